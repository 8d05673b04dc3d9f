use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;

use super::roles::ServiceEndpoint;
use super::server::WebServer;
use crate::election::Role;
use crate::error::RegistryError;
use crate::membership::backoff::Backoff;
use crate::registry::ServiceRegistry;
use crate::search::documents::DocumentStore;
use crate::search::transport::WorkerTransport;
use crate::search::{SearchCoordinator, SearchWorker};

#[derive(Default)]
struct NodeState {
    role: Option<Role>,
    server: Option<WebServer>,
    /// Keeps retrying the registry updates of the current role until they
    /// all succeed.
    advertiser: Option<JoinHandle<()>>,
}

impl NodeState {
    fn stop_advertising(&mut self) {
        if let Some(handle) = self.advertiser.take() {
            handle.abort();
        }
    }
}

/// Turns election outcomes into what the node serves and advertises.
///
/// Transitions are applied one at a time. A node becomes a worker at most
/// once; a leader never steps back down to worker. Registry updates that fail
/// are retried in the background with backoff until they go through.
pub struct RoleManager {
    workers: Arc<ServiceRegistry>,
    coordinators: Arc<ServiceRegistry>,
    documents: Arc<dyn DocumentStore>,
    transport: Arc<dyn WorkerTransport>,
    bind_host: String,
    bind_port: u16,
    advertise_host: String,
    task_timeout: Duration,
    state: Mutex<NodeState>,
}

impl RoleManager {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        workers: Arc<ServiceRegistry>,
        coordinators: Arc<ServiceRegistry>,
        documents: Arc<dyn DocumentStore>,
        transport: Arc<dyn WorkerTransport>,
        bind_host: &str,
        bind_port: u16,
        advertise_host: &str,
        task_timeout: Duration,
    ) -> Self {
        Self {
            workers,
            coordinators,
            documents,
            transport,
            bind_host: bind_host.to_string(),
            bind_port,
            advertise_host: advertise_host.to_string(),
            task_timeout,
            state: Mutex::new(NodeState::default()),
        }
    }

    /// Applies role transitions until the election goes away.
    pub async fn run(self: Arc<Self>, mut roles: watch::Receiver<Option<Role>>) {
        loop {
            let role = *roles.borrow_and_update();
            match role {
                Some(Role::Leader) => self.on_elected_to_be_leader().await,
                Some(Role::Follower) => self.on_worker().await,
                None => {}
            }

            if roles.changed().await.is_err() {
                break;
            }
        }
    }

    pub async fn role(&self) -> Option<Role> {
        self.state.lock().await.role
    }

    pub async fn server_addr(&self) -> Option<SocketAddr> {
        self.state
            .lock()
            .await
            .server
            .as_ref()
            .map(|server| server.local_addr())
    }

    /// True once every registry update of the current role went through.
    pub async fn is_advertised(&self) -> bool {
        let state = self.state.lock().await;
        state.server.is_some()
            && state
                .advertiser
                .as_ref()
                .is_some_and(|handle| handle.is_finished())
    }

    pub async fn on_elected_to_be_leader(&self) {
        let mut state = self.state.lock().await;
        if state.role == Some(Role::Leader) {
            return;
        }

        state.stop_advertising();
        if let Some(server) = state.server.take() {
            server.stop().await;
        }

        let coordinator = Arc::new(SearchCoordinator::new(
            self.workers.clone(),
            self.transport.clone(),
            self.documents.clone(),
            self.task_timeout,
        ));
        state.role = Some(Role::Leader);

        // Leaving the workers registry and watching it must happen even when
        // the coordinator server cannot be started.
        let server = self.serve(ServiceEndpoint::Coordinator(coordinator)).await;
        let address = server.as_ref().map(|server| self.advertised_address(server));
        state.server = server;

        let workers = self.workers.clone();
        let coordinators = self.coordinators.clone();
        state.advertiser = Some(tokio::spawn(async move {
            retry_until_ok("leave the workers registry", || {
                workers.unregister_from_cluster()
            })
            .await;
            retry_until_ok("watch the workers registry", || {
                workers.register_for_updates()
            })
            .await;

            if let Some(address) = address {
                retry_until_ok("advertise the coordinator", || {
                    coordinators.register_to_cluster(&address)
                })
                .await;
            }
        }));
    }

    pub async fn on_worker(&self) {
        let mut state = self.state.lock().await;
        if let Some(role) = state.role {
            tracing::debug!("Already acting as {}, ignoring follower role", role);
            return;
        }

        let worker = Arc::new(SearchWorker::new(self.documents.clone()));
        state.role = Some(Role::Follower);

        let Some(server) = self.serve(ServiceEndpoint::Worker(worker)).await else {
            return;
        };
        let address = self.advertised_address(&server);
        state.server = Some(server);

        let workers = self.workers.clone();
        state.advertiser = Some(tokio::spawn(async move {
            retry_until_ok("advertise the worker", || {
                workers.register_to_cluster(&address)
            })
            .await;
        }));
    }

    async fn serve(&self, service: ServiceEndpoint) -> Option<WebServer> {
        let role = service.role_name();
        match WebServer::start((self.bind_host.as_str(), self.bind_port), service).await {
            Ok(server) => Some(server),
            Err(e) => {
                tracing::error!(
                    "Failed to start the {} server on {}:{}: {}",
                    role,
                    self.bind_host,
                    self.bind_port,
                    e
                );
                None
            }
        }
    }

    fn advertised_address(&self, server: &WebServer) -> String {
        format!(
            "http://{}:{}{}",
            self.advertise_host,
            server.local_addr().port(),
            server.endpoint()
        )
    }

    /// Withdraws this node's addresses and stops its server.
    pub async fn shutdown(&self) {
        let mut state = self.state.lock().await;
        state.stop_advertising();

        for registry in [&self.workers, &self.coordinators] {
            if let Err(e) = registry.unregister_from_cluster().await {
                tracing::warn!("Failed to unregister from {}: {}", registry.namespace(), e);
            }
        }
        self.workers.stop_watching();

        if let Some(server) = state.server.take() {
            server.stop().await;
        }
    }
}

impl Drop for RoleManager {
    fn drop(&mut self) {
        self.state.get_mut().stop_advertising();
    }
}

/// Runs `attempt` until it succeeds, backing off between failures.
async fn retry_until_ok<T, F, Fut>(what: &str, mut attempt: F) -> T
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RegistryError>>,
{
    let mut backoff = Backoff::new();
    loop {
        match attempt().await {
            Ok(value) => return value,
            Err(e) => {
                tracing::error!(
                    "Failed to {}, retrying in {:?}: {}",
                    what,
                    backoff.current(),
                    e
                );
                backoff.wait().await;
            }
        }
    }
}
