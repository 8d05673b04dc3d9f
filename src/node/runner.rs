use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;

use super::manager::RoleManager;
use crate::config::NodeConfig;
use crate::coordination::client::CoordinationClient;
use crate::coordination::types::SessionId;
use crate::election::{ELECTION_NAMESPACE, LeaderElection, Role};
use crate::membership::MembershipStore;
use crate::registry::{COORDINATORS_REGISTRY_NAMESPACE, ServiceRegistry, WORKERS_REGISTRY_NAMESPACE};
use crate::search::documents::{DocumentStore, FsDocumentStore};
use crate::search::transport::{HttpTransport, WorkerTransport};

/// One member of the search cluster, wired to a coordination session.
pub struct ClusterNode {
    store: MembershipStore,
    workers: Arc<ServiceRegistry>,
    coordinators: Arc<ServiceRegistry>,
    election: Arc<LeaderElection>,
    manager: Arc<RoleManager>,
    manager_task: JoinHandle<()>,
}

impl ClusterNode {
    /// Starts a node serving the documents under `config.books_dir`.
    pub async fn start(
        config: NodeConfig,
        client: Arc<dyn CoordinationClient>,
    ) -> anyhow::Result<Self> {
        let documents = Arc::new(FsDocumentStore::new(config.books_dir.clone()));
        Self::start_with(config, client, documents, Arc::new(HttpTransport::new())).await
    }

    pub async fn start_with(
        config: NodeConfig,
        client: Arc<dyn CoordinationClient>,
        documents: Arc<dyn DocumentStore>,
        transport: Arc<dyn WorkerTransport>,
    ) -> anyhow::Result<Self> {
        let store = MembershipStore::new(client);
        tracing::info!("Node session {}", store.session_id());

        let workers = ServiceRegistry::new(store.clone(), WORKERS_REGISTRY_NAMESPACE).await?;
        let coordinators =
            ServiceRegistry::new(store.clone(), COORDINATORS_REGISTRY_NAMESPACE).await?;
        let election = LeaderElection::new(store.clone(), ELECTION_NAMESPACE).await?;

        let manager = Arc::new(RoleManager::new(
            workers.clone(),
            coordinators.clone(),
            documents,
            transport,
            &config.host,
            config.port,
            &config.advertise_host,
            config.task_timeout,
        ));
        let manager_task = tokio::spawn(manager.clone().run(election.subscribe()));

        election.volunteer_for_leadership().await?;
        election.start();

        Ok(Self {
            store,
            workers,
            coordinators,
            election,
            manager,
            manager_task,
        })
    }

    pub fn session_id(&self) -> &SessionId {
        self.store.session_id()
    }

    pub fn election(&self) -> &Arc<LeaderElection> {
        &self.election
    }

    pub fn workers(&self) -> &Arc<ServiceRegistry> {
        &self.workers
    }

    pub fn coordinators(&self) -> &Arc<ServiceRegistry> {
        &self.coordinators
    }

    /// The role the node is currently serving, once it has acted on one.
    pub async fn role(&self) -> Option<Role> {
        self.manager.role().await
    }

    pub async fn server_addr(&self) -> Option<SocketAddr> {
        self.manager.server_addr().await
    }

    /// Leaves the cluster: stops reacting to elections, withdraws the
    /// advertised address and the candidate record, and stops the server.
    pub async fn shutdown(self) {
        self.manager_task.abort();
        self.manager.shutdown().await;

        if let Err(e) = self.election.resign().await {
            tracing::warn!("Failed to resign from the election: {}", e);
        }

        tracing::info!("Node {} left the cluster", self.store.session_id());
    }
}
