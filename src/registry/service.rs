use arc_swap::ArcSwapOption;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use tokio::task::JoinHandle;

use crate::coordination::types::{join_path, sequence_of};
use crate::error::RegistryError;
use crate::membership::backoff::Backoff;
use crate::membership::{ChildrenSubscription, MembershipStore, RecordId};

pub const WORKERS_REGISTRY_NAMESPACE: &str = "/workers_service_registry";
pub const COORDINATORS_REGISTRY_NAMESPACE: &str = "/coordinators_service_registry";

const RECORD_PREFIX: &str = "n_";

/// Addresses advertised under a namespace, in registration order, without
/// duplicates. Cheap to clone; never modified after it is built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MembershipSnapshot(Arc<Vec<String>>);

impl MembershipSnapshot {
    pub fn addresses(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, address: &str) -> bool {
        self.0.iter().any(|a| a == address)
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.0.as_ref().clone()
    }
}

pub struct ServiceRegistry {
    store: MembershipStore,
    namespace: String,
    own_record: tokio::sync::Mutex<Option<RecordId>>,
    snapshot: ArcSwapOption<Vec<String>>,
    refresh_lock: tokio::sync::Mutex<()>,
    watch_task: Mutex<Option<JoinHandle<()>>>,
}

impl ServiceRegistry {
    pub async fn new(store: MembershipStore, namespace: &str) -> Result<Arc<Self>, RegistryError> {
        store.ensure_namespace(namespace).await?;

        Ok(Arc::new(Self {
            store,
            namespace: namespace.to_string(),
            own_record: tokio::sync::Mutex::new(None),
            snapshot: ArcSwapOption::empty(),
            refresh_lock: tokio::sync::Mutex::new(()),
            watch_task: Mutex::new(None),
        }))
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Advertises `address` in this registry. Only the first call registers;
    /// later calls return the same record.
    pub async fn register_to_cluster(&self, address: &str) -> Result<RecordId, RegistryError> {
        let mut own = self.own_record.lock().await;
        if let Some(record) = own.as_ref() {
            tracing::debug!("Already registered to {} as {}", self.namespace, record);
            return Ok(record.clone());
        }

        let record = self
            .store
            .register(&self.namespace, RECORD_PREFIX, address)
            .await?;
        tracing::info!("Registered to service registry {} as {}", self.namespace, record);
        *own = Some(record.clone());
        drop(own);

        self.refresh_if_cached().await;
        Ok(record)
    }

    pub async fn unregister_from_cluster(&self) -> Result<(), RegistryError> {
        let mut own = self.own_record.lock().await;
        let Some(record) = own.take() else {
            tracing::debug!("Not registered to {}, nothing to remove", self.namespace);
            return Ok(());
        };

        let removed = self.store.unregister(&record).await;
        if let Err(e) = removed {
            *own = Some(record);
            return Err(e.into());
        }
        tracing::info!("Unregistered {} from the cluster", record);
        drop(own);

        self.refresh_if_cached().await;
        Ok(())
    }

    pub async fn own_record(&self) -> Option<RecordId> {
        self.own_record.lock().await.clone()
    }

    /// Refreshes the cache right away and keeps it current from then on.
    /// Calling it again while the watch loop runs does nothing.
    pub async fn register_for_updates(self: &Arc<Self>) -> Result<(), RegistryError> {
        if self.is_watching() {
            return Ok(());
        }

        let mut subscription = self.store.subscribe_children(&self.namespace);
        subscription.next().await?;
        self.refresh_now().await?;

        let mut slot = self.watch_task.lock();
        if slot.is_none() {
            *slot = Some(Self::spawn_watch_loop(Arc::downgrade(self), subscription));
            tracing::info!("Watching {} for membership changes", self.namespace);
        }

        Ok(())
    }

    /// Current addresses. The first call refreshes synchronously and installs
    /// the watch loop; later calls return the cached snapshot.
    pub async fn get_all_service_addresses(
        self: &Arc<Self>,
    ) -> Result<MembershipSnapshot, RegistryError> {
        if let Some(snapshot) = self.current_snapshot() {
            return Ok(snapshot);
        }

        self.register_for_updates().await?;

        match self.current_snapshot() {
            Some(snapshot) => Ok(snapshot),
            None => self.refresh_now().await,
        }
    }

    pub fn current_snapshot(&self) -> Option<MembershipSnapshot> {
        self.snapshot.load_full().map(MembershipSnapshot)
    }

    /// Rebuilds the snapshot from the substrate and swaps it in.
    pub async fn refresh_now(&self) -> Result<MembershipSnapshot, RegistryError> {
        let _guard = self.refresh_lock.lock().await;

        let mut children = self.store.list_children(&self.namespace).await?;
        children.sort_by(|a, b| sequence_of(a).cmp(&sequence_of(b)).then_with(|| a.cmp(b)));

        let mut addresses: Vec<String> = Vec::with_capacity(children.len());
        for child in children.iter() {
            let path = join_path(&self.namespace, child);
            if let Some(address) = self.store.read_record(&path).await?
                && !addresses.contains(&address)
            {
                addresses.push(address);
            }
        }

        let addresses = Arc::new(addresses);
        self.snapshot.store(Some(addresses.clone()));
        tracing::info!("The cluster addresses are: {:?}", addresses);

        Ok(MembershipSnapshot(addresses))
    }

    async fn refresh_if_cached(&self) {
        if self.snapshot.load().is_none() {
            return;
        }
        if let Err(e) = self.refresh_now().await {
            tracing::warn!("Failed to refresh {} after a local change: {}", self.namespace, e);
        }
    }

    pub fn is_watching(&self) -> bool {
        self.watch_task.lock().is_some()
    }

    pub fn stop_watching(&self) {
        if let Some(handle) = self.watch_task.lock().take() {
            handle.abort();
            tracing::debug!("Stopped watching {}", self.namespace);
        }
    }

    fn spawn_watch_loop(
        registry: Weak<Self>,
        mut subscription: ChildrenSubscription,
    ) -> JoinHandle<()> {
        let namespace = subscription.path().to_string();

        tokio::spawn(async move {
            let mut backoff = Backoff::new();

            loop {
                let changed = subscription.next().await;

                let Some(registry) = registry.upgrade() else {
                    break;
                };

                let result = match changed {
                    Ok(_) => registry.refresh_now().await.map(|_| ()),
                    Err(e) => Err(RegistryError::from(e)),
                };
                drop(registry);

                match result {
                    Ok(()) => backoff.reset(),
                    Err(e) => {
                        tracing::warn!(
                            "Membership refresh of {} failed, retrying in {:?}: {}",
                            namespace,
                            backoff.current(),
                            e
                        );
                        backoff.wait().await;
                    }
                }
            }
        })
    }
}

impl Drop for ServiceRegistry {
    fn drop(&mut self) {
        if let Some(handle) = self.watch_task.get_mut().take() {
            handle.abort();
        }
    }
}
