use dashmap::DashMap;
use std::sync::Arc;

use super::subscription::ChildrenSubscription;
use crate::coordination::client::CoordinationClient;
use crate::coordination::types::{
    CreateMode, SessionId, Watch, WatchedEvent, join_path, node_name, parent_path, sequence_of,
    validate_path,
};
use crate::error::{CoordinationError, MembershipError};

/// Identity of a record this process created: its namespace and the
/// substrate-assigned name (prefix plus sequence suffix).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordId {
    pub namespace: String,
    pub name: String,
}

impl RecordId {
    pub fn from_path(full_path: &str) -> Self {
        let name = node_name(full_path).to_string();
        let namespace = parent_path(full_path).unwrap_or("/").to_string();
        Self { namespace, name }
    }

    pub fn full_path(&self) -> String {
        join_path(&self.namespace, &self.name)
    }

    pub fn sequence(&self) -> Option<u64> {
        sequence_of(&self.name)
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.full_path())
    }
}

/// A one-shot change notification handed out by a watched read.
///
/// Resolves with the event that fired it, or with `None` if the session that
/// armed it ended first.
#[derive(Debug)]
pub struct ChangeNotification(Watch);

impl ChangeNotification {
    pub async fn fired(self) -> Option<WatchedEvent> {
        self.0.await.ok()
    }
}

#[derive(Clone)]
pub struct MembershipStore {
    client: Arc<dyn CoordinationClient>,
    /// Records this process registered, keyed by namespace.
    owned: Arc<DashMap<String, RecordId>>,
}

impl MembershipStore {
    pub fn new(client: Arc<dyn CoordinationClient>) -> Self {
        Self {
            client,
            owned: Arc::new(DashMap::new()),
        }
    }

    pub fn client(&self) -> &Arc<dyn CoordinationClient> {
        &self.client
    }

    pub fn session_id(&self) -> &SessionId {
        self.client.session_id()
    }

    pub fn is_connected(&self) -> bool {
        self.client.is_connected()
    }

    /// Creates `path` and any missing ancestor as persistent records.
    /// A record that already exists (possibly created concurrently by another
    /// node) counts as success.
    pub async fn ensure_namespace(&self, path: &str) -> Result<(), MembershipError> {
        validate_path(path)?;

        let mut current = String::new();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            current.push('/');
            current.push_str(segment);

            match self
                .client
                .create(&current, Vec::new(), CreateMode::Persistent)
                .await
            {
                Ok(_) => tracing::debug!("Created namespace {}", current),
                Err(CoordinationError::NodeExists(_)) => {}
                Err(e) => return Err(e.into()),
            }
        }

        Ok(())
    }

    /// Advertises `payload` under `namespace` as an ephemeral sequential record
    /// named `<prefix><sequence>`.
    ///
    /// Registering twice in the same namespace without unregistering returns
    /// the existing record.
    pub async fn register(
        &self,
        namespace: &str,
        prefix: &str,
        payload: &str,
    ) -> Result<RecordId, MembershipError> {
        if !self.client.is_connected() {
            return Err(MembershipError::CoordinationUnavailable(
                CoordinationError::ConnectionLoss,
            ));
        }

        if let Some(existing) = self.owned.get(namespace) {
            return Ok(existing.value().clone());
        }

        let full_path = self
            .client
            .create(
                &join_path(namespace, prefix),
                payload.as_bytes().to_vec(),
                CreateMode::EphemeralSequential,
            )
            .await?;
        let record = RecordId::from_path(&full_path);

        // Another task may have registered in the same namespace meanwhile.
        let winner = self
            .owned
            .entry(namespace.to_string())
            .or_insert_with(|| record.clone())
            .value()
            .clone();

        if winner != record {
            if let Err(e) = self.client.delete(&full_path).await {
                tracing::warn!("Failed to remove duplicate record {}: {}", full_path, e);
            }
        }

        Ok(winner)
    }

    /// Deletes one of this process's records. A record the substrate already
    /// removed is not an error.
    pub async fn unregister(&self, record: &RecordId) -> Result<(), MembershipError> {
        self.owned.remove_if(&record.namespace, |_, owned| owned == record);

        match self.client.delete(&record.full_path()).await {
            Ok(()) => Ok(()),
            Err(CoordinationError::NoNode(_)) => {
                tracing::debug!("Record {} was already gone", record);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn owned_record(&self, namespace: &str) -> Option<RecordId> {
        self.owned.get(namespace).map(|entry| entry.value().clone())
    }

    pub async fn list_children(&self, path: &str) -> Result<Vec<String>, MembershipError> {
        Ok(self.client.get_children(path).await?)
    }

    /// Lists the children of `path` and arms a notification for the next
    /// structural change under it. The caller re-arms after it fires.
    pub async fn list_children_with_watch(
        &self,
        path: &str,
    ) -> Result<(Vec<String>, ChangeNotification), MembershipError> {
        let (children, watch) = self.client.watch_children(path).await?;
        Ok((children, ChangeNotification(watch)))
    }

    /// Arms a notification on one record's existence. `None` when the record is
    /// already gone.
    pub async fn watch_record(
        &self,
        full_path: &str,
    ) -> Result<Option<ChangeNotification>, MembershipError> {
        let (stat, watch) = self.client.watch_exists(full_path).await?;
        Ok(stat.map(|_| ChangeNotification(watch)))
    }

    /// Reads a record's payload; `None` if it vanished since it was listed.
    pub async fn read_record(&self, full_path: &str) -> Result<Option<String>, MembershipError> {
        match self.client.get_data(full_path).await {
            Ok(data) => Ok(Some(String::from_utf8_lossy(&data).into_owned())),
            Err(CoordinationError::NoNode(_)) => {
                tracing::debug!("Record {} vanished before it could be read", full_path);
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn subscribe_children(&self, path: &str) -> ChildrenSubscription {
        ChildrenSubscription::new(self.clone(), path)
    }
}
