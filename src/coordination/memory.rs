//! In-Memory Coordination Substrate
//!
//! One authoritative tree of records guarded by a single mutex. Every operation
//! is applied atomically under that lock, which gives the guarantees the cluster
//! relies on: sequential suffixes are unique and strictly increasing per parent,
//! and a watch armed by a read observes every change made after that read.
//!
//! Sessions can be disconnected (partition), expired (crash) or time out when
//! they stop sending keepalives (only for sessions opened with a timeout, which
//! is what the coordination server does for remote clients).

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;

use super::client::CoordinationClient;
use super::types::*;
use crate::error::CoordinationError;

/// Shortest period accepted for the session reapers.
pub const MIN_REAP_INTERVAL: Duration = Duration::from_millis(50);

struct Znode {
    data: Vec<u8>,
    ephemeral_owner: Option<SessionId>,
    created_at: u64,
    /// Counter handed out to sequential children.
    next_sequence: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    Connected,
    Disconnected,
    Expired,
}

struct SessionEntry {
    state: SessionState,
    timeout: Option<Duration>,
    last_seen: Instant,
}

struct PendingWatch {
    owner: SessionId,
    sender: oneshot::Sender<WatchedEvent>,
}

#[derive(Default)]
struct Tree {
    nodes: BTreeMap<String, Znode>,
    sessions: HashMap<SessionId, SessionEntry>,
    exists_watches: HashMap<String, Vec<PendingWatch>>,
    child_watches: HashMap<String, Vec<PendingWatch>>,
    clock: u64,
}

impl Tree {
    fn check_session(&mut self, session: &SessionId) -> Result<(), CoordinationError> {
        match self.sessions.get_mut(session) {
            Some(entry) => match entry.state {
                SessionState::Connected => {
                    entry.last_seen = Instant::now();
                    Ok(())
                }
                SessionState::Disconnected => Err(CoordinationError::ConnectionLoss),
                SessionState::Expired => Err(CoordinationError::SessionExpired),
            },
            None => Err(CoordinationError::SessionExpired),
        }
    }

    fn children_of(&self, path: &str) -> Vec<String> {
        let prefix = if path == "/" {
            "/".to_string()
        } else {
            format!("{}/", path)
        };

        self.nodes
            .range(prefix.clone()..)
            .take_while(|(key, _)| key.starts_with(&prefix))
            .map(|(key, _)| &key[prefix.len()..])
            .filter(|rest| !rest.is_empty() && !rest.contains('/'))
            .map(|rest| rest.to_string())
            .collect()
    }

    fn stat_of(&self, path: &str) -> Option<Stat> {
        self.nodes.get(path).map(|node| Stat {
            created_at: node.created_at,
            ephemeral_owner: node.ephemeral_owner.clone(),
            num_children: self.children_of(path).len(),
            data_length: node.data.len(),
        })
    }

    fn arm(
        watches: &mut HashMap<String, Vec<PendingWatch>>,
        owner: &SessionId,
        path: &str,
    ) -> Watch {
        let (sender, receiver) = oneshot::channel();
        watches
            .entry(path.to_string())
            .or_default()
            .push(PendingWatch {
                owner: owner.clone(),
                sender,
            });
        receiver
    }

    fn fire(
        watches: &mut HashMap<String, Vec<PendingWatch>>,
        path: &str,
        event_type: EventType,
    ) {
        if let Some(pending) = watches.remove(path) {
            for watch in pending {
                // Receiver may already be gone; nothing to deliver then.
                let _ = watch.sender.send(WatchedEvent {
                    event_type,
                    path: path.to_string(),
                });
            }
        }
    }

    fn create_node(
        &mut self,
        owner: &SessionId,
        path: &str,
        data: Vec<u8>,
        mode: CreateMode,
    ) -> Result<String, CoordinationError> {
        validate_path(path)?;
        let parent = parent_path(path).ok_or_else(|| CoordinationError::NodeExists("/".into()))?;

        let parent_node = self
            .nodes
            .get_mut(parent)
            .ok_or_else(|| CoordinationError::NoNode(parent.to_string()))?;

        if parent_node.ephemeral_owner.is_some() {
            return Err(CoordinationError::NoChildrenForEphemerals(
                parent.to_string(),
            ));
        }

        let full_path = if mode.is_sequential() {
            let sequence = parent_node.next_sequence;
            parent_node.next_sequence += 1;
            format!("{}{:0width$}", path, sequence, width = SEQUENCE_WIDTH)
        } else {
            path.to_string()
        };

        if self.nodes.contains_key(&full_path) {
            return Err(CoordinationError::NodeExists(full_path));
        }

        self.clock += 1;
        self.nodes.insert(
            full_path.clone(),
            Znode {
                data,
                ephemeral_owner: mode.is_ephemeral().then(|| owner.clone()),
                created_at: self.clock,
                next_sequence: 0,
            },
        );

        Self::fire(&mut self.exists_watches, &full_path, EventType::NodeCreated);
        Self::fire(
            &mut self.child_watches,
            parent,
            EventType::NodeChildrenChanged,
        );

        Ok(full_path)
    }

    fn delete_node(&mut self, path: &str) -> Result<(), CoordinationError> {
        validate_path(path)?;
        if path == "/" {
            return Err(CoordinationError::InvalidPath(path.to_string()));
        }
        if !self.nodes.contains_key(path) {
            return Err(CoordinationError::NoNode(path.to_string()));
        }
        if !self.children_of(path).is_empty() {
            return Err(CoordinationError::NotEmpty(path.to_string()));
        }

        self.nodes.remove(path);

        Self::fire(&mut self.exists_watches, path, EventType::NodeDeleted);
        Self::fire(&mut self.child_watches, path, EventType::NodeDeleted);
        if let Some(parent) = parent_path(path) {
            Self::fire(
                &mut self.child_watches,
                parent,
                EventType::NodeChildrenChanged,
            );
        }

        Ok(())
    }

    /// Ends a session: its pending watches are dropped (their receivers observe a
    /// closed channel) and its ephemeral records are deleted.
    fn end_session(&mut self, session: &SessionId) -> Vec<String> {
        if let Some(entry) = self.sessions.get_mut(session) {
            entry.state = SessionState::Expired;
        }

        for watches in [&mut self.exists_watches, &mut self.child_watches] {
            for pending in watches.values_mut() {
                pending.retain(|watch| &watch.owner != session);
            }
            watches.retain(|_, pending| !pending.is_empty());
        }

        let owned: Vec<String> = self
            .nodes
            .iter()
            .filter(|(_, node)| node.ephemeral_owner.as_ref() == Some(session))
            .map(|(path, _)| path.clone())
            .collect();

        for path in owned.iter() {
            if let Err(e) = self.delete_node(path) {
                tracing::warn!("Failed to remove ephemeral {} of {}: {}", path, session, e);
            }
        }

        owned
    }
}

/// The authoritative in-process substrate.
pub struct MemoryCoordinator {
    tree: Mutex<Tree>,
}

impl MemoryCoordinator {
    pub fn new() -> Arc<Self> {
        let mut tree = Tree::default();
        tree.nodes.insert(
            "/".to_string(),
            Znode {
                data: Vec::new(),
                ephemeral_owner: None,
                created_at: 0,
                next_sequence: 0,
            },
        );

        Arc::new(Self {
            tree: Mutex::new(tree),
        })
    }

    /// Opens a session that never times out (it lives until closed or expired).
    pub fn connect(self: &Arc<Self>) -> MemorySession {
        self.open_session(None)
    }

    /// Opens a session that expires when it is not touched within `timeout`.
    pub fn connect_with_timeout(self: &Arc<Self>, timeout: Duration) -> MemorySession {
        self.open_session(Some(timeout))
    }

    fn open_session(self: &Arc<Self>, timeout: Option<Duration>) -> MemorySession {
        let id = SessionId::new();
        self.tree.lock().sessions.insert(
            id.clone(),
            SessionEntry {
                state: SessionState::Connected,
                timeout,
                last_seen: Instant::now(),
            },
        );
        tracing::debug!("Opened coordination session {}", id);

        MemorySession {
            coordinator: self.clone(),
            id,
        }
    }

    /// Keepalive. Fails once the session has expired.
    pub fn touch(&self, session: &SessionId) -> Result<(), CoordinationError> {
        self.tree.lock().check_session(session)
    }

    /// Simulates a network partition between one session and the substrate.
    pub fn set_connected(&self, session: &SessionId, connected: bool) {
        let mut tree = self.tree.lock();
        if let Some(entry) = tree.sessions.get_mut(session)
            && entry.state != SessionState::Expired
        {
            entry.state = if connected {
                SessionState::Connected
            } else {
                SessionState::Disconnected
            };
            entry.last_seen = Instant::now();
        }
    }

    /// Simulates a crash of the session's owner.
    pub fn expire_session(&self, session: &SessionId) {
        let removed = self.tree.lock().end_session(session);
        tracing::info!(
            "Session {} expired, removed {} ephemeral record(s)",
            session,
            removed.len()
        );
    }

    pub fn close_session(&self, session: &SessionId) {
        let removed = self.tree.lock().end_session(session);
        tracing::debug!(
            "Session {} closed, removed {} ephemeral record(s)",
            session,
            removed.len()
        );
    }

    pub fn is_connected(&self, session: &SessionId) -> bool {
        self.tree
            .lock()
            .sessions
            .get(session)
            .map(|entry| entry.state == SessionState::Connected)
            .unwrap_or(false)
    }

    pub fn is_expired(&self, session: &SessionId) -> bool {
        self.tree
            .lock()
            .sessions
            .get(session)
            .map(|entry| entry.state == SessionState::Expired)
            .unwrap_or(true)
    }

    /// Number of sessions that have not expired.
    pub fn live_sessions(&self) -> usize {
        self.tree
            .lock()
            .sessions
            .values()
            .filter(|entry| entry.state != SessionState::Expired)
            .count()
    }

    /// Total sessions the tree still tracks, expired ones included.
    pub fn tracked_sessions(&self) -> usize {
        self.tree.lock().sessions.len()
    }

    /// Forgets sessions that have already expired. Unknown sessions are
    /// treated as expired, so callers observe no difference.
    pub fn purge_expired_sessions(&self) -> usize {
        let mut tree = self.tree.lock();
        let before = tree.sessions.len();
        tree.sessions
            .retain(|_, entry| entry.state != SessionState::Expired);
        before - tree.sessions.len()
    }

    /// Expires every timed session whose last keepalive is older than its timeout.
    pub fn expire_stale_sessions(&self) -> Vec<SessionId> {
        let mut tree = self.tree.lock();
        let now = Instant::now();

        let stale: Vec<SessionId> = tree
            .sessions
            .iter()
            .filter(|(_, entry)| entry.state != SessionState::Expired)
            .filter(|(_, entry)| {
                entry
                    .timeout
                    .map(|timeout| now.duration_since(entry.last_seen) > timeout)
                    .unwrap_or(false)
            })
            .map(|(id, _)| id.clone())
            .collect();

        for session in stale.iter() {
            let removed = tree.end_session(session);
            tracing::info!(
                "Session {} timed out, removed {} ephemeral record(s)",
                session,
                removed.len()
            );
        }

        stale
    }

    pub fn spawn_session_reaper(self: &Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        let coordinator = self.clone();
        let interval = interval.max(MIN_REAP_INTERVAL);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                coordinator.expire_stale_sessions();
                coordinator.purge_expired_sessions();
            }
        })
    }

    pub fn create(
        &self,
        session: &SessionId,
        path: &str,
        data: Vec<u8>,
        mode: CreateMode,
    ) -> Result<String, CoordinationError> {
        let mut tree = self.tree.lock();
        tree.check_session(session)?;
        tree.create_node(session, path, data, mode)
    }

    pub fn delete(&self, session: &SessionId, path: &str) -> Result<(), CoordinationError> {
        let mut tree = self.tree.lock();
        tree.check_session(session)?;
        tree.delete_node(path)
    }

    pub fn exists(
        &self,
        session: &SessionId,
        path: &str,
        watch: bool,
    ) -> Result<(Option<Stat>, Option<Watch>), CoordinationError> {
        validate_path(path)?;
        let mut tree = self.tree.lock();
        tree.check_session(session)?;

        let stat = tree.stat_of(path);
        let watch = watch.then(|| Tree::arm(&mut tree.exists_watches, session, path));

        Ok((stat, watch))
    }

    pub fn get_children(
        &self,
        session: &SessionId,
        path: &str,
        watch: bool,
    ) -> Result<(Vec<String>, Option<Watch>), CoordinationError> {
        validate_path(path)?;
        let mut tree = self.tree.lock();
        tree.check_session(session)?;

        if !tree.nodes.contains_key(path) {
            return Err(CoordinationError::NoNode(path.to_string()));
        }

        let children = tree.children_of(path);
        let watch = watch.then(|| Tree::arm(&mut tree.child_watches, session, path));

        Ok((children, watch))
    }

    pub fn get_data(&self, session: &SessionId, path: &str) -> Result<Vec<u8>, CoordinationError> {
        validate_path(path)?;
        let mut tree = self.tree.lock();
        tree.check_session(session)?;

        tree.nodes
            .get(path)
            .map(|node| node.data.clone())
            .ok_or_else(|| CoordinationError::NoNode(path.to_string()))
    }
}

/// A client session on a `MemoryCoordinator`.
#[derive(Clone)]
pub struct MemorySession {
    coordinator: Arc<MemoryCoordinator>,
    id: SessionId,
}

impl MemorySession {
    pub fn coordinator(&self) -> &Arc<MemoryCoordinator> {
        &self.coordinator
    }
}

fn armed(watch: Option<Watch>) -> Result<Watch, CoordinationError> {
    watch.ok_or_else(|| CoordinationError::Protocol("watch was not armed".to_string()))
}

#[async_trait]
impl CoordinationClient for MemorySession {
    fn session_id(&self) -> &SessionId {
        &self.id
    }

    fn is_connected(&self) -> bool {
        self.coordinator.is_connected(&self.id)
    }

    async fn create(
        &self,
        path: &str,
        data: Vec<u8>,
        mode: CreateMode,
    ) -> Result<String, CoordinationError> {
        self.coordinator.create(&self.id, path, data, mode)
    }

    async fn delete(&self, path: &str) -> Result<(), CoordinationError> {
        self.coordinator.delete(&self.id, path)
    }

    async fn exists(&self, path: &str) -> Result<Option<Stat>, CoordinationError> {
        let (stat, _) = self.coordinator.exists(&self.id, path, false)?;
        Ok(stat)
    }

    async fn watch_exists(
        &self,
        path: &str,
    ) -> Result<(Option<Stat>, Watch), CoordinationError> {
        let (stat, watch) = self.coordinator.exists(&self.id, path, true)?;
        Ok((stat, armed(watch)?))
    }

    async fn get_children(&self, path: &str) -> Result<Vec<String>, CoordinationError> {
        let (children, _) = self.coordinator.get_children(&self.id, path, false)?;
        Ok(children)
    }

    async fn watch_children(
        &self,
        path: &str,
    ) -> Result<(Vec<String>, Watch), CoordinationError> {
        let (children, watch) = self.coordinator.get_children(&self.id, path, true)?;
        Ok((children, armed(watch)?))
    }

    async fn get_data(&self, path: &str) -> Result<Vec<u8>, CoordinationError> {
        self.coordinator.get_data(&self.id, path)
    }

    async fn close(&self) {
        self.coordinator.close_session(&self.id);
    }
}
