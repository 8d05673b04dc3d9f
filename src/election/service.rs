use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::types::{CANDIDATE_PREFIX, ElectionState, Role};
use crate::coordination::types::{join_path, sequence_of};
use crate::error::ElectionError;
use crate::membership::MembershipStore;
use crate::membership::backoff::Backoff;

pub struct LeaderElection {
    store: MembershipStore,
    namespace: String,
    state: tokio::sync::Mutex<ElectionState>,
    roles: watch::Sender<Option<Role>>,
    driver: Mutex<Option<JoinHandle<()>>>,
}

impl LeaderElection {
    pub async fn new(store: MembershipStore, namespace: &str) -> Result<Arc<Self>, ElectionError> {
        store.ensure_namespace(namespace).await?;
        let (roles, _) = watch::channel(None);

        Ok(Arc::new(Self {
            store,
            namespace: namespace.to_string(),
            state: tokio::sync::Mutex::new(ElectionState::default()),
            roles,
            driver: Mutex::new(None),
        }))
    }

    /// Role transitions. Holds `None` until the first evaluation.
    pub fn subscribe(&self) -> watch::Receiver<Option<Role>> {
        self.roles.subscribe()
    }

    pub fn current_role(&self) -> Option<Role> {
        *self.roles.borrow()
    }

    pub fn is_leader(&self) -> bool {
        self.current_role() == Some(Role::Leader)
    }

    pub async fn local_name(&self) -> Option<String> {
        self.state.lock().await.local_name.clone()
    }

    pub async fn predecessor(&self) -> Option<String> {
        self.state.lock().await.predecessor.clone()
    }

    /// Creates this node's candidate record and remembers its name.
    pub async fn volunteer_for_leadership(&self) -> Result<String, ElectionError> {
        let record = self
            .store
            .register(&self.namespace, CANDIDATE_PREFIX, "")
            .await?;

        tracing::info!("Volunteered for leadership as {}", record.name);
        self.state.lock().await.local_name = Some(record.name.clone());

        Ok(record.name)
    }

    /// One full evaluation: list the candidates, and either take leadership or
    /// follow the immediate predecessor (arming a deletion watch on it).
    ///
    /// A predecessor that disappears before its watch is armed is skipped and
    /// the order recomputed within the same pass.
    pub async fn reelect_leader(&self) -> Result<Role, ElectionError> {
        let mut state = self.state.lock().await;
        let local = state
            .local_name
            .clone()
            .ok_or(ElectionError::NotVolunteered)?;

        loop {
            let mut candidates = self.store.list_children(&self.namespace).await?;
            candidates.sort_by(|a, b| sequence_of(a).cmp(&sequence_of(b)).then_with(|| a.cmp(b)));

            let Some(position) = candidates.iter().position(|name| *name == local) else {
                return Err(ElectionError::CandidateMissing(local));
            };

            if position == 0 {
                state.predecessor = None;
                state.pending = None;
                self.publish(&mut state, Role::Leader);
                return Ok(Role::Leader);
            }

            let predecessor = &candidates[position - 1];
            let path = join_path(&self.namespace, predecessor);

            match self.store.watch_record(&path).await? {
                Some(notification) => {
                    tracing::debug!("{} is watching {}", local, predecessor);
                    state.predecessor = Some(predecessor.clone());
                    state.pending = Some(notification);
                    self.publish(&mut state, Role::Follower);
                    return Ok(Role::Follower);
                }
                None => {
                    tracing::debug!("Predecessor {} vanished before it was watched", predecessor);
                }
            }
        }
    }

    fn publish(&self, state: &mut ElectionState, role: Role) {
        state.role = Some(role);

        let changed = self.roles.send_if_modified(|current| {
            if *current == Some(role) {
                false
            } else {
                *current = Some(role);
                true
            }
        });

        if changed {
            match role {
                Role::Leader => tracing::info!("I am the leader"),
                Role::Follower => tracing::info!("I am not the leader"),
            }
        }
    }

    /// Starts the background driver: evaluate, and while following wait for
    /// the predecessor to go away, then evaluate again from scratch.
    pub fn start(self: &Arc<Self>) {
        let mut driver = self.driver.lock();
        if driver.is_none() {
            *driver = Some(Self::spawn_driver(Arc::downgrade(self)));
        }
    }

    fn spawn_driver(election: Weak<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut backoff = Backoff::new();

            loop {
                let Some(this) = election.upgrade() else {
                    break;
                };

                let outcome = this.reelect_leader().await;
                match outcome {
                    Ok(Role::Leader) => {
                        backoff.reset();
                        break;
                    }
                    Ok(Role::Follower) => {
                        backoff.reset();
                        let pending = this.state.lock().await.pending.take();
                        drop(this);

                        if let Some(notification) = pending {
                            match notification.fired().await {
                                Some(event) => tracing::debug!(
                                    "Predecessor {} changed ({:?}), re-electing",
                                    event.path,
                                    event.event_type
                                ),
                                None => tracing::debug!("Predecessor watch closed, re-electing"),
                            }
                        }
                    }
                    Err(ElectionError::CandidateMissing(name)) => {
                        tracing::warn!("Candidate {} is gone, volunteering again", name);
                        let volunteered = this.volunteer_again().await;
                        drop(this);
                        if let Err(e) = volunteered {
                            tracing::warn!("Failed to volunteer again: {}", e);
                            backoff.wait().await;
                        }
                    }
                    Err(e) => {
                        drop(this);
                        tracing::warn!(
                            "Leader election failed, retrying in {:?}: {}",
                            backoff.current(),
                            e
                        );
                        backoff.wait().await;
                    }
                }
            }
        })
    }

    async fn volunteer_again(&self) -> Result<(), ElectionError> {
        if let Some(record) = self.store.owned_record(&self.namespace) {
            self.store.unregister(&record).await?;
        }
        self.volunteer_for_leadership().await.map(|_| ())
    }

    /// Stops the driver and withdraws the candidate record.
    pub async fn resign(&self) -> Result<(), ElectionError> {
        let driver = self.driver.lock().take();
        if let Some(handle) = driver {
            handle.abort();
        }

        let mut state = self.state.lock().await;
        if let Some(record) = self.store.owned_record(&self.namespace) {
            self.store.unregister(&record).await?;
            tracing::info!("Withdrew candidate {}", record.name);
        }
        state.reset();

        Ok(())
    }
}

impl Drop for LeaderElection {
    fn drop(&mut self) {
        if let Some(handle) = self.driver.get_mut().take() {
            handle.abort();
        }
    }
}
