//! Remote Coordination Client
//!
//! Talks to a coordination server over HTTP. The session is kept alive by a
//! background heartbeat; if the server stops answering, the client reports
//! itself disconnected, and once the server declares the session expired the
//! client is done for good (its ephemeral records are gone).

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{oneshot, watch};

use super::client::CoordinationClient;
use super::protocol::*;
use super::types::{CreateMode, SessionId, Stat, Watch};
use crate::error::CoordinationError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
const WATCH_RETRY_DELAY: Duration = Duration::from_millis(500);

struct Shared {
    http: reqwest::Client,
    base_url: String,
    session_id: SessionId,
    connected: AtomicBool,
    expired: watch::Sender<bool>,
}

impl Shared {
    async fn call<Req, Resp>(
        &self,
        endpoint: &str,
        body: &Req,
        timeout: Duration,
    ) -> Result<Resp, CoordinationError>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, endpoint);
        let response = self
            .http
            .post(url)
            .json(body)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| CoordinationError::Transport(e.to_string()))?;

        let reply = response
            .json::<Reply<Resp>>()
            .await
            .map_err(|e| CoordinationError::Protocol(e.to_string()))?;

        if let Err(CoordinationError::SessionExpired) = &reply {
            self.mark_expired();
        }

        reply
    }

    fn mark_expired(&self) {
        self.connected.store(false, Ordering::SeqCst);
        self.expired.send_replace(true);
    }

    fn is_expired(&self) -> bool {
        *self.expired.borrow()
    }
}

pub struct RemoteCoordinator {
    shared: Arc<Shared>,
    keepalive: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl RemoteCoordinator {
    /// Opens a session on the coordination server at `base_url` and starts the
    /// keepalive heartbeat (every third of `session_timeout`).
    pub async fn connect(
        base_url: &str,
        session_timeout: Duration,
    ) -> Result<Arc<Self>, CoordinationError> {
        let http = reqwest::Client::new();
        let base_url = base_url.trim_end_matches('/').to_string();

        let (expired, _) = watch::channel(false);
        let mut shared = Shared {
            http,
            base_url,
            session_id: SessionId(String::new()),
            connected: AtomicBool::new(false),
            expired,
        };

        let opened: OpenSessionResponse = shared
            .call(
                ENDPOINT_SESSION_OPEN,
                &OpenSessionRequest {
                    timeout_ms: session_timeout.as_millis() as u64,
                },
                REQUEST_TIMEOUT,
            )
            .await?;

        shared.session_id = opened.session_id;
        shared.connected.store(true, Ordering::SeqCst);
        tracing::info!(
            "Connected to coordination service at {} (session {})",
            shared.base_url,
            shared.session_id
        );

        let client = Arc::new(Self {
            shared: Arc::new(shared),
            keepalive: Mutex::new(None),
        });

        let interval = (session_timeout / 3).max(Duration::from_millis(50));
        *client.keepalive.lock() = Some(client.spawn_keepalive(interval));

        Ok(client)
    }

    /// Resolves once the server has declared this session expired (or the
    /// session was closed locally).
    pub async fn expired(&self) {
        let mut receiver = self.shared.expired.subscribe();
        // Sender lives as long as `self`, so this only ends on `true`.
        let _ = receiver.wait_for(|expired| *expired).await;
    }

    fn spawn_keepalive(&self, interval: Duration) -> tokio::task::JoinHandle<()> {
        let shared = self.shared.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;

                let request = SessionRequest {
                    session_id: shared.session_id.clone(),
                };
                match shared
                    .call::<_, ()>(ENDPOINT_SESSION_KEEPALIVE, &request, interval)
                    .await
                {
                    Ok(()) => {
                        if !shared.connected.swap(true, Ordering::SeqCst) {
                            tracing::info!("Reconnected to coordination service");
                        }
                    }
                    Err(CoordinationError::SessionExpired) => {
                        tracing::error!("Coordination session {} expired", shared.session_id);
                        break;
                    }
                    Err(e) => {
                        if shared.connected.swap(false, Ordering::SeqCst) {
                            tracing::warn!("Lost connection to coordination service: {}", e);
                        }
                    }
                }
            }
        })
    }

    /// Long-polls the server for one parked watch and forwards the event into a
    /// local one-shot channel. Dropping the sender (session gone, unknown watch)
    /// closes the channel, which is how watchers learn the session ended.
    fn spawn_watch_poller(&self, watch_id: String) -> Watch {
        let (sender, receiver) = oneshot::channel();
        let shared = self.shared.clone();

        tokio::spawn(async move {
            let request = WatchPollRequest {
                session_id: shared.session_id.clone(),
                watch_id,
            };

            loop {
                if sender.is_closed() || shared.is_expired() {
                    break;
                }

                let result: Result<WatchPollResponse, _> = shared
                    .call(
                        ENDPOINT_WATCH,
                        &request,
                        WATCH_POLL_WINDOW + REQUEST_TIMEOUT,
                    )
                    .await;

                match result {
                    Ok(WatchPollResponse { event: Some(event) }) => {
                        let _ = sender.send(event);
                        break;
                    }
                    Ok(WatchPollResponse { event: None }) => continue,
                    Err(CoordinationError::Transport(e)) => {
                        tracing::debug!("Watch poll {} failed: {}", request.watch_id, e);
                        tokio::time::sleep(WATCH_RETRY_DELAY).await;
                    }
                    Err(e) => {
                        tracing::debug!("Watch {} abandoned: {}", request.watch_id, e);
                        break;
                    }
                }
            }
        });

        receiver
    }

    fn path_request(&self, path: &str, watch: bool) -> PathRequest {
        PathRequest {
            session_id: self.shared.session_id.clone(),
            path: path.to_string(),
            watch,
        }
    }

    fn armed(&self, watch_id: Option<String>) -> Result<Watch, CoordinationError> {
        watch_id
            .map(|id| self.spawn_watch_poller(id))
            .ok_or_else(|| CoordinationError::Protocol("watch was not armed".to_string()))
    }
}

impl Drop for RemoteCoordinator {
    fn drop(&mut self) {
        if let Some(handle) = self.keepalive.lock().take() {
            handle.abort();
        }
    }
}

#[async_trait]
impl CoordinationClient for RemoteCoordinator {
    fn session_id(&self) -> &SessionId {
        &self.shared.session_id
    }

    fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst) && !self.shared.is_expired()
    }

    async fn create(
        &self,
        path: &str,
        data: Vec<u8>,
        mode: CreateMode,
    ) -> Result<String, CoordinationError> {
        let request = CreateRequest {
            session_id: self.shared.session_id.clone(),
            path: path.to_string(),
            data,
            mode,
        };
        let response: CreateResponse = self
            .shared
            .call(ENDPOINT_CREATE, &request, REQUEST_TIMEOUT)
            .await?;

        Ok(response.path)
    }

    async fn delete(&self, path: &str) -> Result<(), CoordinationError> {
        self.shared
            .call(ENDPOINT_DELETE, &self.path_request(path, false), REQUEST_TIMEOUT)
            .await
    }

    async fn exists(&self, path: &str) -> Result<Option<Stat>, CoordinationError> {
        let response: ExistsResponse = self
            .shared
            .call(ENDPOINT_EXISTS, &self.path_request(path, false), REQUEST_TIMEOUT)
            .await?;

        Ok(response.stat)
    }

    async fn watch_exists(
        &self,
        path: &str,
    ) -> Result<(Option<Stat>, Watch), CoordinationError> {
        let response: ExistsResponse = self
            .shared
            .call(ENDPOINT_EXISTS, &self.path_request(path, true), REQUEST_TIMEOUT)
            .await?;

        Ok((response.stat, self.armed(response.watch_id)?))
    }

    async fn get_children(&self, path: &str) -> Result<Vec<String>, CoordinationError> {
        let response: ChildrenResponse = self
            .shared
            .call(ENDPOINT_CHILDREN, &self.path_request(path, false), REQUEST_TIMEOUT)
            .await?;

        Ok(response.children)
    }

    async fn watch_children(
        &self,
        path: &str,
    ) -> Result<(Vec<String>, Watch), CoordinationError> {
        let response: ChildrenResponse = self
            .shared
            .call(ENDPOINT_CHILDREN, &self.path_request(path, true), REQUEST_TIMEOUT)
            .await?;

        Ok((response.children, self.armed(response.watch_id)?))
    }

    async fn get_data(&self, path: &str) -> Result<Vec<u8>, CoordinationError> {
        let response: DataResponse = self
            .shared
            .call(ENDPOINT_DATA, &self.path_request(path, false), REQUEST_TIMEOUT)
            .await?;

        Ok(response.data)
    }

    async fn close(&self) {
        let keepalive = self.keepalive.lock().take();
        if let Some(handle) = keepalive {
            handle.abort();
        }

        let request = SessionRequest {
            session_id: self.shared.session_id.clone(),
        };
        if let Err(e) = self
            .shared
            .call::<_, ()>(ENDPOINT_SESSION_CLOSE, &request, REQUEST_TIMEOUT)
            .await
        {
            tracing::warn!("Failed to close coordination session cleanly: {}", e);
        }

        self.shared.mark_expired();
    }
}
