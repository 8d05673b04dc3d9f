use super::client::CoordinationClient;
use super::memory::{MIN_REAP_INTERVAL, MemoryCoordinator, MemorySession};
use super::protocol::*;
use super::types::{SessionId, Watch};
use crate::error::CoordinationError;

use axum::http::StatusCode;
use axum::routing::post;
use axum::{Extension, Json, Router};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;

struct ParkedWatch {
    session_id: SessionId,
    watch: Watch,
}

/// Hosts a `MemoryCoordinator` for remote clients.
///
/// Keeps the per-client `MemorySession` handles and the watches that were armed
/// on behalf of clients but not yet collected by a poll.
pub struct CoordinationServer {
    coordinator: Arc<MemoryCoordinator>,
    sessions: DashMap<SessionId, MemorySession>,
    watches: DashMap<String, ParkedWatch>,
}

impl CoordinationServer {
    pub fn new(coordinator: Arc<MemoryCoordinator>) -> Arc<Self> {
        Arc::new(Self {
            coordinator,
            sessions: DashMap::new(),
            watches: DashMap::new(),
        })
    }

    pub fn coordinator(&self) -> &Arc<MemoryCoordinator> {
        &self.coordinator
    }

    fn session(&self, session_id: &SessionId) -> Result<MemorySession, CoordinationError> {
        self.sessions
            .get(session_id)
            .map(|entry| entry.value().clone())
            .ok_or(CoordinationError::SessionExpired)
    }

    fn park(&self, session_id: &SessionId, watch: Watch) -> String {
        let watch_id = uuid::Uuid::new_v4().to_string();
        self.watches.insert(
            watch_id.clone(),
            ParkedWatch {
                session_id: session_id.clone(),
                watch,
            },
        );
        watch_id
    }

    /// Expires sessions that missed their keepalives and drops server-side state
    /// held for expired sessions.
    pub fn reap(&self) {
        self.coordinator.expire_stale_sessions();

        self.sessions
            .retain(|session_id, _| !self.coordinator.is_expired(session_id));
        self.watches
            .retain(|_, parked| !self.coordinator.is_expired(&parked.session_id));
        self.coordinator.purge_expired_sessions();
    }

    pub fn spawn_reaper(self: &Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        let server = self.clone();
        let interval = interval.max(MIN_REAP_INTERVAL);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                server.reap();
            }
        })
    }
}

pub fn router(server: Arc<CoordinationServer>) -> Router {
    Router::new()
        .route(ENDPOINT_SESSION_OPEN, post(handle_open_session))
        .route(ENDPOINT_SESSION_KEEPALIVE, post(handle_keepalive))
        .route(ENDPOINT_SESSION_CLOSE, post(handle_close_session))
        .route(ENDPOINT_CREATE, post(handle_create))
        .route(ENDPOINT_DELETE, post(handle_delete))
        .route(ENDPOINT_EXISTS, post(handle_exists))
        .route(ENDPOINT_CHILDREN, post(handle_children))
        .route(ENDPOINT_DATA, post(handle_data))
        .route(ENDPOINT_WATCH, post(handle_watch_poll))
        .layer(Extension(server))
}

fn reply<T>(result: Reply<T>) -> (StatusCode, Json<Reply<T>>) {
    let status = match &result {
        Ok(_) => StatusCode::OK,
        Err(CoordinationError::SessionExpired) => StatusCode::GONE,
        Err(CoordinationError::ConnectionLoss) => StatusCode::SERVICE_UNAVAILABLE,
        Err(CoordinationError::NoNode(_)) => StatusCode::NOT_FOUND,
        Err(CoordinationError::NodeExists(_)) | Err(CoordinationError::NotEmpty(_)) => {
            StatusCode::CONFLICT
        }
        Err(_) => StatusCode::BAD_REQUEST,
    };

    (status, Json(result))
}

pub async fn handle_open_session(
    Extension(server): Extension<Arc<CoordinationServer>>,
    Json(req): Json<OpenSessionRequest>,
) -> (StatusCode, Json<Reply<OpenSessionResponse>>) {
    let session = server
        .coordinator
        .connect_with_timeout(Duration::from_millis(req.timeout_ms));
    let session_id = session.session_id().clone();

    server.sessions.insert(session_id.clone(), session);
    tracing::info!(
        "Opened session {} (timeout {} ms)",
        session_id,
        req.timeout_ms
    );

    reply(Ok(OpenSessionResponse { session_id }))
}

pub async fn handle_keepalive(
    Extension(server): Extension<Arc<CoordinationServer>>,
    Json(req): Json<SessionRequest>,
) -> (StatusCode, Json<Reply<()>>) {
    reply(server.coordinator.touch(&req.session_id))
}

pub async fn handle_close_session(
    Extension(server): Extension<Arc<CoordinationServer>>,
    Json(req): Json<SessionRequest>,
) -> (StatusCode, Json<Reply<()>>) {
    if let Some((_, session)) = server.sessions.remove(&req.session_id) {
        session.close().await;
        server
            .watches
            .retain(|_, parked| parked.session_id != req.session_id);
        tracing::info!("Closed session {}", req.session_id);
    }

    reply(Ok(()))
}

pub async fn handle_create(
    Extension(server): Extension<Arc<CoordinationServer>>,
    Json(req): Json<CreateRequest>,
) -> (StatusCode, Json<Reply<CreateResponse>>) {
    let result = match server.session(&req.session_id) {
        Ok(session) => session
            .create(&req.path, req.data, req.mode)
            .await
            .map(|path| CreateResponse { path }),
        Err(e) => Err(e),
    };

    reply(result)
}

pub async fn handle_delete(
    Extension(server): Extension<Arc<CoordinationServer>>,
    Json(req): Json<PathRequest>,
) -> (StatusCode, Json<Reply<()>>) {
    let result = match server.session(&req.session_id) {
        Ok(session) => session.delete(&req.path).await,
        Err(e) => Err(e),
    };

    reply(result)
}

pub async fn handle_exists(
    Extension(server): Extension<Arc<CoordinationServer>>,
    Json(req): Json<PathRequest>,
) -> (StatusCode, Json<Reply<ExistsResponse>>) {
    let result = server
        .coordinator
        .exists(&req.session_id, &req.path, req.watch)
        .map(|(stat, watch)| ExistsResponse {
            stat,
            watch_id: watch.map(|watch| server.park(&req.session_id, watch)),
        });

    reply(result)
}

pub async fn handle_children(
    Extension(server): Extension<Arc<CoordinationServer>>,
    Json(req): Json<PathRequest>,
) -> (StatusCode, Json<Reply<ChildrenResponse>>) {
    let result = server
        .coordinator
        .get_children(&req.session_id, &req.path, req.watch)
        .map(|(children, watch)| ChildrenResponse {
            children,
            watch_id: watch.map(|watch| server.park(&req.session_id, watch)),
        });

    reply(result)
}

pub async fn handle_data(
    Extension(server): Extension<Arc<CoordinationServer>>,
    Json(req): Json<PathRequest>,
) -> (StatusCode, Json<Reply<DataResponse>>) {
    let result = server
        .coordinator
        .get_data(&req.session_id, &req.path)
        .map(|data| DataResponse { data });

    reply(result)
}

/// Long-poll for one parked watch. If nothing fires within the poll window the
/// watch is parked again and the client polls once more.
pub async fn handle_watch_poll(
    Extension(server): Extension<Arc<CoordinationServer>>,
    Json(req): Json<WatchPollRequest>,
) -> (StatusCode, Json<Reply<WatchPollResponse>>) {
    let Some((_, parked)) = server.watches.remove(&req.watch_id) else {
        let err = if server.coordinator.is_expired(&req.session_id) {
            CoordinationError::SessionExpired
        } else {
            CoordinationError::Protocol(format!("unknown watch {}", req.watch_id))
        };
        return reply(Err(err));
    };

    if parked.session_id != req.session_id {
        let watch_id = req.watch_id.clone();
        server.watches.insert(watch_id, parked);
        return reply(Err(CoordinationError::Protocol(
            "watch belongs to another session".to_string(),
        )));
    }

    let ParkedWatch {
        session_id,
        mut watch,
    } = parked;

    match tokio::time::timeout(WATCH_POLL_WINDOW, &mut watch).await {
        Ok(Ok(event)) => {
            tracing::debug!("Delivering {:?} on {} to {}", event.event_type, event.path, session_id);
            reply(Ok(WatchPollResponse { event: Some(event) }))
        }
        Ok(Err(_)) => reply(Err(CoordinationError::SessionExpired)),
        Err(_) => {
            server
                .watches
                .insert(req.watch_id, ParkedWatch { session_id, watch });
            reply(Ok(WatchPollResponse { event: None }))
        }
    }
}
