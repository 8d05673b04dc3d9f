use axum::body::Bytes;
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Extension, Router};
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::net::ToSocketAddrs;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use super::roles::ServiceEndpoint;
use crate::error::SearchError;
use crate::search::protocol::{CONTENT_TYPE, ENDPOINT_STATUS};

pub const DEBUG_HEADER: &str = "X-Debug";
pub const DEBUG_INFO_HEADER: &str = "X-Debug-Info";

const STOP_GRACE: Duration = Duration::from_secs(5);

/// HTTP front of one node: a liveness probe plus the POST endpoint of the
/// role the node currently plays.
pub struct WebServer {
    local_addr: SocketAddr,
    endpoint: &'static str,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl WebServer {
    pub async fn start<A: ToSocketAddrs>(
        bind_addr: A,
        service: ServiceEndpoint,
    ) -> std::io::Result<Self> {
        let endpoint = service.endpoint();
        let role = service.role_name();
        let app = router(service);

        let listener = tokio::net::TcpListener::bind(bind_addr).await?;
        let local_addr = listener.local_addr()?;
        let (shutdown, stopped) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            let served = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = stopped.await;
                })
                .await;

            if let Err(e) = served {
                tracing::error!("Web server on {} failed: {}", local_addr, e);
            }
        });

        tracing::info!(
            "Server is listening on {} as {} ({})",
            local_addr,
            role,
            endpoint
        );

        Ok(Self {
            local_addr,
            endpoint,
            shutdown: Some(shutdown),
            task,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn endpoint(&self) -> &'static str {
        self.endpoint
    }

    /// Stops accepting connections and waits a bounded time for in-flight
    /// requests before dropping the listener task.
    pub async fn stop(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }

        if tokio::time::timeout(STOP_GRACE, &mut self.task).await.is_err() {
            tracing::warn!("Web server on {} did not stop in time", self.local_addr);
            self.task.abort();
        }

        tracing::info!("Server on {} stopped", self.local_addr);
    }
}

pub fn router(service: ServiceEndpoint) -> Router {
    Router::new()
        .route(ENDPOINT_STATUS, get(handle_status))
        .route(service.endpoint(), post(handle_service_request))
        .layer(Extension(service))
}

pub async fn handle_status() -> &'static str {
    "Server is alive"
}

pub async fn handle_service_request(
    Extension(service): Extension<ServiceEndpoint>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let started = Instant::now();
    let result = service.handle_request(&body).await;
    let elapsed = started.elapsed();

    let mut response = match result {
        Ok(bytes) => ([(header::CONTENT_TYPE, CONTENT_TYPE)], bytes).into_response(),
        Err(e) => {
            tracing::warn!("Request to {} failed: {}", service.endpoint(), e);
            (status_for(&e), e.to_string()).into_response()
        }
    };

    if debug_requested(&headers) {
        let info = format!("Operation took {} ms", elapsed.as_millis());
        if let Ok(value) = HeaderValue::from_str(&info) {
            response.headers_mut().insert(DEBUG_INFO_HEADER, value);
        }
    }

    response
}

fn debug_requested(headers: &HeaderMap) -> bool {
    headers
        .get(DEBUG_HEADER)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.eq_ignore_ascii_case("true"))
}

fn status_for(err: &SearchError) -> StatusCode {
    match err {
        SearchError::MalformedRequest(_) => StatusCode::BAD_REQUEST,
        SearchError::MembershipUnavailable(_) | SearchError::DocumentsUnavailable(_) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        SearchError::Encode(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
