use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::Html;
use axum::{Json, Router, routing::get};
use clap::Parser;
use search_cluster::coordination::client::CoordinationClient;
use search_cluster::coordination::remote::RemoteCoordinator;
use search_cluster::membership::MembershipStore;
use search_cluster::registry::{COORDINATORS_REGISTRY_NAMESPACE, ServiceRegistry};
use search_cluster::search::protocol::{
    CONTENT_TYPE, DocumentStats, SearchRequest, SearchResponse, decode, encode,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Web front end for the search cluster", long_about = None)]
struct Args {
    /// Base URL of the coordination service
    #[arg(
        long,
        env = "SEARCH_COORDINATION_URL",
        default_value = "http://127.0.0.1:2181"
    )]
    coordination_url: String,

    /// Address the gateway listens on
    #[arg(long, env = "UI_BIND", default_value = "127.0.0.1:9000")]
    bind: SocketAddr,

    #[arg(long, default_value_t = 3000)]
    session_timeout_ms: u64,

    /// How long to wait for the coordinator to answer
    #[arg(long, default_value_t = 10000)]
    request_timeout_ms: u64,
}

type ApiError = (StatusCode, Json<serde_json::Value>);

fn api_error(status: StatusCode, message: impl std::fmt::Display) -> ApiError {
    (status, Json(serde_json::json!({ "error": message.to_string() })))
}

#[derive(Clone)]
struct AppState {
    coordinators: Arc<ServiceRegistry>,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct SearchParams {
    q: String,
    limit: Option<usize>,
}

#[derive(Serialize)]
struct SearchResults {
    query: String,
    coordinator: String,
    results: Vec<DocumentStats>,
}

#[derive(Serialize)]
struct CoordinatorList {
    coordinators: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let session = RemoteCoordinator::connect(
        &args.coordination_url,
        Duration::from_millis(args.session_timeout_ms),
    )
    .await?;
    let store = MembershipStore::new(session.clone());
    let coordinators = ServiceRegistry::new(store, COORDINATORS_REGISTRY_NAMESPACE).await?;
    coordinators.register_for_updates().await?;

    let state = AppState {
        coordinators,
        client: reqwest::Client::builder()
            .timeout(Duration::from_millis(args.request_timeout_ms))
            .build()?,
    };

    let app = Router::new()
        .route("/", get(ui))
        .route("/api/search", get(api_search))
        .route("/api/coordinators", get(api_coordinators))
        .with_state(state);

    tracing::info!("UI listening on {}", args.bind);
    axum::serve(tokio::net::TcpListener::bind(args.bind).await?, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    session.close().await;
    Ok(())
}

async fn ui() -> Html<&'static str> {
    Html(include_str!("ui.html"))
}

async fn api_search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResults>, ApiError> {
    let coordinator = current_coordinator(&state).await?;

    let body = encode(&SearchRequest {
        search_query: params.q.clone(),
    })
    .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e))?;

    let resp = state
        .client
        .post(&coordinator)
        .header(reqwest::header::CONTENT_TYPE, CONTENT_TYPE)
        .body(body)
        .send()
        .await
        .map_err(|e| api_error(StatusCode::BAD_GATEWAY, e))?;

    let status = resp.status();
    let bytes = resp
        .bytes()
        .await
        .map_err(|e| api_error(StatusCode::BAD_GATEWAY, e))?;

    if !status.is_success() {
        return Err(api_error(
            StatusCode::BAD_GATEWAY,
            format!(
                "coordinator answered {}: {}",
                status,
                String::from_utf8_lossy(&bytes)
            ),
        ));
    }

    let response: SearchResponse =
        decode(&bytes).map_err(|e| api_error(StatusCode::BAD_GATEWAY, e))?;

    let mut results = response.relevant_documents;
    if let Some(limit) = params.limit {
        results.truncate(limit);
    }

    Ok(Json(SearchResults {
        query: params.q,
        coordinator,
        results,
    }))
}

async fn api_coordinators(
    State(state): State<AppState>,
) -> Result<Json<CoordinatorList>, ApiError> {
    let snapshot = state
        .coordinators
        .get_all_service_addresses()
        .await
        .map_err(|e| api_error(StatusCode::SERVICE_UNAVAILABLE, e))?;

    Ok(Json(CoordinatorList {
        coordinators: snapshot.to_vec(),
    }))
}

async fn current_coordinator(state: &AppState) -> Result<String, ApiError> {
    let snapshot = state
        .coordinators
        .get_all_service_addresses()
        .await
        .map_err(|e| api_error(StatusCode::SERVICE_UNAVAILABLE, e))?;

    snapshot.addresses().first().cloned().ok_or_else(|| {
        api_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "no search coordinator is available",
        )
    })
}
