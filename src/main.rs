use clap::Parser;
use search_cluster::config::{Cli, Command, CoordinationArgs, NodeArgs};
use search_cluster::coordination::client::CoordinationClient;
use search_cluster::coordination::handlers::{CoordinationServer, router};
use search_cluster::coordination::memory::MemoryCoordinator;
use search_cluster::coordination::remote::RemoteCoordinator;
use search_cluster::node::ClusterNode;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Node(args) => run_node(args).await,
        Command::Coordination(args) => run_coordination(args).await,
    }
}

async fn run_node(args: NodeArgs) -> anyhow::Result<()> {
    tracing::info!(
        "Starting node on {}:{} (documents in {:?})",
        args.host,
        args.port,
        args.books_dir
    );

    // 1. Coordination session:
    let client = RemoteCoordinator::connect(&args.coordination_url, args.session_timeout()).await?;

    // 2. Registries, election and role manager:
    let node = ClusterNode::start(args.node_config(), client.clone()).await?;

    tracing::info!("Press Ctrl+C to shutdown");

    // 3. Run until asked to stop or the session is gone for good:
    let expired = tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutting down");
            false
        }
        _ = client.expired() => {
            tracing::error!("Coordination session expired, leaving the cluster");
            true
        }
    };

    node.shutdown().await;
    client.close().await;

    if expired {
        anyhow::bail!("coordination session expired");
    }
    Ok(())
}

async fn run_coordination(args: CoordinationArgs) -> anyhow::Result<()> {
    let coordinator = MemoryCoordinator::new();
    let server = CoordinationServer::new(coordinator);
    server.spawn_reaper(Duration::from_millis(args.reap_interval_ms));

    let app = router(Arc::clone(&server));

    tracing::info!("Coordination service listening on {}", args.bind);
    tracing::info!("Press Ctrl+C to shutdown");

    let listener = tokio::net::TcpListener::bind(args.bind).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    Ok(())
}
