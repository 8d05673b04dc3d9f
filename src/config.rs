//! Command line and environment configuration for the node binary.

use clap::{Args, Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about = "Self-organizing TF-IDF search cluster", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a search node: volunteers for leadership, then serves as
    /// coordinator or worker.
    Node(NodeArgs),

    /// Host the coordination service the nodes connect to.
    Coordination(CoordinationArgs),
}

#[derive(Args, Debug, Clone)]
pub struct NodeArgs {
    /// Base URL of the coordination service
    #[arg(
        long,
        env = "SEARCH_COORDINATION_URL",
        default_value = "http://127.0.0.1:2181"
    )]
    pub coordination_url: String,

    /// Port of this node's web server
    #[arg(short, long, env = "SEARCH_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Interface the web server binds to
    #[arg(long, env = "SEARCH_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Host name published in the registries (defaults to --host)
    #[arg(long, env = "SEARCH_ADVERTISE_HOST")]
    pub advertise_host: Option<String>,

    /// Directory holding the documents to search
    #[arg(long, env = "SEARCH_BOOKS_DIR", default_value = "./books")]
    pub books_dir: PathBuf,

    /// How long the coordinator waits for one worker
    #[arg(long, default_value_t = 5000)]
    pub task_timeout_ms: u64,

    /// Coordination session timeout
    #[arg(long, default_value_t = 3000)]
    pub session_timeout_ms: u64,
}

#[derive(Args, Debug, Clone)]
pub struct CoordinationArgs {
    /// Address the coordination service listens on
    #[arg(long, env = "SEARCH_COORDINATION_BIND", default_value = "127.0.0.1:2181")]
    pub bind: SocketAddr,

    /// How often expired sessions are swept
    #[arg(long, default_value_t = 500)]
    pub reap_interval_ms: u64,
}

/// Settings a `ClusterNode` needs, independent of how they were obtained.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub host: String,
    pub port: u16,
    pub advertise_host: String,
    pub books_dir: PathBuf,
    pub task_timeout: Duration,
}

impl NodeConfig {
    /// Config for a node on `host` with an OS-assigned port.
    pub fn local(host: &str) -> Self {
        Self {
            host: host.to_string(),
            port: 0,
            advertise_host: host.to_string(),
            books_dir: PathBuf::from("./books"),
            task_timeout: Duration::from_millis(5000),
        }
    }
}

impl NodeArgs {
    pub fn session_timeout(&self) -> Duration {
        Duration::from_millis(self.session_timeout_ms)
    }

    pub fn node_config(&self) -> NodeConfig {
        NodeConfig {
            host: self.host.clone(),
            port: self.port,
            advertise_host: self
                .advertise_host
                .clone()
                .unwrap_or_else(|| self.host.clone()),
            books_dir: self.books_dir.clone(),
            task_timeout: Duration::from_millis(self.task_timeout_ms),
        }
    }
}
