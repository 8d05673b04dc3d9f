//! Node Module
//!
//! Everything a single process needs to take part in the cluster: the HTTP
//! server, the mapping from election outcome to served role, and the bootstrap
//! that wires the coordination session to registries and election.
//!
//! ## Roles
//! - **Leader**: leaves the workers registry, watches it, and serves `/search`
//!   as the coordinator, advertised in the coordinators registry.
//! - **Follower**: serves `/task` as a worker, advertised in the workers
//!   registry.

pub mod manager;
pub mod roles;
pub mod runner;
pub mod server;

pub use manager::RoleManager;
pub use roles::ServiceEndpoint;
pub use runner::ClusterNode;
pub use server::WebServer;
