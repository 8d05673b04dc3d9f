//! Leader Election Module
//!
//! Every node volunteers with an ephemeral sequential record under `/election`.
//! The node owning the smallest sequence number is the leader; every other node
//! watches only its immediate predecessor, so a departure wakes exactly one
//! node (no herd effect).
//!
//! Role changes are published on a `tokio::sync::watch` channel as
//! `Some(Role::Leader)` / `Some(Role::Follower)`, and only when the role
//! actually changes.

pub mod service;
pub mod types;

pub use service::LeaderElection;
pub use types::{CANDIDATE_PREFIX, ELECTION_NAMESPACE, Role};

#[cfg(test)]
mod tests;
