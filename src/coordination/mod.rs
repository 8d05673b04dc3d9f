//! Coordination Substrate
//!
//! A hierarchical namespace of named records with sessions, ephemeral and
//! sequential records, and one-shot change notifications (watches). Everything
//! the cluster needs to agree on (who is leader, which workers exist) is
//! derived from this tree.
//!
//! ## Implementations
//! - **`memory`**: `MemoryCoordinator`, a single authoritative in-process tree.
//!   Used directly by tests and single-process clusters, and hosted by the
//!   coordination server process.
//! - **`remote`**: `RemoteCoordinator`, an HTTP client for the coordination
//!   server. Sessions are kept alive by a heartbeat; watches are delivered by
//!   long-polling.
//!
//! ## Submodules
//! - **`client`**: the `CoordinationClient` trait shared by both implementations.
//! - **`types`**: paths, sessions, create modes, watch events.
//! - **`protocol`**: DTOs and endpoints of the coordination server.
//! - **`handlers`**: Axum handlers exposing a `MemoryCoordinator` over HTTP.

pub mod client;
pub mod handlers;
pub mod memory;
pub mod protocol;
pub mod remote;
pub mod types;
