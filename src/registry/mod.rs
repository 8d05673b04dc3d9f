//! Service Registry Module
//!
//! Keeps a locally cached, immutable snapshot of the addresses advertised under
//! one namespace (workers or coordinators) and refreshes it whenever the
//! substrate reports a change.
//!
//! ## Core Mechanisms
//! - **Atomic Snapshots**: Each refresh builds a new list and swaps it in whole,
//!   so readers see either the old or the new membership, never a mix.
//! - **Watch Loop**: A background task driven by a `ChildrenSubscription`.
//!   Failures are logged and retried with backoff; the loop only ends when the
//!   registry stops watching or is dropped.

pub mod service;

pub use service::{
    COORDINATORS_REGISTRY_NAMESPACE, MembershipSnapshot, ServiceRegistry,
    WORKERS_REGISTRY_NAMESPACE,
};
