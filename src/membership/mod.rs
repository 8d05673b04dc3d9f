//! Membership Module
//!
//! Thin semantic layer over the coordination substrate. Everything above it
//! (the service registries and leader election) talks in terms of namespaces,
//! self-advertisement records and change notifications instead of raw paths and
//! session errors.
//!
//! ## Core Mechanisms
//! - **Ephemeral Records**: A node advertises itself with an ephemeral sequential
//!   record; the substrate removes it when the node's session ends.
//! - **Benign Races**: A record that vanishes between a listing and a read is
//!   reported as absent, never as a failure.
//! - **Subscriptions**: `ChildrenSubscription` hides the one-shot watch re-arming
//!   behind a restartable sequence of listings.

pub mod backoff;
pub mod store;
pub mod subscription;

pub use store::{ChangeNotification, MembershipStore, RecordId};
pub use subscription::ChildrenSubscription;
