//! Self-Organizing Search Cluster Library
//!
//! This library crate defines the modules that make up the cluster. It serves
//! as the foundation for the `search-node` binary (`main.rs`) and the `ui`
//! gateway.
//!
//! ## Architecture Modules
//! The system is composed of loosely coupled layers, each building on the one
//! below it:
//!
//! - **`coordination`**: The hierarchical, session-scoped namespace with
//!   ephemeral sequential records and one-shot watches. Comes as an in-process
//!   substrate, an HTTP server hosting it, and a remote client.
//! - **`membership`**: Namespace setup, record registration and listing on top
//!   of one coordination session, plus re-arming child subscriptions.
//! - **`registry`**: Per-namespace address registries with an atomically
//!   swapped local snapshot kept current by a watch loop.
//! - **`election`**: Leader election by lowest sequence number, each candidate
//!   watching only its immediate predecessor.
//! - **`search`**: Tokenizer, TF-IDF scoring, document partitioning, the
//!   coordinator fan-out and the worker task processor.
//! - **`node`**: The web server, the role manager reacting to election
//!   outcomes, and the node bootstrap.

pub mod config;
pub mod coordination;
pub mod election;
pub mod error;
pub mod membership;
pub mod node;
pub mod registry;
pub mod search;
