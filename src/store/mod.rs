//! Node storage for the gateway.
//!
//! Holds the static node map loaded at startup. Read-only for the
//! lifetime of the process.

mod node_registry;

pub use node_registry::{NodeEntry, NodeRegistry};
