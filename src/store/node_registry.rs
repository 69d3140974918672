//! Immutable node registry built from the JSON node map.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::ConfigError;

/// A monitoring agent the gateway can proxy to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeEntry {
    pub id: String,
    pub display_name: String,
    pub base_url: String,
    pub credential: String,
}

/// Per-node shape inside the configuration map.
#[derive(Debug, Deserialize)]
struct NodeDefinition {
    name: String,
    url: String,
    api_key: String,
}

/// Read-only lookup of nodes by id.
///
/// Keeps entries in configuration order for listing and fan-out,
/// plus an index for O(1) resolution. Never mutated after construction,
/// so it is shared across requests behind an `Arc` without locking.
#[derive(Debug, Default)]
pub struct NodeRegistry {
    entries: Vec<NodeEntry>,
    index: HashMap<String, usize>,
}

impl NodeRegistry {
    /// Creates a registry with no nodes.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds a registry from entries in the given order.
    ///
    /// A repeated id replaces the earlier definition in place.
    pub fn from_entries(entries: impl IntoIterator<Item = NodeEntry>) -> Self {
        let mut registry = Self::empty();
        for entry in entries {
            match registry.index.get(&entry.id) {
                Some(&pos) => registry.entries[pos] = entry,
                None => {
                    registry.index.insert(entry.id.clone(), registry.entries.len());
                    registry.entries.push(entry);
                }
            }
        }
        registry
    }

    /// Parses `{ "<id>": { "name", "url", "api_key" }, ... }`.
    ///
    /// Object key order is kept as the registry order.
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let map: Map<String, Value> = serde_json::from_str(raw)?;

        let mut entries = Vec::with_capacity(map.len());
        for (id, value) in map {
            let def: NodeDefinition = serde_json::from_value(value)
                .map_err(|source| ConfigError::InvalidNode {
                    id: id.clone(),
                    source,
                })?;
            entries.push(NodeEntry {
                id,
                display_name: def.name,
                base_url: def.url.trim_end_matches('/').to_string(),
                credential: def.api_key,
            });
        }

        Ok(Self::from_entries(entries))
    }

    /// Like [`NodeRegistry::from_json`], but a malformed map yields an empty
    /// registry and a warning instead of an error.
    pub fn load(raw: &str) -> Self {
        match Self::from_json(raw) {
            Ok(registry) => registry,
            Err(e) => {
                tracing::warn!(error = %e, "invalid node configuration, starting with no nodes");
                Self::empty()
            }
        }
    }

    /// Looks up a node by id.
    pub fn resolve(&self, node_id: &str) -> Option<&NodeEntry> {
        self.index.get(node_id).map(|&pos| &self.entries[pos])
    }

    /// All nodes in configuration order.
    pub fn list(&self) -> &[NodeEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
