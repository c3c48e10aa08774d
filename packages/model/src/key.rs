//! Node key allocation.
//!
//! Keys are process-unique, opaque strings minted from a global counter.
//! They identify a node for the lifetime of one editor process only:
//! `from_portable` re-issues every key on import, so keys must never be
//! persisted as stable references.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_KEY: AtomicU64 = AtomicU64::new(1);

/// The reserved key of the document root node.
pub const ROOT_KEY: &str = "root";

/// Process-unique identifier of one node in the document tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeKey(String);

impl NodeKey {
    /// Mint a fresh key, distinct from every key issued so far in this
    /// process.
    pub fn fresh() -> Self {
        let n = NEXT_KEY.fetch_add(1, Ordering::Relaxed);
        NodeKey(format!("k{n}"))
    }

    /// The root node's key.
    pub fn root() -> Self {
        NodeKey(ROOT_KEY.to_string())
    }

    pub fn is_root(&self) -> bool {
        self.0 == ROOT_KEY
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
