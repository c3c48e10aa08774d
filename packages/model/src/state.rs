//! # Committed document snapshots
//!
//! An [`EditorState`] is the immutable unit of history and of view diffing:
//! a key→node map, a selection descriptor, and a version counter. Once
//! committed it is never mutated again. Consecutive snapshots share unchanged
//! `Arc<Node>` values; a transaction clones only the nodes it touches
//! (copy-on-write at node granularity).

use crate::error::ModelError;
use crate::key::NodeKey;
use crate::node::{Node, NodeBody};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// One endpoint of a selection: a node key plus a character offset within it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub key: NodeKey,
    pub offset: usize,
}

/// Selection descriptor, valid only relative to one snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub anchor: Point,
    pub focus: Point,
}

impl Selection {
    pub fn collapsed(key: NodeKey, offset: usize) -> Self {
        let point = Point { key, offset };
        Selection {
            anchor: point.clone(),
            focus: point,
        }
    }
}

/// Immutable committed state of the document tree plus selection.
#[derive(Debug, Clone)]
pub struct EditorState {
    nodes: HashMap<NodeKey, Arc<Node>>,
    selection: Option<Selection>,
    version: u64,
}

impl EditorState {
    /// Fresh state holding only the root element.
    pub fn empty() -> Self {
        let root = Node::element(NodeKey::root(), "root");
        let mut nodes = HashMap::new();
        nodes.insert(NodeKey::root(), Arc::new(root));
        EditorState {
            nodes,
            selection: None,
            version: 0,
        }
    }

    /// Assemble a snapshot from parts. The map must satisfy the tree
    /// invariant; callers that build maps from untrusted input should run
    /// [`EditorState::check_tree`] first.
    pub fn from_parts(
        nodes: HashMap<NodeKey, Arc<Node>>,
        selection: Option<Selection>,
        version: u64,
    ) -> Self {
        EditorState {
            nodes,
            selection,
            version,
        }
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn with_version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    pub fn node(&self, key: &NodeKey) -> Option<&Arc<Node>> {
        self.nodes.get(key)
    }

    pub fn root(&self) -> &Arc<Node> {
        self.nodes
            .get(&NodeKey::root())
            .expect("snapshot always contains a root node")
    }

    pub fn contains(&self, key: &NodeKey) -> bool {
        self.nodes.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterate over all (key, node) entries. Iteration order is unspecified.
    pub fn iter(&self) -> impl Iterator<Item = (&NodeKey, &Arc<Node>)> {
        self.nodes.iter()
    }

    /// Borrow the underlying map, for overlay-based transaction commits.
    pub fn nodes(&self) -> &HashMap<NodeKey, Arc<Node>> {
        &self.nodes
    }

    /// Keys of a node's children, empty for leaves.
    pub fn child_keys(&self, key: &NodeKey) -> &[NodeKey] {
        self.nodes
            .get(key)
            .and_then(|n| n.children())
            .unwrap_or(&[])
    }

    /// Verify the tree invariant: the root exists and is parentless, every
    /// other node is reachable from the root exactly once, each child's
    /// parent back-reference matches, and no key is listed as a child twice.
    pub fn check_tree(&self) -> Result<(), ModelError> {
        let root_key = NodeKey::root();
        let root = self
            .nodes
            .get(&root_key)
            .ok_or_else(|| ModelError::NodeNotFound(root_key.clone()))?;
        if root.parent.is_some() {
            return Err(ModelError::OrphanNode(root_key));
        }

        let mut seen: HashSet<NodeKey> = HashSet::new();
        seen.insert(root_key.clone());
        let mut stack = vec![root_key];

        while let Some(key) = stack.pop() {
            let node = &self.nodes[&key];
            if let NodeBody::Element { children } = &node.body {
                for child_key in children {
                    let child = self
                        .nodes
                        .get(child_key)
                        .ok_or_else(|| ModelError::NodeNotFound(child_key.clone()))?;
                    if !seen.insert(child_key.clone()) {
                        return Err(ModelError::DuplicateChild(child_key.clone()));
                    }
                    if child.parent.as_ref() != Some(&key) {
                        return Err(ModelError::OrphanNode(child_key.clone()));
                    }
                    stack.push(child_key.clone());
                }
            }
        }

        // Anything the walk never reached is detached from the tree.
        for key in self.nodes.keys() {
            if !seen.contains(key) {
                return Err(ModelError::OrphanNode(key.clone()));
            }
        }

        Ok(())
    }
}
