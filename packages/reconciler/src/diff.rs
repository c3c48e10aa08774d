//! # Snapshot reconciliation
//!
//! Diffs the previously committed snapshot against the next one and applies
//! the minimal edit script to the view host: create for new keys, in-place
//! patch for changed payloads, move for reordered or reparented keys, remove
//! for vanished keys. Keys that survive between snapshots keep their mount,
//! so externally-attached host state survives structural moves.
//!
//! Any host failure aborts the incremental patch; the view is then rebuilt
//! from scratch against the next snapshot and the original failure is
//! surfaced as a recoverable error. The committed snapshot is never rolled
//! back by a reconciliation failure.

use crate::view_host::{MountDiff, MountId, ViewHost};
use scribe_model::{EditorState, Node, NodeBody, NodeKey};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReconcileError {
    #[error(transparent)]
    View(#[from] crate::view_host::ViewError),

    #[error("snapshot is missing node {0}")]
    MissingNode(NodeKey),

    #[error("child reference {0} points at no node in the next snapshot")]
    DanglingChild(NodeKey),
}

/// Persistent key→mount map plus the diff/patch driver.
#[derive(Debug, Default)]
pub struct Reconciler {
    mounts: HashMap<NodeKey, MountId>,
    root_mount: Option<MountId>,
}

impl Reconciler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn root_mount(&self) -> Option<MountId> {
        self.root_mount
    }

    pub fn mount_of(&self, key: &NodeKey) -> Option<MountId> {
        self.mounts.get(key).copied()
    }

    /// Patch the view from `prev` to `next`. On failure the partial patch is
    /// discarded, the view is rebuilt from `next`, and the original failure
    /// is returned. A second failure during the rebuild replaces it.
    pub fn reconcile(
        &mut self,
        prev: &EditorState,
        next: &EditorState,
        host: &mut dyn ViewHost,
    ) -> Result<(), ReconcileError> {
        match self.patch(prev, next, host) {
            Ok(()) => Ok(()),
            Err(err) => {
                warn!(error = %err, "incremental reconcile failed, rebuilding view");
                self.rebuild(next, host)?;
                Err(err)
            }
        }
    }

    /// Tear down every mount and rebuild the view from `next` alone. Also
    /// the path taken when a view host is first attached.
    pub fn rebuild(
        &mut self,
        next: &EditorState,
        host: &mut dyn ViewHost,
    ) -> Result<(), ReconcileError> {
        // Removing the root cascades through its subtree; hosts tolerate
        // handles that are already gone, so stray mounts can be swept
        // unconditionally.
        if let Some(root) = self.root_mount.take() {
            host.remove_mount(root)?;
        }
        let stray: Vec<MountId> = self.mounts.drain().map(|(_, id)| id).collect();
        for id in stray {
            host.remove_mount(id)?;
        }

        debug!(nodes = next.len(), "rebuilding view from snapshot");
        self.patch(&EditorState::empty(), next, host)
    }

    fn patch(
        &mut self,
        prev: &EditorState,
        next: &EditorState,
        host: &mut dyn ViewHost,
    ) -> Result<(), ReconcileError> {
        let root_key = NodeKey::root();
        let root_node = next
            .node(&root_key)
            .ok_or_else(|| ReconcileError::MissingNode(root_key.clone()))?;

        let root_mount = match self.mounts.get(&root_key) {
            Some(id) => *id,
            None => {
                let id = host.create_mount(&root_key, &root_node.tag)?;
                self.mounts.insert(root_key.clone(), id);
                id
            }
        };
        self.root_mount = Some(root_mount);

        let mut placed: HashSet<NodeKey> = HashSet::new();
        placed.insert(root_key.clone());
        self.walk_children(&root_key, root_mount, prev, next, host, &mut placed)?;

        // Keys rendered before but absent from the next snapshot. Removing
        // an ancestor cascades, so the per-key removals below are tolerated
        // by the host even when a parent went first.
        let stale: Vec<NodeKey> = self
            .mounts
            .keys()
            .filter(|key| !next.contains(key))
            .cloned()
            .collect();
        for key in stale {
            if let Some(id) = self.mounts.remove(&key) {
                host.remove_mount(id)?;
            }
        }

        Ok(())
    }

    fn walk_children(
        &mut self,
        parent_key: &NodeKey,
        parent_mount: MountId,
        prev: &EditorState,
        next: &EditorState,
        host: &mut dyn ViewHost,
        placed: &mut HashSet<NodeKey>,
    ) -> Result<(), ReconcileError> {
        let parent = next
            .node(parent_key)
            .ok_or_else(|| ReconcileError::MissingNode(parent_key.clone()))?
            .clone();
        let Some(children) = parent.children() else {
            return Ok(());
        };

        for (index, child_key) in children.iter().enumerate() {
            let node = next
                .node(child_key)
                .ok_or_else(|| ReconcileError::DanglingChild(child_key.clone()))?
                .clone();

            // A key listed twice in the next snapshot is inconsistent caller
            // input; the later placement wins and the subtree is not walked
            // again.
            let first_visit = placed.insert(child_key.clone());

            let (mount, created) = match self.mounts.get(child_key) {
                Some(id) => (*id, false),
                None => {
                    let id = host.create_mount(child_key, &node.tag)?;
                    self.mounts.insert(child_key.clone(), id);
                    (id, true)
                }
            };

            let prev_node = if created { None } else { prev.node(child_key) };
            // Snapshots share untouched nodes by Arc, so pointer identity
            // short-circuits the payload compare.
            let unchanged = prev_node.is_some_and(|p| Arc::ptr_eq(p, &node));
            if !unchanged {
                let diff = payload_diff(prev_node.map(|n| n.as_ref()), &node);
                if !diff.is_empty() {
                    host.patch_mount(mount, &diff)?;
                }
            }

            let needs_move = created
                || !first_visit
                || position_changed(prev, prev_node.map(|n| n.as_ref()), parent_key, index);
            if needs_move {
                host.move_mount(mount, parent_mount, index)?;
            }

            if first_visit {
                self.walk_children(child_key, mount, prev, next, host, placed)?;
            }
        }

        Ok(())
    }
}

/// Payload fields that changed between the two versions of a node. With no
/// previous version the full payload is emitted.
fn payload_diff(prev: Option<&Node>, next: &Node) -> MountDiff {
    let mut diff = MountDiff::default();
    match &next.body {
        NodeBody::Text { content, format } => {
            let (prev_text, prev_format) = match prev.map(|n| &n.body) {
                Some(NodeBody::Text { content, format }) => (Some(content.as_str()), Some(*format)),
                _ => (None, None),
            };
            if prev_text != Some(content.as_str()) {
                diff.text = Some(content.clone());
            }
            if prev_format != Some(*format) {
                diff.format = Some(*format);
            }
        }
        NodeBody::Decorator { payload } => {
            let prev_payload = match prev.map(|n| &n.body) {
                Some(NodeBody::Decorator { payload }) => Some(payload),
                _ => None,
            };
            if prev_payload != Some(payload) {
                diff.decorator = Some(payload.clone());
            }
        }
        NodeBody::Element { .. } | NodeBody::LineBreak => {}
    }
    diff
}

/// Did this key sit somewhere else in the previous snapshot?
fn position_changed(
    prev: &EditorState,
    prev_node: Option<&Node>,
    parent_key: &NodeKey,
    index: usize,
) -> bool {
    let Some(prev_node) = prev_node else {
        return true;
    };
    match &prev_node.parent {
        Some(prev_parent) if prev_parent == parent_key => {
            let siblings = prev.child_keys(prev_parent);
            siblings.get(index) != Some(&prev_node.key)
        }
        _ => true,
    }
}
