//! # Working transactions
//!
//! A [`WorkingTransaction`] is the mutable, copy-on-write draft derived from
//! the latest committed snapshot: an overlay node map, a removed-key set, and
//! the dirty bookkeeping that drives transform re-evaluation and view
//! diffing. It lives for exactly one commit cycle and is destroyed on commit
//! or on a terminal mutation error.
//!
//! [`DraftContext`] is the handle handed to mutators and transform rules. It
//! carries the whole mutation surface, so mutator bodies never thread an
//! editor handle around, and it is the same-stack re-entry point: a nested
//! [`DraftContext::update`] runs immediately against the same draft and its
//! callback joins the owning transaction's FIFO queue.

use crate::error::EditorError;
use crate::scheduler::{OnCommit, UpdateOptions};
use scribe_model::{
    EditorState, ModelError, Node, NodeBody, NodeKey, NodeRegistry, NodeShape, Selection,
};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Mutable draft overlay over one committed snapshot.
#[derive(Default)]
pub struct WorkingTransaction {
    draft: HashMap<NodeKey, Arc<Node>>,
    removed: HashSet<NodeKey>,
    dirty_keys: HashSet<NodeKey>,
    dirty_tags: HashSet<String>,
    /// Keys dirtied since the start of the current transform pass.
    fresh: Vec<NodeKey>,
    /// `None` = selection untouched by this transaction.
    selection: Option<Option<Selection>>,
}

impl WorkingTransaction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_dirty(&self) -> bool {
        !self.dirty_keys.is_empty()
    }

    pub fn touched_selection(&self) -> bool {
        self.selection.is_some()
    }

    pub fn dirty_keys(&self) -> &HashSet<NodeKey> {
        &self.dirty_keys
    }

    fn mark_dirty(&mut self, key: &NodeKey, tag: &str) {
        self.dirty_keys.insert(key.clone());
        if !self.dirty_tags.contains(tag) {
            self.dirty_tags.insert(tag.to_string());
        }
        if !self.fresh.contains(key) {
            self.fresh.push(key.clone());
        }
    }

    /// Drain the keys dirtied since the previous call. Each fixpoint pass
    /// consumes one batch; an empty batch means the fixpoint is reached.
    pub fn take_fresh(&mut self) -> Vec<NodeKey> {
        std::mem::take(&mut self.fresh)
    }

    /// Merge the overlay over `base` into the next committed snapshot.
    pub fn commit(self, base: &EditorState) -> EditorState {
        let mut nodes = base.nodes().clone();
        for key in &self.removed {
            nodes.remove(key);
        }
        for (key, node) in self.draft {
            nodes.insert(key, node);
        }
        let selection = match self.selection {
            Some(selection) => selection,
            None => base.selection().cloned(),
        };
        EditorState::from_parts(nodes, selection, base.version() + 1)
    }
}

/// Ambient mutation handle passed to mutators and transform rules.
pub struct DraftContext<'a> {
    txn: &'a mut WorkingTransaction,
    base: &'a EditorState,
    registry: &'a NodeRegistry,
    callbacks: &'a mut Vec<OnCommit>,
}

impl<'a> DraftContext<'a> {
    pub(crate) fn new(
        txn: &'a mut WorkingTransaction,
        base: &'a EditorState,
        registry: &'a NodeRegistry,
        callbacks: &'a mut Vec<OnCommit>,
    ) -> Self {
        DraftContext {
            txn,
            base,
            registry,
            callbacks,
        }
    }

    /// Same-stack re-entrant update: the mutator runs immediately against
    /// this draft and the callback is appended to the owning transaction's
    /// queue at issue time, preserving FIFO callback order across nesting.
    /// The `discrete` flag has no effect here since the call never queues.
    pub fn update(
        &mut self,
        mutator: impl FnOnce(&mut DraftContext<'_>) -> Result<(), EditorError>,
        options: UpdateOptions,
    ) -> Result<(), EditorError> {
        if let Some(cb) = options.on_commit {
            self.callbacks.push(cb);
        }
        mutator(self)
    }

    pub(crate) fn push_callback(&mut self, cb: OnCommit) {
        self.callbacks.push(cb);
    }

    pub(crate) fn take_fresh(&mut self) -> Vec<NodeKey> {
        self.txn.take_fresh()
    }

    /// Whether any node of this tag was dirtied during the transaction.
    pub(crate) fn has_dirty_tag(&self, tag: &str) -> bool {
        self.txn.dirty_tags.contains(tag)
    }

    // --- lookup ---------------------------------------------------------

    pub fn root(&self) -> NodeKey {
        NodeKey::root()
    }

    pub fn node(&self, key: &NodeKey) -> Option<&Arc<Node>> {
        if self.txn.removed.contains(key) {
            return None;
        }
        self.txn.draft.get(key).or_else(|| self.base.node(key))
    }

    pub fn contains(&self, key: &NodeKey) -> bool {
        self.node(key).is_some()
    }

    /// Child keys of a container node.
    pub fn children(&self, key: &NodeKey) -> Result<Vec<NodeKey>, EditorError> {
        let node = self.require(key)?;
        node.children()
            .map(|c| c.to_vec())
            .ok_or_else(|| ModelError::NotAnElement(key.clone()).into())
    }

    // --- creation -------------------------------------------------------

    pub fn create_element(&mut self, tag: &str) -> Result<NodeKey, EditorError> {
        self.create(tag, NodeShape::Element)
    }

    pub fn create_text(&mut self, tag: &str, content: &str) -> Result<NodeKey, EditorError> {
        let key = self.create(tag, NodeShape::Text)?;
        if let NodeBody::Text { content: c, .. } = &mut self.draft_mut(&key)?.body {
            *c = content.to_string();
        }
        Ok(key)
    }

    pub fn create_line_break(&mut self, tag: &str) -> Result<NodeKey, EditorError> {
        self.create(tag, NodeShape::LineBreak)
    }

    pub fn create_decorator(&mut self, tag: &str, payload: Value) -> Result<NodeKey, EditorError> {
        let key = self.create(tag, NodeShape::Decorator)?;
        if let NodeBody::Decorator { payload: p } = &mut self.draft_mut(&key)?.body {
            *p = payload;
        }
        Ok(key)
    }

    fn create(&mut self, tag: &str, shape: NodeShape) -> Result<NodeKey, EditorError> {
        let spec = self
            .registry
            .spec(tag)
            .ok_or_else(|| ModelError::UnknownTag(tag.to_string()))?;
        if spec.shape != shape {
            return Err(ModelError::ShapeMismatch {
                tag: tag.to_string(),
                expected: shape_name(shape),
            }
            .into());
        }
        let key = NodeKey::fresh();
        let node = Node {
            key: key.clone(),
            tag: tag.to_string(),
            parent: None,
            body: spec.empty_body(),
        };
        self.txn.draft.insert(key.clone(), Arc::new(node));
        self.txn.mark_dirty(&key, tag);
        Ok(key)
    }

    // --- structure ------------------------------------------------------

    /// Append `child` as the last child of `parent`. Detaches the child from
    /// its previous parent first, so a node never ends up under two parents;
    /// when merged mutators move the same node repeatedly, the last
    /// structural assignment wins.
    pub fn append_child(&mut self, parent: &NodeKey, child: &NodeKey) -> Result<(), EditorError> {
        let index = self.children(parent)?.len();
        self.attach(parent, child, index)
    }

    /// Insert `child` at `index` within `parent` (clamped to the child
    /// count).
    pub fn insert_child(
        &mut self,
        parent: &NodeKey,
        index: usize,
        child: &NodeKey,
    ) -> Result<(), EditorError> {
        self.attach(parent, child, index)
    }

    /// Relocate a node, possibly across subtrees.
    pub fn move_node(
        &mut self,
        key: &NodeKey,
        new_parent: &NodeKey,
        index: usize,
    ) -> Result<(), EditorError> {
        self.attach(new_parent, key, index)
    }

    fn attach(
        &mut self,
        parent: &NodeKey,
        child: &NodeKey,
        index: usize,
    ) -> Result<(), EditorError> {
        if child.is_root() {
            return Err(ModelError::RootImmovable.into());
        }
        self.require(parent)?;
        self.require(child)?;

        // Attaching a node below its own descendant would detach the subtree
        // from the root.
        let mut cursor = Some(parent.clone());
        while let Some(key) = cursor {
            if &key == child {
                return Err(ModelError::CycleDetected(child.clone()).into());
            }
            cursor = self.node(&key).and_then(|n| n.parent.clone());
        }

        self.detach(child)?;

        let child_tag = self.require(child)?.tag.clone();
        let parent_tag = self.require(parent)?.tag.clone();

        {
            let parent_node = self.draft_mut(parent)?;
            let children = parent_node
                .children_mut()
                .ok_or_else(|| ModelError::NotAnElement(parent.clone()))?;
            let index = index.min(children.len());
            children.insert(index, child.clone());
        }
        self.draft_mut(child)?.parent = Some(parent.clone());

        self.txn.mark_dirty(parent, &parent_tag);
        self.txn.mark_dirty(child, &child_tag);
        Ok(())
    }

    fn detach(&mut self, child: &NodeKey) -> Result<(), EditorError> {
        let Some(old_parent) = self.require(child)?.parent.clone() else {
            return Ok(());
        };
        let old_tag = self.require(&old_parent)?.tag.clone();
        {
            let parent_node = self.draft_mut(&old_parent)?;
            if let Some(children) = parent_node.children_mut() {
                children.retain(|c| c != child);
            }
        }
        self.draft_mut(child)?.parent = None;
        self.txn.mark_dirty(&old_parent, &old_tag);
        Ok(())
    }

    /// Remove a node and its whole subtree from the draft.
    pub fn remove_node(&mut self, key: &NodeKey) -> Result<(), EditorError> {
        if key.is_root() {
            return Err(ModelError::RootImmovable.into());
        }
        self.require(key)?;
        self.detach(key)?;

        let mut stack = vec![key.clone()];
        while let Some(current) = stack.pop() {
            let info = self
                .node(&current)
                .map(|node| (node.tag.clone(), node.children().map(|c| c.to_vec())));
            if let Some((tag, children)) = info {
                if let Some(children) = children {
                    stack.extend(children);
                }
                self.txn.mark_dirty(&current, &tag);
            }
            self.txn.draft.remove(&current);
            self.txn.removed.insert(current);
        }
        Ok(())
    }

    // --- payload --------------------------------------------------------

    pub fn set_text(&mut self, key: &NodeKey, content: &str) -> Result<(), EditorError> {
        let tag = self.require(key)?.tag.clone();
        match &mut self.draft_mut(key)?.body {
            NodeBody::Text { content: c, .. } => {
                *c = content.to_string();
            }
            _ => return Err(ModelError::NotText(key.clone()).into()),
        }
        self.txn.mark_dirty(key, &tag);
        Ok(())
    }

    pub fn set_format(&mut self, key: &NodeKey, format: u32) -> Result<(), EditorError> {
        let tag = self.require(key)?.tag.clone();
        match &mut self.draft_mut(key)?.body {
            NodeBody::Text { format: f, .. } => {
                *f = format;
            }
            _ => return Err(ModelError::NotText(key.clone()).into()),
        }
        self.txn.mark_dirty(key, &tag);
        Ok(())
    }

    pub fn set_decorator_payload(
        &mut self,
        key: &NodeKey,
        payload: Value,
    ) -> Result<(), EditorError> {
        let tag = self.require(key)?.tag.clone();
        match &mut self.draft_mut(key)?.body {
            NodeBody::Decorator { payload: p } => {
                *p = payload;
            }
            _ => return Err(ModelError::NotADecorator(key.clone()).into()),
        }
        self.txn.mark_dirty(key, &tag);
        Ok(())
    }

    pub fn set_selection(&mut self, selection: Option<Selection>) {
        self.txn.selection = Some(selection);
    }

    /// Mark a node dirty without changing it, scheduling its transforms for
    /// the next fixpoint pass.
    pub fn mark_dirty(&mut self, key: &NodeKey) -> Result<(), EditorError> {
        let tag = self.require(key)?.tag.clone();
        self.txn.mark_dirty(key, &tag);
        Ok(())
    }

    // --- internals ------------------------------------------------------

    fn require(&self, key: &NodeKey) -> Result<&Arc<Node>, EditorError> {
        self.node(key)
            .ok_or_else(|| ModelError::NodeNotFound(key.clone()).into())
    }

    /// Copy-on-write access: clones the node into the draft overlay on
    /// first mutation only.
    fn draft_mut(&mut self, key: &NodeKey) -> Result<&mut Node, EditorError> {
        if self.txn.removed.contains(key) {
            return Err(ModelError::NodeNotFound(key.clone()).into());
        }
        if !self.txn.draft.contains_key(key) {
            let arc = self
                .base
                .node(key)
                .ok_or_else(|| ModelError::NodeNotFound(key.clone()))?
                .clone();
            self.txn.draft.insert(key.clone(), arc);
        }
        let arc = self.txn.draft.get_mut(key).expect("inserted above");
        Ok(Arc::make_mut(arc))
    }
}

fn shape_name(shape: NodeShape) -> &'static str {
    match shape {
        NodeShape::Element => "element",
        NodeShape::Text => "text",
        NodeShape::LineBreak => "line-break",
        NodeShape::Decorator => "decorator",
    }
}
