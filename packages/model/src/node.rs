//! # Document nodes
//!
//! A node is identified by a process-unique key, typed by a string tag
//! resolved through the [`NodeRegistry`](crate::NodeRegistry), and shaped by
//! one of a closed set of body variants:
//!
//! - `Element` — container owning an ordered child-key list
//! - `Text` — leaf carrying text plus an opaque format bit set
//! - `LineBreak` — empty leaf
//! - `Decorator` — leaf whose rendering is delegated to the view host
//!
//! The key→node mapping is always a tree: every non-root node holds exactly
//! one (non-owning) parent back-reference, and appears exactly once in that
//! parent's child list.

use crate::key::NodeKey;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One node of the document tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// Process-unique key.
    pub key: NodeKey,

    /// Type tag, resolved through the node registry.
    pub tag: String,

    /// Parent back-reference. `None` only for the root.
    pub parent: Option<NodeKey>,

    /// Shape-specific payload.
    pub body: NodeBody,
}

/// Closed catalogue of node shapes. Open-ended typing is by `tag`, not by
/// variant: many tags may share the `Element` shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape")]
pub enum NodeBody {
    /// Container node with ordered children.
    Element { children: Vec<NodeKey> },

    /// Text leaf. `format` is an opaque bit set; the core never interprets
    /// individual bits.
    Text { content: String, format: u32 },

    /// Hard line break leaf.
    LineBreak,

    /// Externally-rendered leaf. The payload is opaque to the core and is
    /// exported once per committed transaction that touches the node.
    Decorator { payload: Value },
}

impl Node {
    pub fn element(key: NodeKey, tag: impl Into<String>) -> Self {
        Node {
            key,
            tag: tag.into(),
            parent: None,
            body: NodeBody::Element {
                children: Vec::new(),
            },
        }
    }

    pub fn text(key: NodeKey, tag: impl Into<String>, content: impl Into<String>) -> Self {
        Node {
            key,
            tag: tag.into(),
            parent: None,
            body: NodeBody::Text {
                content: content.into(),
                format: 0,
            },
        }
    }

    pub fn line_break(key: NodeKey, tag: impl Into<String>) -> Self {
        Node {
            key,
            tag: tag.into(),
            parent: None,
            body: NodeBody::LineBreak,
        }
    }

    pub fn decorator(key: NodeKey, tag: impl Into<String>, payload: Value) -> Self {
        Node {
            key,
            tag: tag.into(),
            parent: None,
            body: NodeBody::Decorator { payload },
        }
    }

    /// Child keys, if this node is a container.
    pub fn children(&self) -> Option<&[NodeKey]> {
        match &self.body {
            NodeBody::Element { children } => Some(children),
            _ => None,
        }
    }

    pub fn children_mut(&mut self) -> Option<&mut Vec<NodeKey>> {
        match &mut self.body {
            NodeBody::Element { children } => Some(children),
            _ => None,
        }
    }

    pub fn is_element(&self) -> bool {
        matches!(self.body, NodeBody::Element { .. })
    }

    pub fn is_decorator(&self) -> bool {
        matches!(self.body, NodeBody::Decorator { .. })
    }

    /// Text content, if this is a text leaf.
    pub fn text_content(&self) -> Option<&str> {
        match &self.body {
            NodeBody::Text { content, .. } => Some(content),
            _ => None,
        }
    }

    /// Format bits, if this is a text leaf.
    pub fn text_format(&self) -> Option<u32> {
        match &self.body {
            NodeBody::Text { format, .. } => Some(*format),
            _ => None,
        }
    }
}
