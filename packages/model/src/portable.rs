//! # Portable snapshot form
//!
//! `to_portable` flattens a committed snapshot into plain serde records;
//! `from_portable` rebuilds a snapshot from them. Node keys are ephemeral:
//! import re-issues a fresh key for every non-root record and remaps all
//! parent/child references and the embedded selection onto the new keys.
//! Offsets are preserved as-is.

use crate::error::ModelError;
use crate::key::NodeKey;
use crate::node::{Node, NodeBody};
use crate::state::{EditorState, Point, Selection};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// One node flattened to a plain record. Keys are strings with no
/// stability guarantee across export/import.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortableNode {
    pub key: String,
    pub tag: String,
    pub parent: Option<String>,
    pub body: PortableBody,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape")]
pub enum PortableBody {
    Element { children: Vec<String> },
    Text { content: String, format: u32 },
    LineBreak,
    Decorator { payload: Value },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortablePoint {
    pub key: String,
    pub offset: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortableSelection {
    pub anchor: PortablePoint,
    pub focus: PortablePoint,
}

/// Serialized snapshot: flat node records plus selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortableState {
    pub nodes: Vec<PortableNode>,
    pub selection: Option<PortableSelection>,
}

/// Flatten a snapshot. Records are emitted in a root-first depth-first
/// order so the output is deterministic for a given tree.
pub fn to_portable(state: &EditorState) -> PortableState {
    let mut nodes = Vec::with_capacity(state.len());
    let mut stack = vec![NodeKey::root()];

    while let Some(key) = stack.pop() {
        if let Some(node) = state.node(&key) {
            nodes.push(portable_node(node));
            if let Some(children) = node.children() {
                for child in children.iter().rev() {
                    stack.push(child.clone());
                }
            }
        }
    }

    let selection = state.selection().map(|sel| PortableSelection {
        anchor: PortablePoint {
            key: sel.anchor.key.as_str().to_string(),
            offset: sel.anchor.offset,
        },
        focus: PortablePoint {
            key: sel.focus.key.as_str().to_string(),
            offset: sel.focus.offset,
        },
    });

    PortableState { nodes, selection }
}

fn portable_node(node: &Node) -> PortableNode {
    let body = match &node.body {
        NodeBody::Element { children } => PortableBody::Element {
            children: children.iter().map(|k| k.as_str().to_string()).collect(),
        },
        NodeBody::Text { content, format } => PortableBody::Text {
            content: content.clone(),
            format: *format,
        },
        NodeBody::LineBreak => PortableBody::LineBreak,
        NodeBody::Decorator { payload } => PortableBody::Decorator {
            payload: payload.clone(),
        },
    };
    PortableNode {
        key: node.key.as_str().to_string(),
        tag: node.tag.clone(),
        parent: node.parent.as_ref().map(|k| k.as_str().to_string()),
        body,
    }
}

/// Rebuild a snapshot from portable records, re-issuing every non-root key.
/// Fails if any reference points at a missing record or the records do not
/// form a tree.
pub fn from_portable(data: &PortableState) -> Result<EditorState, ModelError> {
    // First pass: mint a fresh key per record. The root keeps its reserved
    // key so the rebuilt tree stays addressable.
    let mut remap: HashMap<&str, NodeKey> = HashMap::with_capacity(data.nodes.len());
    for record in &data.nodes {
        let new_key = if record.parent.is_none() {
            NodeKey::root()
        } else {
            NodeKey::fresh()
        };
        remap.insert(record.key.as_str(), new_key);
    }

    let resolve = |key: &str| -> Result<NodeKey, ModelError> {
        remap
            .get(key)
            .cloned()
            .ok_or_else(|| ModelError::UnresolvedReference(key.to_string()))
    };

    let mut nodes: HashMap<NodeKey, Arc<Node>> = HashMap::with_capacity(data.nodes.len());
    for record in &data.nodes {
        let key = resolve(&record.key)?;
        let parent = match &record.parent {
            Some(p) => Some(resolve(p)?),
            None => None,
        };
        let body = match &record.body {
            PortableBody::Element { children } => NodeBody::Element {
                children: children
                    .iter()
                    .map(|c| resolve(c))
                    .collect::<Result<Vec<_>, _>>()?,
            },
            PortableBody::Text { content, format } => NodeBody::Text {
                content: content.clone(),
                format: *format,
            },
            PortableBody::LineBreak => NodeBody::LineBreak,
            PortableBody::Decorator { payload } => NodeBody::Decorator {
                payload: payload.clone(),
            },
        };
        nodes.insert(
            key.clone(),
            Arc::new(Node {
                key,
                tag: record.tag.clone(),
                parent,
                body,
            }),
        );
    }

    let selection = match &data.selection {
        Some(sel) => Some(Selection {
            anchor: Point {
                key: resolve(&sel.anchor.key)?,
                offset: sel.anchor.offset,
            },
            focus: Point {
                key: resolve(&sel.focus.key)?,
                offset: sel.focus.offset,
            },
        }),
        None => None,
    };

    let state = EditorState::from_parts(nodes, selection, 0);
    state.check_tree()?;
    Ok(state)
}
