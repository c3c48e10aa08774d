//! Error types for the document model.

use crate::key::NodeKey;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("node not found: {0}")]
    NodeNotFound(NodeKey),

    #[error("node {0} is not an element")]
    NotAnElement(NodeKey),

    #[error("node {0} is not text")]
    NotText(NodeKey),

    #[error("node {0} is not a decorator")]
    NotADecorator(NodeKey),

    #[error("node {0} appears more than once as a child")]
    DuplicateChild(NodeKey),

    #[error("node {0} is not attached to the tree")]
    OrphanNode(NodeKey),

    #[error("the root node cannot be removed or reparented")]
    RootImmovable,

    #[error("attaching node {0} here would create a cycle")]
    CycleDetected(NodeKey),

    #[error("unknown node tag: {0}")]
    UnknownTag(String),

    #[error("unresolved key reference in portable data: {0}")]
    UnresolvedReference(String),

    #[error("tag {tag} does not have shape {expected}")]
    ShapeMismatch { tag: String, expected: &'static str },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegistryError {
    #[error("tag {0} is already registered with a different implementation")]
    Conflict(String),
}
