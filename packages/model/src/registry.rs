//! # Node type registry
//!
//! Maps a type tag to its node specification with a reference count. Each
//! editor instance owns its own registry; there is no global state. A tag
//! that is in use (non-zero count) can never be rebound to a different
//! specification — double-registration of an identical spec only bumps the
//! count.

use crate::error::RegistryError;
use crate::node::NodeBody;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Shape a tag resolves to. Mirrors the [`NodeBody`] variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeShape {
    Element,
    Text,
    LineBreak,
    Decorator,
}

/// Specification of one node type. Equality is implementation identity:
/// registering the same tag with a non-equal spec is a configuration fault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSpec {
    pub tag: String,
    pub shape: NodeShape,
    /// Rendering is delegated to the view host through the decorator export.
    pub decorator: bool,
}

impl NodeSpec {
    pub fn element(tag: impl Into<String>) -> Self {
        NodeSpec {
            tag: tag.into(),
            shape: NodeShape::Element,
            decorator: false,
        }
    }

    pub fn text(tag: impl Into<String>) -> Self {
        NodeSpec {
            tag: tag.into(),
            shape: NodeShape::Text,
            decorator: false,
        }
    }

    pub fn line_break(tag: impl Into<String>) -> Self {
        NodeSpec {
            tag: tag.into(),
            shape: NodeShape::LineBreak,
            decorator: false,
        }
    }

    pub fn decorator(tag: impl Into<String>) -> Self {
        NodeSpec {
            tag: tag.into(),
            shape: NodeShape::Decorator,
            decorator: true,
        }
    }

    /// Default body for a freshly-created node of this spec.
    pub fn empty_body(&self) -> NodeBody {
        match self.shape {
            NodeShape::Element => NodeBody::Element {
                children: Vec::new(),
            },
            NodeShape::Text => NodeBody::Text {
                content: String::new(),
                format: 0,
            },
            NodeShape::LineBreak => NodeBody::LineBreak,
            NodeShape::Decorator => NodeBody::Decorator {
                payload: Value::Null,
            },
        }
    }
}

#[derive(Debug)]
struct Entry {
    spec: NodeSpec,
    count: u32,
}

/// Handle returned by [`NodeRegistry::register`]; passing it back to
/// [`NodeRegistry::deregister`] decrements exactly the counts that the
/// registration incremented.
#[derive(Debug)]
pub struct RegistrationToken {
    tags: Vec<String>,
}

/// Per-editor tag→spec registry with reference counts.
#[derive(Debug, Default)]
pub struct NodeRegistry {
    entries: HashMap<String, Entry>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a batch of node specs.
    ///
    /// Unregistered tags are added with count 1; identical re-registrations
    /// bump the count; a conflicting spec for a live tag fails the whole
    /// batch without touching any counts.
    pub fn register(&mut self, specs: Vec<NodeSpec>) -> Result<RegistrationToken, RegistryError> {
        for spec in &specs {
            if let Some(entry) = self.entries.get(&spec.tag) {
                if entry.spec != *spec {
                    return Err(RegistryError::Conflict(spec.tag.clone()));
                }
            }
        }

        let mut tags = Vec::with_capacity(specs.len());
        for spec in specs {
            let tag = spec.tag.clone();
            self.entries
                .entry(tag.clone())
                .and_modify(|e| e.count += 1)
                .or_insert(Entry { spec, count: 1 });
            tags.push(tag);
        }
        Ok(RegistrationToken { tags })
    }

    /// Release a registration. Tags whose count reaches zero are removed.
    pub fn deregister(&mut self, token: RegistrationToken) {
        for tag in token.tags {
            if let Some(entry) = self.entries.get_mut(&tag) {
                entry.count -= 1;
                if entry.count == 0 {
                    self.entries.remove(&tag);
                }
            }
        }
    }

    pub fn spec(&self, tag: &str) -> Option<&NodeSpec> {
        self.entries.get(tag).map(|e| &e.spec)
    }

    pub fn is_registered(&self, tag: &str) -> bool {
        self.entries.contains_key(tag)
    }

    #[cfg(test)]
    fn count(&self, tag: &str) -> u32 {
        self.entries.get(tag).map(|e| e.count).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_deregister() {
        let mut registry = NodeRegistry::new();
        let token = registry
            .register(vec![NodeSpec::element("paragraph"), NodeSpec::text("text")])
            .unwrap();

        assert!(registry.is_registered("paragraph"));
        assert_eq!(registry.spec("text").unwrap().shape, NodeShape::Text);

        registry.deregister(token);
        assert!(!registry.is_registered("paragraph"));
        assert!(!registry.is_registered("text"));
    }

    #[test]
    fn test_identical_reregistration_bumps_count() {
        let mut registry = NodeRegistry::new();
        let a = registry.register(vec![NodeSpec::text("text")]).unwrap();
        let b = registry.register(vec![NodeSpec::text("text")]).unwrap();
        assert_eq!(registry.count("text"), 2);

        registry.deregister(a);
        assert!(registry.is_registered("text"));
        registry.deregister(b);
        assert!(!registry.is_registered("text"));
    }

    #[test]
    fn test_conflicting_registration_fails() {
        let mut registry = NodeRegistry::new();
        let _token = registry.register(vec![NodeSpec::text("mark")]).unwrap();

        let err = registry
            .register(vec![NodeSpec::element("mark")])
            .unwrap_err();
        assert!(matches!(err, RegistryError::Conflict(tag) if tag == "mark"));

        // The failed batch must not have touched the live entry.
        assert_eq!(registry.count("mark"), 1);
    }

    #[test]
    fn test_conflicting_batch_is_atomic() {
        let mut registry = NodeRegistry::new();
        let _token = registry.register(vec![NodeSpec::text("mark")]).unwrap();

        let err = registry
            .register(vec![NodeSpec::text("other"), NodeSpec::element("mark")])
            .unwrap_err();
        assert!(matches!(err, RegistryError::Conflict(_)));
        assert!(!registry.is_registered("other"));
    }
}
