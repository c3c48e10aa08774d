//! # Transform engine
//!
//! Rules registered per node tag that run against dirty nodes after the
//! mutators of a transaction finish, cascading until a pass dirties nothing.
//! The pass ceiling turns runaway rule cycles into a recoverable error
//! instead of a hang; the offending transaction is discarded uncommitted and
//! the transform stays registered (the caller must remove it).

use crate::error::EditorError;
use crate::transaction::DraftContext;
use scribe_model::NodeKey;
use std::rc::Rc;
use tracing::debug;

/// Upper bound on fixpoint passes per transaction.
pub const MAX_TRANSFORM_PASSES: usize = 100;

pub type TransformFn = Rc<dyn Fn(&mut DraftContext<'_>, &NodeKey) -> Result<(), EditorError>>;

/// Deregistration token returned by transform registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransformToken(u64);

struct TransformEntry {
    id: u64,
    tag: String,
    rule: TransformFn,
}

/// Per-editor transform registry, ordered by registration.
#[derive(Default)]
pub struct TransformRegistry {
    entries: Vec<TransformEntry>,
    next_id: u64,
}

impl TransformRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, tag: impl Into<String>, rule: TransformFn) -> TransformToken {
        self.next_id += 1;
        let id = self.next_id;
        self.entries.push(TransformEntry {
            id,
            tag: tag.into(),
            rule,
        });
        TransformToken(id)
    }

    pub fn remove(&mut self, token: TransformToken) {
        self.entries.retain(|e| e.id != token.0);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Snapshot of the registered rules grouped by tag, tags in first-
    /// registration order, rules per tag in registration order. Cloned out
    /// of the registry so rules can run while the editor is re-borrowed.
    pub fn plan(&self) -> RulePlan {
        let mut groups: Vec<(String, Vec<TransformFn>)> = Vec::new();
        for entry in &self.entries {
            match groups.iter_mut().find(|(tag, _)| tag == &entry.tag) {
                Some((_, rules)) => rules.push(entry.rule.clone()),
                None => groups.push((entry.tag.clone(), vec![entry.rule.clone()])),
            }
        }
        RulePlan { groups }
    }
}

/// Immutable snapshot of the rule registry for one transaction.
pub struct RulePlan {
    groups: Vec<(String, Vec<TransformFn>)>,
}

impl RulePlan {
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Run the registered rules over the draft until a pass dirties no
    /// node, or fail once the pass ceiling is exceeded.
    pub fn run_to_fixpoint(&self, ctx: &mut DraftContext<'_>) -> Result<(), EditorError> {
        let mut passes = 0usize;
        loop {
            let worklist = ctx.take_fresh();
            if worklist.is_empty() {
                if passes > 0 {
                    debug!(passes, "transform fixpoint reached");
                }
                return Ok(());
            }
            if self.is_empty() {
                return Ok(());
            }
            passes += 1;
            if passes > MAX_TRANSFORM_PASSES {
                return Err(EditorError::TransformRunaway {
                    passes: MAX_TRANSFORM_PASSES,
                });
            }

            for (tag, rules) in &self.groups {
                // Tags never dirtied by this transaction cannot match any
                // worklist key.
                if !ctx.has_dirty_tag(tag) {
                    continue;
                }
                for key in &worklist {
                    // The node may have been removed or retagged by an
                    // earlier rule in this pass.
                    let matches = ctx.node(key).is_some_and(|n| &n.tag == tag);
                    if !matches {
                        continue;
                    }
                    for rule in rules {
                        if ctx.node(key).is_none() {
                            break;
                        }
                        rule(ctx, key)?;
                    }
                }
            }
        }
    }
}
