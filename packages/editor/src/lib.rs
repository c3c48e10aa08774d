//! # Scribe Editor
//!
//! Mutation and consistency core for a structured rich-text document: a
//! transactional update scheduler over an immutable node-tree snapshot, a
//! rule-based transform engine that keeps the tree canonical after every
//! mutation, and a reconciliation driver that projects committed snapshots
//! onto an external view with minimal patching.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ Editor: controller                          │
//! │  - update(mutator) → Working Transaction    │
//! │  - transform fixpoint over dirty nodes      │
//! │  - commit: draft overlay → next snapshot    │
//! │  - reconcile prev vs next against the view  │
//! │  - post-commit callbacks, then listeners    │
//! └─────────────────────────────────────────────┘
//!          ↓ scribe-model            ↓ scribe-reconciler
//!   snapshots / registry       keyed diff → view host
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use scribe_editor::{Editor, EditorConfig, UpdateOptions};
//! use scribe_model::NodeSpec;
//!
//! let mut editor = Editor::new(
//!     EditorConfig::new().with_nodes(vec![
//!         NodeSpec::element("paragraph"),
//!         NodeSpec::text("text"),
//!     ]),
//! )?;
//!
//! editor.update(
//!     |ctx| {
//!         let root = ctx.root();
//!         let para = ctx.create_element("paragraph")?;
//!         let text = ctx.create_text("text", "This works!")?;
//!         ctx.append_child(&para, &text)?;
//!         ctx.append_child(&root, &para)
//!     },
//!     UpdateOptions::new(),
//! )?;
//! ```

mod editor;
mod error;
mod listeners;
mod scheduler;
mod transaction;
mod transforms;

pub use editor::{Editor, EditorConfig};
pub use error::EditorError;
pub use listeners::{ListenerToken, UpdateEvent};
pub use scheduler::{OnCommit, UpdateOptions};
pub use transaction::{DraftContext, WorkingTransaction};
pub use transforms::{TransformToken, MAX_TRANSFORM_PASSES};

// Re-export the model and view-host surface for convenience.
pub use scribe_model::{
    EditorState, Node, NodeBody, NodeKey, NodeShape, NodeSpec, Point, PortableState, Selection,
};
pub use scribe_reconciler::{MountDiff, MountId, ViewError, ViewHost};
