//! # Scribe Reconciler
//!
//! Projects committed document snapshots onto an external, key-addressed
//! rendering surface with minimal patching.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ editor: commit pipeline                     │
//! └─────────────────────────────────────────────┘
//!                     ↓ (prev, next)
//! ┌─────────────────────────────────────────────┐
//! │ reconciler: keyed diff → edit script        │
//! │  - create / patch / move / remove           │
//! │  - move detection across subtrees           │
//! │  - full-rebuild fallback on host failure    │
//! └─────────────────────────────────────────────┘
//!                     ↓ ViewHost trait
//! ┌─────────────────────────────────────────────┐
//! │ view host: owns the rendered artifacts      │
//! └─────────────────────────────────────────────┘
//! ```

mod diff;
pub mod mock;
mod view_host;

pub use diff::{ReconcileError, Reconciler};
pub use view_host::{MountDiff, MountId, ViewError, ViewHost};
