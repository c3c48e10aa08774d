//! Error taxonomy for the editing core.
//!
//! - Mutation and transform-runaway faults discard the in-flight draft;
//!   the last committed snapshot stays authoritative and the view is left
//!   untouched.
//! - Reconciliation faults never roll back the committed snapshot; the view
//!   recovers via full rebuild.
//! - Registry conflicts are raised synchronously to the registering caller
//!   and never routed through the listener bus.

use scribe_model::{ModelError, RegistryError};
use scribe_reconciler::ReconcileError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EditorError {
    #[error("mutation error: {0}")]
    Mutation(#[from] ModelError),

    #[error("transform fixpoint did not terminate after {passes} passes")]
    TransformRunaway { passes: usize },

    #[error("reconciliation error: {0}")]
    Reconcile(#[from] ReconcileError),

    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Failure raised by user mutator or transform code.
    #[error("{0}")]
    Custom(String),
}
