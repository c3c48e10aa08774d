//! # View host contract
//!
//! The reconciler never renders anything itself; it drives an external,
//! key-addressed rendering surface through this trait. The host owns all
//! rendered artifacts and the core never inspects host internals.

use scribe_model::NodeKey;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Opaque handle to one mount point inside the view host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MountId(pub u64);

/// Failure raised by a view host operation.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("view host failure: {0}")]
pub struct ViewError(pub String);

/// Incremental payload patch for one mount. `None` fields are untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MountDiff {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub decorator: Option<Value>,
}

impl MountDiff {
    pub fn is_empty(&self) -> bool {
        self.text.is_none() && self.format.is_none() && self.decorator.is_none()
    }
}

/// External rendering surface, addressed per node key.
///
/// Contract notes:
/// - `move_mount` places the mount at `index` within `new_parent`'s child
///   order, detaching it from any previous parent. Externally-attached
///   state on the mount must survive the move.
/// - `remove_mount` destroys the mount together with its subtree; hosts
///   must tolerate handles that were already destroyed as part of an
///   ancestor's removal.
pub trait ViewHost {
    fn create_mount(&mut self, key: &NodeKey, tag: &str) -> Result<MountId, ViewError>;

    fn patch_mount(&mut self, handle: MountId, diff: &MountDiff) -> Result<(), ViewError>;

    fn remove_mount(&mut self, handle: MountId) -> Result<(), ViewError>;

    fn move_mount(
        &mut self,
        handle: MountId,
        new_parent: MountId,
        index: usize,
    ) -> Result<(), ViewError>;
}
