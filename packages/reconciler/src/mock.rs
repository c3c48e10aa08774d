//! In-memory view host double.
//!
//! Used by this crate's tests and by downstream integration suites. Keeps a
//! real mount tree so tests can assert on final view structure, counts host
//! calls so tests can assert on *how* the view got there, and supports
//! failure injection plus silent mount corruption for the error-recovery
//! paths.

use crate::view_host::{MountDiff, MountId, ViewError, ViewHost};
use scribe_model::NodeKey;
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct MockMount {
    pub key: NodeKey,
    pub tag: String,
    pub text: Option<String>,
    pub format: Option<u32>,
    pub decorator: Option<Value>,
    pub parent: Option<MountId>,
    pub children: Vec<MountId>,
}

#[derive(Debug, Default)]
pub struct MockViewHost {
    mounts: HashMap<MountId, MockMount>,
    next_id: u64,
    pub created: usize,
    pub patched: usize,
    pub moved: usize,
    pub removed: usize,
    pub fail_next_patch: bool,
}

impl MockViewHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mount(&self, id: MountId) -> Option<&MockMount> {
        self.mounts.get(&id)
    }

    pub fn find(&self, key: &NodeKey) -> Option<MountId> {
        self.mounts
            .iter()
            .find(|(_, m)| &m.key == key)
            .map(|(id, _)| *id)
    }

    pub fn mount_count(&self) -> usize {
        self.mounts.len()
    }

    /// Child keys of a mount, in view order.
    pub fn child_keys(&self, id: MountId) -> Vec<NodeKey> {
        self.mounts
            .get(&id)
            .map(|m| {
                m.children
                    .iter()
                    .filter_map(|c| self.mounts.get(c))
                    .map(|c| c.key.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Drop a mount entry without detaching it, simulating view state
    /// corrupted behind the reconciler's back.
    pub fn forget(&mut self, id: MountId) {
        self.mounts.remove(&id);
    }

    pub fn reset_counters(&mut self) {
        self.created = 0;
        self.patched = 0;
        self.moved = 0;
        self.removed = 0;
    }

    fn detach(&mut self, id: MountId) {
        let parent = self.mounts.get(&id).and_then(|m| m.parent);
        if let Some(parent) = parent {
            if let Some(parent_mount) = self.mounts.get_mut(&parent) {
                parent_mount.children.retain(|c| *c != id);
            }
        }
    }

    fn remove_subtree(&mut self, id: MountId) {
        if let Some(mount) = self.mounts.remove(&id) {
            for child in mount.children {
                self.remove_subtree(child);
            }
        }
    }
}

impl ViewHost for MockViewHost {
    fn create_mount(&mut self, key: &NodeKey, tag: &str) -> Result<MountId, ViewError> {
        self.next_id += 1;
        let id = MountId(self.next_id);
        self.mounts.insert(
            id,
            MockMount {
                key: key.clone(),
                tag: tag.to_string(),
                text: None,
                format: None,
                decorator: None,
                parent: None,
                children: Vec::new(),
            },
        );
        self.created += 1;
        Ok(id)
    }

    fn patch_mount(&mut self, handle: MountId, diff: &MountDiff) -> Result<(), ViewError> {
        if self.fail_next_patch {
            self.fail_next_patch = false;
            return Err(ViewError("injected patch failure".to_string()));
        }
        let mount = self
            .mounts
            .get_mut(&handle)
            .ok_or_else(|| ViewError(format!("patch on unknown mount {handle:?}")))?;
        if let Some(text) = &diff.text {
            mount.text = Some(text.clone());
        }
        if let Some(format) = diff.format {
            mount.format = Some(format);
        }
        if let Some(decorator) = &diff.decorator {
            mount.decorator = Some(decorator.clone());
        }
        self.patched += 1;
        Ok(())
    }

    fn remove_mount(&mut self, handle: MountId) -> Result<(), ViewError> {
        // Tolerate handles already destroyed by an ancestor's removal.
        if self.mounts.contains_key(&handle) {
            self.detach(handle);
            self.remove_subtree(handle);
            self.removed += 1;
        }
        Ok(())
    }

    fn move_mount(
        &mut self,
        handle: MountId,
        new_parent: MountId,
        index: usize,
    ) -> Result<(), ViewError> {
        if !self.mounts.contains_key(&handle) {
            return Err(ViewError(format!("move of unknown mount {handle:?}")));
        }
        if !self.mounts.contains_key(&new_parent) {
            return Err(ViewError(format!("move into unknown parent {new_parent:?}")));
        }
        self.detach(handle);
        let parent = self.mounts.get_mut(&new_parent).expect("checked above");
        let index = index.min(parent.children.len());
        parent.children.insert(index, handle);
        self.mounts.get_mut(&handle).expect("checked above").parent = Some(new_parent);
        self.moved += 1;
        Ok(())
    }
}
