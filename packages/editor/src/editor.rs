//! # Editor controller
//!
//! Owns the committed snapshot, the node and transform registries, the
//! listener bus, the reconciler state, and the pending update queue. All
//! mutation flows through [`Editor::update`] (see the scheduler module);
//! this module carries construction, registration, listener, view-host, and
//! serialization APIs.

use crate::error::EditorError;
use crate::listeners::{ListenerBus, ListenerToken, UpdateEvent};
use crate::scheduler::{PendingUpdate, SchedulerState, UpdateOptions};
use crate::transaction::DraftContext;
use crate::transforms::{TransformRegistry, TransformToken};
use scribe_model::{
    from_portable, to_portable, EditorState, NodeBody, NodeKey, NodeRegistry, NodeSpec,
    PortableState, RegistrationToken,
};
use scribe_reconciler::{MountId, Reconciler, ViewHost};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;
use tracing::debug;

/// Construction-time configuration: the node types available from the
/// start. More can be registered later through `register_node_types`.
#[derive(Debug, Default)]
pub struct EditorConfig {
    node_specs: Vec<NodeSpec>,
}

impl EditorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_nodes(mut self, specs: Vec<NodeSpec>) -> Self {
        self.node_specs.extend(specs);
        self
    }
}

/// The document controller: single-threaded, re-entrant, batched.
pub struct Editor {
    pub(crate) state: EditorState,
    pub(crate) registry: NodeRegistry,
    pub(crate) transforms: TransformRegistry,
    pub(crate) listeners: ListenerBus,
    pub(crate) reconciler: Reconciler,
    pub(crate) view: Option<Box<dyn ViewHost>>,
    pub(crate) decorators: HashMap<NodeKey, Value>,
    pub(crate) pending: VecDeque<PendingUpdate>,
    pub(crate) flushing: bool,
    pub(crate) scheduler: SchedulerState,
}

impl Editor {
    pub fn new(config: EditorConfig) -> Result<Self, EditorError> {
        let mut registry = NodeRegistry::new();
        // The root element type is always present.
        registry.register(vec![NodeSpec::element("root")])?;
        if !config.node_specs.is_empty() {
            registry.register(config.node_specs)?;
        }

        Ok(Editor {
            state: EditorState::empty(),
            registry,
            transforms: TransformRegistry::new(),
            listeners: ListenerBus::new(),
            reconciler: Reconciler::new(),
            view: None,
            decorators: HashMap::new(),
            pending: VecDeque::new(),
            flushing: false,
            scheduler: SchedulerState::Idle,
        })
    }

    /// The latest committed snapshot.
    pub fn state(&self) -> &EditorState {
        &self.state
    }

    /// Committed decorator payloads, keyed by node.
    pub fn decorators(&self) -> &HashMap<NodeKey, Value> {
        &self.decorators
    }

    // --- registration ---------------------------------------------------

    /// Register node types. Conflicts are raised synchronously to the
    /// caller, never through the listener bus.
    pub fn register_node_types(
        &mut self,
        specs: Vec<NodeSpec>,
    ) -> Result<RegistrationToken, EditorError> {
        Ok(self.registry.register(specs)?)
    }

    pub fn deregister_node_types(&mut self, token: RegistrationToken) {
        self.registry.deregister(token);
    }

    /// Register a transform rule for a node tag. The rule runs eagerly once
    /// over every committed node of that tag (as an implicit dirty set), so
    /// registration order relative to existing content is deterministic.
    pub fn add_transform(
        &mut self,
        tag: &str,
        rule: impl Fn(&mut DraftContext<'_>, &NodeKey) -> Result<(), EditorError> + 'static,
    ) -> Result<TransformToken, EditorError> {
        let token = self.transforms.add(tag, Rc::new(rule));
        debug!(tag, "transform registered");

        let existing: Vec<NodeKey> = self
            .state
            .iter()
            .filter(|(_, node)| node.tag == tag)
            .map(|(key, _)| key.clone())
            .collect();
        if !existing.is_empty() {
            self.update(
                move |ctx| {
                    for key in &existing {
                        ctx.mark_dirty(key)?;
                    }
                    Ok(())
                },
                UpdateOptions::new(),
            )?;
        }
        Ok(token)
    }

    pub fn remove_transform(&mut self, token: TransformToken) {
        self.transforms.remove(token);
    }

    // --- listeners ------------------------------------------------------

    pub fn on_update(&mut self, listener: impl Fn(&UpdateEvent) + 'static) -> ListenerToken {
        self.listeners.on_update(listener)
    }

    pub fn on_error(&mut self, listener: impl Fn(&EditorError) + 'static) -> ListenerToken {
        self.listeners.on_error(listener)
    }

    pub fn on_root(&mut self, listener: impl Fn(Option<MountId>) + 'static) -> ListenerToken {
        self.listeners.on_root(listener)
    }

    pub fn on_decorator(
        &mut self,
        listener: impl Fn(&HashMap<NodeKey, Value>) + 'static,
    ) -> ListenerToken {
        self.listeners.on_decorator(listener)
    }

    pub fn remove_listener(&mut self, token: ListenerToken) {
        self.listeners.remove(token);
    }

    // --- view host ------------------------------------------------------

    /// Attach (or replace) the rendering surface. The view is built from the
    /// committed snapshot and the `root` event fires for the new root mount.
    pub fn set_view_host(&mut self, host: Box<dyn ViewHost>) -> Result<(), EditorError> {
        self.view = Some(host);
        let host = self.view.as_mut().expect("just attached");

        let before = self.reconciler.root_mount();
        let result = self.reconciler.rebuild(&self.state, host.as_mut());
        if self.reconciler.root_mount() != before {
            self.listeners.emit_root(self.reconciler.root_mount());
        }
        match result {
            Ok(()) => Ok(()),
            Err(err) => self.report(err.into()),
        }
    }

    /// The current root mount, if a view host is attached and built.
    pub fn root_mount(&self) -> Option<MountId> {
        self.reconciler.root_mount()
    }

    // --- serialization --------------------------------------------------

    /// Flatten the committed snapshot to its portable form.
    pub fn to_portable(&self) -> PortableState {
        to_portable(&self.state)
    }

    /// Replace the document with a deserialized snapshot. Every node key is
    /// re-issued and the embedded selection is remapped onto the new keys.
    /// The view (if attached) is rebuilt from scratch.
    pub fn load_portable(&mut self, data: &PortableState) -> Result<(), EditorError> {
        let next = from_portable(data)?.with_version(self.state.version() + 1);
        self.state = next;

        self.decorators.clear();
        let mut changed = false;
        for (key, node) in self.state.iter() {
            if let NodeBody::Decorator { payload } = &node.body {
                self.decorators.insert(key.clone(), payload.clone());
                changed = true;
            }
        }

        if self.view.is_some() {
            let host = self.view.as_mut().expect("checked above");
            let before = self.reconciler.root_mount();
            let result = self.reconciler.rebuild(&self.state, host.as_mut());
            if self.reconciler.root_mount() != before {
                self.listeners.emit_root(self.reconciler.root_mount());
            }
            if let Err(err) = result {
                return self.report(err.into());
            }
        }
        if changed {
            self.listeners.emit_decorator(&self.decorators);
        }
        Ok(())
    }
}
