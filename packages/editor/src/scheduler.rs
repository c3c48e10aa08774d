//! # Update scheduler
//!
//! The batched commit state machine: `Idle → Accumulating → Committing →
//! Idle`. Call origin is modeled as two explicit branches rather than stack
//! inspection:
//!
//! - **Same-stack re-entry** — an update issued from inside a running
//!   mutator or transform rule goes through [`DraftContext::update`]: it
//!   runs immediately against the open draft and its callback joins the
//!   transaction's FIFO queue.
//! - **Queued entry** — [`Editor::update`] from the outside, or from a
//!   post-commit callback, lands in the pending FIFO. All entries drained in
//!   one wave share a single transaction: one dirty set, one fixpoint, one
//!   reconciliation, one callback queue. Entries enqueued by callbacks are
//!   picked up by the flush loop as the next transaction.
//!
//! The `discrete` flag bypasses the queue entirely: mutator, fixpoint,
//! reconciliation, and the call's own callback complete synchronously before
//! the call returns, never merged with pending entries.

use crate::editor::Editor;
use crate::error::EditorError;
use crate::listeners::UpdateEvent;
use crate::transaction::{DraftContext, WorkingTransaction};
use scribe_model::{NodeBody, NodeKey};
use tracing::{debug, warn};

pub type OnCommit = Box<dyn FnOnce(&mut Editor)>;
pub(crate) type Mutator = Box<dyn FnOnce(&mut DraftContext<'_>) -> Result<(), EditorError>>;

/// Options for one `update` call.
#[derive(Default)]
pub struct UpdateOptions {
    pub(crate) on_commit: Option<OnCommit>,
    pub(crate) discrete: bool,
}

impl UpdateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Post-commit callback, fired after reconciliation in call-issue order.
    pub fn on_commit(mut self, cb: impl FnOnce(&mut Editor) + 'static) -> Self {
        self.on_commit = Some(Box::new(cb));
        self
    }

    /// Force a full synchronous commit cycle before the call returns, e.g.
    /// when an input-composition key must be observable immediately.
    pub fn discrete(mut self) -> Self {
        self.discrete = true;
        self
    }
}

pub(crate) struct PendingUpdate {
    pub mutator: Mutator,
    pub on_commit: Option<OnCommit>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SchedulerState {
    Idle,
    Accumulating,
    Committing,
}

impl Editor {
    /// Schedule a mutation of the document tree.
    ///
    /// Returns `Err` only for failures no `error` listener observed;
    /// delivered failures resolve to `Ok` (the error event is the handled
    /// path).
    pub fn update(
        &mut self,
        mutator: impl FnOnce(&mut DraftContext<'_>) -> Result<(), EditorError> + 'static,
        options: UpdateOptions,
    ) -> Result<(), EditorError> {
        if options.discrete {
            return self.run_transaction(vec![PendingUpdate {
                mutator: Box::new(mutator),
                on_commit: options.on_commit,
            }]);
        }

        self.pending.push_back(PendingUpdate {
            mutator: Box::new(mutator),
            on_commit: options.on_commit,
        });
        if self.flushing {
            // The active flush loop drains this entry into the next
            // transaction wave.
            return Ok(());
        }
        self.flush()
    }

    fn flush(&mut self) -> Result<(), EditorError> {
        self.flushing = true;
        let mut first_failure: Option<EditorError> = None;

        while !self.pending.is_empty() {
            let wave: Vec<PendingUpdate> = self.pending.drain(..).collect();
            if let Err(err) = self.run_transaction(wave) {
                first_failure.get_or_insert(err);
            }
        }

        self.flushing = false;
        match first_failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Drive one full commit cycle: mutators → transform fixpoint → commit →
    /// reconcile → callbacks → listeners.
    fn run_transaction(&mut self, entries: Vec<PendingUpdate>) -> Result<(), EditorError> {
        debug_assert_eq!(self.scheduler, SchedulerState::Idle);
        self.scheduler = SchedulerState::Accumulating;

        let mut txn = WorkingTransaction::new();
        let mut callbacks: Vec<OnCommit> = Vec::new();
        let plan = self.transforms.plan();

        let body_result = {
            let mut ctx = DraftContext::new(&mut txn, &self.state, &self.registry, &mut callbacks);
            let mut result = Ok(());
            for entry in entries {
                // Callbacks are appended at call-issue time, before the
                // mutator runs, so nested updates observe FIFO order.
                if let Some(cb) = entry.on_commit {
                    ctx.push_callback(cb);
                }
                if let Err(err) = (entry.mutator)(&mut ctx) {
                    result = Err(err);
                    break;
                }
            }
            if result.is_ok() {
                result = plan.run_to_fixpoint(&mut ctx);
            }
            result
        };

        if let Err(err) = body_result {
            // Mutator fault or transform runaway: the draft is thrown away,
            // the last committed snapshot stays authoritative, the view is
            // untouched and no callback fires.
            self.scheduler = SchedulerState::Idle;
            debug!(error = %err, "transaction discarded");
            return self.report(err);
        }

        if !txn.is_dirty() {
            // Nothing to transform, reconcile, or announce. A touched
            // selection still lands in the snapshot.
            if txn.touched_selection() {
                self.state = txn.commit(&self.state);
            }
            self.scheduler = SchedulerState::Idle;
            return Ok(());
        }

        self.scheduler = SchedulerState::Committing;

        let dirty: Vec<NodeKey> = txn.dirty_keys().iter().cloned().collect();
        let next = txn.commit(&self.state);
        if let Err(err) = next.check_tree() {
            // A mutator left the draft in a non-tree shape; same discard
            // path as a mutator fault.
            self.scheduler = SchedulerState::Idle;
            return self.report(err.into());
        }

        let prev = std::mem::replace(&mut self.state, next);
        let version = self.state.version();
        debug!(version, dirty = dirty.len(), "transaction committed");

        let decorators_changed = self.refresh_decorators(&dirty);

        let mut reconcile_failure: Option<EditorError> = None;
        let mut root_changed = false;
        if let Some(host) = self.view.as_mut() {
            let before = self.reconciler.root_mount();
            if let Err(err) = self.reconciler.reconcile(&prev, &self.state, host.as_mut()) {
                warn!(error = %err, "view recovered by full rebuild");
                reconcile_failure = Some(err.into());
            }
            root_changed = self.reconciler.root_mount() != before;
        }

        self.scheduler = SchedulerState::Idle;

        for cb in callbacks {
            cb(self);
        }

        self.listeners.emit_update(&UpdateEvent { version, dirty });
        if decorators_changed {
            self.listeners.emit_decorator(&self.decorators);
        }
        if root_changed {
            self.listeners.emit_root(self.reconciler.root_mount());
        }

        match reconcile_failure {
            Some(err) => self.report(err),
            None => Ok(()),
        }
    }

    /// Refresh the decorator export from the dirty keys of a committed
    /// transaction. Returns whether the map changed.
    fn refresh_decorators(&mut self, dirty: &[NodeKey]) -> bool {
        let mut changed = false;
        for key in dirty {
            match self.state.node(key) {
                Some(node) => {
                    if let NodeBody::Decorator { payload } = &node.body {
                        if self.decorators.get(key) != Some(payload) {
                            self.decorators.insert(key.clone(), payload.clone());
                            changed = true;
                        }
                    }
                }
                None => {
                    if self.decorators.remove(key).is_some() {
                        changed = true;
                    }
                }
            }
        }
        changed
    }

    /// Deliver a recoverable failure: to the `error` listeners when any are
    /// registered, otherwise fatally to the caller.
    pub(crate) fn report(&mut self, err: EditorError) -> Result<(), EditorError> {
        if self.listeners.has_error_listeners() {
            self.listeners.emit_error(&err);
            Ok(())
        } else {
            Err(err)
        }
    }
}
