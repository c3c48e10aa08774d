//! # Listener bus
//!
//! Fan-out of editor events to registered observers. The bus is owned by
//! its editor instance, never shared globally, and listeners are pure
//! observers: they receive event payloads by reference and re-enter the
//! editor only through post-commit callbacks or fresh `update` calls.

use crate::error::EditorError;
use scribe_model::NodeKey;
use scribe_reconciler::MountId;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::rc::Rc;

/// Fired once per committed transaction, after reconciliation.
#[derive(Debug, Clone, Serialize)]
pub struct UpdateEvent {
    pub version: u64,
    /// Keys touched by the transaction, including removed ones.
    pub dirty: Vec<NodeKey>,
}

pub type UpdateListener = Rc<dyn Fn(&UpdateEvent)>;
pub type ErrorListener = Rc<dyn Fn(&EditorError)>;
pub type RootListener = Rc<dyn Fn(Option<MountId>)>;
pub type DecoratorListener = Rc<dyn Fn(&HashMap<NodeKey, Value>)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Channel {
    Update,
    Error,
    Root,
    Decorator,
}

/// Deregistration token for one listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerToken {
    channel: Channel,
    id: u64,
}

#[derive(Default)]
pub struct ListenerBus {
    update: Vec<(u64, UpdateListener)>,
    error: Vec<(u64, ErrorListener)>,
    root: Vec<(u64, RootListener)>,
    decorator: Vec<(u64, DecoratorListener)>,
    next_id: u64,
}

impl ListenerBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    pub fn on_update(&mut self, listener: impl Fn(&UpdateEvent) + 'static) -> ListenerToken {
        let id = self.next_id();
        self.update.push((id, Rc::new(listener)));
        ListenerToken {
            channel: Channel::Update,
            id,
        }
    }

    pub fn on_error(&mut self, listener: impl Fn(&EditorError) + 'static) -> ListenerToken {
        let id = self.next_id();
        self.error.push((id, Rc::new(listener)));
        ListenerToken {
            channel: Channel::Error,
            id,
        }
    }

    pub fn on_root(&mut self, listener: impl Fn(Option<MountId>) + 'static) -> ListenerToken {
        let id = self.next_id();
        self.root.push((id, Rc::new(listener)));
        ListenerToken {
            channel: Channel::Root,
            id,
        }
    }

    pub fn on_decorator(
        &mut self,
        listener: impl Fn(&HashMap<NodeKey, Value>) + 'static,
    ) -> ListenerToken {
        let id = self.next_id();
        self.decorator.push((id, Rc::new(listener)));
        ListenerToken {
            channel: Channel::Decorator,
            id,
        }
    }

    pub fn remove(&mut self, token: ListenerToken) {
        match token.channel {
            Channel::Update => self.update.retain(|(id, _)| *id != token.id),
            Channel::Error => self.error.retain(|(id, _)| *id != token.id),
            Channel::Root => self.root.retain(|(id, _)| *id != token.id),
            Channel::Decorator => self.decorator.retain(|(id, _)| *id != token.id),
        }
    }

    pub fn has_error_listeners(&self) -> bool {
        !self.error.is_empty()
    }

    pub fn emit_update(&self, event: &UpdateEvent) {
        for (_, listener) in &self.update {
            listener(event);
        }
    }

    pub fn emit_error(&self, error: &EditorError) {
        for (_, listener) in &self.error {
            listener(error);
        }
    }

    pub fn emit_root(&self, mount: Option<MountId>) {
        for (_, listener) in &self.root {
            listener(mount);
        }
    }

    pub fn emit_decorator(&self, decorators: &HashMap<NodeKey, Value>) {
        for (_, listener) in &self.decorator {
            listener(decorators);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_listener_deregistration() {
        let fired = Rc::new(Cell::new(0));
        let mut bus = ListenerBus::new();

        let counter = fired.clone();
        let token = bus.on_update(move |_| counter.set(counter.get() + 1));

        let event = UpdateEvent {
            version: 1,
            dirty: vec![],
        };
        bus.emit_update(&event);
        assert_eq!(fired.get(), 1);

        bus.remove(token);
        bus.emit_update(&event);
        assert_eq!(fired.get(), 1);
    }

    #[test]
    fn test_update_event_serializes() {
        let event = UpdateEvent {
            version: 2,
            dirty: vec![NodeKey::root()],
        };
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(json, r#"{"version":2,"dirty":["root"]}"#);
    }

    #[test]
    fn test_error_listener_presence() {
        let mut bus = ListenerBus::new();
        assert!(!bus.has_error_listeners());
        let token = bus.on_error(|_| {});
        assert!(bus.has_error_listeners());
        bus.remove(token);
        assert!(!bus.has_error_listeners());
    }
}
