//! Lifecycle and value-change events, and a small callback registry.
//!
//! `EventBus<E>` is an explicit list-of-callbacks structure with stable
//! register/deregister handles. Handlers must not reenter the emitting
//! component's own locks.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

use crate::types::Variable;

/// Connection lifecycle events raised by the Main Client and re-emitted by
/// the Service Coordinator.
#[derive(Debug, Clone)]
pub enum ConnectionEvent {
    Connecting,
    Connected,
    Reconnecting,
    Reconnected,
    Disconnected,
    KeepAliveFailed { status_code: u32 },
}

/// A variable's wire value changed between two successive read/push cycles.
#[derive(Debug, Clone)]
pub struct VariableValueChanged {
    pub path: String,
    pub old: Variable,
    pub new: Variable,
}

/// A monitored item pushed a fresh value from the server.
#[derive(Debug, Clone)]
pub struct MonitoredItemChanged {
    pub display_name: String,
    pub node_id: String,
    pub raw_value: crate::types::WireValue,
}

pub type Callback<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// A registry of callbacks for one event type, keyed by a stable handle so
/// callers can deregister exactly the handler they registered.
pub struct EventBus<E> {
    next_id: AtomicU64,
    handlers: DashMap<u64, Callback<E>>,
}

impl<E> Default for EventBus<E> {
    fn default() -> Self {
        Self {
            next_id: AtomicU64::new(0),
            handlers: DashMap::new(),
        }
    }
}

impl<E> fmt::Debug for EventBus<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("handler_count", &self.handlers.len())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

impl<E> EventBus<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, handler: Callback<E>) -> HandlerId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.handlers.insert(id, handler);
        HandlerId(id)
    }

    pub fn unsubscribe(&self, id: HandlerId) -> bool {
        self.handlers.remove(&id.0).is_some()
    }

    /// Invokes every registered handler. Handlers must not call back into
    /// the component emitting the event while holding any of its locks.
    pub fn emit(&self, event: &E) {
        for entry in self.handlers.iter() {
            (entry.value())(event);
        }
    }

    pub fn clear(&self) {
        self.handlers.clear();
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
