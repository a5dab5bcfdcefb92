//! Synchronous publish/subscribe primitive embedded in every realm.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use realmlink_types::{Event, EventKind};

/// A subscription callback.
pub type Handler = Arc<dyn Fn(&Event) + Send + Sync>;

/// Dispatches events to handlers registered per [`EventKind`].
///
/// `fire` runs every handler for the event's kind in registration order, on
/// the calling task. Handlers that do I/O must not block for long: they stall
/// the emitting realm until they return.
///
/// The registry lock is only held to snapshot the handler list, never while
/// handlers run, so a handler may register further handlers. Those see only
/// later fires.
#[derive(Default)]
pub struct EventEmitter {
    handlers: RwLock<HashMap<EventKind, Vec<Handler>>>,
}

impl EventEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for events of `kind`. Duplicates are allowed.
    pub fn on<F>(&self, kind: EventKind, handler: F)
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        let mut handlers = self.handlers.write().unwrap_or_else(|e| e.into_inner());
        handlers.entry(kind).or_default().push(Arc::new(handler));
    }

    /// Invokes all handlers registered for the event's kind, in order.
    pub fn fire(&self, event: &Event) {
        let snapshot = {
            let handlers = self.handlers.read().unwrap_or_else(|e| e.into_inner());
            match handlers.get(&event.kind()) {
                Some(list) => list.clone(),
                None => return,
            }
        };

        for handler in snapshot {
            handler(event);
        }
    }

    /// Returns the number of handlers registered for `kind`.
    pub fn handler_count(&self, kind: EventKind) -> usize {
        let handlers = self.handlers.read().unwrap_or_else(|e| e.into_inner());
        handlers.get(&kind).map_or(0, Vec::len)
    }
}

impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let handlers = self.handlers.read().unwrap_or_else(|e| e.into_inner());
        let counts: HashMap<&EventKind, usize> =
            handlers.iter().map(|(k, v)| (k, v.len())).collect();
        f.debug_struct("EventEmitter")
            .field("handlers", &counts)
            .finish()
    }
}
