//! Named-event subscriptions fired after successful queries.

use serde_json::Value;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, RwLock};

pub type EventHandler = Arc<dyn Fn(&Value) + Send + Sync>;

/// Handlers keyed by event name (`"{get|post|put}-{table}"`), in registration order.
/// Subscriptions are never removed.
#[derive(Clone, Default)]
pub struct EventBus {
    handlers: Arc<RwLock<HashMap<String, Vec<EventHandler>>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on<F>(&self, event: impl Into<String>, handler: F)
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let mut handlers = match self.handlers.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        handlers.entry(event.into()).or_default().push(Arc::new(handler));
    }

    /// Call every handler for `event` synchronously. A panicking handler is logged and
    /// skipped; it never reaches the caller. Returns how many handlers ran to completion.
    pub fn trigger(&self, event: &str, payload: &Value) -> usize {
        let subscribed: Vec<EventHandler> = {
            let handlers = match self.handlers.read() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            match handlers.get(event) {
                Some(list) => list.clone(),
                None => return 0,
            }
        };
        let mut completed = 0;
        for handler in subscribed {
            match catch_unwind(AssertUnwindSafe(|| handler(payload))) {
                Ok(()) => completed += 1,
                Err(_) => tracing::warn!(event = %event, "event handler panicked"),
            }
        }
        completed
    }

    pub fn subscriber_count(&self, event: &str) -> usize {
        self.handlers
            .read()
            .map(|h| h.get(event).map(Vec::len).unwrap_or(0))
            .unwrap_or(0)
    }
}
