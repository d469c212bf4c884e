//! Inbound event fan-out: global and per-event-type listener
//! registries, dispatched from the session thread.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use log::{error, trace, warn};
use serde_json::Value;

/// An asynchronously pushed protocol event: the type discriminator and
/// whatever payload OBS attached to it.
#[derive(Debug, Clone)]
pub struct ObsEvent {
    pub event_type: String,
    pub data: Value,
}

/// Handle returned by listener registration and consumed by
/// unregistration. Ids are never reused within one client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

pub(crate) type EventCallback = Arc<dyn Fn(&ObsEvent) + Send + Sync + 'static>;

/// Listener storage shared between the client (register/unregister)
/// and the session thread (dispatch). Mutation happens under the
/// locks; dispatch iterates a snapshot, so registering or removing a
/// listener while an event is being delivered cannot corrupt the
/// iteration.
#[derive(Default)]
pub(crate) struct CallbackRegistry {
    next_id: AtomicU64,
    global: Mutex<Vec<(ListenerId, EventCallback)>>,
    by_type: Mutex<HashMap<String, Vec<(ListenerId, EventCallback)>>>,
}

impl CallbackRegistry {
    fn next_id(&self) -> ListenerId {
        ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1)
    }

    pub fn register_global(&self, callback: EventCallback) -> ListenerId {
        let id = self.next_id();
        lock(&self.global).push((id, callback));
        id
    }

    pub fn register_for(&self, event_type: &str, callback: EventCallback) -> ListenerId {
        let id = self.next_id();
        lock(&self.by_type)
            .entry(event_type.to_string())
            .or_default()
            .push((id, callback));
        id
    }

    /// Removes a listener wherever it was registered. Unknown ids are
    /// tolerated (logged, not an error); removing the last listener of
    /// an event type drops that type's entry entirely.
    pub fn unregister(&self, id: ListenerId) {
        {
            let mut global = lock(&self.global);
            if let Some(pos) = global.iter().position(|(lid, _)| *lid == id) {
                global.remove(pos);
                return;
            }
        }

        let mut by_type = lock(&self.by_type);
        let mut found = false;
        let mut emptied = None;
        for (event_type, listeners) in by_type.iter_mut() {
            if let Some(pos) = listeners.iter().position(|(lid, _)| *lid == id) {
                listeners.remove(pos);
                found = true;
                if listeners.is_empty() {
                    emptied = Some(event_type.clone());
                }
                break;
            }
        }
        if let Some(event_type) = emptied {
            by_type.remove(&event_type);
        }
        if !found {
            warn!("listener {id:?} was not registered; nothing to remove");
        }
    }

    /// Invokes every global listener, then every listener scoped to
    /// the event's type, in registration order. A panicking listener
    /// is logged and never prevents delivery to the rest.
    pub fn dispatch(&self, event: &ObsEvent) {
        let globals: Vec<EventCallback> =
            lock(&self.global).iter().map(|(_, cb)| Arc::clone(cb)).collect();
        let scoped: Vec<EventCallback> = lock(&self.by_type)
            .get(&event.event_type)
            .map(|listeners| listeners.iter().map(|(_, cb)| Arc::clone(cb)).collect())
            .unwrap_or_default();

        trace!(
            "dispatching '{}' to {} global and {} scoped listener(s)",
            event.event_type,
            globals.len(),
            scoped.len()
        );
        for callback in globals.into_iter().chain(scoped) {
            if panic::catch_unwind(AssertUnwindSafe(|| callback(event))).is_err() {
                error!(
                    "event listener panicked while handling '{}'",
                    event.event_type
                );
            }
        }
    }

    #[cfg(test)]
    pub fn scoped_entry_count(&self) -> usize {
        lock(&self.by_type).len()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
