use std::sync::Arc;

use obsws_lib::protocol::Event;
use parking_lot::Mutex;

type Callback = Arc<dyn Fn(&Event) + Send + Sync>;

/// Identifies one listener registration; pass it back to remove the listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerHandle(u64);

struct Registration {
    handle: ListenerHandle,
    event_type: Option<String>,
    callback: Callback,
}

impl Registration {
    fn wants(&self, event: &Event) -> bool {
        self.event_type
            .as_deref()
            .is_none_or(|event_type| event_type == event.event_type)
    }
}

#[derive(Default)]
struct Registry {
    next_handle: u64,
    entries: Vec<Registration>,
}

/// Listener registry. Callbacks run outside the lock, so a listener may add or
/// remove listeners while being invoked.
#[derive(Default)]
pub(crate) struct EventDispatcher {
    registry: Mutex<Registry>,
}

impl EventDispatcher {
    pub(crate) fn add<F>(&self, event_type: Option<&str>, callback: F) -> ListenerHandle
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        let mut registry = self.registry.lock();
        let handle = ListenerHandle(registry.next_handle);
        registry.next_handle += 1;
        registry.entries.push(Registration {
            handle,
            event_type: event_type.map(str::to_owned),
            callback: Arc::new(callback),
        });
        handle
    }

    pub(crate) fn remove(&self, handle: ListenerHandle) -> bool {
        let mut registry = self.registry.lock();
        let before = registry.entries.len();
        registry.entries.retain(|entry| entry.handle != handle);
        registry.entries.len() != before
    }

    pub(crate) fn clear(&self) {
        self.registry.lock().entries.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.registry.lock().entries.len()
    }

    /// Invokes every matching listener in registration order and returns how many
    /// ran.
    pub(crate) fn dispatch(&self, event: &Event) -> usize {
        let targets: Vec<Callback> = self
            .registry
            .lock()
            .entries
            .iter()
            .filter(|entry| entry.wants(event))
            .map(|entry| Arc::clone(&entry.callback))
            .collect();

        for callback in &targets {
            callback(event);
        }
        targets.len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use obsws_lib::protocol::{Event, EventSubscription};
    use parking_lot::Mutex;
    use serde_json::json;

    use super::EventDispatcher;

    fn event(event_type: &str) -> Event {
        Event::new(event_type, EventSubscription::SCENES, json!({}))
    }

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&Event) + Send + Sync + 'static) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        (seen, move |event: &Event| {
            sink.lock().push(event.event_type.clone())
        })
    }

    #[test]
    fn unfiltered_listener_sees_every_event() {
        let dispatcher = EventDispatcher::default();
        let (seen, callback) = recorder();
        dispatcher.add(None, callback);

        dispatcher.dispatch(&event("SceneCreated"));
        dispatcher.dispatch(&event("InputMuteStateChanged"));

        assert_eq!(*seen.lock(), ["SceneCreated", "InputMuteStateChanged"]);
    }

    #[test]
    fn named_listener_sees_only_matching_events() {
        let dispatcher = EventDispatcher::default();
        let (seen, callback) = recorder();
        dispatcher.add(Some("SceneCreated"), callback);

        assert_eq!(dispatcher.dispatch(&event("InputMuteStateChanged")), 0);
        assert_eq!(dispatcher.dispatch(&event("SceneCreated")), 1);

        assert_eq!(*seen.lock(), ["SceneCreated"]);
    }

    #[test]
    fn listeners_run_in_registration_order() {
        let dispatcher = EventDispatcher::default();
        let order = Arc::new(Mutex::new(Vec::new()));
        for label in ["first", "second", "third"] {
            let order = Arc::clone(&order);
            dispatcher.add(None, move |_| order.lock().push(label));
        }

        dispatcher.dispatch(&event("SceneCreated"));
        assert_eq!(*order.lock(), ["first", "second", "third"]);
    }

    #[test]
    fn removal_stops_delivery_and_is_idempotent() {
        let dispatcher = EventDispatcher::default();
        let (seen, callback) = recorder();
        let handle = dispatcher.add(None, callback);

        dispatcher.dispatch(&event("SceneCreated"));
        assert!(dispatcher.remove(handle));
        assert!(!dispatcher.remove(handle));
        dispatcher.dispatch(&event("SceneRemoved"));

        assert_eq!(*seen.lock(), ["SceneCreated"]);
        assert_eq!(dispatcher.len(), 0);
    }

    #[test]
    fn handles_are_not_reused_after_clear() {
        let dispatcher = EventDispatcher::default();
        let old = dispatcher.add(None, |_| {});
        dispatcher.clear();
        let new = dispatcher.add(None, |_| {});
        assert_ne!(old, new);
        assert!(!dispatcher.remove(old));
        assert_eq!(dispatcher.len(), 1);
    }

    #[test]
    fn listener_may_remove_itself_while_dispatching() {
        let dispatcher = Arc::new(EventDispatcher::default());
        let slot = Arc::new(Mutex::new(None));
        let remover = Arc::clone(&dispatcher);
        let pending_removal = Arc::clone(&slot);
        let handle = dispatcher.add(None, move |_| {
            if let Some(handle) = pending_removal.lock().take() {
                remover.remove(handle);
            }
        });
        *slot.lock() = Some(handle);

        assert_eq!(dispatcher.dispatch(&event("SceneCreated")), 1);
        assert_eq!(dispatcher.dispatch(&event("SceneCreated")), 0);
    }
}
