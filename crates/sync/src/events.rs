//! Typed event bus for connectivity and remote-change notifications.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::Value;

use parlor_core::records::ChatRecord;
use parlor_core::sync::SyncFrame;

/// Events published by the sync client.
#[derive(Debug, Clone)]
pub enum SyncEvent {
    /// Live channel established.
    Connected,
    /// Live channel lost or closed.
    Disconnected,
    /// Any inbound frame, published before its kind-specific event.
    Message(SyncFrame),
    /// A chat changed remotely.
    ChatChanged(ChatRecord),
    /// A setting changed remotely.
    SettingChanged { key: String, value: Value },
    /// A bulk import happened remotely.
    BulkImport,
    /// All data was cleared remotely.
    AllDataCleared,
}

/// Closed set of subscribable event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncEventKind {
    Connected,
    Disconnected,
    Message,
    ChatChanged,
    SettingChanged,
    BulkImport,
    AllDataCleared,
}

impl SyncEvent {
    pub fn kind(&self) -> SyncEventKind {
        match self {
            SyncEvent::Connected => SyncEventKind::Connected,
            SyncEvent::Disconnected => SyncEventKind::Disconnected,
            SyncEvent::Message(_) => SyncEventKind::Message,
            SyncEvent::ChatChanged(_) => SyncEventKind::ChatChanged,
            SyncEvent::SettingChanged { .. } => SyncEventKind::SettingChanged,
            SyncEvent::BulkImport => SyncEventKind::BulkImport,
            SyncEvent::AllDataCleared => SyncEventKind::AllDataCleared,
        }
    }
}

type Handler = Arc<dyn Fn(&SyncEvent) + Send + Sync>;

/// Token returned by `subscribe`; pass to `unsubscribe` to detach the
/// handler again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionToken {
    kind: SyncEventKind,
    id: u64,
}

#[derive(Default)]
struct BusInner {
    handlers: Mutex<HashMap<SyncEventKind, Vec<(u64, Handler)>>>,
    next_id: AtomicU64,
}

/// Publish/subscribe bus over the closed [`SyncEventKind`] set.
///
/// Handlers run synchronously on the emitting task, in registration order.
/// Cheap to clone; clones share subscriptions.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(
        &self,
        kind: SyncEventKind,
        handler: impl Fn(&SyncEvent) + Send + Sync + 'static,
    ) -> SubscriptionToken {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let mut handlers = self.lock_handlers();
        handlers
            .entry(kind)
            .or_default()
            .push((id, Arc::new(handler)));
        SubscriptionToken { kind, id }
    }

    pub fn unsubscribe(&self, token: SubscriptionToken) {
        let mut handlers = self.lock_handlers();
        if let Some(entries) = handlers.get_mut(&token.kind) {
            entries.retain(|(id, _)| *id != token.id);
        }
    }

    /// Dispatch to every handler registered for the event's kind.
    ///
    /// The handler list is snapshotted before dispatch so a handler may
    /// subscribe or unsubscribe without deadlocking the bus.
    pub fn emit(&self, event: &SyncEvent) {
        let snapshot: Vec<Handler> = {
            let handlers = self.lock_handlers();
            handlers
                .get(&event.kind())
                .map(|entries| entries.iter().map(|(_, h)| h.clone()).collect())
                .unwrap_or_default()
        };
        for handler in snapshot {
            handler(event);
        }
    }

    fn lock_handlers(
        &self,
    ) -> std::sync::MutexGuard<'_, HashMap<SyncEventKind, Vec<(u64, Handler)>>> {
        match self.inner.handlers.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handlers_run_in_registration_order() {
        let bus = EventBus::new();
        let order: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));

        let first = order.clone();
        bus.subscribe(SyncEventKind::Connected, move |_| {
            first.lock().expect("order lock").push("first");
        });
        let second = order.clone();
        bus.subscribe(SyncEventKind::Connected, move |_| {
            second.lock().expect("order lock").push("second");
        });

        bus.emit(&SyncEvent::Connected);

        assert_eq!(*order.lock().expect("order lock"), vec!["first", "second"]);
    }

    #[test]
    fn unsubscribed_handler_is_not_invoked() {
        let bus = EventBus::new();
        let calls: Arc<Mutex<u32>> = Arc::new(Mutex::new(0));

        let sink = calls.clone();
        let token = bus.subscribe(SyncEventKind::Disconnected, move |_| {
            *sink.lock().expect("calls lock") += 1;
        });

        bus.emit(&SyncEvent::Disconnected);
        bus.unsubscribe(token);
        bus.emit(&SyncEvent::Disconnected);

        assert_eq!(*calls.lock().expect("calls lock"), 1);
    }

    #[test]
    fn events_only_reach_handlers_of_their_kind() {
        let bus = EventBus::new();
        let calls: Arc<Mutex<u32>> = Arc::new(Mutex::new(0));

        let sink = calls.clone();
        bus.subscribe(SyncEventKind::BulkImport, move |_| {
            *sink.lock().expect("calls lock") += 1;
        });

        bus.emit(&SyncEvent::Connected);
        bus.emit(&SyncEvent::AllDataCleared);
        bus.emit(&SyncEvent::BulkImport);

        assert_eq!(*calls.lock().expect("calls lock"), 1);
    }

    #[test]
    fn handler_may_unsubscribe_itself_during_dispatch() {
        let bus = EventBus::new();
        let slot: Arc<Mutex<Option<SubscriptionToken>>> = Arc::new(Mutex::new(None));

        let bus_clone = bus.clone();
        let slot_clone = slot.clone();
        let token = bus.subscribe(SyncEventKind::Connected, move |_| {
            if let Some(token) = slot_clone.lock().expect("slot lock").take() {
                bus_clone.unsubscribe(token);
            }
        });
        *slot.lock().expect("slot lock") = Some(token);

        bus.emit(&SyncEvent::Connected);
        bus.emit(&SyncEvent::Connected);
    }
}
