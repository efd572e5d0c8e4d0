//! Synchronous typed publish/subscribe bus.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tickforge_common::{Event, EventPayload};

/// Handle returned by [`EventBus::subscribe`], used to unsubscribe.
pub type SubscriptionId = u64;

type Handler = Arc<dyn Fn(&Event) + Send + Sync>;

struct Subscription {
    id: SubscriptionId,
    handler: Handler,
}

/// Per-actor event bus with synchronous, subscription-ordered delivery.
///
/// `publish` invokes every matching subscriber on the calling thread, in
/// the order subscriptions were registered. The subscriber table is
/// snapshotted under the lock and the lock released before any handler
/// runs, so handlers may freely call `publish`, `subscribe`, or
/// `unsubscribe` reentrantly without deadlock. A handler added or removed
/// during a publish may or may not see the in-flight event; that looseness
/// is part of the contract.
///
/// Subscription order is load-bearing: components that must observe an
/// event before their peers (e.g. the order tracker seeing `Order` before
/// anything that reads tracker state) rely on being registered first.
#[derive(Default)]
pub struct EventBus {
    subscriptions: RwLock<Vec<Subscription>>,
    next_id: AtomicU64,
}

impl EventBus {
    /// An empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self {
            subscriptions: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a handler for every event. Returns its subscription id.
    pub fn subscribe<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscriptions.write().push(Subscription {
            id,
            handler: Arc::new(handler),
        });
        id
    }

    /// Register a handler for one payload type.
    ///
    /// Lowered onto a generic subscription that tests the event's variant
    /// tag and forwards the payload when it matches; non-matching events
    /// are silently ignored.
    pub fn subscribe_to<P, F>(&self, handler: F) -> SubscriptionId
    where
        P: EventPayload + 'static,
        F: Fn(&P) + Send + Sync + 'static,
    {
        self.subscribe(move |event| {
            if let Some(payload) = P::from_event(event) {
                handler(payload);
            }
        })
    }

    /// Remove a subscription. Unknown ids are a no-op.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.subscriptions
            .write()
            .retain(|subscription| subscription.id != id);
    }

    /// Deliver `event` to every subscriber, in subscription order, on the
    /// calling thread.
    pub fn publish(&self, event: &Event) {
        // Snapshot the handler list, then drop the lock before invoking.
        let handlers: Vec<Handler> = {
            let subscriptions = self.subscriptions.read();
            subscriptions
                .iter()
                .map(|subscription| Arc::clone(&subscription.handler))
                .collect()
        };

        for handler in handlers {
            handler(event);
        }
    }

    /// Number of active subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscriptions.read().len()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
