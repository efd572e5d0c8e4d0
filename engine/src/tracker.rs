//! Authoritative order lifecycle tracking.

use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tickforge_bus::{EventBus, SubscriptionId};
use tickforge_common::{
    Event, ExecutionReport, Order, OrderId, OrderRequest, OrderStatus, OrderUpdate,
};
use tracing::warn;

/// Sole owner of the authoritative lifecycle state of every active order.
///
/// Subscribes to `Order` and `ExecutionReport` on the risk loop's bus,
/// validates every transition against the lifecycle state machine, and
/// publishes an `OrderUpdate` for each applied change. Orders reaching a
/// terminal state are removed from the active map and never mutated again.
///
/// Must be attached to the bus before any other `Order` subscriber, so
/// its `New` insertion is observable to downstream subscribers.
pub struct OrderTracker {
    bus: Arc<EventBus>,
    active: Mutex<FxHashMap<OrderId, Order>>,
    subscriptions: Mutex<Vec<SubscriptionId>>,
}

impl OrderTracker {
    /// Create the tracker and register its subscriptions on `bus`.
    pub fn attach(bus: &Arc<EventBus>) -> Arc<Self> {
        let tracker = Arc::new(Self {
            bus: Arc::clone(bus),
            active: Mutex::new(FxHashMap::default()),
            subscriptions: Mutex::new(Vec::new()),
        });

        let on_order = {
            let tracker = Arc::clone(&tracker);
            bus.subscribe_to::<OrderRequest, _>(move |request| tracker.on_order(request))
        };
        let on_report = {
            let tracker = Arc::clone(&tracker);
            bus.subscribe_to::<ExecutionReport, _>(move |report| tracker.on_execution_report(report))
        };
        tracker.subscriptions.lock().extend([on_order, on_report]);

        tracker
    }

    /// Remove this tracker's subscriptions. Call before dropping so no
    /// further callbacks fire.
    pub fn detach(&self) {
        for id in self.subscriptions.lock().drain(..) {
            self.bus.unsubscribe(id);
        }
    }

    /// Seat an order without publishing an update.
    ///
    /// Warm-up only: must be called from the composition thread before the
    /// risk loop is scheduled.
    pub fn hydrate_order(&self, order: Order) {
        self.active.lock().insert(order.id, order);
    }

    /// Snapshot of an active (non-terminal) order, if tracked.
    #[must_use]
    pub fn active_order(&self, id: OrderId) -> Option<Order> {
        self.active.lock().get(&id).cloned()
    }

    /// Number of active orders.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.active.lock().len()
    }

    fn on_order(&self, request: &OrderRequest) {
        let order = request.order.clone();
        self.active.lock().insert(order.id, order.clone());

        self.bus.publish(
            &Event::OrderUpdate(OrderUpdate {
                order,
                previous_status: OrderStatus::New,
                timestamp_ms: request.timestamp_ms,
                sequence: request.sequence,
            }),
        );
    }

    fn on_execution_report(&self, report: &ExecutionReport) {
        // Mutate under the lock, publish after releasing it.
        let update = {
            let mut active = self.active.lock();
            let Some(order) = active.get_mut(&report.order_id) else {
                warn!(
                    order_id = report.order_id,
                    "execution report for unknown order, dropping"
                );
                return;
            };

            let previous = order.status;
            let proposed = report.status.as_order_status();
            if !previous.can_transition_to(proposed) {
                warn!(
                    order_id = report.order_id,
                    from = %previous,
                    to = %proposed,
                    "illegal order transition, dropping report"
                );
                return;
            }

            order.status = proposed;
            if proposed == OrderStatus::Filled {
                order.filled_quantity = report.filled_quantity;
            }

            let snapshot = order.clone();
            if proposed.is_terminal() {
                active.remove(&report.order_id);
            }

            OrderUpdate {
                order: snapshot,
                previous_status: previous,
                timestamp_ms: report.timestamp_ms,
                sequence: report.sequence,
            }
        };

        self.bus.publish(&Event::OrderUpdate(update));
    }
}
