//! Simulated execution on the order-routing loop.

use std::sync::Arc;

use parking_lot::Mutex;
use tickforge_bus::{EventBus, SubscriptionId};
use tickforge_common::{Event, ExecutionReport, ExecutionStatus, OrderRequest, TimeProvider};

/// Converts every order into a two-step report sequence:
/// `Accepted` (zero fill) followed by `Filled` for the full quantity at
/// the order price. No slippage and no partial fills keeps replays
/// deterministic and reproducible.
///
/// Report timestamps come from the injected clock, so simulated runs stamp
/// fills with simulated time.
pub struct ExecutionSimulator {
    bus: Arc<EventBus>,
    clock: Arc<dyn TimeProvider>,
    subscriptions: Mutex<Vec<SubscriptionId>>,
}

impl ExecutionSimulator {
    /// Create the simulator and register it on the routing loop's bus.
    pub fn attach(bus: &Arc<EventBus>, clock: Arc<dyn TimeProvider>) -> Arc<Self> {
        let simulator = Arc::new(Self {
            bus: Arc::clone(bus),
            clock,
            subscriptions: Mutex::new(Vec::new()),
        });

        let on_order = {
            let simulator = Arc::clone(&simulator);
            bus.subscribe_to::<OrderRequest, _>(move |request| simulator.on_order(request))
        };
        simulator.subscriptions.lock().push(on_order);

        simulator
    }

    /// Remove this simulator's subscriptions.
    pub fn detach(&self) {
        for id in self.subscriptions.lock().drain(..) {
            self.bus.unsubscribe(id);
        }
    }

    fn on_order(&self, request: &OrderRequest) {
        let now_ms = self.clock.now_ms();
        let order = &request.order;

        self.bus.publish(&Event::ExecutionReport(ExecutionReport {
            order_id: order.id,
            filled_quantity: 0.0,
            fill_price: 0.0,
            status: ExecutionStatus::Accepted,
            timestamp_ms: now_ms,
            sequence: request.sequence,
        }));

        self.bus.publish(&Event::ExecutionReport(ExecutionReport {
            order_id: order.id,
            filled_quantity: order.quantity,
            fill_price: order.price,
            status: ExecutionStatus::Filled,
            timestamp_ms: now_ms,
            sequence: request.sequence,
        }));
    }
}
