//! Pre-trade gating and the kill-switch latch.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tickforge_bus::{EventBus, SubscriptionId};
use tickforge_common::{
    Event, Order, OrderIdGenerator, OrderRequest, RiskLimits, RiskViolation, Signal,
};
use parking_lot::Mutex;
use tracing::{error, warn};

use crate::positions::PositionEngine;

/// Quantity of every order minted from a signal. A production sizing model
/// would derive this from `Signal::strength`.
const ORDER_QUANTITY: f64 = 1.0;

/// Gates `Signal -> Order` with pre-trade checks and latches a one-way
/// kill switch on drawdown breach or operator command.
///
/// The halt flag is monotonic: settable from any thread, never cleared.
/// Relaxed atomics suffice; no other data depends on its ordering.
pub struct RiskEngine {
    bus: Arc<EventBus>,
    order_ids: Arc<OrderIdGenerator>,
    positions: Arc<PositionEngine>,
    limits: RiskLimits,
    halted: AtomicBool,
    subscriptions: Mutex<Vec<SubscriptionId>>,
}

impl RiskEngine {
    /// Create the engine and register its subscriptions on `bus`.
    pub fn attach(
        bus: &Arc<EventBus>,
        order_ids: Arc<OrderIdGenerator>,
        positions: Arc<PositionEngine>,
        limits: RiskLimits,
    ) -> Arc<Self> {
        let engine = Arc::new(Self {
            bus: Arc::clone(bus),
            order_ids,
            positions,
            limits,
            halted: AtomicBool::new(false),
            subscriptions: Mutex::new(Vec::new()),
        });

        let on_signal = {
            let engine = Arc::clone(&engine);
            bus.subscribe_to::<Signal, _>(move |signal| engine.on_signal(signal))
        };
        let on_violation = {
            let engine = Arc::clone(&engine);
            bus.subscribe_to::<RiskViolation, _>(move |violation| engine.on_violation(violation))
        };
        engine.subscriptions.lock().extend([on_signal, on_violation]);

        engine
    }

    /// Remove this engine's subscriptions.
    pub fn detach(&self) {
        for id in self.subscriptions.lock().drain(..) {
            self.bus.unsubscribe(id);
        }
    }

    /// Latch the kill switch. Safe from any thread; there is no reset.
    pub fn halt_trading(&self) {
        self.halted.store(true, Ordering::Relaxed);
        warn!("trading halted");
    }

    /// Whether the kill switch has latched. Safe from any thread.
    #[must_use]
    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::Relaxed)
    }

    fn on_signal(&self, signal: &Signal) {
        if self.is_halted() {
            warn!(
                symbol = %signal.symbol,
                strategy = %signal.strategy_id,
                "signal dropped: trading is halted"
            );
            return;
        }

        let current = self
            .positions
            .position(&signal.symbol)
            .map_or(0.0, |position| position.net_quantity.abs());
        if current + ORDER_QUANTITY > self.limits.max_position_per_symbol {
            warn!(
                symbol = %signal.symbol,
                current,
                limit = self.limits.max_position_per_symbol,
                "signal dropped: position cap would be breached"
            );
            return;
        }

        let order = Order::new(
            self.order_ids.next_id(),
            signal.strategy_id.clone(),
            signal.symbol.clone(),
            signal.side,
            ORDER_QUANTITY,
            signal.price,
        );

        self.bus.publish(&Event::Order(OrderRequest {
            order,
            timestamp_ms: signal.timestamp_ms,
            sequence: signal.sequence,
        }));
    }

    fn on_violation(&self, violation: &RiskViolation) {
        error!(
            symbol = %violation.symbol,
            reason = %violation.reason,
            current = violation.current_value,
            limit = violation.limit_value,
            "risk violation: latching kill switch"
        );
        self.halted.store(true, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex as PlMutex;
    use rstest::*;
    use tickforge_common::{EventPayload, Position, Side};

    struct Harness {
        bus: Arc<EventBus>,
        engine: Arc<RiskEngine>,
        positions: Arc<PositionEngine>,
        orders: Arc<PlMutex<Vec<Order>>>,
    }

    #[fixture]
    fn capped() -> Harness {
        harness(RiskLimits {
            max_position_per_symbol: 2.0,
            max_drawdown: -500.0,
        })
    }

    fn harness(limits: RiskLimits) -> Harness {
        let bus = Arc::new(EventBus::new());
        let positions = PositionEngine::attach(&bus, limits);
        let engine = RiskEngine::attach(
            &bus,
            Arc::new(OrderIdGenerator::new()),
            Arc::clone(&positions),
            limits,
        );

        let orders = Arc::new(PlMutex::new(Vec::new()));
        {
            let orders = Arc::clone(&orders);
            bus.subscribe_to::<OrderRequest, _>(move |request| {
                orders.lock().push(request.order.clone());
            });
        }

        Harness {
            bus,
            engine,
            positions,
            orders,
        }
    }

    fn signal(symbol: &str, side: Side, price: f64) -> Event {
        Signal {
            strategy_id: "threshold".to_string(),
            symbol: symbol.to_string(),
            side,
            strength: 1.0,
            price,
            timestamp_ms: 1,
            sequence: 1,
        }
        .into_event()
    }

    #[rstest]
    fn passing_signal_mints_an_order(capped: Harness) {
        capped.bus.publish(&signal("AAPL", Side::Buy, 150.25));

        let orders = capped.orders.lock();
        assert_eq!(orders.len(), 1);
        let order = &orders[0];
        assert_eq!(order.id, 1);
        assert_eq!(order.symbol, "AAPL");
        assert_eq!(order.side, Side::Buy);
        assert_eq!(order.quantity, 1.0);
        assert_eq!(order.price, 150.25);
    }

    #[rstest]
    fn position_cap_drops_the_third_signal(capped: Harness) {
        // Seed the position to simulate fills keeping pace with orders.
        capped.positions.hydrate_position(Position {
            symbol: "AAPL".to_string(),
            net_quantity: 2.0,
            average_price: 150.0,
            realized_pnl: 0.0,
        });

        capped.bus.publish(&signal("AAPL", Side::Buy, 151.0));
        assert!(capped.orders.lock().is_empty());

        // Other symbols are unaffected by AAPL's cap.
        capped.bus.publish(&signal("MSFT", Side::Buy, 300.0));
        assert_eq!(capped.orders.lock().len(), 1);
    }

    #[rstest]
    fn cap_applies_to_short_positions_symmetrically(capped: Harness) {
        capped.positions.hydrate_position(Position {
            symbol: "ES".to_string(),
            net_quantity: -2.0,
            average_price: 4000.0,
            realized_pnl: 0.0,
        });

        capped.bus.publish(&signal("ES", Side::Sell, 4000.0));
        assert!(capped.orders.lock().is_empty());
    }

    #[rstest]
    fn violation_latches_and_drops_all_subsequent_signals(capped: Harness) {
        assert!(!capped.engine.is_halted());

        capped.bus.publish(
            &RiskViolation {
                symbol: "ES".to_string(),
                reason: "Max Drawdown Exceeded".to_string(),
                current_value: -20.0,
                limit_value: -10.0,
                timestamp_ms: 1,
                sequence: 1,
            }
            .into_event(),
        );
        assert!(capped.engine.is_halted());

        capped.bus.publish(&signal("AAPL", Side::Buy, 150.0));
        assert!(capped.orders.lock().is_empty());
    }

    #[rstest]
    fn operator_halt_is_equivalent_to_a_violation(capped: Harness) {
        capped.engine.halt_trading();
        assert!(capped.engine.is_halted());

        capped.bus.publish(&signal("AAPL", Side::Buy, 150.0));
        assert!(capped.orders.lock().is_empty());
    }

    #[rstest]
    fn order_ids_increase_across_signals(capped: Harness) {
        capped.bus.publish(&signal("AAPL", Side::Buy, 150.0));
        capped.bus.publish(&signal("MSFT", Side::Buy, 300.0));

        let ids: Vec<u64> = capped.orders.lock().iter().map(|o| o.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }
}
