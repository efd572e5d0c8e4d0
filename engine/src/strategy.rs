//! Trivial illustrative strategy.

use std::sync::Arc;

use parking_lot::Mutex;
use tickforge_bus::{EventBus, SubscriptionId};
use tickforge_common::{Event, MarketData, Side, Signal};

/// Emits a Buy signal for every tick whose price exceeds a threshold.
///
/// Exists to exercise the pipeline: real strategies would live on the same
/// loop with the same shape (subscribe to market data, publish signals,
/// never talk to execution directly).
pub struct ThresholdStrategy {
    bus: Arc<EventBus>,
    strategy_id: String,
    threshold: f64,
    subscriptions: Mutex<Vec<SubscriptionId>>,
}

impl ThresholdStrategy {
    /// Create the strategy and register it on the strategy loop's bus.
    pub fn attach(bus: &Arc<EventBus>, threshold: f64) -> Arc<Self> {
        let strategy = Arc::new(Self {
            bus: Arc::clone(bus),
            strategy_id: "threshold".to_string(),
            threshold,
            subscriptions: Mutex::new(Vec::new()),
        });

        let on_tick = {
            let strategy = Arc::clone(&strategy);
            bus.subscribe_to::<MarketData, _>(move |tick| strategy.on_market_data(tick))
        };
        strategy.subscriptions.lock().push(on_tick);

        strategy
    }

    /// Remove this strategy's subscriptions.
    pub fn detach(&self) {
        for id in self.subscriptions.lock().drain(..) {
            self.bus.unsubscribe(id);
        }
    }

    fn on_market_data(&self, tick: &MarketData) {
        if tick.price <= self.threshold {
            return;
        }

        self.bus.publish(&Event::Signal(Signal {
            strategy_id: self.strategy_id.clone(),
            symbol: tick.symbol.clone(),
            side: Side::Buy,
            strength: 1.0,
            price: tick.price,
            timestamp_ms: tick.timestamp_ms,
            sequence: tick.sequence,
        }));
    }
}
