//! Per-symbol position tracking and realized P&L.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use tickforge_bus::{EventBus, SubscriptionId};
use tickforge_common::{
    Event, ExecutionReport, ExecutionStatus, OrderId, OrderRequest, Position, PositionUpdate,
    RiskLimits, RiskViolation, Side,
};
use tracing::warn;

/// Symbol and side remembered per order, because execution reports do not
/// carry either. Populated on `Order`, consumed on the `Filled` report.
#[derive(Debug, Clone)]
struct OrderContext {
    symbol: String,
    side: Side,
}

/// Maintains net position, weighted-average entry price, and realized P&L
/// per symbol, and runs the post-trade drawdown check.
///
/// Fills mutate the position map under an exclusive lock; the drawdown
/// test and the snapshot for the outgoing `PositionUpdate` happen under
/// the same lock, but publishing never does. Reads from other threads
/// (`snapshots` for the IPC worker) take the shared side of the lock.
pub struct PositionEngine {
    bus: Arc<EventBus>,
    limits: RiskLimits,
    positions: RwLock<FxHashMap<String, Position>>,
    order_cache: Mutex<FxHashMap<OrderId, OrderContext>>,
    subscriptions: Mutex<Vec<SubscriptionId>>,
}

impl PositionEngine {
    /// Create the engine and register its subscriptions on `bus`.
    pub fn attach(bus: &Arc<EventBus>, limits: RiskLimits) -> Arc<Self> {
        let engine = Arc::new(Self {
            bus: Arc::clone(bus),
            limits,
            positions: RwLock::new(FxHashMap::default()),
            order_cache: Mutex::new(FxHashMap::default()),
            subscriptions: Mutex::new(Vec::new()),
        });

        let on_order = {
            let engine = Arc::clone(&engine);
            bus.subscribe_to::<OrderRequest, _>(move |request| engine.on_order(request))
        };
        let on_fill = {
            let engine = Arc::clone(&engine);
            bus.subscribe_to::<ExecutionReport, _>(move |report| engine.on_fill(report))
        };
        engine.subscriptions.lock().extend([on_order, on_fill]);

        engine
    }

    /// Remove this engine's subscriptions.
    pub fn detach(&self) {
        for id in self.subscriptions.lock().drain(..) {
            self.bus.unsubscribe(id);
        }
    }

    /// Seat a position without publishing an update.
    ///
    /// Warm-up only: must be called from the composition thread before the
    /// risk loop is scheduled.
    pub fn hydrate_position(&self, position: Position) {
        self.positions
            .write()
            .insert(position.symbol.clone(), position);
    }

    /// Snapshot of one symbol's position, if any.
    ///
    /// Used by the risk engine for the pre-trade cap check on the same
    /// thread; the shared lock keeps it safe against concurrent
    /// [`snapshots`](Self::snapshots) callers.
    #[must_use]
    pub fn position(&self, symbol: &str) -> Option<Position> {
        self.positions.read().get(symbol).cloned()
    }

    /// Consistent copy of every position. Callable from any thread.
    #[must_use]
    pub fn snapshots(&self) -> Vec<Position> {
        self.positions.read().values().cloned().collect()
    }

    fn on_order(&self, request: &OrderRequest) {
        self.order_cache.lock().insert(
            request.order.id,
            OrderContext {
                symbol: request.order.symbol.clone(),
                side: request.order.side,
            },
        );
    }

    fn on_fill(&self, report: &ExecutionReport) {
        // Accepted/Rejected reports do not move positions.
        if report.status != ExecutionStatus::Filled {
            return;
        }

        let Some(context) = self.order_cache.lock().remove(&report.order_id) else {
            warn!(
                order_id = report.order_id,
                "fill for order with no cached context, dropping"
            );
            return;
        };

        let signed_qty = match context.side {
            Side::Buy => report.filled_quantity,
            Side::Sell => -report.filled_quantity,
        };

        // Mutation, snapshot, and drawdown test under the exclusive lock;
        // publishing strictly after release.
        let (update, violation) = {
            let mut positions = self.positions.write();
            let position = positions
                .entry(context.symbol.clone())
                .or_insert_with(|| Position::flat(context.symbol.clone()));

            position.apply_fill(signed_qty, report.fill_price);

            let update = PositionUpdate {
                position: position.clone(),
                timestamp_ms: report.timestamp_ms,
                sequence: report.sequence,
            };

            let violation = (position.realized_pnl < self.limits.max_drawdown).then(|| {
                RiskViolation {
                    symbol: context.symbol.clone(),
                    reason: "Max Drawdown Exceeded".to_string(),
                    current_value: position.realized_pnl,
                    limit_value: self.limits.max_drawdown,
                    timestamp_ms: report.timestamp_ms,
                    sequence: report.sequence,
                }
            });

            (update, violation)
        };

        self.bus.publish(&Event::PositionUpdate(update));
        if let Some(violation) = violation {
            self.bus.publish(&Event::RiskViolation(violation));
        }
    }
}
