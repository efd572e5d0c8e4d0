//! Warm-up reconciliation: seeding state that predates this process.

use tickforge_common::{Order, Position};

/// One-shot source of pre-existing positions and open orders.
///
/// Both methods are called exactly once, synchronously, on the composition
/// thread before any actor is scheduled, so implementations need not be
/// thread-safe and may block on I/O. The returned values are hydrated into
/// the position engine and the order tracker so the P&L math and lifecycle
/// tracking start from the broker's truth rather than assuming a cold
/// start.
pub trait Reconciler {
    /// Current positions held at the authoritative source.
    fn reconcile_positions(&mut self) -> Vec<Position>;

    /// Orders the authoritative source still considers open.
    fn reconcile_orders(&mut self) -> Vec<Order>;
}

/// Canned reconciler handing back a fixed set of positions and orders.
///
/// Used by tests and simulation runs to exercise the warm-up gate without
/// an exchange connection.
#[derive(Debug, Default)]
pub struct StaticReconciler {
    positions: Vec<Position>,
    orders: Vec<Order>,
}

impl StaticReconciler {
    /// An empty reconciler (no prior state).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a position to hand back during warm-up.
    #[must_use]
    pub fn with_position(mut self, position: Position) -> Self {
        self.positions.push(position);
        self
    }

    /// Add an open order to hand back during warm-up.
    #[must_use]
    pub fn with_order(mut self, order: Order) -> Self {
        self.orders.push(order);
        self
    }
}

impl Reconciler for StaticReconciler {
    fn reconcile_positions(&mut self) -> Vec<Position> {
        self.positions.clone()
    }

    fn reconcile_orders(&mut self) -> Vec<Order> {
        self.orders.clone()
    }
}
