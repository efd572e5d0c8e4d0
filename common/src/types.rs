//! Order, position, and risk-limit domain types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for an order. `0` is reserved as "unset".
pub type OrderId = u64;

/// Trading side of an order or signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    /// Buy (long) side.
    Buy,
    /// Sell (short) side.
    Sell,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => write!(f, "Buy"),
            Self::Sell => write!(f, "Sell"),
        }
    }
}

/// Lifecycle state of an order.
///
/// Transitions follow a strict state machine enforced by the order tracker:
///
/// ```text
///   New ──> PendingNew ──> Accepted ──> PartiallyFilled ──> Filled
///    │          │             │              │    ▲            ▲
///    │          ▼             ▼              ▼    └────────────┘
///    ├──> Accepted        Canceled       Canceled
///    └──> Rejected        Rejected
/// ```
///
/// `Filled`, `Canceled`, `Rejected`, and `Expired` are terminal: once an
/// order reaches one of them, no further transitions are permitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    /// Created by the risk engine, not yet sent toward execution.
    New,
    /// Submitted to execution, awaiting acknowledgment.
    PendingNew,
    /// Acknowledged by the execution layer.
    Accepted,
    /// Some quantity filled, remainder still open.
    PartiallyFilled,
    /// Fully filled. Terminal.
    Filled,
    /// Canceled by request. Terminal.
    Canceled,
    /// Rejected by execution or risk. Terminal.
    Rejected,
    /// Expired by time-in-force. Terminal.
    Expired,
}

impl OrderStatus {
    /// Whether this status is terminal (no outgoing transitions).
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Filled | Self::Canceled | Self::Rejected | Self::Expired
        )
    }

    /// Whether the transition `self -> next` is legal.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        match self {
            Self::New => matches!(next, Self::PendingNew | Self::Accepted | Self::Rejected),
            Self::PendingNew => matches!(next, Self::Accepted | Self::Rejected),
            Self::Accepted => matches!(
                next,
                Self::PartiallyFilled | Self::Filled | Self::Canceled | Self::Rejected
            ),
            Self::PartiallyFilled => {
                matches!(next, Self::PartiallyFilled | Self::Filled | Self::Canceled)
            }
            Self::Filled | Self::Canceled | Self::Rejected | Self::Expired => false,
        }
    }

    /// Variant name, as used in telemetry records.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::New => "New",
            Self::PendingNew => "PendingNew",
            Self::Accepted => "Accepted",
            Self::PartiallyFilled => "PartiallyFilled",
            Self::Filled => "Filled",
            Self::Canceled => "Canceled",
            Self::Rejected => "Rejected",
            Self::Expired => "Expired",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A trading order: original intent plus current lifecycle state.
///
/// The authoritative copy lives inside the order tracker and is mutated
/// only on the risk loop thread. Copies distributed through events are
/// snapshots; recipients must not treat them as live state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    /// Unique identifier, minted by [`crate::OrderIdGenerator`]. Always > 0.
    pub id: OrderId,
    /// Strategy that generated this order.
    pub strategy_id: String,
    /// Instrument to trade (e.g. `"AAPL"`).
    pub symbol: String,
    /// Buy or Sell.
    pub side: Side,
    /// Order size. Always > 0.
    pub quantity: f64,
    /// Limit price, or the market price that triggered the signal.
    pub price: f64,
    /// Current lifecycle state.
    pub status: OrderStatus,
    /// Cumulative filled quantity. 0 <= filled_quantity <= quantity.
    pub filled_quantity: f64,
}

impl Order {
    /// Build a fresh order in the `New` state with nothing filled.
    #[must_use]
    pub fn new(
        id: OrderId,
        strategy_id: impl Into<String>,
        symbol: impl Into<String>,
        side: Side,
        quantity: f64,
        price: f64,
    ) -> Self {
        Self {
            id,
            strategy_id: strategy_id.into(),
            symbol: symbol.into(),
            side,
            quantity,
            price,
            status: OrderStatus::New,
            filled_quantity: 0.0,
        }
    }
}

/// Per-symbol position state: net quantity, weighted-average entry price,
/// and cumulative realized P&L.
///
/// Sign convention for `net_quantity`: positive = long, negative = short,
/// zero = flat. `average_price` is the weighted average entry cost of the
/// open position; it changes only when the position grows in its own
/// direction, opens from flat, or re-opens after a reversal. Pure shrinks
/// leave it untouched, even when the position goes flat.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Instrument identifier.
    pub symbol: String,
    /// Signed net quantity: +long, -short, 0 flat.
    pub net_quantity: f64,
    /// Weighted average entry price of the current position.
    pub average_price: f64,
    /// Cumulative realized profit/loss from closed portions.
    pub realized_pnl: f64,
}

impl Position {
    /// A flat position for `symbol`.
    #[must_use]
    pub fn flat(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            ..Self::default()
        }
    }

    /// Apply a signed fill (`+qty` buy, `-qty` sell) at `fill_price`.
    ///
    /// Three regimes:
    /// 1. Flat or same-direction fill: grow the position, re-weight
    ///    `average_price`.
    /// 2. Opposite-direction fill not exceeding the open quantity: realize
    ///    P&L on the closed portion, keep `average_price`.
    /// 3. Opposite-direction fill crossing zero: realize P&L on the whole
    ///    open position, then open the remainder at `fill_price`.
    pub fn apply_fill(&mut self, signed_qty: f64, fill_price: f64) {
        let current = self.net_quantity;

        // Flat: first fill for this symbol opens the position.
        if current == 0.0 {
            self.net_quantity = signed_qty;
            self.average_price = fill_price;
            return;
        }

        let same_direction = (current > 0.0) == (signed_qty > 0.0);
        if same_direction {
            // Grow: weighted average over the combined quantity. Both terms
            // share a sign, so the denominator is never zero.
            let total = current + signed_qty;
            self.average_price =
                (current * self.average_price + signed_qty * fill_price) / total;
            self.net_quantity = total;
            return;
        }

        let abs_current = current.abs();
        let abs_fill = signed_qty.abs();
        // +1 for a long position, -1 for a short. Collapses the long/short
        // P&L formulas into one: closed * (fill - avg) * direction.
        let direction = if current > 0.0 { 1.0 } else { -1.0 };

        if abs_fill <= abs_current {
            // Shrink: realize P&L on the closed portion; average unchanged
            // even if the position ends flat.
            self.realized_pnl += abs_fill * (fill_price - self.average_price) * direction;
            self.net_quantity = current + signed_qty;
            return;
        }

        // Reversal: close the whole position, then open the remainder in
        // the fill's direction at the fill price.
        self.realized_pnl += abs_current * (fill_price - self.average_price) * direction;
        let open = abs_fill - abs_current;
        self.net_quantity = if signed_qty > 0.0 { open } else { -open };
        self.average_price = fill_price;
    }
}

/// Engine-wide hard risk thresholds.
///
/// Applied by the risk engine (pre-trade position cap) and the position
/// engine (post-trade drawdown kill switch). Copied by value into
/// components at startup; immutable for the lifetime of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskLimits {
    /// Maximum absolute net position per symbol, in units. A signal whose
    /// order would push `|net_quantity|` above this value is dropped.
    pub max_position_per_symbol: f64,
    /// Realized P&L floor (a negative number). When any symbol's
    /// `realized_pnl` drops below this value, the kill switch latches.
    pub max_drawdown: f64,
}

impl Default for RiskLimits {
    fn default() -> Self {
        Self {
            max_position_per_symbol: 1000.0,
            max_drawdown: -500.0,
        }
    }
}
