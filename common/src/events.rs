//! The event model: one sum type carried by every queue and bus.
//!
//! Each payload carries an epoch-millisecond timestamp and a monotonic
//! sequence number assigned at the edge of the system (the market-data
//! worker or a test harness) and propagated through the pipeline for
//! ordering and audit.

use serde::{Deserialize, Serialize};

use crate::types::{Order, OrderId, OrderStatus, Position, Side};

/// A single market data update (tick).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketData {
    /// Instrument identifier.
    pub symbol: String,
    /// Last or mid price for this tick.
    pub price: f64,
    /// Volume or size associated with the update.
    pub quantity: f64,
    /// Epoch milliseconds when this tick was observed.
    pub timestamp_ms: i64,
    /// Monotonic sequence number for total ordering.
    pub sequence: u64,
}

/// A trading signal produced by a strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    /// Strategy that produced the signal.
    pub strategy_id: String,
    /// Instrument to trade.
    pub symbol: String,
    /// Direction of the intent.
    pub side: Side,
    /// Strength or size hint, strategy-defined.
    pub strength: f64,
    /// Market price that triggered this signal. Propagates through the
    /// order to the fill so position math sees the correct entry price.
    pub price: f64,
    /// Epoch milliseconds.
    pub timestamp_ms: i64,
    /// Sequence propagated from the triggering tick.
    pub sequence: u64,
}

/// A freshly minted order entering the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    /// Snapshot of the order, in the `New` state.
    pub order: Order,
    /// Epoch milliseconds.
    pub timestamp_ms: i64,
    /// Sequence propagated from the triggering signal.
    pub sequence: u64,
}

/// Wire-level outcome reported by the execution layer.
///
/// Distinct from [`OrderStatus`]: execution only reports what it observed;
/// the order tracker maps these onto lifecycle transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionStatus {
    /// Execution acknowledged the order and will attempt to fill it.
    Accepted,
    /// The order was filled at the reported price and quantity.
    Filled,
    /// The order was rejected by the execution layer.
    Rejected,
}

impl ExecutionStatus {
    /// The lifecycle status this wire status maps onto.
    #[must_use]
    pub const fn as_order_status(self) -> OrderStatus {
        match self {
            Self::Accepted => OrderStatus::Accepted,
            Self::Filled => OrderStatus::Filled,
            Self::Rejected => OrderStatus::Rejected,
        }
    }
}

/// What happened to a specific order at the execution layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionReport {
    /// Which order this report concerns.
    pub order_id: OrderId,
    /// Filled quantity; 0 for `Accepted` and `Rejected`.
    pub filled_quantity: f64,
    /// Fill price; 0 for `Accepted` and `Rejected`.
    pub fill_price: f64,
    /// Reported outcome.
    pub status: ExecutionStatus,
    /// Epoch milliseconds.
    pub timestamp_ms: i64,
    /// Sequence propagated from the originating order.
    pub sequence: u64,
}

/// Published by the order tracker whenever an order's state changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderUpdate {
    /// Snapshot of the order after the transition.
    pub order: Order,
    /// State the order was in before this transition.
    pub previous_status: OrderStatus,
    /// Epoch milliseconds.
    pub timestamp_ms: i64,
    /// Sequence propagated from the triggering event.
    pub sequence: u64,
}

/// Published by the position engine after a fill is applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionUpdate {
    /// Snapshot of the position after the fill.
    pub position: Position,
    /// Epoch milliseconds.
    pub timestamp_ms: i64,
    /// Sequence propagated from the fill report.
    pub sequence: u64,
}

/// Published when a post-trade limit is breached; latches the kill switch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskViolation {
    /// Symbol whose position breached the limit.
    pub symbol: String,
    /// Human-readable reason, e.g. `"Max Drawdown Exceeded"`.
    pub reason: String,
    /// The observed value that breached the limit.
    pub current_value: f64,
    /// The configured limit.
    pub limit_value: f64,
    /// Epoch milliseconds.
    pub timestamp_ms: i64,
    /// Sequence propagated from the triggering event.
    pub sequence: u64,
}

/// The envelope carried by every inbox and bus in the engine.
///
/// A tagged union rather than trait objects: the set of event kinds is
/// closed, dispatch is an exhaustive `match`, and payloads stay plain
/// values that cross threads by copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    /// Market tick entering the strategy loop.
    MarketData(MarketData),
    /// Strategy intent entering the risk loop.
    Signal(Signal),
    /// New order flowing toward execution.
    Order(OrderRequest),
    /// Execution outcome flowing back to the risk loop.
    ExecutionReport(ExecutionReport),
    /// Order lifecycle change, for telemetry and monitoring.
    OrderUpdate(OrderUpdate),
    /// Position change, for telemetry and monitoring.
    PositionUpdate(PositionUpdate),
    /// Post-trade limit breach.
    RiskViolation(RiskViolation),
}

impl Event {
    /// Stable snake_case tag for this event kind, used in logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::MarketData(_) => "market_data",
            Self::Signal(_) => "signal",
            Self::Order(_) => "order",
            Self::ExecutionReport(_) => "execution_report",
            Self::OrderUpdate(_) => "order_update",
            Self::PositionUpdate(_) => "position_update",
            Self::RiskViolation(_) => "risk_violation",
        }
    }
}

/// Payload types that can be extracted from (and wrapped into) an [`Event`].
///
/// Typed bus subscriptions are lowered onto this trait: a generic
/// subscription tests the variant tag and forwards the payload when it
/// matches, silently ignoring everything else.
pub trait EventPayload: Sized {
    /// Borrow the payload if `event` carries this type.
    fn from_event(event: &Event) -> Option<&Self>;
    /// Wrap this payload into the event envelope.
    fn into_event(self) -> Event;
}

macro_rules! impl_event_payload {
    ($payload:ty => $variant:ident) => {
        impl EventPayload for $payload {
            fn from_event(event: &Event) -> Option<&Self> {
                match event {
                    Event::$variant(payload) => Some(payload),
                    _ => None,
                }
            }

            fn into_event(self) -> Event {
                Event::$variant(self)
            }
        }
    };
}

impl_event_payload!(MarketData => MarketData);
impl_event_payload!(Signal => Signal);
impl_event_payload!(OrderRequest => Order);
impl_event_payload!(ExecutionReport => ExecutionReport);
impl_event_payload!(OrderUpdate => OrderUpdate);
impl_event_payload!(PositionUpdate => PositionUpdate);
impl_event_payload!(RiskViolation => RiskViolation);

#[cfg(test)]
mod tests {
    use super::*;

    fn tick() -> MarketData {
        MarketData {
            symbol: "AAPL".to_string(),
            price: 150.25,
            quantity: 100.0,
            timestamp_ms: 1_700_000_000_000,
            sequence: 7,
        }
    }

    #[test]
    fn payload_round_trips_through_envelope() {
        let event = tick().into_event();
        assert_eq!(event.kind(), "market_data");

        let extracted = MarketData::from_event(&event).expect("payload present");
        assert_eq!(extracted.symbol, "AAPL");
        assert_eq!(extracted.sequence, 7);

        assert!(Signal::from_event(&event).is_none());
    }

    #[test]
    fn execution_status_maps_to_lifecycle_status() {
        assert_eq!(
            ExecutionStatus::Accepted.as_order_status(),
            OrderStatus::Accepted
        );
        assert_eq!(
            ExecutionStatus::Filled.as_order_status(),
            OrderStatus::Filled
        );
        assert_eq!(
            ExecutionStatus::Rejected.as_order_status(),
            OrderStatus::Rejected
        );
    }

    #[test]
    fn events_serialize_with_variant_tags() {
        let json = serde_json::to_string(&tick().into_event()).expect("serializable");
        assert!(json.contains("MarketData"));
        assert!(json.contains("AAPL"));
    }
}
