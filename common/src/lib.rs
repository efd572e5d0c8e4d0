//! Core domain types for the TickForge trading engine.
//!
//! Everything in this crate has value semantics: orders, positions, and
//! events are plain data that can be copied freely between threads. The
//! authoritative copy of each entity lives in exactly one component on one
//! actor thread; everything else sees snapshots carried by events.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod events;
pub mod ids;
pub mod time;
pub mod types;

pub use events::{
    Event, EventPayload, ExecutionReport, ExecutionStatus, MarketData, OrderRequest, OrderUpdate,
    PositionUpdate, RiskViolation, Signal,
};
pub use ids::OrderIdGenerator;
pub use time::{LiveTimeProvider, SimulationTimeProvider, TimeProvider};
pub use types::{Order, OrderId, OrderStatus, Position, RiskLimits, Side};
