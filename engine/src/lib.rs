//! TickForge engine: the stateful core of the trading runtime.
//!
//! Four thread-affine actors plus two I/O workers, wired together by the
//! [`TradingEngine`] composition root:
//!
//! | Actor / worker        | Hosts                                        |
//! |-----------------------|----------------------------------------------|
//! | `strategy` loop       | [`ThresholdStrategy`]                        |
//! | `risk` loop           | [`OrderTracker`], [`PositionEngine`], [`RiskEngine`] |
//! | `order-routing` loop  | [`ExecutionSimulator`]                       |
//! | market-data worker    | tick decoding, simulation clock              |
//! | IPC worker            | telemetry fan-out, operator commands         |

#![forbid(unsafe_code)]

pub mod config;
pub mod engine;
pub mod error;
pub mod execution;
pub mod ipc;
pub mod market_data;
pub mod positions;
pub mod reconciler;
pub mod risk;
pub mod strategy;
pub mod tracker;

pub use config::EngineConfig;
pub use engine::TradingEngine;
pub use error::EngineError;
pub use execution::ExecutionSimulator;
pub use ipc::IpcWorker;
pub use market_data::MarketDataWorker;
pub use positions::PositionEngine;
pub use reconciler::{Reconciler, StaticReconciler};
pub use risk::RiskEngine;
pub use strategy::ThresholdStrategy;
pub use tracker::OrderTracker;
