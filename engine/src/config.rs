//! Engine configuration.

use serde::{Deserialize, Serialize};
use tickforge_common::RiskLimits;

use crate::error::EngineError;

/// Top-level engine configuration.
///
/// An empty endpoint string disables the corresponding I/O worker; tests
/// use that to drive the core purely through
/// [`crate::TradingEngine::push_market_data`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// UDP endpoint the market-data worker binds for inbound ticks.
    pub market_data_endpoint: String,
    /// UDP endpoint the IPC worker binds for operator commands.
    pub command_endpoint: String,
    /// TCP endpoint the IPC worker binds for telemetry subscribers.
    pub telemetry_endpoint: String,
    /// Engine-wide risk thresholds.
    pub limits: RiskLimits,
    /// Price threshold above which the trivial strategy emits a signal.
    pub signal_threshold: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            market_data_endpoint: "127.0.0.1:5555".to_string(),
            command_endpoint: "127.0.0.1:5556".to_string(),
            telemetry_endpoint: "127.0.0.1:5557".to_string(),
            limits: RiskLimits::default(),
            signal_threshold: 0.0,
        }
    }
}

impl EngineConfig {
    /// A configuration with all I/O workers disabled, for in-process use.
    #[must_use]
    pub fn without_io() -> Self {
        Self {
            market_data_endpoint: String::new(),
            command_endpoint: String::new(),
            telemetry_endpoint: String::new(),
            ..Self::default()
        }
    }

    /// Load configuration from a JSON file.
    pub fn from_file(path: &str) -> Result<Self, EngineError> {
        let raw = std::fs::read_to_string(path).map_err(|source| EngineError::ConfigRead {
            path: path.to_string(),
            source,
        })?;
        Ok(serde_json::from_str(&raw)?)
    }
}
