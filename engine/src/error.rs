//! Engine error types.

use thiserror::Error;

/// Failures surfaced by the engine's fallible operations.
///
/// Recoverable conditions (illegal transitions, fills for unknown orders,
/// malformed ticks, unknown commands) are never errors: they are logged
/// and dropped, and the engine keeps running. Only I/O and configuration
/// problems reach this type.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A socket could not be bound or configured.
    #[error("I/O failure on {context}: {source}")]
    Io {
        /// What was being set up (e.g. "market data socket 127.0.0.1:5555").
        context: String,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file could not be read.
    #[error("failed to read config file {path}: {source}")]
    ConfigRead {
        /// Path passed on the command line.
        path: String,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid JSON for [`crate::EngineConfig`].
    #[error("failed to parse config: {0}")]
    ConfigParse(#[from] serde_json::Error),
}

impl EngineError {
    /// Wrap an I/O error with the context of what was being set up.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}
