//! Time sources: a trait so components can be driven by either the wall
//! clock or a replay-controlled simulation clock.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// A source of "now" in epoch milliseconds.
pub trait TimeProvider: Send + Sync {
    /// Current time in epoch milliseconds.
    fn now_ms(&self) -> i64;
}

/// Clock driven by the data replay layer rather than the OS.
///
/// The market-data worker calls [`advance`](Self::advance) with each tick's
/// timestamp before publishing the tick, so every component that asks for
/// the time during processing sees the simulated "now". Single writer
/// (the market-data worker), any number of readers. Monotonicity is the
/// caller's responsibility; it is not enforced here to keep the hot path
/// branchless.
#[derive(Debug, Default)]
pub struct SimulationTimeProvider {
    current_ms: AtomicI64,
}

impl SimulationTimeProvider {
    /// A clock at 0 ms (no data replayed yet).
    #[must_use]
    pub const fn new() -> Self {
        Self {
            current_ms: AtomicI64::new(0),
        }
    }

    /// Set the simulated clock. Intended for the market-data worker only.
    pub fn advance(&self, now_ms: i64) {
        self.current_ms.store(now_ms, Ordering::SeqCst);
    }
}

impl TimeProvider for SimulationTimeProvider {
    fn now_ms(&self) -> i64 {
        self.current_ms.load(Ordering::SeqCst)
    }
}

/// Wall-clock time provider for live runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct LiveTimeProvider;

impl TimeProvider for LiveTimeProvider {
    fn now_ms(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
    }
}
