//! Inbound market data worker.
//!
//! A plain transport thread, not an actor: it owns no inbox and no bus. It
//! decodes JSON tick datagrams, advances the simulation clock, and hands
//! each tick to the engine's event sink (which enqueues into the strategy
//! loop).

use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use serde::Deserialize;
use tickforge_common::{Event, MarketData, SimulationTimeProvider};
use tracing::{error, info, warn};

use crate::error::EngineError;

/// Callback the worker pushes decoded events through.
pub type EventSink = Arc<dyn Fn(Event) + Send + Sync>;

/// Bounded receive timeout so the running flag is re-examined regularly.
const RECV_TIMEOUT: Duration = Duration::from_millis(100);

/// Wire format of one inbound tick datagram.
#[derive(Debug, Deserialize)]
struct TickPayload {
    timestamp_ms: i64,
    symbol: String,
    price: f64,
    volume: f64,
}

/// UDP tick receiver driving the simulation clock and the strategy loop.
///
/// On each successful decode, the clock is advanced to the tick's
/// timestamp *before* the event is pushed, so any component reading the
/// clock while processing the tick sees the correct simulated time.
/// Malformed datagrams are logged and skipped; unexpected socket errors
/// end the worker loop.
pub struct MarketDataWorker {
    running: Arc<AtomicBool>,
    local_addr: SocketAddr,
    worker: Option<JoinHandle<()>>,
}

impl MarketDataWorker {
    /// Bind `endpoint` and start the receive loop.
    pub fn spawn(
        endpoint: &str,
        clock: Arc<SimulationTimeProvider>,
        sink: EventSink,
    ) -> Result<Self, EngineError> {
        let socket = UdpSocket::bind(endpoint)
            .map_err(|e| EngineError::io(format!("market data socket {endpoint}"), e))?;
        socket
            .set_read_timeout(Some(RECV_TIMEOUT))
            .map_err(|e| EngineError::io("market data socket timeout", e))?;
        let local_addr = socket
            .local_addr()
            .map_err(|e| EngineError::io("market data socket address", e))?;

        let running = Arc::new(AtomicBool::new(true));
        let worker = {
            let running = Arc::clone(&running);
            std::thread::Builder::new()
                .name("market-data".to_string())
                .spawn(move || run(&socket, &clock, &sink, &running))
                .map_err(|e| EngineError::io("market data thread", e))?
        };

        info!(%local_addr, "market data worker listening");
        Ok(Self {
            running,
            local_addr,
            worker: Some(worker),
        })
    }

    /// The bound address; useful when the endpoint requested port 0.
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Signal the receive loop and join it. Idempotent.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("market data worker panicked");
            }
        }
    }
}

impl Drop for MarketDataWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(
    socket: &UdpSocket,
    clock: &Arc<SimulationTimeProvider>,
    sink: &EventSink,
    running: &AtomicBool,
) {
    let mut buffer = [0u8; 8192];
    let mut sequence: u64 = 0;

    while running.load(Ordering::Acquire) {
        let len = match socket.recv_from(&mut buffer) {
            Ok((len, _peer)) => len,
            Err(e)
                if matches!(
                    e.kind(),
                    std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
                ) =>
            {
                // Receive timeout: loop back and re-check the running flag.
                continue;
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                error!(error = %e, "market data receive failed, stopping worker");
                break;
            }
        };

        let tick: TickPayload = match serde_json::from_slice(&buffer[..len]) {
            Ok(tick) => tick,
            Err(e) => {
                warn!(
                    error = %e,
                    payload = %String::from_utf8_lossy(&buffer[..len]),
                    "malformed tick, skipping"
                );
                continue;
            }
        };

        // Advance the clock before publishing, so components processing
        // this tick read the tick's own time as "now".
        clock.advance(tick.timestamp_ms);

        sequence += 1;
        sink(Event::MarketData(MarketData {
            symbol: tick.symbol,
            price: tick.price,
            quantity: tick.volume,
            timestamp_ms: tick.timestamp_ms,
            sequence,
        }));
    }
}
