//! Operator I/O: telemetry fan-out and the command endpoint.
//!
//! Like the market-data worker, this is a plain transport thread outside
//! the actor abstraction. It owns a telemetry inbox fed by bridges on the
//! risk loop, a UDP request/reply command socket, and a TCP listener that
//! fans telemetry records out to any number of subscribers as JSON lines.

use std::io::Write;
use std::net::{SocketAddr, TcpListener, TcpStream, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use serde_json::json;
use tickforge_bus::EventQueue;
use tickforge_common::Event;
use tracing::{error, info, warn};

use crate::error::EngineError;
use crate::positions::PositionEngine;
use crate::risk::RiskEngine;

/// Handles one operator command string, returning the response string.
pub type CommandHandler = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Bounded command poll so the running flag is re-examined regularly.
const COMMAND_TIMEOUT: Duration = Duration::from_millis(50);

/// The IPC worker: drains telemetry, polls for commands, repeats.
///
/// Each loop iteration: accept any new telemetry subscribers, drain the
/// telemetry queue (non-blocking) into every subscriber, then poll the
/// command socket with a bounded timeout and answer at most one request.
/// On shutdown the telemetry queue is drained one last time.
pub struct IpcWorker {
    telemetry: Arc<EventQueue<Event>>,
    running: Arc<AtomicBool>,
    command_addr: SocketAddr,
    telemetry_addr: SocketAddr,
    worker: Option<JoinHandle<()>>,
}

impl IpcWorker {
    /// Bind both endpoints and start the worker loop.
    pub fn spawn(
        command_endpoint: &str,
        telemetry_endpoint: &str,
        handler: CommandHandler,
    ) -> Result<Self, EngineError> {
        let command_socket = UdpSocket::bind(command_endpoint)
            .map_err(|e| EngineError::io(format!("command socket {command_endpoint}"), e))?;
        command_socket
            .set_read_timeout(Some(COMMAND_TIMEOUT))
            .map_err(|e| EngineError::io("command socket timeout", e))?;
        let command_addr = command_socket
            .local_addr()
            .map_err(|e| EngineError::io("command socket address", e))?;

        let listener = TcpListener::bind(telemetry_endpoint)
            .map_err(|e| EngineError::io(format!("telemetry listener {telemetry_endpoint}"), e))?;
        listener
            .set_nonblocking(true)
            .map_err(|e| EngineError::io("telemetry listener mode", e))?;
        let telemetry_addr = listener
            .local_addr()
            .map_err(|e| EngineError::io("telemetry listener address", e))?;

        let telemetry = Arc::new(EventQueue::new());
        let running = Arc::new(AtomicBool::new(true));

        let worker = {
            let telemetry = Arc::clone(&telemetry);
            let running = Arc::clone(&running);
            std::thread::Builder::new()
                .name("ipc".to_string())
                .spawn(move || run(&command_socket, &listener, &telemetry, &handler, &running))
                .map_err(|e| EngineError::io("ipc thread", e))?
        };

        info!(command = %command_addr, telemetry = %telemetry_addr, "ipc worker listening");
        Ok(Self {
            telemetry,
            running,
            command_addr,
            telemetry_addr,
            worker: Some(worker),
        })
    }

    /// The telemetry inbox, for bridges on the risk loop to push into.
    #[must_use]
    pub fn telemetry_queue(&self) -> Arc<EventQueue<Event>> {
        Arc::clone(&self.telemetry)
    }

    /// Bound command address (useful when the endpoint requested port 0).
    #[must_use]
    pub fn command_addr(&self) -> SocketAddr {
        self.command_addr
    }

    /// Bound telemetry address.
    #[must_use]
    pub fn telemetry_addr(&self) -> SocketAddr {
        self.telemetry_addr
    }

    /// Signal the worker loop and join it. Idempotent.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("ipc worker panicked");
            }
        }
    }
}

impl Drop for IpcWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(
    command_socket: &UdpSocket,
    listener: &TcpListener,
    telemetry: &EventQueue<Event>,
    handler: &CommandHandler,
    running: &AtomicBool,
) {
    let mut subscribers: Vec<TcpStream> = Vec::new();

    while running.load(Ordering::Acquire) {
        accept_subscribers(listener, &mut subscribers);
        drain_telemetry(telemetry, &mut subscribers);
        if !poll_command(command_socket, handler) {
            break;
        }
    }

    // Final drain so telemetry produced during shutdown is not lost.
    drain_telemetry(telemetry, &mut subscribers);
}

fn accept_subscribers(listener: &TcpListener, subscribers: &mut Vec<TcpStream>) {
    loop {
        match listener.accept() {
            Ok((stream, peer)) => {
                info!(%peer, "telemetry subscriber connected");
                subscribers.push(stream);
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => break,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                warn!(error = %e, "telemetry accept failed");
                break;
            }
        }
    }
}

fn drain_telemetry(telemetry: &EventQueue<Event>, subscribers: &mut Vec<TcpStream>) {
    while let Some(event) = telemetry.try_pop() {
        let Some(record) = telemetry_record(&event) else {
            continue;
        };
        let mut line = record.to_string();
        line.push('\n');
        // Dead subscribers are pruned on write failure.
        subscribers.retain_mut(|stream| stream.write_all(line.as_bytes()).is_ok());
    }
}

/// Poll for one command and answer it. Returns `false` when the socket is
/// broken and the worker loop should end.
fn poll_command(command_socket: &UdpSocket, handler: &CommandHandler) -> bool {
    let mut buffer = [0u8; 4096];
    match command_socket.recv_from(&mut buffer) {
        Ok((len, peer)) => {
            let command = String::from_utf8_lossy(&buffer[..len]);
            let response = handler(command.trim());
            if let Err(e) = command_socket.send_to(response.as_bytes(), peer) {
                warn!(error = %e, %peer, "failed to send command response");
            }
            true
        }
        Err(e)
            if matches!(
                e.kind(),
                std::io::ErrorKind::WouldBlock
                    | std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::Interrupted
            ) =>
        {
            true
        }
        Err(e) => {
            error!(error = %e, "command receive failed, stopping ipc worker");
            false
        }
    }
}

/// Serialize a telemetry-worthy event as a self-describing JSON record.
///
/// Only `OrderUpdate`, `PositionUpdate`, and `RiskViolation` are emitted;
/// everything else returns `None`.
#[must_use]
pub fn telemetry_record(event: &Event) -> Option<serde_json::Value> {
    match event {
        Event::OrderUpdate(update) => Some(json!({
            "type": "order_update",
            "order_id": update.order.id,
            "symbol": update.order.symbol,
            "side": update.order.side.to_string(),
            "status": update.order.status.as_str(),
            "previous_status": update.previous_status.as_str(),
            "quantity": update.order.quantity,
            "price": update.order.price,
            "filled_quantity": update.order.filled_quantity,
        })),
        Event::PositionUpdate(update) => Some(json!({
            "type": "position_update",
            "symbol": update.position.symbol,
            "net_quantity": update.position.net_quantity,
            "average_price": update.position.average_price,
            "realized_pnl": update.position.realized_pnl,
        })),
        Event::RiskViolation(violation) => Some(json!({
            "type": "risk_violation",
            "symbol": violation.symbol,
            "reason": violation.reason,
            "current_value": violation.current_value,
            "limit_value": violation.limit_value,
        })),
        _ => None,
    }
}

/// Execute one operator command against the engine's thread-safe surfaces.
///
/// Commands:
/// - `PING`: liveness probe.
/// - `STATUS`: halt flag plus a consistent snapshot of all positions.
/// - `HALT`: latch the kill switch.
/// - anything else: an error response naming the command.
#[must_use]
pub fn execute_command(command: &str, risk: &RiskEngine, positions: &PositionEngine) -> String {
    match command {
        "PING" => json!({"status": "ok", "response": "PONG"}).to_string(),
        "STATUS" => {
            let snapshots: Vec<serde_json::Value> = positions
                .snapshots()
                .into_iter()
                .map(|position| {
                    json!({
                        "symbol": position.symbol,
                        "net_quantity": position.net_quantity,
                        "average_price": position.average_price,
                        "realized_pnl": position.realized_pnl,
                    })
                })
                .collect();
            json!({
                "status": "ok",
                "halted": risk.is_halted(),
                "positions": snapshots,
            })
            .to_string()
        }
        "HALT" => {
            risk.halt_trading();
            json!({"status": "ok", "response": "Trading halted"}).to_string()
        }
        unknown => {
            warn!(command = %unknown, "unknown ipc command");
            json!({
                "status": "error",
                "response": format!("Unknown command: {unknown}"),
            })
            .to_string()
        }
    }
}
