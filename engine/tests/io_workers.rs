//! Transport-level tests for the market-data and IPC workers.

use std::io::{BufRead, BufReader};
use std::net::{TcpStream, UdpSocket};
use std::sync::Arc;
use std::time::Duration;

use crossbeam::channel::unbounded;
use tickforge_common::{
    Event, EventPayload, Order, OrderStatus, OrderUpdate, Side, SimulationTimeProvider,
    TimeProvider,
};
use tickforge_engine::ipc::CommandHandler;
use tickforge_engine::market_data::EventSink;
use tickforge_engine::{IpcWorker, MarketDataWorker};

const RECV_DEADLINE: Duration = Duration::from_secs(2);

#[test]
fn market_data_worker_decodes_ticks_and_advances_the_clock() {
    let clock = Arc::new(SimulationTimeProvider::new());
    let (event_tx, events) = unbounded();
    let sink: EventSink = Arc::new(move |event| {
        let _ = event_tx.send(event);
    });

    let mut worker =
        MarketDataWorker::spawn("127.0.0.1:0", Arc::clone(&clock), sink).expect("spawn");
    let feed = UdpSocket::bind("127.0.0.1:0").expect("bind feeder");

    feed.send_to(
        br#"{"timestamp_ms":1700000000000,"symbol":"AAPL","price":150.25,"volume":100.0}"#,
        worker.local_addr(),
    )
    .expect("send tick");

    let event = events.recv_timeout(RECV_DEADLINE).expect("tick decoded");
    let Event::MarketData(tick) = event else {
        panic!("expected a MarketData event");
    };
    assert_eq!(tick.symbol, "AAPL");
    assert_eq!(tick.price, 150.25);
    assert_eq!(tick.quantity, 100.0);
    assert_eq!(tick.sequence, 1);
    assert_eq!(tick.timestamp_ms, 1_700_000_000_000);

    // The clock was advanced before the event was pushed.
    assert_eq!(clock.now_ms(), 1_700_000_000_000);

    // Malformed datagrams are skipped, not fatal.
    feed.send_to(b"definitely not json", worker.local_addr())
        .expect("send garbage");
    feed.send_to(
        br#"{"timestamp_ms":1700000000100,"symbol":"MSFT","price":300.0,"volume":50.0}"#,
        worker.local_addr(),
    )
    .expect("send second tick");

    let event = events.recv_timeout(RECV_DEADLINE).expect("second tick");
    let Event::MarketData(tick) = event else {
        panic!("expected a MarketData event");
    };
    assert_eq!(tick.symbol, "MSFT");
    assert_eq!(tick.sequence, 2);

    worker.stop();
}

#[test]
fn ipc_worker_answers_commands_over_udp() {
    let handler: CommandHandler = Arc::new(|command: &str| format!("echo:{command}"));
    let mut worker = IpcWorker::spawn("127.0.0.1:0", "127.0.0.1:0", handler).expect("spawn");

    let client = UdpSocket::bind("127.0.0.1:0").expect("bind client");
    client
        .set_read_timeout(Some(RECV_DEADLINE))
        .expect("timeout");

    client
        .send_to(b"PING", worker.command_addr())
        .expect("send command");

    let mut buffer = [0u8; 1024];
    let (len, _) = client.recv_from(&mut buffer).expect("response");
    assert_eq!(&buffer[..len], b"echo:PING");

    worker.stop();
}

#[test]
fn ipc_worker_fans_telemetry_out_to_tcp_subscribers() {
    let handler: CommandHandler = Arc::new(|_: &str| String::new());
    let mut worker = IpcWorker::spawn("127.0.0.1:0", "127.0.0.1:0", handler).expect("spawn");

    let stream = TcpStream::connect(worker.telemetry_addr()).expect("connect subscriber");
    stream
        .set_read_timeout(Some(RECV_DEADLINE))
        .expect("timeout");

    // Give the worker an iteration to accept the subscriber before any
    // telemetry is queued.
    std::thread::sleep(Duration::from_millis(250));

    let mut order = Order::new(3, "strat", "AAPL", Side::Buy, 1.0, 150.25);
    order.status = OrderStatus::Filled;
    order.filled_quantity = 1.0;
    worker.telemetry_queue().push(
        OrderUpdate {
            order,
            previous_status: OrderStatus::Accepted,
            timestamp_ms: 0,
            sequence: 1,
        }
        .into_event(),
    );

    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    reader.read_line(&mut line).expect("telemetry line");

    let record: serde_json::Value = serde_json::from_str(line.trim()).expect("json record");
    assert_eq!(record["type"], "order_update");
    assert_eq!(record["order_id"], 3);
    assert_eq!(record["status"], "Filled");
    assert_eq!(record["previous_status"], "Accepted");

    worker.stop();
}
