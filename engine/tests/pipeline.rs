//! End-to-end pipeline tests: ticks in, orders, fills, positions, and
//! telemetry-grade events out, across all three event loops.

use std::time::{Duration, Instant};

use crossbeam::channel::{unbounded, Receiver};
use tickforge_common::{
    Event, EventPayload, ExecutionReport, ExecutionStatus, MarketData, OrderStatus, OrderUpdate,
    PositionUpdate, RiskLimits, RiskViolation, Side, Signal,
};
use tickforge_engine::{EngineConfig, TradingEngine};

const RECV_DEADLINE: Duration = Duration::from_secs(2);
const QUIET_DEADLINE: Duration = Duration::from_millis(300);

struct Collectors {
    order_updates: Receiver<OrderUpdate>,
    position_updates: Receiver<PositionUpdate>,
    violations: Receiver<RiskViolation>,
}

/// Register external subscribers on the risk bus before the engine starts.
fn collect(engine: &TradingEngine) -> Collectors {
    let (order_tx, order_updates) = unbounded();
    engine.risk_bus().subscribe_to::<OrderUpdate, _>(move |update| {
        let _ = order_tx.send(update.clone());
    });

    let (position_tx, position_updates) = unbounded();
    engine
        .risk_bus()
        .subscribe_to::<PositionUpdate, _>(move |update| {
            let _ = position_tx.send(update.clone());
        });

    let (violation_tx, violations) = unbounded();
    engine
        .risk_bus()
        .subscribe_to::<RiskViolation, _>(move |violation| {
            let _ = violation_tx.send(violation.clone());
        });

    Collectors {
        order_updates,
        position_updates,
        violations,
    }
}

fn tick(symbol: &str, price: f64, sequence: u64) -> MarketData {
    MarketData {
        symbol: symbol.to_string(),
        price,
        quantity: 100.0,
        timestamp_ms: 1_700_000_000_000 + sequence as i64,
        sequence,
    }
}

fn signal(symbol: &str, side: Side, price: f64, sequence: u64) -> Event {
    Signal {
        strategy_id: "harness".to_string(),
        symbol: symbol.to_string(),
        side,
        strength: 1.0,
        price,
        timestamp_ms: 1_700_000_000_000 + sequence as i64,
        sequence,
    }
    .into_event()
}

fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {expected}, got {actual}"
    );
}

fn wait_until(deadline: Duration, condition: impl Fn() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}

#[test]
fn single_tick_full_round_trip() {
    let mut engine = TradingEngine::new(EngineConfig::without_io());
    let collectors = collect(&engine);
    engine.start(None).expect("start");

    engine.push_market_data(tick("AAPL", 150.25, 1));

    // Registration, acknowledgment, fill.
    let first = collectors.order_updates.recv_timeout(RECV_DEADLINE).unwrap();
    assert_eq!(first.previous_status, OrderStatus::New);
    assert_eq!(first.order.status, OrderStatus::New);
    assert_eq!(first.order.id, 1);
    assert_eq!(first.order.symbol, "AAPL");
    assert_eq!(first.order.side, Side::Buy);
    assert_close(first.order.quantity, 1.0);
    assert_close(first.order.price, 150.25);

    let second = collectors.order_updates.recv_timeout(RECV_DEADLINE).unwrap();
    assert_eq!(second.previous_status, OrderStatus::New);
    assert_eq!(second.order.status, OrderStatus::Accepted);

    let third = collectors.order_updates.recv_timeout(RECV_DEADLINE).unwrap();
    assert_eq!(third.previous_status, OrderStatus::Accepted);
    assert_eq!(third.order.status, OrderStatus::Filled);
    assert_close(third.order.filled_quantity, 1.0);

    // One position update: long 1 @ 150.25, nothing realized.
    let position = collectors
        .position_updates
        .recv_timeout(RECV_DEADLINE)
        .unwrap();
    assert_eq!(position.position.symbol, "AAPL");
    assert_close(position.position.net_quantity, 1.0);
    assert_close(position.position.average_price, 150.25);
    assert_close(position.position.realized_pnl, 0.0);

    // Sequence ids propagate from the tick through the whole chain.
    assert_eq!(third.sequence, 1);
    assert_eq!(position.sequence, 1);

    // No violation anywhere in the flow.
    assert!(collectors.violations.recv_timeout(QUIET_DEADLINE).is_err());

    engine.stop();
}

#[test]
fn position_cap_drops_signals_beyond_the_limit() {
    let config = EngineConfig {
        limits: RiskLimits {
            max_position_per_symbol: 2.0,
            max_drawdown: -1_000_000.0,
        },
        ..EngineConfig::without_io()
    };
    let mut engine = TradingEngine::new(config);
    let collectors = collect(&engine);
    engine.start(None).expect("start");

    // First two ticks trade; wait for each fill so the cap check sees the
    // settled position before the next signal arrives.
    for sequence in 1..=2 {
        engine.push_market_data(tick("AAPL", 150.0, sequence));
        let update = collectors
            .position_updates
            .recv_timeout(RECV_DEADLINE)
            .unwrap();
        assert_close(update.position.net_quantity, sequence as f64);
    }

    // The third signal would breach the cap: no order, no fill.
    while collectors.order_updates.try_recv().is_ok() {}
    engine.push_market_data(tick("AAPL", 150.0, 3));
    assert!(collectors.order_updates.recv_timeout(QUIET_DEADLINE).is_err());
    assert!(collectors.position_updates.try_recv().is_err());

    // STATUS still reports a healthy, capped book.
    let status: serde_json::Value =
        serde_json::from_str(&engine.execute_command("STATUS")).unwrap();
    assert_eq!(status["halted"], false);
    assert_eq!(status["positions"][0]["net_quantity"], 2.0);

    engine.stop();
}

#[test]
fn drawdown_breach_latches_the_kill_switch() {
    let config = EngineConfig {
        limits: RiskLimits {
            max_position_per_symbol: 1000.0,
            max_drawdown: -10.0,
        },
        ..EngineConfig::without_io()
    };
    let mut engine = TradingEngine::new(config);
    let collectors = collect(&engine);
    engine.start(None).expect("start");

    // Buy 1 @ 100, then sell 1 @ 80: realized -20, below the -10 floor.
    engine.push_event(signal("ES", Side::Buy, 100.0, 1));
    let opened = collectors
        .position_updates
        .recv_timeout(RECV_DEADLINE)
        .unwrap();
    assert_close(opened.position.net_quantity, 1.0);

    engine.push_event(signal("ES", Side::Sell, 80.0, 2));
    let closed = collectors
        .position_updates
        .recv_timeout(RECV_DEADLINE)
        .unwrap();
    assert_close(closed.position.realized_pnl, -20.0);

    let violation = collectors.violations.recv_timeout(RECV_DEADLINE).unwrap();
    assert_eq!(violation.symbol, "ES");
    assert_eq!(violation.reason, "Max Drawdown Exceeded");
    assert_close(violation.current_value, -20.0);
    assert_close(violation.limit_value, -10.0);

    // The latch is visible over the command surface once the risk loop has
    // processed the violation.
    assert!(wait_until(RECV_DEADLINE, || {
        let status: serde_json::Value =
            serde_json::from_str(&engine.execute_command("STATUS")).unwrap();
        status["halted"] == true
    }));

    // Any further signal is silently dropped: no order, no update.
    while collectors.order_updates.try_recv().is_ok() {}
    engine.push_event(signal("ES", Side::Buy, 100.0, 3));
    assert!(collectors.order_updates.recv_timeout(QUIET_DEADLINE).is_err());

    engine.stop();
}

#[test]
fn late_report_for_a_terminal_order_is_ignored() {
    let mut engine = TradingEngine::new(EngineConfig::without_io());
    let collectors = collect(&engine);
    engine.start(None).expect("start");

    engine.push_market_data(tick("AAPL", 150.25, 1));

    // Drain the three lifecycle updates of the round trip.
    for _ in 0..3 {
        collectors.order_updates.recv_timeout(RECV_DEADLINE).unwrap();
    }

    // Replay an Accepted report for the already-filled (and evicted)
    // order. Publishing on the risk bus runs the tracker synchronously.
    engine.risk_bus().publish(
        &ExecutionReport {
            order_id: 1,
            filled_quantity: 0.0,
            fill_price: 0.0,
            status: ExecutionStatus::Accepted,
            timestamp_ms: 0,
            sequence: 9,
        }
        .into_event(),
    );

    assert!(collectors.order_updates.recv_timeout(QUIET_DEADLINE).is_err());
    engine.stop();
}

#[test]
fn ticks_at_or_below_threshold_produce_no_orders() {
    let config = EngineConfig {
        signal_threshold: 100.0,
        ..EngineConfig::without_io()
    };
    let mut engine = TradingEngine::new(config);
    let collectors = collect(&engine);
    engine.start(None).expect("start");

    engine.push_market_data(tick("AAPL", 99.0, 1));
    engine.push_market_data(tick("AAPL", 100.0, 2));
    assert!(collectors.order_updates.recv_timeout(QUIET_DEADLINE).is_err());

    // Above the threshold the pipeline wakes up.
    engine.push_market_data(tick("AAPL", 101.0, 3));
    let update = collectors.order_updates.recv_timeout(RECV_DEADLINE).unwrap();
    assert_close(update.order.price, 101.0);

    engine.stop();
}
