//! The composition root: owns every actor, worker, and component, and
//! enforces the startup/shutdown ordering the pipeline depends on.

use std::sync::Arc;

use serde_json::json;
use tickforge_bus::{EventBus, EventLoop, SubscriptionId};
use tickforge_common::{Event, MarketData, OrderIdGenerator, SimulationTimeProvider};
use tracing::info;

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::execution::ExecutionSimulator;
use crate::ipc::{self, IpcWorker};
use crate::market_data::MarketDataWorker;
use crate::positions::PositionEngine;
use crate::reconciler::Reconciler;
use crate::risk::RiskEngine;
use crate::strategy::ThresholdStrategy;
use crate::tracker::OrderTracker;

/// Central orchestrator for the whole runtime.
///
/// Owns the three event loops, the I/O workers, the ID generator, the
/// clock, and every logic component. `start` brings the pipeline up in an
/// order that guarantees no event can arrive before its subscribers are
/// live; `stop` tears it down in reverse, detaching components before any
/// loop is joined so handlers never fire on half-dead state. Both are
/// idempotent.
///
/// Cross-loop wiring established at startup:
///
/// 1. `strategy` bus `Signal` → pushed into the `risk` loop.
/// 2. `risk` bus `Order` → pushed into the `order-routing` loop.
/// 3. `order-routing` bus `ExecutionReport` → pushed into the `risk` loop.
/// 4. market-data worker → decoded ticks pushed into the `strategy` loop.
/// 5. `risk` bus `OrderUpdate`/`PositionUpdate`/`RiskViolation` → the IPC
///    worker's telemetry queue.
pub struct TradingEngine {
    config: EngineConfig,
    clock: Arc<SimulationTimeProvider>,
    order_ids: Arc<OrderIdGenerator>,

    strategy_loop: Arc<EventLoop>,
    risk_loop: Arc<EventLoop>,
    order_routing_loop: Arc<EventLoop>,

    strategy: Option<Arc<ThresholdStrategy>>,
    order_tracker: Option<Arc<OrderTracker>>,
    position_engine: Option<Arc<PositionEngine>>,
    risk_engine: Option<Arc<RiskEngine>>,
    execution: Option<Arc<ExecutionSimulator>>,

    market_data: Option<MarketDataWorker>,
    ipc: Option<IpcWorker>,

    bridges: Vec<(Arc<EventBus>, SubscriptionId)>,
    running: bool,
}

impl TradingEngine {
    /// Build a stopped engine. No threads spawn and no sockets open here.
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            clock: Arc::new(SimulationTimeProvider::new()),
            order_ids: Arc::new(OrderIdGenerator::new()),
            strategy_loop: Arc::new(EventLoop::new("strategy")),
            risk_loop: Arc::new(EventLoop::new("risk")),
            order_routing_loop: Arc::new(EventLoop::new("order-routing")),
            strategy: None,
            order_tracker: None,
            position_engine: None,
            risk_engine: None,
            execution: None,
            market_data: None,
            ipc: None,
            bridges: Vec::new(),
            running: false,
        }
    }

    /// Bring the engine to a running state.
    ///
    /// If a reconciler is supplied, the warm-up gate runs first: positions
    /// and open orders are hydrated synchronously on this thread before
    /// any worker is scheduled. Market data starts last so no tick can
    /// enter the pipeline before every subscriber is live.
    ///
    /// Idempotent: starting a running engine does nothing.
    pub fn start(&mut self, reconciler: Option<&mut dyn Reconciler>) -> Result<(), EngineError> {
        if self.running {
            return Ok(());
        }

        match self.start_inner(reconciler) {
            Ok(()) => {
                self.running = true;
                info!("trading engine started");
                Ok(())
            }
            Err(e) => {
                // Unwind whatever was brought up before the failure.
                self.teardown();
                Err(e)
            }
        }
    }

    fn start_inner(&mut self, reconciler: Option<&mut dyn Reconciler>) -> Result<(), EngineError> {
        let limits = self.config.limits;

        // 1. Stateful components subscribe on the risk bus while the loop
        //    is not yet scheduled. The tracker registers first: its `New`
        //    insertion must be observable to every later Order subscriber.
        //    Each component is stored as soon as it attaches, so a failure
        //    later in startup still detaches it during teardown.
        let order_tracker = OrderTracker::attach(self.risk_loop.bus());
        self.order_tracker = Some(Arc::clone(&order_tracker));
        let position_engine = PositionEngine::attach(self.risk_loop.bus(), limits);
        self.position_engine = Some(Arc::clone(&position_engine));

        // 2. Warm-up gate: single-threaded hydration before any actor runs.
        if let Some(reconciler) = reconciler {
            let positions = reconciler.reconcile_positions();
            let orders = reconciler.reconcile_orders();
            info!(
                positions = positions.len(),
                open_orders = orders.len(),
                "reconciled pre-existing state"
            );
            for position in positions {
                position_engine.hydrate_position(position);
            }
            for order in orders {
                order_tracker.hydrate_order(order);
            }
        }

        // 3. Core event loops come up.
        self.strategy_loop.start();
        self.risk_loop.start();

        // 4. Cross-loop bridges.
        {
            let risk_loop = Arc::clone(&self.risk_loop);
            let id = self.strategy_loop.bus().subscribe(move |event| {
                if matches!(event, Event::Signal(_)) {
                    risk_loop.push(event.clone());
                }
            });
            self.bridges.push((Arc::clone(self.strategy_loop.bus()), id));
        }
        {
            let routing_loop = Arc::clone(&self.order_routing_loop);
            let id = self.risk_loop.bus().subscribe(move |event| {
                if matches!(event, Event::Order(_)) {
                    routing_loop.push(event.clone());
                }
            });
            self.bridges.push((Arc::clone(self.risk_loop.bus()), id));
        }
        {
            let risk_loop = Arc::clone(&self.risk_loop);
            let id = self.order_routing_loop.bus().subscribe(move |event| {
                if matches!(event, Event::ExecutionReport(_)) {
                    risk_loop.push(event.clone());
                }
            });
            self.bridges
                .push((Arc::clone(self.order_routing_loop.bus()), id));
        }

        // 5. The routing loop and its execution simulator.
        self.order_routing_loop.start();
        let execution = ExecutionSimulator::attach(
            self.order_routing_loop.bus(),
            Arc::clone(&self.clock) as Arc<dyn tickforge_common::TimeProvider>,
        );
        self.execution = Some(execution);

        // 6. Logic components that produce events.
        let strategy =
            ThresholdStrategy::attach(self.strategy_loop.bus(), self.config.signal_threshold);
        self.strategy = Some(strategy);
        let risk_engine = RiskEngine::attach(
            self.risk_loop.bus(),
            Arc::clone(&self.order_ids),
            Arc::clone(&position_engine),
            limits,
        );
        self.risk_engine = Some(Arc::clone(&risk_engine));

        // 7. IPC worker plus the telemetry bridge feeding it.
        if !self.config.command_endpoint.is_empty() && !self.config.telemetry_endpoint.is_empty() {
            let handler: ipc::CommandHandler = {
                let risk_engine = Arc::clone(&risk_engine);
                let position_engine = Arc::clone(&position_engine);
                Arc::new(move |command: &str| {
                    ipc::execute_command(command, &risk_engine, &position_engine)
                })
            };
            let worker = IpcWorker::spawn(
                &self.config.command_endpoint,
                &self.config.telemetry_endpoint,
                handler,
            )?;

            let telemetry = worker.telemetry_queue();
            let id = self.risk_loop.bus().subscribe(move |event| {
                if matches!(
                    event,
                    Event::OrderUpdate(_) | Event::PositionUpdate(_) | Event::RiskViolation(_)
                ) {
                    telemetry.push(event.clone());
                }
            });
            self.bridges.push((Arc::clone(self.risk_loop.bus()), id));
            self.ipc = Some(worker);
        }

        // 8. Market data last: no tick may arrive before subscribers exist.
        if !self.config.market_data_endpoint.is_empty() {
            let sink: crate::market_data::EventSink = {
                let strategy_loop = Arc::clone(&self.strategy_loop);
                Arc::new(move |event| strategy_loop.push(event))
            };
            self.market_data = Some(MarketDataWorker::spawn(
                &self.config.market_data_endpoint,
                Arc::clone(&self.clock),
                sink,
            )?);
        }

        Ok(())
    }

    /// Shut everything down. Idempotent.
    pub fn stop(&mut self) {
        if !self.running {
            return;
        }
        self.teardown();
        self.running = false;
        info!("trading engine stopped");
    }

    fn teardown(&mut self) {
        // 1. No new ticks.
        if let Some(mut market_data) = self.market_data.take() {
            market_data.stop();
        }

        // 2. IPC joins before the components it reads are detached.
        if let Some(mut ipc) = self.ipc.take() {
            ipc.stop();
        }

        // 3. Bridges and logic components come off their buses so no
        //    handler fires during or after loop shutdown.
        for (bus, id) in self.bridges.drain(..) {
            bus.unsubscribe(id);
        }
        if let Some(risk_engine) = self.risk_engine.take() {
            risk_engine.detach();
        }
        if let Some(position_engine) = self.position_engine.take() {
            position_engine.detach();
        }
        if let Some(order_tracker) = self.order_tracker.take() {
            order_tracker.detach();
        }
        if let Some(strategy) = self.strategy.take() {
            strategy.detach();
        }

        // 4. Routing loop and its simulator.
        if let Some(execution) = self.execution.take() {
            execution.detach();
        }
        self.order_routing_loop.stop();

        // 5. Core loops last. Remaining in-flight events are discarded.
        self.strategy_loop.stop();
        self.risk_loop.stop();
    }

    /// Enqueue a tick into the strategy loop, as the market-data worker
    /// would. Test harness entry point; safe from any thread.
    pub fn push_market_data(&self, tick: MarketData) {
        self.strategy_loop.push(Event::MarketData(tick));
    }

    /// Enqueue an arbitrary event into the strategy loop. This is the
    /// sink the market-data worker is bound to; safe from any thread.
    pub fn push_event(&self, event: Event) {
        self.strategy_loop.push(event);
    }

    /// Execute one operator command (PING / STATUS / HALT / …) against the
    /// running engine. Safe from any thread.
    #[must_use]
    pub fn execute_command(&self, command: &str) -> String {
        match (self.risk_engine.as_ref(), self.position_engine.as_ref()) {
            (Some(risk_engine), Some(position_engine)) => {
                ipc::execute_command(command, risk_engine, position_engine)
            }
            _ => json!({"status": "error", "response": "Engine not running"}).to_string(),
        }
    }

    /// The strategy loop's bus, for external subscribers (e.g. loggers).
    #[must_use]
    pub fn strategy_bus(&self) -> &Arc<EventBus> {
        self.strategy_loop.bus()
    }

    /// The risk loop's bus, for external subscribers.
    #[must_use]
    pub fn risk_bus(&self) -> &Arc<EventBus> {
        self.risk_loop.bus()
    }

    /// The simulation clock driven by the market-data worker.
    #[must_use]
    pub fn clock(&self) -> Arc<SimulationTimeProvider> {
        Arc::clone(&self.clock)
    }

    /// Whether the engine is between `start` and `stop`.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running
    }
}

impl Drop for TradingEngine {
    fn drop(&mut self) {
        self.stop();
    }
}
