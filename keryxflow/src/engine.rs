//! Engine Orchestrator: owns the run loop, the state machine,
//! and the wiring between every other component. A command channel
//! checked alongside an event-generating loop, generalized from a single
//! synchronous `VecDeque<Event>` pump into per-symbol async tick streams
//! plus the typed event bus every other crate already publishes through.

use crate::config::Settings;
use crate::llm::{analyze_bounded, LlmCollaborator};
use crate::news::{recent_or_empty, NewsAggregator};
use crate::notify::{NotificationSink, Severity};
use crate::state::EngineState;
use crate::stats::{EngineStats, EngineStatsSnapshot};
use chrono::Utc;
use futures::StreamExt;
use keryxflow_data::OhlcvBuffer;
use keryxflow_execution::{ExchangeAdapter, PaperEngine, TrailingConfig};
use keryxflow_instrument::{Side, Symbol};
use keryxflow_integration::bus::EventBus;
use keryxflow_integration::event::{
    Event, EventPayload, OrderEvent, PositionEvent, PriceEvent, RiskEvent, SystemEvent, TrailingEvent,
};
use keryxflow_memory::FeatureVector;
use keryxflow_risk::breaker::{BreakerInputs, CircuitBreaker, TripReason};
use keryxflow_risk::guardrails::{Guardrails, SymbolWhitelist};
use keryxflow_risk::manager::{RiskManager, RiskOutcome, SoftRules};
use keryxflow_store::{EpisodeId, ExitReason, SignalKind, Store, TradeEpisode, TrailingState};
use keryxflow_ta::{Analysis, AnalyzerConfig, Candle, IndicatorResult, TechnicalAnalyzer};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineCommand {
    Pause,
    Resume,
    Panic,
    Shutdown,
}

/// How long the run loop waits for outstanding tick processing to settle
/// once a shutdown is requested before force-cancelling stragglers
///.
pub const SHUTDOWN_DEADLINE: Duration = Duration::from_secs(30);

/// How many equity samples [`EquityTracker::equity_curve`] retains, oldest
/// dropped first — bounded the same way `OhlcvBuffer`'s candle ring is.
const EQUITY_CURVE_CAPACITY: usize = 1000;

struct EquityTracker {
    peak_equity: Decimal,
    daily_start_equity: Decimal,
    weekly_start_equity: Decimal,
    /// Equity sampled on every trade close, oldest first. Feeds
    /// [`keryxflow_quant::drawdown`] for the circuit breaker's drawdown trip
    /// condition.
    equity_curve: Vec<Decimal>,
}

/// Core orchestrator. Every field that changes after construction is
/// behind its own lock — there is no single global mutex. The episodic
/// and semantic stores serialize writes per entity, and the portfolio
/// snapshot is recomputed fresh on every decision rather than cached.
pub struct Engine {
    settings: Settings,
    guardrails: Guardrails,
    state: Mutex<EngineState>,
    bus: EventBus,
    store: Arc<Store>,
    paper: Arc<PaperEngine>,
    adapter: Arc<dyn ExchangeAdapter>,
    analyzers: Mutex<HashMap<Symbol, TechnicalAnalyzer>>,
    ohlcv: OhlcvBuffer,
    risk: RiskManager,
    breaker: Mutex<CircuitBreaker>,
    trailing_config: TrailingConfig,
    llm: Arc<dyn LlmCollaborator>,
    news: Arc<dyn NewsAggregator>,
    notify: Arc<dyn NotificationSink>,
    stats: EngineStats,
    equity: Mutex<EquityTracker>,
}

impl Engine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        settings: Settings,
        guardrails: Guardrails,
        store: Arc<Store>,
        bus: EventBus,
        paper: Arc<PaperEngine>,
        adapter: Arc<dyn ExchangeAdapter>,
        llm: Arc<dyn LlmCollaborator>,
        news: Arc<dyn NewsAggregator>,
        notify: Arc<dyn NotificationSink>,
    ) -> Self {
        let whitelist = SymbolWhitelist::new(settings.system.symbols.clone());
        let soft_rules = SoftRules {
            risk_per_trade: settings.risk.risk_per_trade,
            min_risk_reward: settings.risk.min_risk_reward,
            ..SoftRules::default()
        };
        let risk = RiskManager::new(guardrails, whitelist, soft_rules);
        let breaker_config = settings.circuit.to_breaker_config(&guardrails);
        let trailing_config = TrailingConfig {
            breakeven_enabled: settings.risk.breakeven_enabled,
            breakeven_trigger_pct: settings.risk.breakeven_trigger_pct,
            trailing_enabled: settings.risk.trailing_enabled,
            trailing_pct: settings.risk.trailing_pct,
            atr_mult: Some(settings.risk.atr_multiplier),
        };

        let mut analyzers = HashMap::new();
        for symbol in &settings.system.symbols {
            analyzers.insert(symbol.clone(), TechnicalAnalyzer::new(Into::<AnalyzerConfig>::into(settings.oracle.analyzer.clone())));
        }

        let initial_balance = paper.cash_free();

        Self {
            settings,
            guardrails,
            state: Mutex::new(EngineState::Initializing),
            bus,
            store,
            paper,
            adapter,
            analyzers: Mutex::new(analyzers),
            ohlcv: OhlcvBuffer::new(),
            risk,
            breaker: Mutex::new(CircuitBreaker::new(breaker_config)),
            trailing_config,
            llm,
            news,
            notify,
            stats: EngineStats::new(Utc::now()),
            equity: Mutex::new(EquityTracker {
                peak_equity: initial_balance,
                daily_start_equity: initial_balance,
                weekly_start_equity: initial_balance,
                equity_curve: vec![initial_balance],
            }),
        }
    }

    pub fn state(&self) -> EngineState {
        *self.state.lock()
    }

    pub fn stats(&self) -> EngineStatsSnapshot {
        self.stats.snapshot()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// `running -> paused`. A no-op (returns `false`) from any other state.
    pub async fn pause(&self) -> bool {
        let transitioned = {
            let mut state = self.state.lock();
            if *state == EngineState::Running {
                *state = EngineState::Paused;
                true
            } else {
                false
            }
        };
        if transitioned {
            self.bus.publish(Event::new(Utc::now(), EventPayload::System(SystemEvent::Paused))).await;
        }
        transitioned
    }

    /// `paused -> running`. A no-op from any other state.
    pub async fn resume(&self) -> bool {
        let transitioned = {
            let mut state = self.state.lock();
            if *state == EngineState::Paused {
                *state = EngineState::Running;
                true
            } else {
                false
            }
        };
        if transitioned {
            self.bus.publish(Event::new(Utc::now(), EventPayload::System(SystemEvent::Resumed))).await;
        }
        transitioned
    }

    /// Toggle paused/running, per the REST surface's `POST /api/pause`
    /// contract. Returns the resulting state.
    pub async fn toggle_pause(&self) -> EngineState {
        if self.state() == EngineState::Paused {
            self.resume().await;
        } else {
            self.pause().await;
        }
        self.state()
    }

    /// Close every open position and transition to paused. Idempotent:
    /// calling this while already paused with no open positions is a
    /// harmless no-op.
    pub async fn trigger_panic(&self) {
        let prices = self.store.open_positions();
        let trades = self.paper.close_all(
            |symbol| prices.iter().find(|p| &p.symbol == symbol).map(|p| p.entry_price),
            ExitReason::Panic,
        );
        for trade in &trades {
            self.publish_trade_closed(trade.symbol.clone(), "panic-close".into(), trade.exit_reason).await;
        }

        self.breaker.lock().trip("panic", Utc::now());
        *self.state.lock() = EngineState::Paused;
        self.bus
            .publish(Event::new(Utc::now(), EventPayload::System(SystemEvent::Panic { reason: "manual panic".into() })))
            .await;
        self.notify.send(Severity::Critical, "panic triggered", "all positions closed, engine paused").await;
    }

    /// Per-tick pipeline: forward to the OHLCV buffer, then
    /// the trailing stop manager, then the paper engine for MTM and
    /// stop/target triggering. Runs regardless of pause state — only new
    /// entries are gated on `running`.
    pub async fn on_tick(&self, symbol: &Symbol, price: Decimal, volume: Decimal, timestamp: chrono::DateTime<Utc>) {
        if self.breaker.lock().reset(Utc::now()) {
            info!("circuit breaker cooldown expired; re-armed");
        }

        self.stats.record_tick();
        self.bus
            .publish(Event::new(timestamp, EventPayload::Price(PriceEvent::Tick { symbol: symbol.clone(), price, volume })))
            .await;

        self.apply_trailing(symbol, price).await;

        if let Some(trade) = self.paper.on_price_update(symbol, price) {
            self.stats.record_trade_closed();
            self.publish_trade_closed(symbol.clone(), trade.exit_reason.to_string(), trade.exit_reason).await;
        }

        let finished = self.ohlcv_on_tick(symbol, price, volume, timestamp);
        if let Some(candle) = finished {
            self.stats.record_candle_close();
            self.bus
                .publish(Event::new(timestamp, EventPayload::Price(PriceEvent::CandleClose { symbol: symbol.clone() })))
                .await;
            self.on_candle_close(&candle).await;
        }
    }

    fn ohlcv_on_tick(&self, symbol: &Symbol, price: Decimal, volume: Decimal, timestamp: chrono::DateTime<Utc>) -> Option<Candle> {
        self.ohlcv.on_tick(symbol, price, volume, timestamp)
    }

    async fn apply_trailing(&self, symbol: &Symbol, price: Decimal) {
        let Some(position) = self.store.open_positions().into_iter().find(|p| &p.symbol == symbol) else {
            return;
        };
        let Some(stop) = position.stop_loss else { return };
        let trailing_state = position.trailing_state.unwrap_or_else(|| {
            TrailingState::new(position.entry_price, stop, position.entry_price, false, false)
        });

        let (new_trailing_state, outcome) =
            keryxflow_execution::on_tick(&self.trailing_config, position.side, Some(stop), trailing_state, price);

        let new_stop = match outcome {
            keryxflow_execution::TrailingOutcome::Unchanged => return,
            keryxflow_execution::TrailingOutcome::Breakeven { new_stop } => new_stop,
            keryxflow_execution::TrailingOutcome::Trailed { new_stop } => new_stop,
        };

        let mut updated = position.clone();
        updated.stop_loss = Some(new_stop);
        updated.trailing_state = Some(new_trailing_state);
        self.store.upsert_position(updated).ok();

        let event = match outcome {
            keryxflow_execution::TrailingOutcome::Breakeven { .. } => {
                TrailingEvent::Breakeven { position_id: position.id.0.to_string(), new_stop }
            }
            _ => TrailingEvent::Trailed { position_id: position.id.0.to_string(), new_stop },
        };
        self.bus.publish(Event::new(Utc::now(), EventPayload::Trailing(event))).await;
        self.bus
            .publish(Event::new(Utc::now(), EventPayload::Position(PositionEvent::Updated { position_id: position.id.0.to_string() })))
            .await;
    }

    /// Candle-close pipeline: Analyzer -> Aggregator ->
    /// (bounded LLM verdict) -> Risk Manager -> Executor.
    pub async fn on_candle_close(&self, candle: &Candle) {
        let symbol = candle.symbol.clone();
        let analysis = {
            let mut analyzers = self.analyzers.lock();
            let analyzer = analyzers
                .entry(symbol.clone())
                .or_insert_with(|| TechnicalAnalyzer::new(Into::<AnalyzerConfig>::into(self.settings.oracle.analyzer.clone())));
            analyzer.update(candle)
        };

        let llm_verdict = if self.settings.oracle.llm_enabled && self.settings.system.ai_mode != crate::config::AiMode::Disabled {
            let news = recent_or_empty(self.news.as_ref(), &symbol, Duration::from_secs(3600)).await;
            let context_blob = serde_json::to_string(&serde_json::json!({ "analysis": &analysis, "news": news })).unwrap_or_default();
            analyze_bounded(self.llm.as_ref(), &context_blob).await.map(|a| keryxflow_strategy::LlmVerdict {
                direction: a.direction,
                confidence: a.confidence,
                rationale_hash: 0,
            })
        } else {
            None
        };

        let aggregator = keryxflow_strategy::SignalAggregator::new(keryxflow_strategy::AggregatorConfig::default());
        let signal = aggregator.aggregate(&analysis, llm_verdict);
        self.stats.record_signal();
        self.bus
            .publish(Event::new(Utc::now(), EventPayload::Signal(keryxflow_integration::event::SignalEvent::Generated { symbol: symbol.clone() })))
            .await;

        if signal.kind == SignalKind::NoAction {
            return;
        }

        if signal.kind.is_entry() && !self.state().accepts_new_entries() {
            debug!(%symbol, "new-entry processing halted while not running");
            return;
        }

        let snapshot = self.snapshot();
        let outcome = {
            let breaker = self.breaker.lock();
            self.risk.evaluate(&signal, &snapshot, &breaker, &self.bus).await
        };

        match outcome {
            RiskOutcome::Reject(_) => {
                self.stats.record_order_rejected();
            }
            RiskOutcome::Approve(intent) => {
                self.stats.record_order_approved();
                match self.adapter.place_order(intent.clone()).await {
                    Ok(order_id) => {
                        self.bus
                            .publish(Event::new(
                                Utc::now(),
                                EventPayload::Order(OrderEvent::Filled {
                                    client_id: intent.client_id.clone(),
                                    fill_price: intent.price.unwrap_or_default(),
                                    quantity: intent.quantity,
                                }),
                            ))
                            .await;
                        self.bus
                            .publish(Event::new(
                                Utc::now(),
                                EventPayload::Position(PositionEvent::Opened { position_id: order_id, symbol: symbol.clone() }),
                            ))
                            .await;
                        self.record_entry_episode(&symbol, &signal, &analysis).await;
                    }
                    Err(err) => {
                        // Ambiguous-fill: no retry, surface a risk
                        // alert, never synthesize a position.
                        warn!(%symbol, error = %err, "order placement did not confirm; treating as unresolved");
                        self.bus
                            .publish(Event::new(Utc::now(), EventPayload::Risk(RiskEvent::Alert { message: format!("unresolved order for {symbol}: {err}") })))
                            .await;
                        self.notify.send(Severity::Warn, "unresolved order", &format!("{symbol}: {err}")).await;
                    }
                }
            }
        }
    }

    async fn publish_trade_closed(&self, symbol: Symbol, _reason_text: String, reason: ExitReason) {
        let trades = self.store.recent_trades(20);
        let Some(trade) = trades.into_iter().find(|t| t.symbol == symbol) else { return };

        self.bus
            .publish(Event::new(Utc::now(), EventPayload::Position(PositionEvent::Closed { position_id: trade.id.0.to_string(), reason: reason.to_string() })))
            .await;

        self.update_equity_on_close(trade.pnl);
        self.evaluate_breaker().await;

        let episode = TradeEpisode {
            id: EpisodeId::new(),
            trade_ref: Some(trade.id),
            timestamp: Utc::now(),
            symbol: symbol.clone(),
            action: "exit".into(),
            reasoning: format!("{reason}"),
            confidence: 1.0,
            market_context: serde_json::json!({}),
            portfolio_snapshot: self.snapshot(),
            entry_price: trade.entry_price,
            quantity: trade.quantity,
            exit_price: Some(trade.exit_price),
            pnl: Some(trade.pnl),
            post_mortem: None,
            lessons_learned: None,
        };
        keryxflow_memory::record_episode(
            &self.store,
            episode,
            FeatureVector { rsi: 0.0, macd_histogram: 0.0, bollinger_position: 0.5, obv_slope: 0.0, ema_alignment: 0.0 },
        );
    }

    async fn record_entry_episode(&self, symbol: &Symbol, signal: &keryxflow_store::Signal, analysis: &Analysis) {
        let Some(entry) = signal.entry_price else { return };
        let features = feature_vector_from_analysis(analysis);
        let episode = TradeEpisode {
            id: keryxflow_store::EpisodeId::new(),
            trade_ref: None,
            timestamp: Utc::now(),
            symbol: symbol.clone(),
            action: format!("{:?}", signal.kind).to_lowercase(),
            reasoning: signal.rationale.clone(),
            confidence: signal.confidence,
            market_context: serde_json::json!({}),
            portfolio_snapshot: self.snapshot(),
            entry_price: entry,
            quantity: Decimal::ZERO,
            exit_price: None,
            pnl: None,
            post_mortem: None,
            lessons_learned: None,
        };
        keryxflow_memory::record_episode(&self.store, episode, features);
    }

    fn update_equity_on_close(&self, pnl: Decimal) {
        // Computed without going through `self.snapshot()` since that also
        // locks `self.equity` — `parking_lot::Mutex` isn't reentrant.
        let cash_free = self.paper.cash_free();
        let current_exposure: Decimal = self.store.open_positions().iter().map(|p| p.entry_price * p.quantity).sum();
        let current_equity = cash_free + current_exposure;

        let mut equity = self.equity.lock();
        if current_equity > equity.peak_equity {
            equity.peak_equity = current_equity;
        }
        equity.equity_curve.push(current_equity);
        if equity.equity_curve.len() > EQUITY_CURVE_CAPACITY {
            equity.equity_curve.remove(0);
        }
        let _ = pnl;
    }

    async fn evaluate_breaker(&self) {
        let snapshot = self.snapshot();
        let trades = self.store.all_trades();
        let recent_losses: Vec<_> = trades.iter().rev().filter(|t| t.pnl < Decimal::ZERO).map(|t| t.exit_time).collect();

        let drawdown_pct = {
            let equity = self.equity.lock();
            let (current_dd, _max_dd) = keryxflow_quant::drawdown(&equity.equity_curve);
            current_dd.abs()
        };

        let inputs = BreakerInputs {
            daily_loss_pct: snapshot.daily_loss_pct,
            weekly_loss_pct: snapshot.weekly_loss_pct,
            drawdown_pct,
            consecutive_losses: snapshot.consecutive_losses,
            recent_loss_timestamps: recent_losses,
        };

        let reason = { self.breaker.lock().evaluate(&inputs, Utc::now()) };
        if let Some(reason) = reason {
            self.stats.record_breaker_trip();
            self.bus
                .publish(Event::new(Utc::now(), EventPayload::Risk(RiskEvent::Breaker { reason: format!("{reason:?}") })))
                .await;
            self.notify.send(Severity::Critical, "circuit breaker tripped", &format!("{reason:?}")).await;
            if matches!(reason, TripReason::DailyLoss | TripReason::WeeklyLoss | TripReason::Drawdown) {
                *self.state.lock() = EngineState::Paused;
            }
        }
    }

    /// Recompute the authoritative portfolio snapshot from the paper
    /// engine and store — never cached.
    pub fn snapshot(&self) -> keryxflow_store::PortfolioSnapshot {
        let cash_free = self.paper.cash_free();
        let open_positions = self.store.open_positions();
        let current_exposure: Decimal = open_positions.iter().map(|p| p.entry_price * p.quantity).sum();
        let total_value = cash_free + current_exposure;

        let current_risk_pct = if total_value.is_zero() {
            Decimal::ZERO
        } else {
            open_positions
                .iter()
                .filter_map(|p| p.stop_loss.map(|stop| (p.entry_price - stop).abs() * p.quantity))
                .sum::<Decimal>()
                / total_value
        };

        let equity = self.equity.lock();
        let daily_loss_pct = if equity.daily_start_equity.is_zero() {
            Decimal::ZERO
        } else {
            ((equity.daily_start_equity - total_value) / equity.daily_start_equity).max(Decimal::ZERO)
        };
        let weekly_loss_pct = if equity.weekly_start_equity.is_zero() {
            Decimal::ZERO
        } else {
            ((equity.weekly_start_equity - total_value) / equity.weekly_start_equity).max(Decimal::ZERO)
        };

        let trades = self.store.all_trades();
        let now = Utc::now();
        let trades_in_last_hour = trades.iter().filter(|t| now - t.exit_time < chrono::Duration::hours(1)).count() as u32;
        let trades_today = trades.iter().filter(|t| t.exit_time.date_naive() == now.date_naive()).count() as u32;
        let consecutive_losses = trades.iter().rev().take_while(|t| t.pnl < Decimal::ZERO).count() as u32;

        keryxflow_store::PortfolioSnapshot {
            total_value,
            cash_free,
            cash_locked: Decimal::ZERO,
            open_positions_count: open_positions.len() as u32,
            current_exposure,
            current_risk_pct,
            peak_equity: equity.peak_equity,
            daily_start_equity: equity.daily_start_equity,
            weekly_start_equity: equity.weekly_start_equity,
            consecutive_losses,
            daily_loss_pct,
            weekly_loss_pct,
            trades_in_last_hour,
            trades_today,
        }
    }

    /// Run the orchestrator: one task per configured symbol forwarding
    /// ticks from the adapter, plus the command channel. Blocks until a
    /// `Shutdown` command is received and the bounded drain completes.
    pub async fn run(self: Arc<Self>, mut command_rx: mpsc::Receiver<EngineCommand>) {
        *self.state.lock() = EngineState::Running;
        self.bus.publish(Event::new(Utc::now(), EventPayload::System(SystemEvent::Started))).await;
        info!("engine started");

        let mut tick_tasks = Vec::new();
        for symbol in self.settings.system.symbols.clone() {
            let engine = self.clone();
            let adapter = self.adapter.clone();
            tick_tasks.push(tokio::spawn(async move {
                let Ok(mut stream) = adapter.subscribe_ticks(symbol.clone()).await else {
                    warn!(%symbol, "failed to subscribe to ticks");
                    return;
                };
                while let Some(tick) = stream.next().await {
                    engine.on_tick(&symbol, tick.price, tick.volume, tick.timestamp).await;
                }
            }));
        }

        while let Some(command) = command_rx.recv().await {
            match command {
                EngineCommand::Pause => {
                    self.pause().await;
                }
                EngineCommand::Resume => {
                    self.resume().await;
                }
                EngineCommand::Panic => {
                    self.trigger_panic().await;
                }
                EngineCommand::Shutdown => break,
            }
        }

        *self.state.lock() = EngineState::Stopping;
        info!("shutdown requested, draining outstanding work");

        for task in &tick_tasks {
            task.abort();
        }
        let drain = futures::future::join_all(tick_tasks);
        if timeout(SHUTDOWN_DEADLINE, drain).await.is_err() {
            warn!("shutdown deadline exceeded; stragglers force-cancelled");
        }

        *self.state.lock() = EngineState::Stopped;
        self.bus.publish(Event::new(Utc::now(), EventPayload::System(SystemEvent::Stopped))).await;
        info!("engine stopped");
    }
}

fn feature_vector_from_analysis(analysis: &Analysis) -> FeatureVector {
    fn value_of(indicators: &[IndicatorResult], name: &str) -> f64 {
        indicators.iter().find(|i| i.name == name).map(|i| i.value).unwrap_or(0.0)
    }
    FeatureVector {
        rsi: value_of(&analysis.indicators, "rsi") / 100.0,
        macd_histogram: value_of(&analysis.indicators, "macd"),
        bollinger_position: value_of(&analysis.indicators, "bollinger"),
        obv_slope: value_of(&analysis.indicators, "obv"),
        ema_alignment: value_of(&analysis.indicators, "ema_alignment"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::UnavailableLlm;
    use crate::news::NoNewsFeed;
    use crate::notify::TracingSink;
    use keryxflow_execution::PaperEngineConfig;

    fn test_engine() -> Arc<Engine> {
        let store = Arc::new(Store::in_memory());
        let paper = Arc::new(PaperEngine::new(PaperEngineConfig::default(), store.clone()));
        let mut settings = Settings::default();
        settings.system.symbols = vec![Symbol::new("BTC/USDT")];
        Arc::new(Engine::new(
            settings,
            Guardrails::production(),
            store,
            EventBus::new(),
            paper.clone(),
            paper,
            Arc::new(UnavailableLlm),
            Arc::new(NoNewsFeed),
            Arc::new(TracingSink),
        ))
    }

    #[tokio::test]
    async fn pause_then_pause_is_idempotent() {
        let engine = test_engine();
        *engine.state.lock() = EngineState::Running;
        assert!(engine.pause().await);
        assert!(!engine.pause().await);
        assert_eq!(engine.state(), EngineState::Paused);
    }

    #[tokio::test]
    async fn panic_then_panic_leaves_same_state() {
        let engine = test_engine();
        *engine.state.lock() = EngineState::Running;
        engine.trigger_panic().await;
        let after_first = engine.state();
        engine.trigger_panic().await;
        assert_eq!(engine.state(), after_first);
        assert_eq!(engine.state(), EngineState::Paused);
    }

    #[tokio::test]
    async fn toggle_pause_flips_between_running_and_paused() {
        let engine = test_engine();
        *engine.state.lock() = EngineState::Running;
        assert_eq!(engine.toggle_pause().await, EngineState::Paused);
        assert_eq!(engine.toggle_pause().await, EngineState::Running);
    }

    #[tokio::test]
    async fn snapshot_reflects_paper_engine_cash() {
        let engine = test_engine();
        let snapshot = engine.snapshot();
        assert_eq!(snapshot.cash_free, keryxflow_execution::PaperEngineConfig::default().initial_balance);
    }

    /// A breaker tripped long enough ago that its cooldown has elapsed
    /// re-arms on the very next tick, not just in the breaker's own unit
    /// tests — `on_tick` is the run loop's per-tick body, so this is the
    /// path a live process actually exercises.
    #[tokio::test]
    async fn breaker_rearms_on_tick_once_cooldown_has_elapsed() {
        let engine = test_engine();
        let long_ago = Utc::now() - chrono::Duration::hours(2);
        engine.breaker.lock().trip("test", long_ago);
        assert!(!engine.breaker.lock().allows_entries());

        engine.on_tick(&Symbol::new("BTC/USDT"), Decimal::from(100), Decimal::from(1), Utc::now()).await;

        assert!(engine.breaker.lock().allows_entries());
    }

    /// `evaluate_breaker` derives `drawdown_pct` from the equity curve via
    /// `keryxflow_quant::drawdown` rather than a hardcoded zero, so a real
    /// drawdown past the guardrail floor trips the breaker.
    #[tokio::test]
    async fn evaluate_breaker_trips_on_drawdown_from_equity_curve() {
        let engine = test_engine();
        {
            let mut equity = engine.equity.lock();
            equity.peak_equity = Decimal::from(10000);
            equity.equity_curve = vec![Decimal::from(10000), Decimal::from(7000)];
        }

        engine.evaluate_breaker().await;

        assert!(!engine.breaker.lock().allows_entries());
        assert_eq!(engine.state(), EngineState::Paused);
    }
}
