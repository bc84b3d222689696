//! Cross-crate end-to-end scenarios. Each test drives two or more crates
//! together through their public surfaces rather than a single crate's own
//! unit behavior — the kind of thing that can only regress at an
//! integration boundary.

use chrono::Utc;
use keryxflow::config::Settings;
use keryxflow::engine::Engine;
use keryxflow::llm::UnavailableLlm;
use keryxflow::news::NoNewsFeed;
use keryxflow::notify::TracingSink;
use keryxflow_execution::{on_tick as trailing_on_tick, ExchangeAdapter, PaperEngine, PaperEngineConfig, TrailingConfig, TrailingOutcome};
use keryxflow_instrument::{Direction, Side, Strength, Symbol};
use keryxflow_integration::bus::EventBus;
use keryxflow_risk::breaker::{BreakerConfig, BreakerInputs, CircuitBreaker, TripReason};
use keryxflow_risk::guardrails::{Action, Guardrails, SymbolWhitelist, Verdict};
use keryxflow_risk::manager::{RiskManager, RiskOutcome, SoftRules};
use keryxflow_store::{
    ExitReason, OrderIntent, OrderKind, PortfolioSnapshot, Signal, SignalKind, SignalSource, Store, TrailingState,
};
use keryxflow_ta::Analysis;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

fn test_engine(store: Arc<Store>) -> (Arc<Engine>, Arc<PaperEngine>) {
    let paper = Arc::new(PaperEngine::new(PaperEngineConfig::default(), store.clone()));
    let mut settings = Settings::default();
    settings.system.symbols = vec![Symbol::new("BTC/USDT")];
    let engine = Arc::new(Engine::new(
        settings,
        Guardrails::production(),
        store,
        EventBus::new(),
        paper.clone(),
        paper.clone(),
        Arc::new(UnavailableLlm),
        Arc::new(NoNewsFeed),
        Arc::new(TracingSink),
    ));
    (engine, paper)
}

fn snapshot(total_value: Decimal, cash_free: Decimal, current_exposure: Decimal, open_positions_count: u32) -> PortfolioSnapshot {
    PortfolioSnapshot {
        total_value,
        cash_free,
        cash_locked: Decimal::ZERO,
        open_positions_count,
        current_exposure,
        peak_equity: total_value,
        daily_start_equity: total_value,
        weekly_start_equity: total_value,
        consecutive_losses: 0,
        daily_loss_pct: dec!(0),
        weekly_loss_pct: dec!(0),
        trades_in_last_hour: 0,
        trades_today: 0,
    }
}

fn long_signal(symbol: Symbol, entry: Decimal, stop: Decimal, target: Decimal) -> Signal {
    Signal {
        symbol,
        kind: SignalKind::Long,
        strength: Strength::Strong,
        confidence: 0.8,
        source: SignalSource::Technical,
        entry_price: Some(entry),
        stop_loss: Some(stop),
        take_profit: Some(target),
        risk_reward: Some(dec!(2.0)),
        timestamp: Utc::now(),
        rationale: "test fixture".into(),
    }
}

/// A third entry that would push aggregate exposure past the guardrail
/// floor is rejected even though the signal and breaker are both fine in
/// isolation — the guardrail reasons about the *portfolio*, not the trade.
#[tokio::test]
async fn aggregate_exposure_rejection_blocks_entry_breaker_and_signal_allow() {
    let guardrails = Guardrails::production();
    let whitelist = SymbolWhitelist::new(vec![Symbol::new("BTC/USDT")]);
    let risk = RiskManager::new(guardrails, whitelist, SoftRules::default());
    let breaker = CircuitBreaker::new(BreakerConfig::default());
    let bus = EventBus::new();

    // current_exposure already sits at 60% of a 10k book, past the 50%
    // aggregate ceiling. The new order's own notional is small (4% of the
    // book, well under the 10% per-position cap) so only the aggregate
    // exposure check can be what rejects it.
    let snap = snapshot(dec!(10000), dec!(4000), dec!(6000), 2);
    let signal = long_signal(Symbol::new("BTC/USDT"), dec!(200), dec!(100), dec!(400));

    let outcome = risk.evaluate(&signal, &snap, &breaker, &bus).await;
    match outcome {
        RiskOutcome::Reject(reason) => assert!(reason.contains("exposure"), "unexpected rejection reason: {reason}"),
        RiskOutcome::Approve(_) => panic!("expected aggregate exposure to reject the entry"),
    }
}

/// The same guardrail check run directly against the validate() function
/// confirms Allow is only returned when every bound is respected — a
/// positive control paired with the rejection case above.
#[test]
fn guardrail_allow_implies_every_bound_respected() {
    let guardrails = Guardrails::production();
    let whitelist = SymbolWhitelist::new(vec![Symbol::new("BTC/USDT")]);
    let snap = snapshot(dec!(10000), dec!(8000), dec!(1000), 1);
    let action = Action::MarketBuy { symbol: Symbol::new("BTC/USDT"), notional: dec!(500), risk_pct: dec!(0.02) };

    let verdict = keryxflow_risk::guardrails::validate(&action, &guardrails, &whitelist, &snap);
    assert_eq!(verdict, Verdict::Allow);

    let position_pct = dec!(500) / dec!(10000);
    assert!(position_pct <= guardrails.max_position_pct);
    let exposure_pct = dec!(1000) / dec!(10000);
    assert!(exposure_pct <= guardrails.max_aggregate_exposure_pct);
}

/// A day that loses 6% trips the breaker on the very next evaluate() call,
/// and the risk manager immediately starts rejecting entries off that
/// tripped state — the breaker and the risk manager are separate types
/// wired through the same evaluate() call the engine makes every candle
/// close.
#[tokio::test]
async fn breaker_trip_on_daily_loss_blocks_subsequent_entries() {
    let mut breaker = CircuitBreaker::new(BreakerConfig::default());
    let inputs = BreakerInputs {
        daily_loss_pct: dec!(0.06),
        weekly_loss_pct: dec!(0),
        drawdown_pct: dec!(0),
        consecutive_losses: 0,
        recent_loss_timestamps: Vec::new(),
    };
    let now = Utc::now();
    assert_eq!(breaker.evaluate(&inputs, now), Some(TripReason::DailyLoss));
    assert!(!breaker.allows_entries());

    let guardrails = Guardrails::production();
    let whitelist = SymbolWhitelist::new(vec![Symbol::new("BTC/USDT")]);
    let risk = RiskManager::new(guardrails, whitelist, SoftRules::default());
    let bus = EventBus::new();
    let snap = snapshot(dec!(10000), dec!(8000), dec!(0), 0);
    let signal = long_signal(Symbol::new("BTC/USDT"), dec!(100), dec!(95), dec!(110));

    match risk.evaluate(&signal, &snap, &breaker, &bus).await {
        RiskOutcome::Reject(reason) => assert!(reason.contains("breaker")),
        RiskOutcome::Approve(_) => panic!("tripped breaker must reject new entries"),
    }
}

/// A long position's stop moves to breakeven once price clears the
/// breakeven trigger, then trails behind price once further in profit —
/// never moving the stop backwards.
#[test]
fn trailing_moves_to_breakeven_then_trails_and_never_reverses() {
    let config = TrailingConfig {
        breakeven_enabled: true,
        breakeven_trigger_pct: dec!(0.01),
        trailing_enabled: true,
        trailing_pct: dec!(0.02),
        atr_mult: None,
    };
    let entry = dec!(100);
    let initial_stop = dec!(95);
    let mut state = TrailingState::new(entry, initial_stop, entry, false, false);
    let mut stop = initial_stop;

    // +1.5% clears the breakeven trigger.
    let (next_state, outcome) = trailing_on_tick(&config, Side::Buy, Some(stop), state, dec!(101.5));
    let TrailingOutcome::Breakeven { new_stop } = outcome else { panic!("expected breakeven, got {outcome:?}") };
    assert!(new_stop >= entry, "breakeven stop must be at or above entry");
    stop = new_stop;
    state = next_state;

    // +5% should now trail behind the new high.
    let (next_state, outcome) = trailing_on_tick(&config, Side::Buy, Some(stop), state, dec!(105.0));
    let TrailingOutcome::Trailed { new_stop } = outcome else { panic!("expected trailing, got {outcome:?}") };
    assert!(new_stop > stop, "trailing stop must advance with a new high");
    stop = new_stop;
    state = next_state;

    // A pullback that stays below the prior high must never move the stop
    // backwards.
    let (_next_state, outcome) = trailing_on_tick(&config, Side::Buy, Some(stop), state, dec!(103.0));
    match outcome {
        TrailingOutcome::Unchanged => {}
        TrailingOutcome::Trailed { new_stop } => assert!(new_stop >= stop, "stop must never retreat"),
        TrailingOutcome::Breakeven { .. } => panic!("breakeven should not re-trigger after already past it"),
    }
}

/// A market buy fills above the reference price (slippage) and a
/// subsequent tick through the stop closes the position at the stop price
/// itself, not the worse triggering tick — conservative fill semantics.
#[test]
fn paper_engine_applies_slippage_on_entry_and_exits_at_stop_not_tick_price() {
    let store = Arc::new(Store::in_memory());
    let paper = PaperEngine::new(PaperEngineConfig::default(), store.clone());
    let symbol = Symbol::new("BTC/USDT");
    let order = OrderIntent::new(symbol.clone(), Side::Buy, dec!(1), OrderKind::Market, Some(dec!(100)), Some(dec!(95)), Some(dec!(110)), "c1".into());

    let position = paper.execute(&order, dec!(100)).unwrap();
    assert!(position.entry_price > dec!(100), "a buy fill must include slippage above the reference price");

    // Price gaps straight through the stop to 90; the close must still be
    // recorded at the 95 stop, not 90.
    let trade = paper.on_price_update(&symbol, dec!(90)).expect("stop should trigger a close");
    assert_eq!(trade.exit_reason, ExitReason::Stop);
    assert!(trade.exit_price < dec!(95.01) && trade.exit_price > dec!(94.0), "exit must be priced near the stop, not the tick");
    assert!(store.open_positions().is_empty(), "position must be closed in the store too");
}

/// An LLM verdict that directly opposes the technical direction vetoes the
/// trade (flips to Neutral/zero confidence) rather than averaging the two
/// into a watered-down entry.
#[test]
fn llm_veto_on_opposing_direction_forces_no_action() {
    let aggregator = keryxflow_strategy::SignalAggregator::new(keryxflow_strategy::AggregatorConfig::default());
    let analysis = Analysis {
        symbol: Symbol::new("BTC/USDT"),
        timestamp: Utc::now(),
        close: dec!(100),
        atr: Some(2.0),
        indicators: Vec::new(),
        direction: Direction::Bullish,
        strength: Strength::Strong,
        confidence: 0.9,
    };
    let opposing_llm = keryxflow_strategy::LlmVerdict { direction: Direction::Bearish, confidence: 0.9, rationale_hash: 0 };

    let signal = aggregator.aggregate(&analysis, Some(opposing_llm));
    assert_eq!(signal.kind, SignalKind::NoAction);
    assert_eq!(signal.confidence, 0.0);
}

/// Panic closes every open position and transitions to paused exactly
/// once's worth — calling it again is a harmless no-op, not a second
/// round of closes.
#[tokio::test]
async fn engine_panic_is_idempotent_and_closes_every_open_position() {
    let store = Arc::new(Store::in_memory());
    let (engine, paper) = test_engine(store.clone());

    // Open a position through the exact paper engine instance the
    // orchestrator's own trigger_panic() closes.
    let adapter: Arc<dyn ExchangeAdapter> = paper;
    let btc = OrderIntent::new(Symbol::new("BTC/USDT"), Side::Buy, dec!(1), OrderKind::Market, Some(dec!(100)), Some(dec!(95)), Some(dec!(110)), "c1".into());
    adapter.place_order(btc).await.unwrap();
    assert_eq!(store.open_positions().len(), 1);

    engine.trigger_panic().await;
    assert!(store.open_positions().is_empty(), "panic must close every open position");
    let after_first = engine.state();

    engine.trigger_panic().await;
    assert_eq!(engine.state(), after_first);
    assert!(store.open_positions().is_empty());
}

/// After a restart, a fresh `Store::open` over the same directory replays
/// the journal and recovers every open position and trade that was
/// written before the process ended.
#[test]
fn store_restart_recovers_positions_and_trades_from_journal() {
    let dir = std::env::temp_dir().join(format!("keryxflow-scenarios-test-{}", uuid::Uuid::new_v4()));
    let symbol = Symbol::new("BTC/USDT");

    {
        let store = Store::open(&dir).expect("open store");
        let paper = PaperEngine::new(PaperEngineConfig::default(), Arc::new(store));
        let order = OrderIntent::new(symbol.clone(), Side::Buy, dec!(1), OrderKind::Market, Some(dec!(100)), Some(dec!(95)), Some(dec!(110)), "c1".into());
        paper.execute(&order, dec!(100)).unwrap();
    }

    let reopened = Store::open(&dir).expect("reopen store after restart");
    let positions = reopened.open_positions();
    assert_eq!(positions.len(), 1);
    assert_eq!(positions[0].symbol, symbol);

    std::fs::remove_dir_all(&dir).ok();
}
