//! Persisted entity data model. Every entity derives
//! `Serialize`/`Deserialize` so the store can round-trip it faithfully
//! across a restart.

use chrono::{DateTime, Utc};
use derive_more::{Constructor, Display, From};
use keryxflow_instrument::{Side, Symbol};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! uuid_id {
    ($name:ident) => {
        #[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Display, From, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }
    };
}

uuid_id!(PositionId);
uuid_id!(TradeId);
uuid_id!(EpisodeId);
uuid_id!(RuleId);
uuid_id!(PatternId);

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Display, Serialize, Deserialize)]
pub enum SignalKind {
    Long,
    Short,
    CloseLong,
    CloseShort,
    NoAction,
}

impl SignalKind {
    pub fn is_entry(self) -> bool {
        matches!(self, SignalKind::Long | SignalKind::Short)
    }

    pub fn is_exit(self) -> bool {
        matches!(self, SignalKind::CloseLong | SignalKind::CloseShort)
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Display, Serialize, Deserialize)]
pub enum SignalSource {
    Technical,
    Llm,
    Combined,
}

/// A candidate trading decision, before risk validation.
///
/// Invariants (enforced by the constructors in `keryxflow-strategy`, not
/// here — this type is a plain data carrier): `Long`/`Short` require
/// `stop_loss` and a risk:reward `>= min_risk_reward`; `confidence` below
/// the entry threshold collapses `kind` to `NoAction`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub symbol: Symbol,
    pub kind: SignalKind,
    pub strength: keryxflow_instrument::Strength,
    pub confidence: f64,
    pub source: SignalSource,
    pub entry_price: Option<Decimal>,
    pub stop_loss: Option<Decimal>,
    pub take_profit: Option<Decimal>,
    pub risk_reward: Option<Decimal>,
    pub timestamp: DateTime<Utc>,
    pub rationale: String,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Display, Serialize, Deserialize)]
pub enum OrderKind {
    Market,
    Limit,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Constructor)]
pub struct OrderIntent {
    pub symbol: Symbol,
    pub side: Side,
    pub quantity: Decimal,
    pub kind: OrderKind,
    pub price: Option<Decimal>,
    pub stop_loss: Option<Decimal>,
    pub take_profit: Option<Decimal>,
    pub client_id: String,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Display, Serialize, Deserialize)]
pub enum PositionStatus {
    Open,
    Closed,
}

/// Per-position trailing-stop bookkeeping. Owned by the
/// position; the Trailing Stop Manager in `keryxflow-execution` mutates it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Constructor)]
pub struct TrailingState {
    pub entry: Decimal,
    pub initial_stop: Decimal,
    pub highest_favorable_price: Decimal,
    pub breakeven_armed: bool,
    pub trailing_active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub id: PositionId,
    pub symbol: Symbol,
    pub side: Side,
    pub quantity: Decimal,
    pub entry_price: Decimal,
    pub opened_at: DateTime<Utc>,
    pub stop_loss: Option<Decimal>,
    pub take_profit: Option<Decimal>,
    pub trailing_state: Option<TrailingState>,
    pub realized_pnl: Decimal,
    pub status: PositionStatus,
}

impl Position {
    /// Mark-to-market unrealized PnL at `price`. Zero once closed — the
    /// spec's "quantity is frozen and status=closed" invariant means a
    /// closed position no longer marks.
    pub fn unrealized_pnl(&self, price: Decimal) -> Decimal {
        if self.status == PositionStatus::Closed {
            return Decimal::ZERO;
        }
        (price - self.entry_price) * self.quantity * Decimal::from(self.side.sign())
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Display, Serialize, Deserialize)]
pub enum ExitReason {
    Stop,
    Target,
    Signal,
    Manual,
    Panic,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Constructor)]
pub struct Trade {
    pub id: TradeId,
    pub symbol: Symbol,
    pub side: Side,
    pub quantity: Decimal,
    pub entry_price: Decimal,
    pub exit_price: Decimal,
    pub entry_time: DateTime<Utc>,
    pub exit_time: DateTime<Utc>,
    pub pnl: Decimal,
    pub pnl_pct: Decimal,
    pub exit_reason: ExitReason,
    pub is_paper: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct PortfolioSnapshot {
    pub total_value: Decimal,
    pub cash_free: Decimal,
    pub cash_locked: Decimal,
    pub open_positions_count: u32,
    pub current_exposure: Decimal,
    /// Fraction of `total_value` already at risk across every open
    /// position's stop distance (`sum(|entry - stop| * qty) / total_value`).
    /// Read by the aggregate-risk guardrail alongside a proposed order's own
    /// risk so the two can be summed before comparing to the cap.
    pub current_risk_pct: Decimal,
    pub peak_equity: Decimal,
    pub daily_start_equity: Decimal,
    pub weekly_start_equity: Decimal,
    pub consecutive_losses: u32,
    pub daily_loss_pct: Decimal,
    pub weekly_loss_pct: Decimal,
    pub trades_in_last_hour: u32,
    pub trades_today: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeEpisode {
    pub id: EpisodeId,
    pub trade_ref: Option<TradeId>,
    pub timestamp: DateTime<Utc>,
    pub symbol: Symbol,
    pub action: String,
    pub reasoning: String,
    pub confidence: f64,
    pub market_context: serde_json::Value,
    pub portfolio_snapshot: PortfolioSnapshot,
    pub entry_price: Decimal,
    pub quantity: Decimal,
    pub exit_price: Option<Decimal>,
    pub pnl: Option<Decimal>,
    pub post_mortem: Option<String>,
    pub lessons_learned: Option<String>,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Display, Serialize, Deserialize)]
pub enum RuleSource {
    Learned,
    User,
    Backtest,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradingRule {
    pub id: RuleId,
    pub text: String,
    pub rationale: String,
    pub source: RuleSource,
    pub times_applied: u32,
    pub times_helpful: u32,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketPattern {
    pub id: PatternId,
    pub name: String,
    pub conditions: serde_json::Value,
    pub expected_outcome: String,
    pub times_identified: u32,
    pub times_correct: u32,
    pub avg_return_when_correct: Decimal,
    pub last_seen: DateTime<Utc>,
}

impl MarketPattern {
    /// `times_correct / times_identified`, `0` when never identified.
    pub fn accuracy(&self) -> f64 {
        if self.times_identified == 0 {
            0.0
        } else {
            self.times_correct as f64 / self.times_identified as f64
        }
    }
}
