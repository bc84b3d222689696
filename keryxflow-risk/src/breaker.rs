//! Loss/rapid-loss/consecutive-loss detection with cooldown. `evaluate`
//! takes the caller's notion of "now" rather than reading the clock itself
//! so the state machine stays pure and trivially testable.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Armed,
    Tripped,
    Cooldown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TripReason {
    DailyLoss,
    WeeklyLoss,
    Drawdown,
    ConsecutiveLosses,
    RapidLosses,
    Manual(String),
}

/// Inputs the breaker reacts to on each `evaluate` call. All percentages
/// are fractions (0.05 == 5%), matching [`keryxflow_store::PortfolioSnapshot`].
#[derive(Debug, Clone)]
pub struct BreakerInputs {
    pub daily_loss_pct: Decimal,
    pub weekly_loss_pct: Decimal,
    pub drawdown_pct: Decimal,
    pub consecutive_losses: u32,
    /// Timestamps of recent losing trades, most recent last.
    pub recent_loss_timestamps: Vec<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy)]
pub struct BreakerConfig {
    pub max_daily_loss_pct: Decimal,
    pub max_weekly_loss_pct: Decimal,
    pub max_drawdown_pct: Decimal,
    pub max_consecutive_losses: u32,
    pub rapid_loss_count: u32,
    pub rapid_loss_window: Duration,
    pub cooldown_duration: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            max_daily_loss_pct: dec!(0.05),
            max_weekly_loss_pct: dec!(0.10),
            max_drawdown_pct: dec!(0.20),
            max_consecutive_losses: 5,
            rapid_loss_count: 3,
            rapid_loss_window: Duration::hours(1),
            cooldown_duration: Duration::hours(1),
        }
    }
}

/// Circuit breaker state machine: `armed -> tripped -> cooldown -> armed`.
pub struct CircuitBreaker {
    config: BreakerConfig,
    state: BreakerState,
    tripped_at: Option<DateTime<Utc>>,
    last_reason: Option<TripReason>,
}

impl CircuitBreaker {
    pub fn new(config: BreakerConfig) -> Self {
        Self { config, state: BreakerState::Armed, tripped_at: None, last_reason: None }
    }

    pub fn state(&self) -> BreakerState {
        self.state
    }

    pub fn last_reason(&self) -> Option<&TripReason> {
        self.last_reason.as_ref()
    }

    /// Re-evaluate breaker inputs at `now`. Returns the trip reason if this
    /// call caused `armed -> tripped`.
    pub fn evaluate(&mut self, inputs: &BreakerInputs, now: DateTime<Utc>) -> Option<TripReason> {
        if self.state != BreakerState::Armed {
            return None;
        }

        let reason = if inputs.daily_loss_pct >= self.config.max_daily_loss_pct {
            Some(TripReason::DailyLoss)
        } else if inputs.weekly_loss_pct >= self.config.max_weekly_loss_pct {
            Some(TripReason::WeeklyLoss)
        } else if inputs.drawdown_pct >= self.config.max_drawdown_pct {
            Some(TripReason::Drawdown)
        } else if inputs.consecutive_losses >= self.config.max_consecutive_losses {
            Some(TripReason::ConsecutiveLosses)
        } else if rapid_losses(&inputs.recent_loss_timestamps, self.config.rapid_loss_count, self.config.rapid_loss_window, now) {
            Some(TripReason::RapidLosses)
        } else {
            None
        };

        if let Some(reason) = reason {
            self.trip_internal(reason.clone(), now);
            Some(reason)
        } else {
            None
        }
    }

    /// Manual trip, e.g. from an operator command.
    pub fn trip(&mut self, reason: impl Into<String>, now: DateTime<Utc>) {
        self.trip_internal(TripReason::Manual(reason.into()), now);
    }

    fn trip_internal(&mut self, reason: TripReason, now: DateTime<Utc>) {
        self.state = BreakerState::Cooldown;
        self.tripped_at = Some(now);
        self.last_reason = Some(reason);
    }

    /// Attempt to reset. Returns `false` (and does nothing) if cooldown has
    /// not yet expired or the breaker was never tripped.
    pub fn reset(&mut self, now: DateTime<Utc>) -> bool {
        match (self.state, self.tripped_at) {
            (BreakerState::Cooldown, Some(tripped_at)) if now >= tripped_at + self.config.cooldown_duration => {
                self.state = BreakerState::Armed;
                self.tripped_at = None;
                true
            }
            _ => false,
        }
    }

    /// Entry orders are rejected while tripped or cooling down; exits
    /// (close_position, panic) are always permitted regardless of state.
    pub fn allows_entries(&self) -> bool {
        self.state == BreakerState::Armed
    }
}

fn rapid_losses(timestamps: &[DateTime<Utc>], count: u32, window: Duration, now: DateTime<Utc>) -> bool {
    let cutoff = now - window;
    timestamps.iter().filter(|ts| **ts >= cutoff).count() as u32 >= count
}
