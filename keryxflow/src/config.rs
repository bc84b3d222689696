//! Configuration surface: the `system` / `risk` / `oracle` /
//! `circuit` key groups, validated at startup against the hardcoded
//! guardrail floors. Anything laxer than a guardrail is clamped to the
//! guardrail value and a warning is logged — the floor always wins.

use chrono::Duration;
use keryxflow_instrument::Symbol;
use keryxflow_risk::breaker::BreakerConfig;
use keryxflow_risk::guardrails::Guardrails;
use keryxflow_ta::AnalyzerConfig;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdapterMode {
    Paper,
    Live,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AiMode {
    Disabled,
    Enhanced,
    Autonomous,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopLossType {
    Atr,
    Fixed,
    Percentage,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemConfig {
    pub mode: AdapterMode,
    pub symbols: Vec<Symbol>,
    pub ai_mode: AiMode,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self { mode: AdapterMode::Paper, symbols: vec![Symbol::new("BTC/USDT")], ai_mode: AiMode::Disabled }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RiskConfig {
    pub risk_per_trade: Decimal,
    pub min_risk_reward: Decimal,
    pub stop_loss_type: StopLossType,
    pub atr_multiplier: Decimal,
    pub trailing_enabled: bool,
    pub trailing_pct: Decimal,
    pub breakeven_enabled: bool,
    pub breakeven_trigger_pct: Decimal,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            risk_per_trade: dec!(0.02),
            min_risk_reward: dec!(2.0),
            stop_loss_type: StopLossType::Atr,
            atr_multiplier: dec!(1.5),
            trailing_enabled: true,
            trailing_pct: dec!(0.02),
            breakeven_enabled: true,
            breakeven_trigger_pct: dec!(0.01),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleConfig {
    pub analyzer: AnalyzerConfigMirror,
    pub analysis_interval_seconds: u64,
    pub llm_enabled: bool,
}

/// `keryxflow_ta::AnalyzerConfig` has no `Serialize`/`Deserialize` (it is a
/// pure-computation type with no persistence contract) — this mirrors its
/// fields for the configuration surface and converts on load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzerConfigMirror {
    pub rsi_period: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub bollinger_period: usize,
    pub bollinger_std: f64,
    pub obv_window: usize,
    pub atr_period: usize,
    pub ema_periods: Vec<usize>,
}

impl From<AnalyzerConfigMirror> for AnalyzerConfig {
    fn from(m: AnalyzerConfigMirror) -> Self {
        AnalyzerConfig {
            rsi_period: m.rsi_period,
            macd_fast: m.macd_fast,
            macd_slow: m.macd_slow,
            macd_signal: m.macd_signal,
            bollinger_period: m.bollinger_period,
            bollinger_std: m.bollinger_std,
            obv_window: m.obv_window,
            atr_period: m.atr_period,
            ema_periods: m.ema_periods,
        }
    }
}

impl Default for OracleConfig {
    fn default() -> Self {
        let default = AnalyzerConfig::default();
        Self {
            analyzer: AnalyzerConfigMirror {
                rsi_period: default.rsi_period,
                macd_fast: default.macd_fast,
                macd_slow: default.macd_slow,
                macd_signal: default.macd_signal,
                bollinger_period: default.bollinger_period,
                bollinger_std: default.bollinger_std,
                obv_window: default.obv_window,
                atr_period: default.atr_period,
                ema_periods: default.ema_periods,
            },
            analysis_interval_seconds: 60,
            llm_enabled: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CircuitConfig {
    pub cooldown_minutes: i64,
    pub rapid_loss_window_seconds: i64,
    pub rapid_loss_count: u32,
}

impl Default for CircuitConfig {
    fn default() -> Self {
        Self { cooldown_minutes: 60, rapid_loss_window_seconds: 3600, rapid_loss_count: 3 }
    }
}

impl CircuitConfig {
    pub fn to_breaker_config(self, guardrails: &Guardrails) -> BreakerConfig {
        BreakerConfig {
            max_daily_loss_pct: guardrails.max_daily_loss_pct,
            max_weekly_loss_pct: guardrails.max_weekly_loss_pct,
            max_drawdown_pct: guardrails.max_drawdown_pct,
            max_consecutive_losses: guardrails.max_consecutive_losses,
            rapid_loss_count: self.rapid_loss_count,
            rapid_loss_window: Duration::seconds(self.rapid_loss_window_seconds),
            cooldown_duration: Duration::minutes(self.cooldown_minutes),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    pub system: SystemConfig,
    pub risk: RiskConfig,
    pub oracle: OracleConfig,
    pub circuit: CircuitConfig,
}

impl Settings {
    /// Validate `self` against `floor` (normally [`Guardrails::production`]);
    /// any configured limit laxer than the floor is clamped down, with a
    /// warning. Returns the clamped settings.
    pub fn validated_against(mut self, floor: &Guardrails) -> Self {
        if self.risk.risk_per_trade > floor.max_loss_per_trade_pct {
            warn!(
                configured = %self.risk.risk_per_trade,
                floor = %floor.max_loss_per_trade_pct,
                "risk_per_trade exceeds guardrail floor; clamping"
            );
            self.risk.risk_per_trade = floor.max_loss_per_trade_pct;
        }
        self
    }
}
