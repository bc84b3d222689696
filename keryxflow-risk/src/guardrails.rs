//! Hardcoded upper bounds on position size, exposure, and loss. Compiled-in
//! and loaded once; runtime configuration may only tighten a limit, never
//! relax it.

use keryxflow_instrument::Symbol;
use keryxflow_store::PortfolioSnapshot;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Every action the Guardrail Enforcer is asked to validate. `NoOp` always
/// allows — it exists so "allowed action kinds" is a closed, checkable set.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    MarketBuy { symbol: Symbol, notional: Decimal, risk_pct: Decimal },
    MarketSell { symbol: Symbol, notional: Decimal, risk_pct: Decimal },
    LimitBuy { symbol: Symbol, notional: Decimal, risk_pct: Decimal },
    LimitSell { symbol: Symbol, notional: Decimal, risk_pct: Decimal },
    Cancel { symbol: Symbol },
    Close { symbol: Symbol },
    SetStop { symbol: Symbol },
    SetTarget { symbol: Symbol },
    NoOp,
}

impl Action {
    fn is_entry(&self) -> bool {
        matches!(
            self,
            Action::MarketBuy { .. } | Action::MarketSell { .. } | Action::LimitBuy { .. } | Action::LimitSell { .. }
        )
    }

    fn symbol(&self) -> Option<&Symbol> {
        match self {
            Action::MarketBuy { symbol, .. }
            | Action::MarketSell { symbol, .. }
            | Action::LimitBuy { symbol, .. }
            | Action::LimitSell { symbol, .. }
            | Action::Cancel { symbol }
            | Action::Close { symbol }
            | Action::SetStop { symbol }
            | Action::SetTarget { symbol } => Some(symbol),
            Action::NoOp => None,
        }
    }

    fn notional(&self) -> Decimal {
        match self {
            Action::MarketBuy { notional, .. }
            | Action::MarketSell { notional, .. }
            | Action::LimitBuy { notional, .. }
            | Action::LimitSell { notional, .. } => *notional,
            _ => Decimal::ZERO,
        }
    }

    fn risk_pct(&self) -> Decimal {
        match self {
            Action::MarketBuy { risk_pct, .. }
            | Action::MarketSell { risk_pct, .. }
            | Action::LimitBuy { risk_pct, .. }
            | Action::LimitSell { risk_pct, .. } => *risk_pct,
            _ => Decimal::ZERO,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    Allow,
    Deny { reason: String },
}

impl Verdict {
    pub fn is_allow(&self) -> bool {
        matches!(self, Verdict::Allow)
    }

    fn deny(reason: impl Into<String>) -> Self {
        Verdict::Deny { reason: reason.into() }
    }
}

/// Frozen limit set. `production()` is the compiled-in default; a deployment
/// may only call [`Guardrails::tightened_by`] to lower a bound further.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Guardrails {
    pub max_position_pct: Decimal,
    pub max_aggregate_exposure_pct: Decimal,
    pub min_cash_reserve_pct: Decimal,
    pub max_loss_per_trade_pct: Decimal,
    pub max_aggregate_risk_pct: Decimal,
    pub max_daily_loss_pct: Decimal,
    pub max_weekly_loss_pct: Decimal,
    pub max_drawdown_pct: Decimal,
    pub max_consecutive_losses: u32,
    pub max_trades_per_hour: u32,
    pub max_trades_per_day: u32,
}

impl Guardrails {
    pub fn production() -> Self {
        Self {
            max_position_pct: dec!(0.10),
            max_aggregate_exposure_pct: dec!(0.50),
            min_cash_reserve_pct: dec!(0.20),
            max_loss_per_trade_pct: dec!(0.02),
            max_aggregate_risk_pct: dec!(0.05),
            max_daily_loss_pct: dec!(0.05),
            max_weekly_loss_pct: dec!(0.10),
            max_drawdown_pct: dec!(0.20),
            max_consecutive_losses: 5,
            max_trades_per_hour: 10,
            max_trades_per_day: 50,
        }
    }

    /// Apply a tighter configuration on top of `self`. Any field in
    /// `tighter` that would relax a bound is ignored — limits only ever
    /// shrink.
    pub fn tightened_by(&self, tighter: &Guardrails) -> Self {
        Self {
            max_position_pct: self.max_position_pct.min(tighter.max_position_pct),
            max_aggregate_exposure_pct: self.max_aggregate_exposure_pct.min(tighter.max_aggregate_exposure_pct),
            min_cash_reserve_pct: self.min_cash_reserve_pct.max(tighter.min_cash_reserve_pct),
            max_loss_per_trade_pct: self.max_loss_per_trade_pct.min(tighter.max_loss_per_trade_pct),
            max_aggregate_risk_pct: self.max_aggregate_risk_pct.min(tighter.max_aggregate_risk_pct),
            max_daily_loss_pct: self.max_daily_loss_pct.min(tighter.max_daily_loss_pct),
            max_weekly_loss_pct: self.max_weekly_loss_pct.min(tighter.max_weekly_loss_pct),
            max_drawdown_pct: self.max_drawdown_pct.min(tighter.max_drawdown_pct),
            max_consecutive_losses: self.max_consecutive_losses.min(tighter.max_consecutive_losses),
            max_trades_per_hour: self.max_trades_per_hour.min(tighter.max_trades_per_hour),
            max_trades_per_day: self.max_trades_per_day.min(tighter.max_trades_per_day),
        }
    }
}

/// Whitelist of tradeable symbols, checked separately from the numeric
/// limits above since it has no "tighten" semantics beyond set shrinkage.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolWhitelist(Vec<Symbol>);

impl SymbolWhitelist {
    pub fn new(symbols: Vec<Symbol>) -> Self {
        Self(symbols)
    }

    pub fn allows(&self, symbol: &Symbol) -> bool {
        self.0.iter().any(|s| s == symbol)
    }
}

/// Validate `action` against `guardrails` using `snapshot` of the portfolio
/// *before* the proposed action. `snapshot.current_risk_pct` already carries
/// the risk open positions have at stake; this adds `action.risk_pct()` on
/// top before comparing to `max_aggregate_risk_pct`, so e.g. a third 2%-risk
/// trade correctly rejects once the prior two already consume 4%.
pub fn validate(
    action: &Action,
    guardrails: &Guardrails,
    whitelist: &SymbolWhitelist,
    snapshot: &PortfolioSnapshot,
) -> Verdict {
    if let Some(symbol) = action.symbol() {
        if !whitelist.allows(symbol) {
            return Verdict::deny(format!("symbol {symbol} not in whitelist"));
        }
    }

    if !action.is_entry() {
        return Verdict::Allow;
    }

    if snapshot.total_value <= Decimal::ZERO {
        return Verdict::deny("portfolio has no value");
    }

    let position_pct = action.notional() / snapshot.total_value;
    if position_pct > guardrails.max_position_pct {
        return Verdict::deny(format!(
            "position size {position_pct} exceeds max {}",
            guardrails.max_position_pct
        ));
    }

    let exposure_pct = snapshot.current_exposure / snapshot.total_value;
    if exposure_pct > guardrails.max_aggregate_exposure_pct {
        return Verdict::deny(format!(
            "aggregate exposure {exposure_pct} exceeds max {}",
            guardrails.max_aggregate_exposure_pct
        ));
    }

    let cash_reserve_pct = snapshot.cash_free / snapshot.total_value;
    if cash_reserve_pct < guardrails.min_cash_reserve_pct {
        return Verdict::deny(format!(
            "cash reserve {cash_reserve_pct} below min {}",
            guardrails.min_cash_reserve_pct
        ));
    }

    if action.risk_pct() > guardrails.max_loss_per_trade_pct {
        return Verdict::deny(format!(
            "stop too far: risk {} exceeds max {}",
            action.risk_pct(),
            guardrails.max_loss_per_trade_pct
        ));
    }

    let aggregate_risk_pct = snapshot.current_risk_pct + action.risk_pct();
    if aggregate_risk_pct > guardrails.max_aggregate_risk_pct {
        return Verdict::deny(format!(
            "aggregate at-risk {aggregate_risk_pct} exceeds max {}",
            guardrails.max_aggregate_risk_pct
        ));
    }

    if snapshot.trades_in_last_hour >= guardrails.max_trades_per_hour {
        return Verdict::deny("max trades per hour reached");
    }

    if snapshot.trades_today >= guardrails.max_trades_per_day {
        return Verdict::deny("max trades per day reached");
    }

    Verdict::Allow
}

#[cfg(test)]
mod tests {
    use super::*;
    use keryxflow_instrument::Symbol;

    fn snapshot() -> PortfolioSnapshot {
        PortfolioSnapshot {
            total_value: dec!(10000),
            cash_free: dec!(8000),
            cash_locked: dec!(0),
            open_positions_count: 0,
            current_exposure: dec!(0),
            current_risk_pct: dec!(0),
            peak_equity: dec!(10000),
            daily_start_equity: dec!(10000),
            weekly_start_equity: dec!(10000),
            consecutive_losses: 0,
            daily_loss_pct: dec!(0),
            weekly_loss_pct: dec!(0),
            trades_in_last_hour: 0,
            trades_today: 0,
        }
    }

    fn whitelist() -> SymbolWhitelist {
        SymbolWhitelist::new(vec![Symbol::new("BTC/USDT")])
    }

    #[test]
    fn rejects_unlisted_symbol() {
        let action = Action::MarketBuy {
            symbol: Symbol::new("DOGE/USDT"),
            notional: dec!(100),
            risk_pct: dec!(0.01),
        };
        let verdict = validate(&action, &Guardrails::production(), &whitelist(), &snapshot());
        assert!(!verdict.is_allow());
    }

    #[test]
    fn rejects_oversized_position() {
        let action = Action::MarketBuy {
            symbol: Symbol::new("BTC/USDT"),
            notional: dec!(2000),
            risk_pct: dec!(0.01),
        };
        let verdict = validate(&action, &Guardrails::production(), &whitelist(), &snapshot());
        assert!(!verdict.is_allow());
    }

    #[test]
    fn allows_within_bounds() {
        let action = Action::MarketBuy {
            symbol: Symbol::new("BTC/USDT"),
            notional: dec!(500),
            risk_pct: dec!(0.01),
        };
        let verdict = validate(&action, &Guardrails::production(), &whitelist(), &snapshot());
        assert_eq!(verdict, Verdict::Allow);
    }

    #[test]
    fn third_two_percent_risk_trade_rejects_on_aggregate() {
        // Two existing positions already risk 2% apiece (4% total); a third
        // 2%-risk entry would push the book to 6%, over the 5% cap, even
        // though its own risk_pct and notional are both within their
        // individual per-trade limits.
        let mut snap = snapshot();
        snap.current_risk_pct = dec!(0.04);
        let action = Action::MarketBuy {
            symbol: Symbol::new("BTC/USDT"),
            notional: dec!(100),
            risk_pct: dec!(0.02),
        };
        let verdict = validate(&action, &Guardrails::production(), &whitelist(), &snap);
        assert!(!verdict.is_allow());
    }

    #[test]
    fn tightened_by_never_relaxes() {
        let base = Guardrails::production();
        let looser = Guardrails { max_position_pct: dec!(0.90), ..Guardrails::production() };
        let result = base.tightened_by(&looser);
        assert_eq!(result.max_position_pct, base.max_position_pct);
    }

    #[test]
    fn exit_actions_skip_sizing_checks() {
        let action = Action::Close { symbol: Symbol::new("BTC/USDT") };
        let mut snap = snapshot();
        snap.cash_free = dec!(0);
        let verdict = validate(&action, &Guardrails::production(), &whitelist(), &snap);
        assert_eq!(verdict, Verdict::Allow);
    }
}
