//! Trailing Stop Manager. Break-even always fires before
//! trailing within the same tick; a stop never moves against the position.

use keryxflow_instrument::Side;
use keryxflow_store::TrailingState;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

#[derive(Debug, Clone, Copy)]
pub struct TrailingConfig {
    pub breakeven_enabled: bool,
    pub breakeven_trigger_pct: Decimal,
    pub trailing_enabled: bool,
    pub trailing_pct: Decimal,
    pub atr_mult: Option<Decimal>,
}

impl Default for TrailingConfig {
    fn default() -> Self {
        Self {
            breakeven_enabled: true,
            breakeven_trigger_pct: dec!(0.01),
            trailing_enabled: true,
            trailing_pct: dec!(0.02),
            atr_mult: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TrailingOutcome {
    Unchanged,
    Breakeven { new_stop: Decimal },
    Trailed { new_stop: Decimal },
}

/// Evaluate one price tick against `state` for a position on `side` with
/// `current_stop`. Returns the (possibly updated) state and what, if
/// anything, happened — break-even is checked before trailing, so a tick
/// that qualifies for both reports `Breakeven` (trailing resumes next tick).
pub fn on_tick(
    config: &TrailingConfig,
    side: Side,
    current_stop: Option<Decimal>,
    mut state: TrailingState,
    price: Decimal,
) -> (TrailingState, TrailingOutcome) {
    let unrealized_gain_pct = match side {
        Side::Buy => (price - state.entry) / state.entry,
        Side::Sell => (state.entry - price) / state.entry,
    };

    if config.breakeven_enabled && !state.breakeven_armed && unrealized_gain_pct >= config.breakeven_trigger_pct {
        state.breakeven_armed = true;
        return (state, TrailingOutcome::Breakeven { new_stop: state.entry });
    }

    if !config.trailing_enabled {
        return (state, TrailingOutcome::Unchanged);
    }

    match side {
        Side::Buy => {
            if price > state.highest_favorable_price {
                state.highest_favorable_price = price;
            }
            let candidate = price * (Decimal::ONE - config.trailing_pct);
            let floor = current_stop.unwrap_or(candidate);
            let new_stop = floor.max(candidate);
            if current_stop.map(|s| new_stop > s).unwrap_or(true) {
                state.trailing_active = true;
                (state, TrailingOutcome::Trailed { new_stop })
            } else {
                (state, TrailingOutcome::Unchanged)
            }
        }
        Side::Sell => {
            if price < state.highest_favorable_price || state.highest_favorable_price.is_zero() {
                state.highest_favorable_price = price;
            }
            let candidate = price * (Decimal::ONE + config.trailing_pct);
            let ceiling = current_stop.unwrap_or(candidate);
            let new_stop = ceiling.min(candidate);
            if current_stop.map(|s| new_stop < s).unwrap_or(true) {
                state.trailing_active = true;
                (state, TrailingOutcome::Trailed { new_stop })
            } else {
                (state, TrailingOutcome::Unchanged)
            }
        }
    }
}
