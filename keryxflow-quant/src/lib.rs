//! Stateless numeric primitives. Every function here is pure —
//! no I/O, no shared state — so the risk manager and signal aggregator can
//! call them without suspending.
//!
//! Money/price arguments and their outputs are [`Decimal`]; this is the
//! only module permitted to bridge fixed-point money into `Decimal` maths
//! operations like `sqrt`. Callers convert results back to
//! fixed-point order-size granularity at the sizing boundary.

use rust_decimal::{Decimal, MathematicalOps};

/// Safety cap applied to [`kelly_fraction`] regardless of the raw Kelly
/// value — a hard min/max clamp on any derived sizing factor, the same
/// convention `VolatilityScaler`-style sizing helpers use.
pub const DEFAULT_KELLY_CAP: Decimal = Decimal::from_parts(25, 0, 0, false, 2); // 0.25

/// `(balance * risk_pct) / |entry - stop|`. Returns `0` if `entry == stop`
/// (undefined risk-per-unit). Always non-negative.
pub fn position_size(balance: Decimal, risk_pct: Decimal, entry: Decimal, stop: Decimal) -> Decimal {
    let risk_per_unit = (entry - stop).abs();
    if risk_per_unit.is_zero() {
        return Decimal::ZERO;
    }
    (balance * risk_pct) / risk_per_unit
}

/// Standard Kelly fraction `f* = p - (1-p)/b` where `b = avg_win/avg_loss`,
/// clamped to `[0, cap]`. Returns `0` if `avg_loss <= 0` or
/// `win_rate` is not strictly between `0` and `1`.
pub fn kelly_fraction(win_rate: Decimal, avg_win: Decimal, avg_loss: Decimal, cap: Decimal) -> Decimal {
    if avg_loss <= Decimal::ZERO || win_rate <= Decimal::ZERO || win_rate >= Decimal::ONE {
        return Decimal::ZERO;
    }
    let b = avg_win / avg_loss;
    if b.is_zero() {
        return Decimal::ZERO;
    }
    let loss_rate = Decimal::ONE - win_rate;
    let raw = win_rate - (loss_rate / b);

    raw.clamp(Decimal::ZERO, cap)
}

/// `entry - mult*atr` for a long, `entry + mult*atr` for a short.
pub fn atr_stop(entry: Decimal, atr: Decimal, mult: Decimal, is_long: bool) -> Decimal {
    if is_long {
        entry - mult * atr
    } else {
        entry + mult * atr
    }
}

/// `|target - entry| / |entry - stop|`. Returns `0` if the denominator is
/// zero.
pub fn risk_reward(entry: Decimal, stop: Decimal, target: Decimal) -> Decimal {
    let risk = (entry - stop).abs();
    if risk.is_zero() {
        return Decimal::ZERO;
    }
    (target - entry).abs() / risk
}

/// Running-peak drawdown over an equity curve. Returns `(current_dd,
/// max_dd)` as non-positive fractions (`0` = no drawdown, `-0.2` = 20%
/// below peak).
pub fn drawdown(equity_curve: &[Decimal]) -> (Decimal, Decimal) {
    if equity_curve.is_empty() {
        return (Decimal::ZERO, Decimal::ZERO);
    }

    let mut peak = equity_curve[0];
    let mut max_dd = Decimal::ZERO;
    let mut current_dd = Decimal::ZERO;

    for &equity in equity_curve {
        if equity > peak {
            peak = equity;
        }
        if !peak.is_zero() {
            current_dd = (equity - peak) / peak;
            if current_dd < max_dd {
                max_dd = current_dd;
            }
        }
    }

    (current_dd, max_dd)
}

/// `(mean(r - rf) / stddev(r - rf)) * sqrt(252)`, the daily-returns
/// annualization convention. Returns `0` for fewer than two samples or
/// zero variance (undefined ratio, not a divide-by-zero panic).
pub fn sharpe(returns: &[Decimal], rf: Decimal) -> Decimal {
    if returns.len() < 2 {
        return Decimal::ZERO;
    }

    let excess: Vec<Decimal> = returns.iter().map(|r| *r - rf).collect();
    let n = Decimal::from(excess.len());
    let mean = excess.iter().sum::<Decimal>() / n;

    let variance = excess
        .iter()
        .map(|r| {
            let diff = *r - mean;
            diff * diff
        })
        .sum::<Decimal>()
        / n;

    let Some(std_dev) = variance.sqrt() else {
        return Decimal::ZERO;
    };
    if std_dev.is_zero() {
        return Decimal::ZERO;
    }

    let annualization = Decimal::from(252u32).sqrt().unwrap_or(Decimal::ZERO);
    (mean / std_dev) * annualization
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn position_size_zero_risk_per_unit() {
        assert_eq!(position_size(dec!(10000), dec!(0.02), dec!(100), dec!(100)), Decimal::ZERO);
    }

    #[test]
    fn position_size_standard() {
        // risk 200, stop distance 2 => 100 units
        assert_eq!(position_size(dec!(10000), dec!(0.02), dec!(100), dec!(98)), dec!(100));
    }

    #[test]
    fn kelly_clamped_to_cap() {
        // huge edge: p=0.9, b=10 -> raw way above cap
        let f = kelly_fraction(dec!(0.9), dec!(10), dec!(1), DEFAULT_KELLY_CAP);
        assert_eq!(f, DEFAULT_KELLY_CAP);
    }

    #[test]
    fn kelly_zero_on_bad_inputs() {
        assert_eq!(kelly_fraction(dec!(0.5), dec!(1), dec!(0), DEFAULT_KELLY_CAP), Decimal::ZERO);
        assert_eq!(kelly_fraction(dec!(0), dec!(1), dec!(1), DEFAULT_KELLY_CAP), Decimal::ZERO);
        assert_eq!(kelly_fraction(dec!(1), dec!(1), dec!(1), DEFAULT_KELLY_CAP), Decimal::ZERO);
    }

    #[test]
    fn atr_stop_long_and_short() {
        assert_eq!(atr_stop(dec!(100), dec!(2), dec!(1.5), true), dec!(97));
        assert_eq!(atr_stop(dec!(100), dec!(2), dec!(1.5), false), dec!(103));
    }

    #[test]
    fn risk_reward_standard_and_zero_denominator() {
        assert_eq!(risk_reward(dec!(100), dec!(98), dec!(104)), dec!(2));
        assert_eq!(risk_reward(dec!(100), dec!(100), dec!(104)), Decimal::ZERO);
    }

    #[test]
    fn drawdown_tracks_peak_to_trough() {
        let curve = vec![dec!(100), dec!(110), dec!(90), dec!(95)];
        let (current, max) = drawdown(&curve);
        // trough of 90 from peak of 110 => -0.1818..., recovers slightly to 95
        assert!(max < dec!(-0.18) && max > dec!(-0.19));
        assert!(current < Decimal::ZERO && current > max);
    }

    #[test]
    fn sharpe_needs_two_samples() {
        assert_eq!(sharpe(&[dec!(0.01)], Decimal::ZERO), Decimal::ZERO);
    }

    #[test]
    fn sharpe_zero_variance_is_zero() {
        let returns = vec![dec!(0.01), dec!(0.01), dec!(0.01)];
        assert_eq!(sharpe(&returns, Decimal::ZERO), Decimal::ZERO);
    }

    #[test]
    fn sharpe_positive_for_positive_mean_returns() {
        let returns = vec![dec!(0.01), dec!(0.02), dec!(-0.005), dec!(0.015)];
        let ratio = sharpe(&returns, Decimal::ZERO);
        assert!(ratio > Decimal::ZERO);
    }
}
