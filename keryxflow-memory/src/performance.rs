//! Recent-performance rollup over the trade log: win rate and average
//! win/loss, the inputs `keryxflow_quant::kelly_fraction` needs, computed
//! from the store's trade history rather than a live running accumulator.

use keryxflow_store::{Store, Trade};
use rust_decimal::Decimal;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecentPerformance {
    pub trade_count: u32,
    pub win_rate: Decimal,
    pub avg_win: Decimal,
    pub avg_loss: Decimal,
}

/// Summarize the most recent `window` trades (all trades if fewer exist).
pub fn recent_performance(store: &Store, window: usize) -> RecentPerformance {
    let trades = store.recent_trades(window);
    summarize(&trades)
}

fn summarize(trades: &[Trade]) -> RecentPerformance {
    if trades.is_empty() {
        return RecentPerformance { trade_count: 0, win_rate: Decimal::ZERO, avg_win: Decimal::ZERO, avg_loss: Decimal::ZERO };
    }

    let wins: Vec<Decimal> = trades.iter().filter(|t| t.pnl > Decimal::ZERO).map(|t| t.pnl).collect();
    let losses: Vec<Decimal> = trades.iter().filter(|t| t.pnl < Decimal::ZERO).map(|t| t.pnl.abs()).collect();

    let win_rate = Decimal::from(wins.len() as u64) / Decimal::from(trades.len() as u64);
    let avg_win = average(&wins);
    let avg_loss = average(&losses);

    RecentPerformance { trade_count: trades.len() as u32, win_rate, avg_win, avg_loss }
}

fn average(values: &[Decimal]) -> Decimal {
    if values.is_empty() {
        return Decimal::ZERO;
    }
    values.iter().sum::<Decimal>() / Decimal::from(values.len() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use keryxflow_instrument::{Side, Symbol};
    use keryxflow_store::{ExitReason, TradeId};
    use rust_decimal_macros::dec;

    fn trade(pnl: Decimal) -> Trade {
        Trade::new(
            TradeId::new(),
            Symbol::new("BTC/USDT"),
            Side::Buy,
            dec!(1),
            dec!(100),
            dec!(100) + pnl,
            Utc::now(),
            Utc::now(),
            pnl,
            pnl / dec!(100),
            ExitReason::Signal,
            true,
        )
    }

    #[test]
    fn empty_trade_log_has_zeroed_performance() {
        let store = Store::in_memory();
        let perf = recent_performance(&store, 20);
        assert_eq!(perf.trade_count, 0);
        assert_eq!(perf.win_rate, Decimal::ZERO);
    }

    #[test]
    fn mixed_wins_and_losses_compute_rate_and_averages() {
        let store = Store::in_memory();
        store.append_trade(trade(dec!(10))).unwrap();
        store.append_trade(trade(dec!(20))).unwrap();
        store.append_trade(trade(dec!(-5))).unwrap();

        let perf = recent_performance(&store, 20);
        assert_eq!(perf.trade_count, 3);
        assert_eq!(perf.win_rate, Decimal::from(2) / Decimal::from(3));
        assert_eq!(perf.avg_win, dec!(15));
        assert_eq!(perf.avg_loss, dec!(5));
    }

    #[test]
    fn window_limits_to_most_recent_trades() {
        let store = Store::in_memory();
        for _ in 0..5 {
            store.append_trade(trade(dec!(10))).unwrap();
        }
        store.append_trade(trade(dec!(-100))).unwrap();

        let perf = recent_performance(&store, 1);
        assert_eq!(perf.trade_count, 1);
        assert_eq!(perf.avg_loss, dec!(100));
    }
}
