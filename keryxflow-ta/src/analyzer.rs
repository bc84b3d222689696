//! The Technical Analyzer: pure aggregation of per-indicator
//! directional scores into one `Analysis` per candle close. No I/O, no
//! hidden time/state beyond the indicators' own warm-up windows.

use crate::candle::Candle;
use crate::indicators::{Atr, BollingerBands, Ema, IndicatorResult, Macd, Obv, Rsi};
use chrono::{DateTime, Utc};
use keryxflow_instrument::{Direction, Strength, Symbol};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
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

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            rsi_period: 14,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            bollinger_period: 20,
            bollinger_std: 2.0,
            obv_window: 10,
            atr_period: 14,
            ema_periods: vec![9, 21, 50, 200],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    pub symbol: Symbol,
    pub timestamp: DateTime<Utc>,
    pub close: Decimal,
    pub atr: Option<f64>,
    pub indicators: Vec<IndicatorResult>,
    pub direction: Direction,
    pub strength: Strength,
    pub confidence: f64,
}

pub struct TechnicalAnalyzer {
    config: AnalyzerConfig,
    rsi: Rsi,
    macd: Macd,
    bollinger: BollingerBands,
    obv: Obv,
    atr: Atr,
    emas: Vec<Ema>,
}

impl TechnicalAnalyzer {
    pub fn new(config: AnalyzerConfig) -> Self {
        let emas = config.ema_periods.iter().map(|&p| Ema::new(p)).collect();
        Self {
            rsi: Rsi::new(config.rsi_period),
            macd: Macd::new(config.macd_fast, config.macd_slow, config.macd_signal),
            bollinger: BollingerBands::new(config.bollinger_period, config.bollinger_std),
            obv: Obv::new(config.obv_window),
            atr: Atr::new(config.atr_period),
            emas,
            config,
        }
    }

    /// Feed a complete candle and produce the aggregated [`Analysis`].
    /// Callers must only invoke this with `candle.complete == true`.
    pub fn update(&mut self, candle: &Candle) -> Analysis {
        let close = candle.close_f64();
        let mut indicators = Vec::new();

        if let Some(r) = self.rsi.update(close) {
            indicators.push(r);
        }
        if let Some(r) = self.macd.update(close) {
            indicators.push(r);
        }
        if let Some(r) = self.bollinger.update(close) {
            indicators.push(r);
        }
        if let Some(r) = self.obv.update(close, candle.volume_f64()) {
            indicators.push(r);
        }
        let atr_value = self.atr.update(candle.high_f64(), candle.low_f64(), close);

        let ema_values: Vec<Option<f64>> = self.emas.iter_mut().map(|ema| Some(ema.update(close))).collect();
        if ema_values.iter().all(Option::is_some) {
            let values: Vec<f64> = ema_values.into_iter().flatten().collect();
            indicators.push(ema_alignment(&values, close, &self.config.ema_periods));
        }

        let (direction, strength, confidence) = aggregate(&indicators);

        Analysis {
            symbol: candle.symbol.clone(),
            timestamp: candle.open_time,
            close: candle.close,
            atr: atr_value,
            indicators,
            direction,
            strength,
            confidence,
        }
    }
}

/// EMA alignment: all shorter EMAs above all longer EMAs with
/// price above all of them is a strong bullish stack; fully inverted is a
/// strong bearish stack; anything else is a partial alignment scored by how
/// many consecutive pairs agree.
fn ema_alignment(values: &[f64], price: f64, periods: &[usize]) -> IndicatorResult {
    debug_assert_eq!(values.len(), periods.len());
    let _ = periods;

    if values.len() < 2 {
        return IndicatorResult { name: "ema_alignment", value: 0.0, direction: Direction::Neutral, strength: Strength::None };
    }

    let total_pairs = values.len() - 1;
    let bullish_pairs = values.windows(2).filter(|w| w[0] > w[1]).count();
    let bearish_pairs = values.windows(2).filter(|w| w[0] < w[1]).count();
    let price_above_all = values.iter().all(|&v| price > v);
    let price_below_all = values.iter().all(|&v| price < v);
    let score = (bullish_pairs as f64 - bearish_pairs as f64) / total_pairs as f64;

    let (direction, strength) = if bullish_pairs == total_pairs && price_above_all {
        (Direction::Bullish, Strength::Strong)
    } else if bearish_pairs == total_pairs && price_below_all {
        (Direction::Bearish, Strength::Strong)
    } else if bullish_pairs > bearish_pairs {
        (Direction::Bullish, if price > values[0] { Strength::Moderate } else { Strength::Weak })
    } else if bearish_pairs > bullish_pairs {
        (Direction::Bearish, if price < values[0] { Strength::Moderate } else { Strength::Weak })
    } else {
        (Direction::Neutral, Strength::None)
    };

    IndicatorResult { name: "ema_alignment", value: score, direction, strength }
}

/// Weighted-confidence aggregation: confidence is the
/// polarity-weighted sum normalized by the maximum possible weight.
fn aggregate(indicators: &[IndicatorResult]) -> (Direction, Strength, f64) {
    if indicators.is_empty() {
        return (Direction::Neutral, Strength::None, 0.0);
    }

    let weighted_sum: i64 = indicators
        .iter()
        .map(|r| r.strength.weight() as i64 * r.direction.polarity() as i64)
        .sum();
    let max_weight: i64 = indicators.len() as i64 * Strength::Strong.weight() as i64;

    let confidence = if max_weight == 0 { 0.0 } else { weighted_sum.unsigned_abs() as f64 / max_weight as f64 };

    let direction = match weighted_sum.cmp(&0) {
        std::cmp::Ordering::Greater => Direction::Bullish,
        std::cmp::Ordering::Less => Direction::Bearish,
        std::cmp::Ordering::Equal => Direction::Neutral,
    };

    let strength = if confidence >= 0.7 {
        Strength::Strong
    } else if confidence >= 0.4 {
        Strength::Moderate
    } else if confidence > 0.0 {
        Strength::Weak
    } else {
        Strength::None
    };

    (direction, strength, confidence)
}
