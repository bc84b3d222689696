//! Incremental indicator state. Each indicator exposes an `update` method
//! taking the next candle and returning its directional
//! [`IndicatorResult`], mirroring the `update`/`value` shape of
//! `jackbot-ta::indicators::{SimpleMovingAverage, ExponentialMovingAverage}`.
//!
//! Internally these operate on `f64` — indicator values are floating
//! point; only [`crate::candle::Candle`]'s OHLCV fields and the signal
//! aggregator's entry/stop/target stay `Decimal`.

use keryxflow_instrument::{Direction, Strength};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorResult {
    pub name: &'static str,
    pub value: f64,
    pub direction: Direction,
    pub strength: Strength,
}

/// Relative Strength Index. Oversold/overbought thresholds and the
/// stronger `<20`/`>80` band are hardcoded.
#[derive(Debug, Clone)]
pub struct Rsi {
    period: usize,
    prev_close: Option<f64>,
    avg_gain: f64,
    avg_loss: f64,
    seeded: usize,
    last: Option<f64>,
}

impl Rsi {
    pub fn new(period: usize) -> Self {
        Self { period, prev_close: None, avg_gain: 0.0, avg_loss: 0.0, seeded: 0, last: None }
    }

    pub fn update(&mut self, close: f64) -> Option<IndicatorResult> {
        let Some(prev) = self.prev_close else {
            self.prev_close = Some(close);
            return None;
        };
        self.prev_close = Some(close);

        let change = close - prev;
        let (gain, loss) = if change >= 0.0 { (change, 0.0) } else { (0.0, -change) };

        if self.seeded < self.period {
            self.avg_gain += gain;
            self.avg_loss += loss;
            self.seeded += 1;
            if self.seeded == self.period {
                self.avg_gain /= self.period as f64;
                self.avg_loss /= self.period as f64;
            } else {
                return None;
            }
        } else {
            let n = self.period as f64;
            self.avg_gain = (self.avg_gain * (n - 1.0) + gain) / n;
            self.avg_loss = (self.avg_loss * (n - 1.0) + loss) / n;
        }

        let rsi = if self.avg_loss == 0.0 {
            100.0
        } else {
            let rs = self.avg_gain / self.avg_loss;
            100.0 - 100.0 / (1.0 + rs)
        };
        self.last = Some(rsi);

        let (direction, strength) = if rsi < 20.0 {
            (Direction::Bullish, Strength::Strong)
        } else if rsi < 30.0 {
            (Direction::Bullish, Strength::Moderate)
        } else if rsi > 80.0 {
            (Direction::Bearish, Strength::Strong)
        } else if rsi > 70.0 {
            (Direction::Bearish, Strength::Moderate)
        } else {
            (Direction::Neutral, Strength::None)
        };

        Some(IndicatorResult { name: "rsi", value: rsi, direction, strength })
    }

    pub fn value(&self) -> Option<f64> {
        self.last
    }
}

/// Exponential moving average, also the building block MACD is composed
/// from.
#[derive(Debug, Clone)]
pub struct Ema {
    pub period: usize,
    multiplier: f64,
    value: Option<f64>,
}

impl Ema {
    pub fn new(period: usize) -> Self {
        Self { period, multiplier: 2.0 / (period as f64 + 1.0), value: None }
    }

    pub fn update(&mut self, price: f64) -> f64 {
        let next = match self.value {
            Some(prev) => (price - prev) * self.multiplier + prev,
            None => price,
        };
        self.value = Some(next);
        next
    }

    pub fn value(&self) -> Option<f64> {
        self.value
    }
}

/// MACD: fast/slow EMA spread plus a signal-line EMA of that spread.
/// Bullish on an upward signal-line crossover, bearish on the opposite;
/// strength scales with histogram magnitude.
#[derive(Debug, Clone)]
pub struct Macd {
    fast: Ema,
    slow: Ema,
    signal: Ema,
    prev_histogram: Option<f64>,
}

impl Macd {
    pub fn new(fast_period: usize, slow_period: usize, signal_period: usize) -> Self {
        Self {
            fast: Ema::new(fast_period),
            slow: Ema::new(slow_period),
            signal: Ema::new(signal_period),
            prev_histogram: None,
        }
    }

    pub fn update(&mut self, close: f64) -> Option<IndicatorResult> {
        let fast = self.fast.update(close);
        let slow = self.slow.update(close);
        let macd_line = fast - slow;
        let signal_line = self.signal.update(macd_line);
        let histogram = macd_line - signal_line;

        let prev = self.prev_histogram;
        self.prev_histogram = Some(histogram);

        let Some(prev_histogram) = prev else {
            return None;
        };

        let crossed_up = prev_histogram <= 0.0 && histogram > 0.0;
        let crossed_down = prev_histogram >= 0.0 && histogram < 0.0;

        let direction = if crossed_up {
            Direction::Bullish
        } else if crossed_down {
            Direction::Bearish
        } else if histogram > 0.0 {
            Direction::Bullish
        } else if histogram < 0.0 {
            Direction::Bearish
        } else {
            Direction::Neutral
        };

        let magnitude = histogram.abs();
        let strength = if magnitude > 1.0 {
            Strength::Strong
        } else if magnitude > 0.3 {
            Strength::Moderate
        } else if magnitude > 0.05 {
            Strength::Weak
        } else {
            Strength::None
        };

        Some(IndicatorResult { name: "macd", value: histogram, direction, strength })
    }
}

/// Bollinger Bands. `pos` locates price within the band; extremes flag
/// mean-reversion signals.
#[derive(Debug, Clone)]
pub struct BollingerBands {
    period: usize,
    std_mult: f64,
    window: VecDeque<f64>,
}

impl BollingerBands {
    pub fn new(period: usize, std_mult: f64) -> Self {
        Self { period, std_mult, window: VecDeque::with_capacity(period) }
    }

    pub fn update(&mut self, close: f64) -> Option<IndicatorResult> {
        self.window.push_back(close);
        if self.window.len() > self.period {
            self.window.pop_front();
        }
        if self.window.len() < self.period {
            return None;
        }

        let mean = self.window.iter().sum::<f64>() / self.period as f64;
        let variance = self.window.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / self.period as f64;
        let std_dev = variance.sqrt();

        let upper = mean + self.std_mult * std_dev;
        let lower = mean - self.std_mult * std_dev;

        if (upper - lower).abs() < f64::EPSILON {
            return Some(IndicatorResult { name: "bollinger", value: 0.5, direction: Direction::Neutral, strength: Strength::None });
        }

        let pos = (close - lower) / (upper - lower);

        let (direction, strength) = if pos < 0.05 {
            (Direction::Bullish, Strength::Strong)
        } else if pos < 0.3 {
            (Direction::Bullish, if pos < 0.15 { Strength::Moderate } else { Strength::Weak })
        } else if pos > 0.95 {
            (Direction::Bearish, Strength::Strong)
        } else if pos > 0.7 {
            (Direction::Bearish, if pos > 0.85 { Strength::Moderate } else { Strength::Weak })
        } else {
            (Direction::Neutral, Strength::None)
        };

        Some(IndicatorResult { name: "bollinger", value: pos, direction, strength })
    }
}

/// On-Balance Volume. Direction is the slope of the last `window` points.
#[derive(Debug, Clone)]
pub struct Obv {
    cumulative: f64,
    prev_close: Option<f64>,
    history: VecDeque<f64>,
    window: usize,
}

impl Obv {
    pub fn new(window: usize) -> Self {
        Self { cumulative: 0.0, prev_close: None, history: VecDeque::with_capacity(window), window }
    }

    pub fn update(&mut self, close: f64, volume: f64) -> Option<IndicatorResult> {
        if let Some(prev) = self.prev_close {
            if close > prev {
                self.cumulative += volume;
            } else if close < prev {
                self.cumulative -= volume;
            }
        }
        self.prev_close = Some(close);

        self.history.push_back(self.cumulative);
        if self.history.len() > self.window {
            self.history.pop_front();
        }
        if self.history.len() < self.window {
            return None;
        }

        let slope = (self.history.back().unwrap() - self.history.front().unwrap()) / self.window as f64;

        let (direction, strength) = if slope > 0.0 {
            (Direction::Bullish, if slope.abs() > self.cumulative.abs().max(1.0) * 0.1 { Strength::Strong } else { Strength::Weak })
        } else if slope < 0.0 {
            (Direction::Bearish, if slope.abs() > self.cumulative.abs().max(1.0) * 0.1 { Strength::Strong } else { Strength::Weak })
        } else {
            (Direction::Neutral, Strength::None)
        };

        Some(IndicatorResult { name: "obv", value: self.cumulative, direction, strength })
    }
}

/// Average True Range over `period` candles (Wilder smoothing).
#[derive(Debug, Clone)]
pub struct Atr {
    period: usize,
    prev_close: Option<f64>,
    avg_tr: f64,
    seeded: usize,
}

impl Atr {
    pub fn new(period: usize) -> Self {
        Self { period, prev_close: None, avg_tr: 0.0, seeded: 0 }
    }

    pub fn update(&mut self, high: f64, low: f64, close: f64) -> Option<f64> {
        let tr = match self.prev_close {
            Some(prev) => (high - low).max((high - prev).abs()).max((low - prev).abs()),
            None => high - low,
        };
        self.prev_close = Some(close);

        if self.seeded < self.period {
            self.avg_tr += tr;
            self.seeded += 1;
            if self.seeded == self.period {
                self.avg_tr /= self.period as f64;
                return Some(self.avg_tr);
            }
            return None;
        }

        let n = self.period as f64;
        self.avg_tr = (self.avg_tr * (n - 1.0) + tr) / n;
        Some(self.avg_tr)
    }

    pub fn value(&self) -> Option<f64> {
        (self.seeded >= self.period).then_some(self.avg_tr)
    }
}
