//! Per-symbol rolling OHLCV ring buffer. Owned by the engine;
//! the rest of the system only ever sees immutable snapshots.

use chrono::{DateTime, DurationRound, TimeDelta, Utc};
use keryxflow_instrument::Symbol;
use keryxflow_ta::Candle;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

pub const DEFAULT_CAPACITY: usize = 500;

struct SymbolBuffer {
    capacity: usize,
    completed: VecDeque<Candle>,
    in_progress: Option<Candle>,
}

impl SymbolBuffer {
    fn new(capacity: usize) -> Self {
        Self { capacity, completed: VecDeque::with_capacity(capacity), in_progress: None }
    }

    fn push_completed(&mut self, candle: Candle) {
        if self.completed.len() == self.capacity {
            self.completed.pop_front();
        }
        self.completed.push_back(candle);
    }

    /// Returns `Some(candle)` when a tick finalizes the in-progress candle
    /// (minute boundary crossed), in which case that finalized candle
    /// should also be appended to `completed`.
    fn on_tick(&mut self, symbol: &Symbol, price: Decimal, volume: Decimal, ts: DateTime<Utc>) -> Option<Candle> {
        let bucket = minute_bucket(ts);

        match &mut self.in_progress {
            Some(candle) if candle.open_time == bucket => {
                candle.high = candle.high.max(price);
                candle.low = candle.low.min(price);
                candle.close = price;
                candle.volume += volume;
                None
            }
            Some(candle) => {
                candle.complete = true;
                let finished = candle.clone();
                self.push_completed(finished.clone());
                self.in_progress = Some(Candle {
                    symbol: symbol.clone(),
                    open_time: bucket,
                    open: price,
                    high: price,
                    low: price,
                    close: price,
                    volume,
                    complete: false,
                });
                Some(finished)
            }
            None => {
                self.in_progress = Some(Candle {
                    symbol: symbol.clone(),
                    open_time: bucket,
                    open: price,
                    high: price,
                    low: price,
                    close: price,
                    volume,
                    complete: false,
                });
                None
            }
        }
    }

    /// Point-in-time snapshot. Never includes the in-progress candle.
    fn snapshot(&self) -> Vec<Candle> {
        self.completed.iter().cloned().collect()
    }

    fn seed(&mut self, history: Vec<Candle>) {
        for candle in history {
            self.push_completed(candle);
        }
    }
}

fn minute_bucket(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.duration_trunc(TimeDelta::minutes(1)).unwrap_or(ts)
}

/// Thread-safe collection of per-symbol ring buffers. Candle-close events
/// are the caller's responsibility to emit — `on_tick` only tells you
/// whether one occurred.
#[derive(Clone)]
pub struct OhlcvBuffer {
    capacity: usize,
    symbols: Arc<Mutex<HashMap<Symbol, SymbolBuffer>>>,
}

impl OhlcvBuffer {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self { capacity, symbols: Arc::new(Mutex::new(HashMap::new())) }
    }

    /// Seed a symbol's history from a historical fetch. Overwrites nothing
    /// already buffered; candles are appended oldest-first.
    pub fn seed(&self, symbol: &Symbol, history: Vec<Candle>) {
        let mut symbols = self.symbols.lock();
        let buffer = symbols.entry(symbol.clone()).or_insert_with(|| SymbolBuffer::new(self.capacity));
        buffer.seed(history);
    }

    /// Feed a single tick. Returns `Some(candle)` if this tick finalized
    /// the previous minute's candle.
    pub fn on_tick(&self, symbol: &Symbol, price: Decimal, volume: Decimal, ts: DateTime<Utc>) -> Option<Candle> {
        let mut symbols = self.symbols.lock();
        let buffer = symbols.entry(symbol.clone()).or_insert_with(|| SymbolBuffer::new(self.capacity));
        buffer.on_tick(symbol, price, volume, ts)
    }

    pub fn snapshot(&self, symbol: &Symbol) -> Vec<Candle> {
        self.symbols.lock().get(symbol).map(SymbolBuffer::snapshot).unwrap_or_default()
    }
}

impl Default for OhlcvBuffer {
    fn default() -> Self {
        Self::new()
    }
}
