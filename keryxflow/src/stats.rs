//! Session counters surfaced on `/api/status`. Plain atomics —
//! read under no lock, written from the single orchestrator task.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

pub struct EngineStats {
    started_at: DateTime<Utc>,
    ticks_processed: AtomicU64,
    candles_closed: AtomicU64,
    signals_generated: AtomicU64,
    orders_approved: AtomicU64,
    orders_rejected: AtomicU64,
    trades_closed: AtomicU64,
    breaker_trips: AtomicU64,
}

#[derive(Debug, Clone, Serialize)]
pub struct EngineStatsSnapshot {
    pub uptime_seconds: i64,
    pub ticks_processed: u64,
    pub candles_closed: u64,
    pub signals_generated: u64,
    pub orders_approved: u64,
    pub orders_rejected: u64,
    pub trades_closed: u64,
    pub breaker_trips: u64,
}

impl EngineStats {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            ticks_processed: AtomicU64::new(0),
            candles_closed: AtomicU64::new(0),
            signals_generated: AtomicU64::new(0),
            orders_approved: AtomicU64::new(0),
            orders_rejected: AtomicU64::new(0),
            trades_closed: AtomicU64::new(0),
            breaker_trips: AtomicU64::new(0),
        }
    }

    pub fn record_tick(&self) {
        self.ticks_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_candle_close(&self) {
        self.candles_closed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_signal(&self) {
        self.signals_generated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_order_approved(&self) {
        self.orders_approved.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_order_rejected(&self) {
        self.orders_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_trade_closed(&self) {
        self.trades_closed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_breaker_trip(&self) {
        self.breaker_trips.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> EngineStatsSnapshot {
        EngineStatsSnapshot {
            uptime_seconds: (Utc::now() - self.started_at).num_seconds(),
            ticks_processed: self.ticks_processed.load(Ordering::Relaxed),
            candles_closed: self.candles_closed.load(Ordering::Relaxed),
            signals_generated: self.signals_generated.load(Ordering::Relaxed),
            orders_approved: self.orders_approved.load(Ordering::Relaxed),
            orders_rejected: self.orders_rejected.load(Ordering::Relaxed),
            trades_closed: self.trades_closed.load(Ordering::Relaxed),
            breaker_trips: self.breaker_trips.load(Ordering::Relaxed),
        }
    }
}
