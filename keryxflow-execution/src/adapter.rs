//! Exchange Adapter port. The core depends only on this trait
//! and is polymorphic over its implementations — paper, and (not yet
//! wired) live venues. [`crate::paper::PaperEngine`] implements it locally;
//! a live adapter translates the same calls to venue API requests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use keryxflow_instrument::{Side, Symbol};
use keryxflow_store::OrderIntent;
use rust_decimal::Decimal;
use thiserror::Error;
use tokio_stream::wrappers::ReceiverStream;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AdapterError {
    #[error("connectivity error: {0}")]
    Connectivity(String),
    #[error("order rejected by venue: {0}")]
    RejectedByVenue(String),
    #[error("insufficient balance")]
    InsufficientBalance,
    #[error("invalid symbol: {0}")]
    InvalidSymbol(Symbol),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceTick {
    pub price: Decimal,
    pub timestamp: DateTime<Utc>,
    pub volume: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Balance {
    pub total: Decimal,
    pub free: Decimal,
}

/// Venue-agnostic capability set every component downstream of a signal
/// depends on. Implementations: `PaperEngine` (local, deterministic),
/// and documented extension points for live venues.
#[async_trait]
pub trait ExchangeAdapter: Send + Sync {
    /// Subscribe to a restartable, hot stream of ticks for `symbol`.
    async fn subscribe_ticks(&self, symbol: Symbol) -> Result<ReceiverStream<PriceTick>, AdapterError>;

    /// Fetch a finite, ordered sequence of up to `limit` historical candles.
    async fn fetch_ohlcv(&self, symbol: Symbol, timeframe_minutes: u32, limit: usize) -> Result<Vec<keryxflow_ta::Candle>, AdapterError>;

    async fn place_order(&self, intent: OrderIntent) -> Result<String, AdapterError>;

    async fn cancel_order(&self, order_id: String) -> Result<(), AdapterError>;

    async fn fetch_balance(&self) -> Result<Balance, AdapterError>;

    async fn fetch_open_positions(&self) -> Result<Vec<(Symbol, Side, Decimal)>, AdapterError>;
}
