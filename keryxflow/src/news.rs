//! News aggregator port: `recent(symbol, lookback)`. Failures
//! are non-fatal by contract — callers treat an `Err` the same as an
//! empty result.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use keryxflow_instrument::Symbol;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    pub source: String,
    pub timestamp: DateTime<Utc>,
    pub sentiment: f64,
    pub mentions: Vec<String>,
}

#[derive(Debug, Clone, Error)]
pub enum NewsError {
    #[error("news aggregator unreachable: {0}")]
    Unreachable(String),
}

#[async_trait]
pub trait NewsAggregator: Send + Sync {
    async fn recent(&self, symbol: &Symbol, lookback: Duration) -> Result<Vec<NewsItem>, NewsError>;
}

/// No external feed wired; always returns an empty result. The engine
/// runs fine without news context — the aggregator simply never receives
/// any sentiment input.
pub struct NoNewsFeed;

#[async_trait]
impl NewsAggregator for NoNewsFeed {
    async fn recent(&self, _symbol: &Symbol, _lookback: Duration) -> Result<Vec<NewsItem>, NewsError> {
        Ok(Vec::new())
    }
}

/// `recent` failures never propagate past this call — non-fatal by
/// contract.
pub async fn recent_or_empty(feed: &dyn NewsAggregator, symbol: &Symbol, lookback: Duration) -> Vec<NewsItem> {
    match feed.recent(symbol, lookback).await {
        Ok(items) => items,
        Err(err) => {
            tracing::debug!(error = %err, "news aggregator call failed; continuing without sentiment");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn no_feed_returns_empty_without_erroring_the_caller() {
        let items = recent_or_empty(&NoNewsFeed, &Symbol::new("BTC/USDT"), Duration::from_secs(3600)).await;
        assert!(items.is_empty());
    }
}
