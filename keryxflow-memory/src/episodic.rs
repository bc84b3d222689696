//! Episodic store: append-only, indexed by (symbol,
//! timestamp). `recall_similar` returns the K past episodes for a symbol
//! whose stored indicator vector is closest to a query vector in a
//! normalized feature space, Euclidean distance, ties broken by recency.

use keryxflow_instrument::Symbol;
use keryxflow_store::{Store, TradeEpisode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// The five-indicator feature vector every episode is indexed by:
/// `[rsi, macd_histogram, bollinger_position, obv_slope, ema_alignment]`.
/// Each component is expected to already live in a comparable, roughly
/// normalized range (e.g. rsi/100, bb_position in [0,1]) — this module
/// does not normalize on the caller's behalf.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub rsi: f64,
    pub macd_histogram: f64,
    pub bollinger_position: f64,
    pub obv_slope: f64,
    pub ema_alignment: f64,
}

impl FeatureVector {
    fn as_array(self) -> [f64; 5] {
        [self.rsi, self.macd_histogram, self.bollinger_position, self.obv_slope, self.ema_alignment]
    }

    fn distance(self, other: FeatureVector) -> f64 {
        self.as_array()
            .iter()
            .zip(other.as_array())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f64>()
            .sqrt()
    }

    fn from_context(value: &serde_json::Value) -> Option<Self> {
        serde_json::from_value(value.get("features")?.clone()).ok()
    }

    pub fn to_context(self) -> serde_json::Value {
        serde_json::json!({ "features": self })
    }
}

/// Append a new episode, recording `features` alongside the rest of the
/// episode's narrative context so future queries can retrieve it.
pub fn record_episode(store: &Store, mut episode: TradeEpisode, features: FeatureVector) -> TradeEpisode {
    let mut context = episode.market_context.clone();
    if let serde_json::Value::Object(ref mut map) = context {
        map.insert("features".to_string(), serde_json::to_value(features).unwrap());
    } else {
        context = features.to_context();
    }
    episode.market_context = context;
    store.append_episode(episode.clone()).ok();
    episode
}

/// Return up to `k` past episodes for `symbol` ordered by ascending
/// distance from `query` in the five-feature space, ties broken by most
/// recent timestamp first.
pub fn recall_similar(store: &Arc<Store>, symbol: &Symbol, query: FeatureVector, k: usize) -> Vec<TradeEpisode> {
    let mut scored: Vec<(f64, TradeEpisode)> = store
        .episodes_for_symbol(symbol)
        .into_iter()
        .filter_map(|episode| {
            let features = FeatureVector::from_context(&episode.market_context)?;
            Some((query.distance(features), episode))
        })
        .collect();

    scored.sort_by(|(da, a), (db, b)| {
        da.partial_cmp(db).unwrap_or(std::cmp::Ordering::Equal).then_with(|| b.timestamp.cmp(&a.timestamp))
    });

    scored.into_iter().take(k).map(|(_, episode)| episode).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use keryxflow_store::{EpisodeId, PortfolioSnapshot};
    use rust_decimal::Decimal;

    fn episode(symbol: Symbol, minutes_ago: i64) -> TradeEpisode {
        TradeEpisode {
            id: EpisodeId::new(),
            trade_ref: None,
            timestamp: Utc::now() - Duration::minutes(minutes_ago),
            symbol,
            action: "enter_long".into(),
            reasoning: "test".into(),
            confidence: 0.8,
            market_context: serde_json::json!({}),
            portfolio_snapshot: PortfolioSnapshot::default(),
            entry_price: Decimal::from(100),
            quantity: Decimal::from(1),
            exit_price: None,
            pnl: None,
            post_mortem: None,
            lessons_learned: None,
        }
    }

    fn feature(rsi: f64) -> FeatureVector {
        FeatureVector { rsi, macd_histogram: 0.0, bollinger_position: 0.5, obv_slope: 0.0, ema_alignment: 0.0 }
    }

    #[test]
    fn recall_orders_by_ascending_distance() {
        let store = Arc::new(Store::in_memory());
        let symbol = Symbol::new("BTC/USDT");
        record_episode(&store, episode(symbol.clone(), 10), feature(0.2));
        record_episode(&store, episode(symbol.clone(), 5), feature(0.9));
        record_episode(&store, episode(symbol.clone(), 1), feature(0.5));

        let results = recall_similar(&store, &symbol, feature(0.5), 2);
        assert_eq!(results.len(), 2);
        assert_eq!(
            FeatureVector::from_context(&results[0].market_context).unwrap().rsi,
            0.5
        );
    }

    #[test]
    fn recall_is_scoped_to_symbol() {
        let store = Arc::new(Store::in_memory());
        record_episode(&store, episode(Symbol::new("BTC/USDT"), 1), feature(0.5));
        record_episode(&store, episode(Symbol::new("ETH/USDT"), 1), feature(0.5));

        let results = recall_similar(&store, &Symbol::new("BTC/USDT"), feature(0.5), 5);
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn identical_vectors_have_zero_distance() {
        let a = feature(0.3);
        assert_eq!(a.distance(a), 0.0);
    }

    #[test]
    fn ties_broken_by_recency() {
        let store = Arc::new(Store::in_memory());
        let symbol = Symbol::new("BTC/USDT");
        // Both equidistant from the query (0.5): one at +0.1, one at -0.1.
        record_episode(&store, episode(symbol.clone(), 20), feature(0.6));
        record_episode(&store, episode(symbol.clone(), 1), feature(0.4));

        let results = recall_similar(&store, &symbol, feature(0.5), 1);
        assert_eq!(
            FeatureVector::from_context(&results[0].market_context).unwrap().rsi,
            0.4
        );
    }
}
