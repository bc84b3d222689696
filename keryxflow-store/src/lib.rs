//! Data model and durable store for every persisted entity in KeryxFlow:
//! positions, trades, trade episodes, learned rules, and market patterns
//!. `keryxflow-memory` builds episodic/semantic recall on top
//! of this crate; `keryxflow-execution` is the sole writer of positions
//! and trades.

pub mod error;
pub mod model;
pub mod store;

pub use error::StoreError;
pub use model::{
    EpisodeId, ExitReason, MarketPattern, OrderIntent, OrderKind, PatternId, Position, PositionId,
    PositionStatus, PortfolioSnapshot, RuleId, RuleSource, Signal, SignalKind, SignalSource,
    Trade, TradeEpisode, TradeId, TradingRule, TrailingState,
};
pub use store::{Store, CURRENT_SCHEMA_VERSION};
