//! Candle type, incremental indicators, and the pure Technical Analyzer
//!. See `keryxflow-quant` for the stateless sizing/statistics
//! primitives the analyzer's output eventually feeds.

pub mod analyzer;
pub mod candle;
pub mod indicators;

pub use analyzer::{AnalyzerConfig, Analysis, TechnicalAnalyzer};
pub use candle::{Candle, CandleError};
pub use indicators::IndicatorResult;
