//! OHLCV candle type. Complete candles are immutable; only the
//! current in-progress candle for a symbol may be mutated in place (by
//! [`crate::super`]'s OHLCV buffer, which lives in `keryxflow-data`).

use chrono::{DateTime, Utc};
use keryxflow_instrument::Symbol;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Candle {
    pub symbol: Symbol,
    pub open_time: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
    pub complete: bool,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CandleError {
    #[error("candle invariant violated: low {low} must be <= min(open, close) and high {high} must be >= max(open, close)")]
    OhlcInvariant { low: Decimal, high: Decimal },
    #[error("candle volume must be non-negative, got {0}")]
    NegativeVolume(Decimal),
}

impl Candle {
    pub fn new(
        symbol: Symbol,
        open_time: DateTime<Utc>,
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
        volume: Decimal,
        complete: bool,
    ) -> Result<Self, CandleError> {
        let candle = Self { symbol, open_time, open, high, low, close, volume, complete };
        candle.validate()?;
        Ok(candle)
    }

    pub fn validate(&self) -> Result<(), CandleError> {
        if self.volume < Decimal::ZERO {
            return Err(CandleError::NegativeVolume(self.volume));
        }
        let body_min = self.open.min(self.close);
        let body_max = self.open.max(self.close);
        if self.low > body_min || body_max > self.high {
            return Err(CandleError::OhlcInvariant { low: self.low, high: self.high });
        }
        Ok(())
    }

    pub fn close_f64(&self) -> f64 {
        self.close.to_f64().unwrap_or(0.0)
    }

    pub fn high_f64(&self) -> f64 {
        self.high.to_f64().unwrap_or(0.0)
    }

    pub fn low_f64(&self) -> f64 {
        self.low.to_f64().unwrap_or(0.0)
    }

    pub fn volume_f64(&self) -> f64 {
        self.volume.to_f64().unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z").unwrap().with_timezone(&Utc)
    }

    #[test]
    fn rejects_inverted_range() {
        let err = Candle::new(
            Symbol::new("BTC/USDT"),
            now(),
            dec!(100),
            dec!(90), // high below open
            dec!(80),
            dec!(95),
            dec!(1),
            true,
        )
        .unwrap_err();
        assert!(matches!(err, CandleError::OhlcInvariant { .. }));
    }

    #[test]
    fn rejects_negative_volume() {
        let err = Candle::new(Symbol::new("BTC/USDT"), now(), dec!(100), dec!(110), dec!(90), dec!(105), dec!(-1), true)
            .unwrap_err();
        assert_eq!(err, CandleError::NegativeVolume(dec!(-1)));
    }

    #[test]
    fn accepts_well_formed_candle() {
        assert!(Candle::new(Symbol::new("BTC/USDT"), now(), dec!(100), dec!(110), dec!(90), dec!(105), dec!(10), true).is_ok());
    }
}
