//! Core primitive types shared across every KeryxFlow crate: the [`Symbol`]
//! identifying a trading pair, [`Side`] of an order/position, and the
//! decimal/time aliases the rest of the workspace builds on.

use derive_more::{Display, From};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque "BASE/QUOTE" trading pair identifier, e.g. `"BTC/USDT"`.
///
/// The trading universe is a finite configured set (see `Guardrails`'s
/// symbol whitelist); `Symbol` itself places no restriction on its
/// contents beyond non-emptiness at construction.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize, From)]
pub struct Symbol(String);

impl Symbol {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The BASE half of a `"BASE/QUOTE"` pair, if the symbol is well-formed.
    pub fn base(&self) -> Option<&str> {
        self.0.split('/').next()
    }

    /// The QUOTE half of a `"BASE/QUOTE"` pair, if the symbol is well-formed.
    pub fn quote(&self) -> Option<&str> {
        self.0.split('/').nth(1)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Symbol {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Directional side of an order or position.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Deserialize, Serialize, Display)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// `+1` for `Buy`/long, `-1` for `Sell`/short — used to sign PnL math.
    pub fn sign(self) -> i8 {
        match self {
            Side::Buy => 1,
            Side::Sell => -1,
        }
    }

    pub fn opposite(self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

/// Direction implied by a position or indicator reading.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Deserialize, Serialize, Display, Default)]
pub enum Direction {
    Bullish,
    Bearish,
    #[default]
    Neutral,
}

impl Direction {
    /// `+1` bullish, `-1` bearish, `0` neutral — used by aggregation math.
    pub fn polarity(self) -> i8 {
        match self {
            Direction::Bullish => 1,
            Direction::Bearish => -1,
            Direction::Neutral => 0,
        }
    }
}

/// Qualitative indicator/signal strength, ordered weakest to strongest.
#[derive(
    Debug, Copy, Clone, Eq, PartialEq, PartialOrd, Ord, Hash, Deserialize, Serialize, Display, Default,
)]
pub enum Strength {
    #[default]
    None,
    Weak,
    Moderate,
    Strong,
}

impl Strength {
    /// Integer weight used by the analyzer's weighted-confidence aggregation.
    pub fn weight(self) -> u32 {
        match self {
            Strength::None => 0,
            Strength::Weak => 1,
            Strength::Moderate => 2,
            Strength::Strong => 3,
        }
    }
}
