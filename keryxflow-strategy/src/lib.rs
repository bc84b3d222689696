//! Signal Aggregator: fuses the Technical Analyzer's output
//! with an optional external LLM verdict into a single tradeable [`Signal`].

use chrono::Utc;
use keryxflow_instrument::{Direction, Symbol};
use keryxflow_quant::{atr_stop, risk_reward};
use keryxflow_store::{Signal, SignalKind, SignalSource};
use keryxflow_ta::Analysis;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Default ATR multiple used to derive the stop from the latest close.
pub const STOP_ATR_MULT: Decimal = dec!(1.5);
/// Target risk:reward ratio new entries are sized to.
pub const TARGET_RISK_REWARD: Decimal = dec!(2.0);

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LlmVerdict {
    pub direction: Direction,
    pub confidence: f64,
    pub rationale_hash: u64,
}

#[derive(Debug, Clone, Copy)]
pub struct AggregatorConfig {
    pub strong_threshold: f64,
    pub moderate_threshold: f64,
    pub weak_threshold: f64,
    pub technical_weight: f64,
    pub llm_weight: f64,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            strong_threshold: 0.7,
            moderate_threshold: 0.5,
            weak_threshold: 0.3,
            technical_weight: 0.6,
            llm_weight: 0.4,
        }
    }
}

pub struct SignalAggregator {
    config: AggregatorConfig,
}

impl SignalAggregator {
    pub fn new(config: AggregatorConfig) -> Self {
        Self { config }
    }

    /// Combine `analysis` and an optional `llm` verdict into a `Signal`.
    /// `llm: None` means technical-only (e.g. the LLM collaborator timed
    /// out) — not "LLM disagrees".
    pub fn aggregate(&self, analysis: &Analysis, llm: Option<LlmVerdict>) -> Signal {
        let (direction, confidence, source) = match llm {
            None => (analysis.direction, analysis.confidence, SignalSource::Technical),
            Some(llm) => {
                if llm.direction.polarity() != 0
                    && analysis.direction.polarity() != 0
                    && llm.direction.polarity() != analysis.direction.polarity()
                {
                    (Direction::Neutral, 0.0, SignalSource::Combined)
                } else {
                    let combined_direction = if analysis.direction != Direction::Neutral {
                        analysis.direction
                    } else {
                        llm.direction
                    };
                    let combined_confidence =
                        self.config.technical_weight * analysis.confidence + self.config.llm_weight * llm.confidence;
                    (combined_direction, combined_confidence, SignalSource::Combined)
                }
            }
        };

        let kind = self.kind_for(direction, confidence);
        let strength = self.strength_for(confidence);
        self.attach_levels(analysis, kind, strength, confidence, direction, source)
    }

    fn strength_for(&self, confidence: f64) -> keryxflow_instrument::Strength {
        if confidence >= self.config.strong_threshold {
            keryxflow_instrument::Strength::Strong
        } else if confidence >= self.config.moderate_threshold {
            keryxflow_instrument::Strength::Moderate
        } else if confidence >= self.config.weak_threshold {
            keryxflow_instrument::Strength::Weak
        } else {
            keryxflow_instrument::Strength::None
        }
    }

    fn kind_for(&self, direction: Direction, confidence: f64) -> SignalKind {
        if confidence < self.config.weak_threshold || direction == Direction::Neutral {
            return SignalKind::NoAction;
        }
        // Weak signals are tradeable-shaped but treated as NoAction for
        // entries.
        if confidence < self.config.moderate_threshold {
            return SignalKind::NoAction;
        }
        match direction {
            Direction::Bullish => SignalKind::Long,
            Direction::Bearish => SignalKind::Short,
            Direction::Neutral => SignalKind::NoAction,
        }
    }

    fn attach_levels(
        &self,
        analysis: &Analysis,
        kind: SignalKind,
        strength: keryxflow_instrument::Strength,
        confidence: f64,
        direction: Direction,
        source: SignalSource,
    ) -> Signal {
        if !kind.is_entry() {
            return self.no_action(analysis, strength, confidence, source);
        }

        let Some(atr) = analysis.atr else {
            return self.no_action(analysis, strength, confidence, source);
        };
        let Some(atr) = Decimal::try_from(atr).ok() else {
            return self.no_action(analysis, strength, confidence, source);
        };
        if atr <= Decimal::ZERO {
            return self.no_action(analysis, strength, confidence, source);
        }

        let entry = analysis.close;
        let is_long = kind == SignalKind::Long;
        let stop = atr_stop(entry, atr, STOP_ATR_MULT, is_long);
        let stop_distance = (entry - stop).abs();
        if stop_distance.is_zero() {
            return self.no_action(analysis, strength, confidence, source);
        }
        let target = if is_long {
            entry + stop_distance * TARGET_RISK_REWARD
        } else {
            entry - stop_distance * TARGET_RISK_REWARD
        };
        let rr = risk_reward(entry, stop, target);

        Signal {
            symbol: analysis.symbol.clone(),
            kind,
            strength,
            confidence,
            source,
            entry_price: Some(entry),
            stop_loss: Some(stop),
            take_profit: Some(target),
            risk_reward: Some(rr),
            timestamp: analysis.timestamp,
            rationale: rationale_for(direction, confidence),
        }
    }

    fn no_action(
        &self,
        analysis: &Analysis,
        strength: keryxflow_instrument::Strength,
        confidence: f64,
        source: SignalSource,
    ) -> Signal {
        Signal {
            symbol: analysis.symbol.clone(),
            kind: SignalKind::NoAction,
            strength,
            confidence,
            source,
            entry_price: None,
            stop_loss: None,
            take_profit: None,
            risk_reward: None,
            timestamp: analysis.timestamp,
            rationale: "insufficient confidence or conflicting signals".into(),
        }
    }
}

fn rationale_for(direction: Direction, confidence: f64) -> String {
    format!("{direction} at confidence {confidence:.2}")
}

/// Exit-side helper: a flat close-only signal for `symbol`, used when a
/// position needs to be closed outside the entry aggregation path (e.g.
/// an externally triggered exit instruction).
pub fn close_signal(symbol: Symbol, kind: SignalKind) -> Signal {
    debug_assert!(kind.is_exit());
    Signal {
        symbol,
        kind,
        strength: keryxflow_instrument::Strength::None,
        confidence: 1.0,
        source: SignalSource::Technical,
        entry_price: None,
        stop_loss: None,
        take_profit: None,
        risk_reward: None,
        timestamp: Utc::now(),
        rationale: "explicit exit".into(),
    }
}
