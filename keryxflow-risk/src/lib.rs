//! Guardrails, circuit breaker, and risk manager.
//! This crate is the only path by which a signal can become an order.

pub mod breaker;
pub mod guardrails;
pub mod manager;

pub use breaker::{BreakerConfig, BreakerInputs, BreakerState, CircuitBreaker, TripReason};
pub use guardrails::{validate, Action, Guardrails, SymbolWhitelist, Verdict};
pub use manager::{RiskManager, RiskOutcome, SoftRules};
