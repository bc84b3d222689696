//! Error taxonomy: which class an outcome belongs to decides
//! whether the orchestrator retries, rejects-and-continues, or halts.
//! Validation and ambiguous-fill outcomes are not exposed here — they are
//! routine `RiskOutcome`/"unresolved order" values handled inline, never
//! propagated as an `Err`. Only the two fatal classes bubble up.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("state invariant violated: {0}")]
    StateInvariant(String),

    #[error("data corruption: {0}")]
    DataCorruption(#[from] keryxflow_store::error::StoreError),

    #[error("adapter call exhausted retries: {0}")]
    AdapterExhausted(#[from] keryxflow_execution::AdapterError),
}

impl EngineError {
    /// Every fatal error trips the breaker and pauses the engine;
    /// this is the notification severity attached to that event.
    pub fn severity(&self) -> &'static str {
        "critical"
    }
}
