//! LLM collaborator port: a single `analyze` operation with a
//! bounded latency contract. "Unavailable" is a first-class outcome, not
//! an error — the aggregator treats it as "absent" and falls back to
//! technical-only.

use async_trait::async_trait;
use keryxflow_instrument::Direction;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Bounded latency contract: p99 < 10s. The orchestrator wraps
/// every call in a `tokio::time::timeout` at this bound regardless of
/// what an implementation promises internally.
pub const LLM_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmAnalysis {
    pub direction: Direction,
    pub confidence: f64,
    pub rationale: String,
    pub risk_factors: Vec<String>,
}

#[async_trait]
pub trait LlmCollaborator: Send + Sync {
    /// Returns `Ok(None)` for "unavailable" — deliberately not an `Err`,
    /// since an absent LLM is a normal degraded mode, not a failure.
    async fn analyze(&self, context_blob: &str) -> Result<Option<LlmAnalysis>, LlmError>;
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum LlmError {
    #[error("llm collaborator timed out")]
    Timeout,
    #[error("llm collaborator transport error: {0}")]
    Transport(String),
}

/// Always reports unavailable. Used when `oracle.llm_enabled` is `false`
/// or `system.ai_mode` is `disabled` — the aggregator then runs
/// technical-only without ever dialing out.
pub struct UnavailableLlm;

#[async_trait]
impl LlmCollaborator for UnavailableLlm {
    async fn analyze(&self, _context_blob: &str) -> Result<Option<LlmAnalysis>, LlmError> {
        Ok(None)
    }
}

/// Await `collaborator.analyze` bounded by [`LLM_TIMEOUT`]; a timeout or
/// transport error degrades to `None` (technical-only) rather than
/// propagating — LLM unavailability never halts the loop.
pub async fn analyze_bounded(collaborator: &dyn LlmCollaborator, context_blob: &str) -> Option<LlmAnalysis> {
    match tokio::time::timeout(LLM_TIMEOUT, collaborator.analyze(context_blob)).await {
        Ok(Ok(verdict)) => verdict,
        Ok(Err(err)) => {
            tracing::warn!(error = %err, "llm collaborator call failed; proceeding technical-only");
            None
        }
        Err(_elapsed) => {
            tracing::warn!("llm collaborator call exceeded bound; proceeding technical-only");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SlowLlm;

    #[async_trait]
    impl LlmCollaborator for SlowLlm {
        async fn analyze(&self, _context_blob: &str) -> Result<Option<LlmAnalysis>, LlmError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(Some(LlmAnalysis { direction: Direction::Bullish, confidence: 0.9, rationale: String::new(), risk_factors: Vec::new() }))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn unavailable_llm_returns_none() {
        let result = analyze_bounded(&UnavailableLlm, "{}").await;
        assert!(result.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn slow_llm_times_out_to_none() {
        let handle = tokio::spawn(async { analyze_bounded(&SlowLlm, "{}").await });
        tokio::time::advance(LLM_TIMEOUT + Duration::from_secs(1)).await;
        assert!(handle.await.unwrap().is_none());
    }
}
