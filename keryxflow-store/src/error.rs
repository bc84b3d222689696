use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("journal io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("journal record corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
    #[error("state-invariant violation: {0}")]
    InvariantViolation(String),
}
