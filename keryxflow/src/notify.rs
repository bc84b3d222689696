//! Notification sink port: fire-and-forget, at-least-once best
//! effort. Severity follows the error taxonomy's propagation policy:
//! info for rejections and recoverable issues, warn for retries
//! exhausted, critical for fatals and breaker trips.

use async_trait::async_trait;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warn,
    Critical,
}

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send(&self, severity: Severity, title: &str, body: &str);
}

/// Logs through `tracing` at the matching level. This is the only sink
/// wired by default — a deployment adds a channel-specific sink (email,
/// webhook, chat) by implementing the trait, not by changing the engine.
pub struct TracingSink;

#[async_trait]
impl NotificationSink for TracingSink {
    async fn send(&self, severity: Severity, title: &str, body: &str) {
        match severity {
            Severity::Info => tracing::info!(title, body, "notification"),
            Severity::Warn => tracing::warn!(title, body, "notification"),
            Severity::Critical => tracing::error!(title, body, "notification"),
        }
    }
}
