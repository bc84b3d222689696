//! Low-level framework shared by every KeryxFlow crate: the typed event bus
//!, the error taxonomy's `Unrecoverable` marker, and small
//! retry/backoff plumbing used at adapter call sites.

pub mod bus;
pub mod event;
pub mod retry;

pub use bus::{EventBus, Subscriber, SubscriptionId};
pub use event::{Event, EventCategory, EventPayload};
pub use retry::{retry_with_backoff, RetryPolicy};

/// Marks an error as unrecoverable for its caller — no retry policy will
/// help. Used to bound the `Error` associated type on channel senders and
/// adapter calls, mirroring `jackbot-integration`'s `Tx::Error: Unrecoverable`.
pub trait Unrecoverable {
    fn is_unrecoverable(&self) -> bool;
}

impl<T> Unrecoverable for tokio::sync::mpsc::error::SendError<T> {
    fn is_unrecoverable(&self) -> bool {
        true
    }
}
