//! The typed pub/sub hub: a bounded, backpressured queued-publish path
//! plus a synchronous inline-publish path.
//!
//! Grounded on the `Tx`/`Channel` split in `jackbot-integration::channel`:
//! a cheap, cloneable handle wraps a `tokio::mpsc` sender, and a single
//! background task owns the receiver.

use crate::event::{Event, EventCategory};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::{collections::HashMap, sync::Arc};
use tokio::sync::mpsc;
use tracing::{error, warn};
use uuid::Uuid;

/// Default bound on the queued-publish FIFO.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1000;

/// A subscriber callback. Implementors must not panic and must complete in
/// bounded time — long work must be offloaded to its own task.
#[async_trait]
pub trait Subscriber: Send + Sync {
    async fn handle(&self, event: Arc<Event>);
}

#[async_trait]
impl<F> Subscriber for F
where
    F: Fn(Arc<Event>) + Send + Sync,
{
    async fn handle(&self, event: Arc<Event>) {
        (self)(event)
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct SubscriptionId(Uuid);

type SubscriberMap = HashMap<EventCategory, Vec<(SubscriptionId, Arc<dyn Subscriber>)>>;

/// Typed event bus. Cheap to clone — all state lives behind `Arc`.
#[derive(Clone)]
pub struct EventBus {
    queue_tx: mpsc::Sender<Event>,
    subscribers: Arc<RwLock<SubscriberMap>>,
}

impl EventBus {
    /// Construct a new bus with the default queue capacity and spawn its
    /// dispatcher task onto the current Tokio runtime.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_QUEUE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (queue_tx, queue_rx) = mpsc::channel(capacity);
        let subscribers = Arc::new(RwLock::new(SubscriberMap::new()));

        tokio::spawn(Self::dispatch_loop(queue_rx, subscribers.clone()));

        Self { queue_tx, subscribers }
    }

    /// Subscribe to every event in `category`. Returns an id usable with
    /// [`EventBus::unsubscribe`].
    pub fn subscribe(&self, category: EventCategory, subscriber: Arc<dyn Subscriber>) -> SubscriptionId {
        let id = SubscriptionId(Uuid::new_v4());
        self.subscribers
            .write()
            .entry(category)
            .or_default()
            .push((id, subscriber));
        id
    }

    /// Idempotent: unsubscribing an id that is not (or no longer)
    /// registered is a no-op.
    pub fn unsubscribe(&self, category: EventCategory, id: SubscriptionId) {
        if let Some(subs) = self.subscribers.write().get_mut(&category) {
            subs.retain(|(sub_id, _)| *sub_id != id);
        }
    }

    /// Enqueue `event` for asynchronous dispatch. Blocks (backpressure) if
    /// the queue is full rather than dropping the event — this is the
    /// documented contract, not an implementation detail.
    pub async fn publish(&self, event: Event) {
        if self.queue_tx.send(event).await.is_err() {
            error!("event bus dispatcher task is gone; event dropped");
        }
    }

    /// Invoke every subscriber of `event`'s category inline, returning only
    /// once all have completed. Used by test harnesses and teardown paths
    /// that need a happens-before with subscribers.
    pub async fn publish_sync(&self, event: Event) {
        let event = Arc::new(event);
        Self::dispatch_one(&event, &self.subscribers).await;
    }

    async fn dispatch_loop(mut queue_rx: mpsc::Receiver<Event>, subscribers: Arc<RwLock<SubscriberMap>>) {
        while let Some(event) = queue_rx.recv().await {
            let event = Arc::new(event);
            Self::dispatch_one(&event, &subscribers).await;
        }
    }

    /// Dispatch a single event to every subscriber of its category. Each
    /// subscriber invocation runs in its own task so a panicking subscriber
    /// is isolated (logged, doesn't abort the dispatcher or its peers);
    /// all are awaited before this returns, which is what guarantees a
    /// given subscriber never sees event N+1 before it has finished
    /// processing event N.
    async fn dispatch_one(event: &Arc<Event>, subscribers: &Arc<RwLock<SubscriberMap>>) {
        let category = event.category();
        let targets: Vec<Arc<dyn Subscriber>> = subscribers
            .read()
            .get(&category)
            .map(|subs| subs.iter().map(|(_, sub)| sub.clone()).collect())
            .unwrap_or_default();

        let handles = targets.into_iter().map(|sub| {
            let event = event.clone();
            tokio::spawn(async move { sub.handle(event).await })
        });

        for handle in handles {
            if let Err(join_err) = handle.await {
                warn!(error = %join_err, "event subscriber panicked; isolated from other subscribers");
            }
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
