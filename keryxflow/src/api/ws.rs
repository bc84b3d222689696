//! WebSocket streaming: every event published on the bus is
//! forwarded to connected clients as `{type, timestamp, data}` JSON, in
//! the order it was published. Connection handling (token check, Ping/Pong,
//! Close, cleanup) follows the same shape as a plain interval-push socket,
//! but the push side is driven by a bus subscription instead of a timer,
//! since every event needs to reach clients, not a periodic diff of
//! derived state.

use super::auth::validate_token;
use super::state::AppState;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use keryxflow_integration::bus::{EventBus, Subscriber, SubscriptionId};
use keryxflow_integration::event::{Event, EventCategory};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

#[derive(Deserialize)]
pub struct WsQuery {
    token: Option<String>,
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(query): Query<WsQuery>,
) -> impl IntoResponse {
    let token = query.token.unwrap_or_default();
    if !validate_token(&state, &token) {
        warn!("websocket connection rejected: invalid token");
        return (axum::http::StatusCode::FORBIDDEN, "invalid or missing token").into_response();
    }

    info!("websocket connection accepted — upgrading");
    ws.on_upgrade(move |socket| handle_connection(socket, state)).into_response()
}

const ALL_CATEGORIES: [EventCategory; 7] = [
    EventCategory::Price,
    EventCategory::Signal,
    EventCategory::Order,
    EventCategory::Position,
    EventCategory::Risk,
    EventCategory::Trailing,
    EventCategory::System,
];

/// Forwards every bus event it receives into a per-connection channel. One
/// instance is subscribed to all seven categories for the lifetime of a
/// single WebSocket connection.
struct Forwarder(mpsc::Sender<Arc<Event>>);

#[async_trait::async_trait]
impl Subscriber for Forwarder {
    async fn handle(&self, event: Arc<Event>) {
        // The send-side channel is bounded; a slow client applies
        // backpressure to its own forwarder task, never to the bus.
        let _ = self.0.send(event).await;
    }
}

fn subscribe_all(bus: &EventBus, tx: mpsc::Sender<Arc<Event>>) -> Vec<SubscriptionId> {
    let forwarder: Arc<dyn Subscriber> = Arc::new(Forwarder(tx));
    ALL_CATEGORIES
        .iter()
        .map(|category| bus.subscribe(*category, forwarder.clone()))
        .collect()
}

fn unsubscribe_all(bus: &EventBus, ids: &[SubscriptionId]) {
    for (category, id) in ALL_CATEGORIES.iter().zip(ids.iter()) {
        bus.unsubscribe(*category, *id);
    }
}

#[derive(Serialize)]
struct WireEvent<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    timestamp: chrono::DateTime<chrono::Utc>,
    data: &'a keryxflow_integration::event::EventPayload,
}

fn category_name(category: EventCategory) -> &'static str {
    match category {
        EventCategory::Price => "price",
        EventCategory::Signal => "signal",
        EventCategory::Order => "order",
        EventCategory::Position => "position",
        EventCategory::Risk => "risk",
        EventCategory::Trailing => "trailing",
        EventCategory::System => "system",
    }
}

async fn handle_connection(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::channel::<Arc<Event>>(256);

    let bus = state.engine.bus();
    let subscriptions = subscribe_all(bus, tx);

    loop {
        tokio::select! {
            event = rx.recv() => {
                match event {
                    Some(event) => {
                        let wire = WireEvent {
                            kind: category_name(event.category()),
                            timestamp: event.timestamp,
                            data: &event.payload,
                        };
                        match serde_json::to_string(&wire) {
                            Ok(text) => {
                                if let Err(e) = sender.send(Message::Text(text.into())).await {
                                    debug!(error = %e, "websocket send failed — disconnecting");
                                    break;
                                }
                            }
                            Err(e) => warn!(error = %e, "failed to serialize event"),
                        }
                    }
                    None => {
                        // Forwarder channel closed only if the connection itself dropped it.
                        break;
                    }
                }
            }

            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Ping(data))) => {
                        if let Err(e) = sender.send(Message::Pong(data)).await {
                            debug!(error = %e, "failed to send pong — disconnecting");
                            break;
                        }
                    }
                    Some(Ok(Message::Pong(_))) => {}
                    Some(Ok(Message::Text(text))) => {
                        debug!(msg = %text, "websocket text message received");
                    }
                    Some(Ok(Message::Close(_))) => {
                        info!("websocket close frame received — disconnecting");
                        break;
                    }
                    Some(Ok(Message::Binary(_))) => {}
                    Some(Err(e)) => {
                        warn!(error = %e, "websocket receive error — disconnecting");
                        break;
                    }
                    None => {
                        info!("websocket stream ended");
                        break;
                    }
                }
            }
        }
    }

    unsubscribe_all(bus, &subscriptions);
    let _ = sender.send(Message::Close(None)).await;
    info!("websocket connection closed — cleanup complete");
}
