//! The closed event taxonomy published on the [`crate::bus::EventBus`].
//!
//! Every [`Event`] carries a UTC timestamp and a category-specific payload;
//! [`EventCategory`] is the subscription key (cheap to hash/compare, no
//! payload data).

use chrono::{DateTime, Utc};
use keryxflow_instrument::Symbol;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub timestamp: DateTime<Utc>,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(timestamp: DateTime<Utc>, payload: EventPayload) -> Self {
        Self { timestamp, payload }
    }

    pub fn category(&self) -> EventCategory {
        self.payload.category()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EventPayload {
    Price(PriceEvent),
    Signal(SignalEvent),
    Order(OrderEvent),
    Position(PositionEvent),
    Risk(RiskEvent),
    Trailing(TrailingEvent),
    System(SystemEvent),
}

impl EventPayload {
    pub fn category(&self) -> EventCategory {
        match self {
            EventPayload::Price(_) => EventCategory::Price,
            EventPayload::Signal(_) => EventCategory::Signal,
            EventPayload::Order(_) => EventCategory::Order,
            EventPayload::Position(_) => EventCategory::Position,
            EventPayload::Risk(_) => EventCategory::Risk,
            EventPayload::Trailing(_) => EventCategory::Trailing,
            EventPayload::System(_) => EventCategory::System,
        }
    }
}

/// Subscription key. Cheap `Copy` enum so subscriber maps can key on it
/// without touching the (potentially large) payload.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum EventCategory {
    Price,
    Signal,
    Order,
    Position,
    Risk,
    Trailing,
    System,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PriceEvent {
    Tick {
        symbol: Symbol,
        price: Decimal,
        volume: Decimal,
    },
    CandleClose {
        symbol: Symbol,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SignalEvent {
    Generated { symbol: Symbol },
    Validated { symbol: Symbol },
    Rejected { symbol: Symbol, reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OrderEvent {
    Requested { client_id: String, symbol: Symbol },
    Approved { client_id: String, symbol: Symbol },
    Rejected { client_id: String, reason: String },
    Submitted { client_id: String },
    Filled { client_id: String, fill_price: Decimal, quantity: Decimal },
    Cancelled { client_id: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PositionEvent {
    Opened { position_id: String, symbol: Symbol },
    Updated { position_id: String },
    Closed { position_id: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RiskEvent {
    Alert { message: String },
    Breaker { reason: String },
    DrawdownWarn { drawdown_pct: Decimal },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TrailingEvent {
    Trailed { position_id: String, new_stop: Decimal },
    Breakeven { position_id: String, new_stop: Decimal },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SystemEvent {
    Started,
    Stopped,
    Paused,
    Resumed,
    Panic { reason: String },
}
