//! KeryxFlow: an event-driven cryptocurrency trading engine. This crate
//! is the orchestrator — it owns the run loop, the external-port traits
//! (exchange adapter, LLM collaborator, news feed, notification sink),
//! configuration, and the REST/WS front door. The trading logic itself
//! (technical analysis, risk, execution, storage, learning) lives in the
//! sibling `keryxflow-*` crates this one wires together.

pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod llm;
pub mod news;
pub mod notify;
pub mod state;
pub mod stats;
