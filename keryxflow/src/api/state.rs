//! Shared application state handed to every REST/WS handler via axum's
//! `State` extractor. Thin wrapper around the orchestrator plus the
//! bearer token the auth layer checks against.

use crate::engine::Engine;
use std::sync::Arc;

pub struct AppState {
    pub engine: Arc<Engine>,
    /// Empty token disables authentication — every request passes.
    pub auth_token: String,
}

impl AppState {
    pub fn new(engine: Arc<Engine>, auth_token: String) -> Self {
        Self { engine, auth_token }
    }

    pub fn auth_enabled(&self) -> bool {
        !self.auth_token.is_empty()
    }
}
