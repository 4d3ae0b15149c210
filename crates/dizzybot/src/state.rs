use std::sync::Arc;
use std::time::Instant;
use axum::extract::FromRef;

use crate::services::{Dispatcher, GenerationClient};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub client: Arc<GenerationClient>,
    pub dispatcher: Arc<Dispatcher>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(client: Arc<GenerationClient>, dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            client,
            dispatcher,
            started_at: Instant::now(),
        }
    }
}

impl FromRef<AppState> for Arc<GenerationClient> {
    fn from_ref(state: &AppState) -> Self {
        state.client.clone()
    }
}

impl FromRef<AppState> for Arc<Dispatcher> {
    fn from_ref(state: &AppState) -> Self {
        state.dispatcher.clone()
    }
}
