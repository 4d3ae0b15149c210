pub mod health;
pub mod messages;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::{DefaultMakeSpan, TraceLayer};

use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    // Probes
    let public_routes = Router::new()
        .route("/healthz", get(health::liveness))
        .route("/health", get(health::health_check));

    let api_routes = Router::new().route("/api/messages", post(messages::message_handler));

    Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .with_state(state)
        // Tracing
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::default().include_headers(false)),
        )
}
