use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

use crate::models::chat::{InboundMessage, ReplyMessage};
use crate::services::dispatcher::{DispatchError, Dispatcher};
use crate::utils::error::ApiError;

pub async fn message_handler(
    State(dispatcher): State<Arc<Dispatcher>>,
    payload: Result<Json<InboundMessage>, JsonRejection>,
) -> Result<Json<ReplyMessage>, ApiError> {
    let start_time = Instant::now();
    let Json(request) = payload.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;

    if request.conversation_id.trim().is_empty() {
        return Err(ApiError::BadRequest("conversation_id is required".to_string()));
    }
    if request.text.trim().is_empty() {
        return Err(ApiError::BadRequest("text is required".to_string()));
    }

    info!(
        "Inbound message: conversation={}, author={}, text_len={}",
        request.conversation_id,
        request.author_id,
        request.text.len()
    );

    let result = dispatcher
        .dispatch(request.conversation_id, request.author_id, request.text)
        .await
        .map_err(|e| match e {
            DispatchError::QueueFull => ApiError::Busy(e.to_string()),
            DispatchError::Closed | DispatchError::Dropped => ApiError::InternalError(e.to_string()),
        })?;
    let reply = result?;

    info!(
        "Reply ready: reply_len={}, processing_time_ms={}",
        reply.len(),
        start_time.elapsed().as_millis()
    );

    Ok(Json(ReplyMessage { reply }))
}
