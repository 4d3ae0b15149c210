use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use dizzybot::config::{ConversationConfig, DispatcherConfig, LlmConfig};
use dizzybot::handlers::build_router;
use dizzybot::models::chat::Message;
use dizzybot::services::conversation::ConversationStore;
use dizzybot::services::palm::{GenerationRequest, GenerationResponse, MessageGenerator};
use dizzybot::services::{ChatPolicy, Dispatcher, GenerationClient, GenerationOptions};
use dizzybot::state::AppState;
use dizzybot::utils::error::GenerationError;

/// Replies "echo: <last message>", or fails when the text says so
struct Echo;

#[async_trait::async_trait]
impl MessageGenerator for Echo {
    async fn generate_message(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationResponse, GenerationError> {
        let last = request.prompt.messages.last().map(|m| m.content.clone()).unwrap_or_default();
        if last == "please fail" {
            return Err(GenerationError::Remote {
                code: 500,
                message: "model exploded".to_string(),
                status: "INTERNAL".to_string(),
            });
        }
        Ok(GenerationResponse {
            candidates: vec![Message::new("bot", format!("echo: {}", last))],
            ..GenerationResponse::default()
        })
    }
}

fn app() -> (Router, Arc<GenerationClient>) {
    app_with(ConversationConfig::default())
}

fn app_with(conversation: ConversationConfig) -> (Router, Arc<GenerationClient>) {
    let client = Arc::new(GenerationClient::new(
        ConversationStore::new(conversation.default_context.clone()),
        Arc::new(Echo),
        GenerationOptions::from_config(&LlmConfig::default(), &conversation),
    ));
    let dispatcher = Arc::new(Dispatcher::start(
        client.clone(),
        &DispatcherConfig {
            worker_count: 2,
            queue_capacity: 8,
            ..DispatcherConfig::default()
        },
        ChatPolicy::from_config(&conversation),
    ));
    (build_router(AppState::new(client.clone(), dispatcher)), client)
}

fn post_message(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/messages")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn healthz_answers_ok() {
    let (app, _) = app();

    let response = app
        .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"OK");
}

#[tokio::test]
async fn health_reports_status() {
    let (app, _) = app();

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["active_conversations"], 0);
}

#[tokio::test]
async fn message_round_trip() {
    let (app, client) = app();

    let response = app
        .oneshot(post_message(json!({
            "conversation_id": "-1001905601063",
            "author_id": 77,
            "text": "hi"
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["reply"], "echo: hi");
    assert_eq!(
        client.conversation("-1001905601063").await.messages,
        vec![Message::new("77", "hi"), Message::new("bot", "echo: hi")]
    );
}

#[tokio::test]
async fn reset_command_clears_history() {
    let (app, client) = app();
    client.generate_text("5", 1, "remember me").await.unwrap();

    let response = app
        .oneshot(post_message(json!({
            "conversation_id": "5",
            "author_id": 1,
            "text": "/reset"
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["reply"], "Reset successfully");
    assert!(client.conversation("5").await.messages.is_empty());
}

#[tokio::test]
async fn empty_text_is_bad_request() {
    let (app, _) = app();

    let response = app
        .oneshot(post_message(json!({
            "conversation_id": "5",
            "author_id": 1,
            "text": "   "
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn generation_failure_is_bad_gateway() {
    let (app, client) = app();

    let response = app
        .oneshot(post_message(json!({
            "conversation_id": "9",
            "author_id": 1,
            "text": "please fail"
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body = json_body(response).await;
    assert_eq!(body["error"], "LlmError");
    assert_eq!(body["message"], "model exploded");
    assert!(client.conversation("9").await.messages.is_empty());
}

#[tokio::test]
async fn missing_field_is_bad_request_with_json_body() {
    let (app, _) = app();

    let response = app
        .oneshot(post_message(json!({
            "conversation_id": "5",
            "text": "hi"
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["error"], "BadRequest");
    assert!(body["message"].as_str().unwrap().contains("author_id"));
}

#[tokio::test]
async fn broken_json_is_bad_request_with_json_body() {
    let (app, _) = app();

    let request = Request::builder()
        .method("POST")
        .uri("/api/messages")
        .header("content-type", "application/json")
        .body(Body::from("{\"conversation_id\": \"5\","))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "BadRequest");
}

#[tokio::test]
async fn chats_outside_allow_list_get_refusal() {
    let (app, client) = app_with(ConversationConfig {
        allowed_conversations: vec!["-1001905601063".to_string()],
        refusal_reply: "To use this bot please contact the owner".to_string(),
        ..ConversationConfig::default()
    });

    let response = app
        .oneshot(post_message(json!({
            "conversation_id": "777",
            "author_id": 1,
            "text": "hi"
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        json_body(response).await["reply"],
        "To use this bot please contact the owner"
    );
    assert!(client.conversation("777").await.messages.is_empty());
}
