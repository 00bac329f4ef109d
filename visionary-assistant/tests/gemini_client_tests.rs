//! GeminiClient against a local fake of the generative-language API

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};
use visionary_assistant::gemini::GenerateRequest;
use visionary_assistant::{
    Assistant, AssistantError, GeminiClient, ImagePayload, Turn, EMPTY_CHAT_REPLY, EMPTY_IMAGE_REPLY,
    SYSTEM_INSTRUCTION,
};

#[derive(Clone, Default)]
struct Fake {
    requests: Arc<Mutex<Vec<(String, String, GenerateRequest)>>>,
    reply: Arc<Mutex<Value>>,
    status: Arc<Mutex<Option<StatusCode>>>,
}

async fn generate(
    State(fake): State<Fake>,
    Path(model_action): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    Json(body): Json<GenerateRequest>,
) -> (StatusCode, Json<Value>) {
    let key = query.get("key").cloned().unwrap_or_default();
    fake.requests.lock().unwrap().push((model_action, key, body));

    if let Some(status) = *fake.status.lock().unwrap() {
        return (status, Json(json!({"error": {"message": "quota exceeded"}})));
    }
    (StatusCode::OK, Json(fake.reply.lock().unwrap().clone()))
}

async fn start_fake(fake: Fake) -> String {
    let app = Router::new()
        .route("/v1beta/models/:model_action", post(generate))
        .with_state(fake);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}/v1beta", addr)
}

fn client(base: &str) -> GeminiClient {
    GeminiClient::new("test-key", "gemini-test", base, Duration::from_secs(5)).unwrap()
}

fn text_reply(text: &str) -> Value {
    json!({"candidates": [{"content": {"role": "model", "parts": [{"text": text}]}}]})
}

#[tokio::test]
async fn test_chat_sends_history_and_instruction() {
    let fake = Fake::default();
    *fake.reply.lock().unwrap() = text_reply("Try the travel pack.");
    let base = start_fake(fake.clone()).await;

    let reply = client(&base)
        .chat(&[Turn::user("hi"), Turn::model("hello")], "what fits a vlog?")
        .await
        .unwrap();
    assert_eq!(reply, "Try the travel pack.");

    let requests = fake.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    let (model_action, key, body) = &requests[0];
    assert_eq!(model_action, "gemini-test:generateContent");
    assert_eq!(key, "test-key");
    assert_eq!(
        body.system_instruction.as_ref().unwrap().parts[0].text.as_deref(),
        Some(SYSTEM_INSTRUCTION)
    );
    assert_eq!(body.contents.len(), 3);
    assert_eq!(body.contents[2].parts[0].text.as_deref(), Some("what fits a vlog?"));
}

#[tokio::test]
async fn test_empty_replies_become_canned_text() {
    let fake = Fake::default();
    *fake.reply.lock().unwrap() = json!({"candidates": []});
    let base = start_fake(fake.clone()).await;
    let client = client(&base);

    assert_eq!(client.chat(&[], "hi").await.unwrap(), EMPTY_CHAT_REPLY);

    let image = ImagePayload::parse("data:image/png;base64,aGVsbG8=").unwrap();
    assert_eq!(
        client.describe_image(&image, "describe").await.unwrap(),
        EMPTY_IMAGE_REPLY
    );

    let requests = fake.requests.lock().unwrap();
    let inline = requests[1].2.contents[0].parts[0].inline_data.as_ref().unwrap();
    assert_eq!(inline.mime_type, "image/png");
}

#[tokio::test]
async fn test_api_error_status_is_reported() {
    let fake = Fake::default();
    *fake.status.lock().unwrap() = Some(StatusCode::TOO_MANY_REQUESTS);
    let base = start_fake(fake).await;

    match client(&base).chat(&[], "hi").await {
        Err(AssistantError::ApiError(status, body)) => {
            assert_eq!(status, 429);
            assert!(body.contains("quota exceeded"));
        }
        other => panic!("expected ApiError, got {:?}", other),
    }
}

#[tokio::test]
async fn test_unreachable_service_is_network_error() {
    // Bind then drop to get a port nobody listens on
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let result = client(&format!("http://{}/v1beta", addr)).chat(&[], "hi").await;
    assert!(matches!(result, Err(AssistantError::NetworkError(_))));
}
