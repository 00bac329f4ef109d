//! RestBackend against a local fake of the hosted backend
//!
//! The fake records every request and answers from a canned
//! `(method, path) -> (status, body)` table.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{Request, State};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use serde_json::{json, Value};
use visionary_common::chat::{new_session, DEFAULT_WELCOME};
use visionary_common::schema::{SessionPatch, SettingRow};
use visionary_common::{Error, Template};
use visionary_store::backend::{Backend, RestBackend};

#[derive(Debug, Clone)]
struct Recorded {
    method: Method,
    path: String,
    query: String,
    headers: HeaderMap,
    body: Bytes,
}

impl Recorded {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap()
    }
}

#[derive(Clone, Default)]
struct Fake {
    requests: Arc<Mutex<Vec<Recorded>>>,
    responses: Arc<Mutex<HashMap<(Method, String), (StatusCode, Value)>>>,
}

impl Fake {
    fn respond(&self, method: Method, path: &str, status: StatusCode, body: Value) {
        self.responses
            .lock()
            .unwrap()
            .insert((method, path.to_string()), (status, body));
    }

    fn last(&self) -> Recorded {
        self.requests.lock().unwrap().last().cloned().unwrap()
    }
}

async fn record(State(fake): State<Fake>, request: Request) -> Response {
    let (parts, body) = request.into_parts();
    let body = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    let path = parts.uri.path().to_string();

    fake.requests.lock().unwrap().push(Recorded {
        method: parts.method.clone(),
        path: path.clone(),
        query: parts.uri.query().unwrap_or_default().to_string(),
        headers: parts.headers,
        body,
    });

    match fake.responses.lock().unwrap().get(&(parts.method, path)) {
        Some((status, body)) => (*status, Json(body.clone())).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

async fn start_fake(fake: Fake) -> String {
    let app = Router::new().fallback(record).with_state(fake);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn backend(base: &str) -> RestBackend {
    RestBackend::new(base, "eyTestKey", Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn test_fetch_templates_query_and_auth_headers() {
    let fake = Fake::default();
    fake.respond(
        Method::GET,
        "/rest/v1/templates",
        StatusCode::OK,
        json!([
            {"id": 12, "title": "Numeric id", "price": "¥1", "description": null,
             "image_url": "https://img.test/a.jpg", "video_url": "", "tags": ["a"]},
            {"id": "abc", "title": "Legacy", "imageUrl": "https://img.test/b.jpg",
             "videoUrl": "https://v.test/b.mp4"}
        ]),
    );
    let base = start_fake(fake.clone()).await;

    let templates = backend(&base).fetch_templates().await.unwrap();
    assert_eq!(templates.len(), 2);
    assert_eq!(templates[0].id, "12");
    assert_eq!(templates[0].video_url, None);
    assert_eq!(templates[1].image_url, "https://img.test/b.jpg");
    assert_eq!(templates[1].video_url.as_deref(), Some("https://v.test/b.mp4"));

    let req = fake.last();
    assert_eq!(req.method, Method::GET);
    assert!(req.query.contains("order=id.desc"));
    assert!(req.query.contains("select=*") || req.query.contains("select=%2A"));
    assert_eq!(req.header("apikey"), Some("eyTestKey"));
    assert_eq!(req.header("authorization"), Some("Bearer eyTestKey"));
}

#[tokio::test]
async fn test_insert_conflict_carries_backend_message() {
    let fake = Fake::default();
    fake.respond(
        Method::POST,
        "/rest/v1/templates",
        StatusCode::CONFLICT,
        json!({"code": "23505", "message": "duplicate key value violates unique constraint"}),
    );
    let base = start_fake(fake.clone()).await;

    let template = Template {
        id: "1".into(),
        title: "t".into(),
        price: "¥1".into(),
        description: String::new(),
        image_url: String::new(),
        video_url: None,
        tags: vec!["x".into()],
    };
    let err = backend(&base).insert_template(&template).await.unwrap_err();
    match err {
        Error::Backend(msg) => assert_eq!(msg, "duplicate key value violates unique constraint"),
        other => panic!("unexpected error: {:?}", other),
    }

    let req = fake.last();
    assert_eq!(req.header("prefer"), Some("return=minimal"));
    assert_eq!(req.json()[0]["tags"], json!(["x"]));
}

#[tokio::test]
async fn test_update_and_delete_filter_by_id() {
    let fake = Fake::default();
    let base = start_fake(fake.clone()).await;
    let rest = backend(&base);

    rest.delete_template("42").await.unwrap();
    let req = fake.last();
    assert_eq!(req.method, Method::DELETE);
    assert_eq!(req.query, "id=eq.42");
}

#[tokio::test]
async fn test_settings_upsert_merges_duplicates() {
    let fake = Fake::default();
    let base = start_fake(fake.clone()).await;

    backend(&base)
        .upsert_settings(&[SettingRow::new("wechat_id", "wx")])
        .await
        .unwrap();

    let req = fake.last();
    assert_eq!(req.path, "/rest/v1/settings");
    assert!(req
        .header("prefer")
        .unwrap()
        .contains("resolution=merge-duplicates"));
    assert_eq!(req.json(), json!([{"key": "wechat_id", "value": "wx"}]));
}

#[tokio::test]
async fn test_session_round_trip() {
    let fake = Fake::default();
    let session = new_session(&"user_abcdefghi".parse().unwrap(), DEFAULT_WELCOME, 1000);
    fake.respond(
        Method::GET,
        "/rest/v1/chat_sessions",
        StatusCode::OK,
        json!([session]),
    );
    let base = start_fake(fake.clone()).await;
    let rest = backend(&base);

    let fetched = rest.fetch_session("user_abcdefghi").await.unwrap().unwrap();
    assert_eq!(fetched, session);
    assert!(fake.last().query.contains("session_id=eq.user_abcdefghi"));

    let patch = SessionPatch::counters(&fetched);
    rest.update_session("user_abcdefghi", &patch).await.unwrap();
    let req = fake.last();
    assert_eq!(req.method, Method::PATCH);
    assert_eq!(
        req.json(),
        json!({"unread_admin_count": 0, "unread_user_count": 1})
    );
}

#[tokio::test]
async fn test_upload_returns_public_url() {
    let fake = Fake::default();
    fake.respond(
        Method::POST,
        "/storage/v1/object/chat-uploads/user_a_1.png",
        StatusCode::OK,
        json!({"Key": "chat-uploads/user_a_1.png"}),
    );
    let base = start_fake(fake.clone()).await;

    let url = backend(&base)
        .upload_object("chat-uploads", "user_a_1.png", "image/png", vec![1, 2, 3])
        .await
        .unwrap();
    assert_eq!(
        url,
        format!("{}/storage/v1/object/public/chat-uploads/user_a_1.png", base)
    );

    let req = fake.last();
    assert_eq!(req.header("content-type"), Some("image/png"));
    assert_eq!(req.body.as_ref(), &[1, 2, 3]);
}

#[tokio::test]
async fn test_unreachable_host_is_http_error() {
    // Nothing listens on port 1
    let rest = RestBackend::new("http://127.0.0.1:1", "eyKey", Duration::from_secs(2)).unwrap();
    assert!(matches!(rest.fetch_templates().await, Err(Error::Http(_))));
}
