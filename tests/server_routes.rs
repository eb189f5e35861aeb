use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use siphon::database::Database;
use siphon::interface::Interface;
use siphon::server::router;

const SCHEMA: &str = "
todos: [todo]
tags: <string:int>
struct todo { title: string completed: bool }
";

fn app() -> Router {
    let db = Arc::new(Database::new(SCHEMA).expect("schema ok"));
    router(Arc::new(Interface::new(db)))
}

async fn send(app: &Router, method: &str, uri: &str, body: &str) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_owned()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn append_then_read_back() {
    let app = app();
    let (status, _) = send(&app, "POST", "/append?selector=todos", r#"{"title":"a","completed":false}"#).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, "POST", "/set?selector=todos%5B0%5D.completed", "true").await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = send(&app, "GET", "/json?selector=todos", "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([{"title": "a", "completed": true}]));
}

#[tokio::test]
async fn key_unset_and_empty() {
    let app = app();
    let (status, _) = send(&app, "POST", "/key?selector=tags", r#"{"key":"x","value":1}"#).await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = send(&app, "GET", "/json?selector=tags", "").await;
    assert_eq!(body, json!({"x": 1}));
    let (status, _) = send(&app, "POST", "/unset?selector=tags", r#""x""#).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = send(&app, "POST", "/unset?selector=tags", r#""x""#).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["kind"], "index");
    let (status, _) = send(&app, "POST", "/empty?selector=todos", "").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn whole_database_without_a_selector() {
    let app = app();
    let (status, body) = send(&app, "GET", "/json", "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"todos": [], "tags": {}}));
}

#[tokio::test]
async fn malformed_input_is_a_bad_request() {
    let app = app();
    let (status, body) = send(&app, "GET", "/json?selector=todos%5B", "").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "parse");
    let (status, body) = send(&app, "POST", "/append?selector=todos", "{not json").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "json");
}

#[tokio::test]
async fn application_errors_are_server_errors() {
    let app = app();
    let (status, body) = send(&app, "POST", "/set?selector=todos", r#"[{"title": 1, "completed": false}]"#).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["kind"], "type_mismatch");
    assert!(body["err"].as_str().is_some());
}

#[tokio::test]
async fn unknown_action_is_not_found() {
    let app = app();
    let (status, body) = send(&app, "POST", "/explode?selector=todos", "").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "noop");
}

#[tokio::test]
async fn schema_lists_top_level_types() {
    let app = app();
    let (status, body) = send(&app, "GET", "/schema", "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"todos": "[todo]", "tags": "<string:int>"}));
}
