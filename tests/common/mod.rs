#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{header::CONTENT_TYPE, Method, Request, Response},
    Router,
};
use serde_json::Value;
use tower::ServiceExt;

use userhub::{app::build_app, state::AppState};

/// Full router (CORS, tracing, fallback) over an in-memory user store.
pub fn build_test_app() -> (Router, AppState) {
    let state = AppState::in_memory();
    let app = build_app(state.clone()).expect("router should build");
    (app, state)
}

/// Same router over a caller-provided state.
pub fn build_app_with(state: AppState) -> Router {
    build_app(state).expect("router should build")
}

pub async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> Response<Body> {
    let mut req = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            req = req.header(CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    app.clone()
        .oneshot(req.body(body).expect("request"))
        .await
        .expect("router is infallible")
}

/// Sends `body` verbatim as `application/json`, well-formed or not.
pub async fn send_raw(app: &Router, method: Method, uri: &str, body: &str) -> Response<Body> {
    let req = Request::builder()
        .method(method)
        .uri(uri)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request");
    app.clone().oneshot(req).await.expect("router is infallible")
}

pub async fn get(app: &Router, uri: &str) -> Response<Body> {
    send(app, Method::GET, uri, None).await
}

pub async fn post_json(app: &Router, uri: &str, body: Value) -> Response<Body> {
    send(app, Method::POST, uri, Some(body)).await
}

pub async fn put_json(app: &Router, uri: &str, body: Value) -> Response<Body> {
    send(app, Method::PUT, uri, Some(body)).await
}

pub async fn delete(app: &Router, uri: &str) -> Response<Body> {
    send(app, Method::DELETE, uri, None).await
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("body should be JSON")
}
