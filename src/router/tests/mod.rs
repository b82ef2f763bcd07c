//! Scenario tests for the router.
//!
//! Everything here runs in-process through [`Router::fetch`]; no sockets.
//!
//! - `matching`: registration order, method isolation, fallthrough, 404s
//! - `middleware`: `next()` chaining, CORS and sessions
//! - `nested`: mounted routers and fetchers
//! - `scenario`: a small todo application end to end

mod middleware;
mod nested;

use crate::{Env, Router};
use axum::body::Body;
use http::{Request, Response, header};
use http_body_util::BodyExt;

pub(crate) fn get_request(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

pub(crate) fn post_request(uri: &str, body: impl Into<Body>) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(body.into())
        .unwrap()
}

pub(crate) fn options_request(uri: &str, origin: &str) -> Request<Body> {
    Request::options(uri)
        .header(header::ORIGIN, origin)
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .body(Body::empty())
        .unwrap()
}

pub(crate) async fn get_body_string(response: Response<Body>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub(crate) async fn get_body_json(response: Response<Body>) -> serde_json::Value {
    let body = get_body_string(response).await;
    serde_json::from_str(&body).unwrap()
}

/// Sends `request` through `router` with an empty environment.
pub(crate) async fn send(router: &Router, request: Request<Body>) -> Response<Body> {
    router.fetch(request, Env::default()).await
}
