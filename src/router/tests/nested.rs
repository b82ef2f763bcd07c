use super::{get_body_json, get_body_string, get_request, send};
use crate::{Env, Error, FetchEvent, Json, Router, fetcher_fn, middleware::service_binding};
use axum::body::Body;
use http::{Method, Request, Response, StatusCode};
use serde_json::json;

fn api() -> Router {
    Router::new()
        .get("/users/:id", |event: FetchEvent| async move {
            Ok::<_, Error>(Json(json!({
                "id": event.param("id"),
                "path": event.url().path(),
                "original": event.original_url().path(),
            })))
        })
        .get("/", |_event: FetchEvent| async { Ok::<_, Error>("api root") })
}

#[tokio::test]
async fn test_mount_rebases_path() {
    let router = Router::new().mount("/api", api());

    let response = send(&router, get_request("/api/users/42")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        get_body_json(response).await,
        json!({ "id": "42", "path": "/users/42", "original": "/api/users/42" })
    );

    let response = send(&router, get_request("/api")).await;
    assert_eq!(get_body_string(response).await, "api root");
}

#[tokio::test]
async fn test_mount_respects_segment_boundary() {
    let router = Router::new().mount("/api", api());

    let response = send(&router, get_request("/apix/users/1")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_mount_on_named_param_prefix() {
    let tenant = Router::new().get("/x", |event: FetchEvent| async move {
        Ok::<_, Error>(Json(json!({
            "tenant": event.param("tenant"),
            "path": event.url().path(),
        })))
    });
    let router = Router::new().mount("/t/:tenant", tenant);

    let response = send(&router, get_request("/t/acme/x")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(get_body_json(response).await, json!({ "tenant": "acme", "path": "/x" }));

    let matched = router.match_route(&Method::GET, "/t/acme/x").unwrap();
    assert_eq!(matched.param("tenant"), Some("acme"));
    assert!(router.match_route(&Method::GET, "/t/acme/y").is_none());

    let response = send(&router, get_request("/t/acmex")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_mounted_router_falls_back_to_parent() {
    let router = Router::new()
        .mount("/api", api())
        .get("/api/*", |_event: FetchEvent| async { Ok::<_, Error>("parent catch-all") });

    let response = send(&router, get_request("/api/unknown")).await;
    assert_eq!(get_body_string(response).await, "parent catch-all");
}

#[tokio::test]
async fn test_match_route_recurses_into_mounts() {
    let router = Router::new().mount("/api", api());

    let matched = router.match_route(&Method::GET, "/api/users/5").unwrap();
    assert_eq!(matched.param("id"), Some("5"));
    assert!(router.match_route(&Method::POST, "/api/users/5").is_none());

    let routes = router.routes();
    assert_eq!(routes.len(), 1);
    assert_eq!(routes[0].routes.as_ref().map(Vec::len), Some(2));
}

#[tokio::test]
async fn test_mount_fetcher_forwards_rebased_request() {
    let upstream = fetcher_fn(|request: Request<Body>| async move {
        Ok(Response::new(Body::from(format!(
            "{} {}",
            request.method(),
            request.uri().path()
        ))))
    });
    let router = Router::new().mount_fetcher("/assets/", upstream);

    let response = send(&router, get_request("/assets/css/site.css")).await;
    assert_eq!(get_body_string(response).await, "GET /css/site.css");
}

#[tokio::test]
async fn test_router_as_fetcher() {
    let router = Router::new().mount_fetcher("/v1", api());

    let response = send(&router, get_request("/v1/users/3")).await;
    let body = get_body_json(response).await;
    assert_eq!(body["id"], "3");
    assert_eq!(body["path"], "/users/3");
}

#[tokio::test]
async fn test_service_binding_proxies_to_env() {
    let upstream = fetcher_fn(|request: Request<Body>| async move {
        Ok(Response::new(Body::from(format!("upstream {}", request.uri().path()))))
    });
    let env = Env::new().with_fetcher("UPSTREAM", upstream).with_text("MODE", "test");
    let router = Router::new()
        .all("/proxy/*", service_binding("UPSTREAM"))
        .all("/broken/*", service_binding("MISSING"));

    let response = router.fetch(get_request("/proxy/a"), env.clone()).await;
    assert_eq!(get_body_string(response).await, "upstream /proxy/a");

    let response = router.fetch(get_request("/broken/a"), env).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = get_body_string(response).await;
    assert!(body.contains("MISSING"));
    assert!(body.contains("MODE, UPSTREAM"));
}
