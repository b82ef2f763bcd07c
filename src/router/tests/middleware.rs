use super::{get_body_string, get_request, options_request, send};
use crate::{
    Config, Error, FetchEvent, HttpCorsConfig, HttpSessionConfig, Next, Router,
    middleware::{Session, cors, session},
};
use http::{HeaderValue, Request, StatusCode, header};

fn hello(router: Router) -> Router {
    router.get("/hello", |_event: FetchEvent| async { Ok::<_, Error>("hello") })
}

#[tokio::test]
async fn test_middleware_post_processes_response() {
    let router = Router::new().middleware(|_event: FetchEvent, next: Next| async move {
        let mut response = next.run().await?;
        response
            .headers_mut()
            .insert("x-powered-by", HeaderValue::from_static("keywork"));
        Ok::<_, Error>(response)
    });
    let router = hello(router);

    let response = send(&router, get_request("/hello")).await;
    assert_eq!(response.headers()["x-powered-by"], "keywork");
    assert_eq!(get_body_string(response).await, "hello");

    // Middleware also wraps the 404 at the end of the chain.
    let response = send(&router, get_request("/nope")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(response.headers()["x-powered-by"], "keywork");
}

#[tokio::test]
async fn test_middleware_passes_data_downstream() {
    #[derive(Clone)]
    struct User(&'static str);

    let router = Router::new()
        .middleware(|event: FetchEvent| async move {
            event.insert_data(User("ada"));
            Ok::<_, Error>(())
        })
        .get("/me", |event: FetchEvent| async move {
            let user = event.data::<User>().map(|u| u.0).unwrap_or("anonymous");
            Ok::<_, Error>(user.to_string())
        });

    let response = send(&router, get_request("/me")).await;
    assert_eq!(get_body_string(response).await, "ada");
}

#[tokio::test]
async fn test_cors_preflight_wildcard() {
    let router = hello(Router::new().middleware(cors(HttpCorsConfig::default())));

    let response = send(&router, options_request("/hello", "https://any.example")).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    assert!(response.headers().contains_key(header::ACCESS_CONTROL_ALLOW_METHODS));
}

#[tokio::test]
async fn test_cors_preflight_configured_origins() {
    let config = HttpCorsConfig::default().with_allowed_origins(vec!["https://app.example.com".into()]);
    let router = hello(Router::new().setup_cors(config));

    let response = send(&router, options_request("/hello", "https://app.example.com")).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "https://app.example.com"
    );
    assert_eq!(response.headers()[header::VARY], "Origin");

    let response = send(&router, options_request("/hello", "https://evil.example")).await;
    assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "false");
}

#[tokio::test]
async fn test_cors_simple_request_headers() {
    let config = HttpCorsConfig::default()
        .with_allow_credentials()
        .with_allowed_origins(vec!["https://app.example.com".into()]);
    let router = hello(Router::new().setup_cors(config));

    let request = Request::get("/hello")
        .header(header::ORIGIN, "https://app.example.com")
        .body(axum::body::Body::empty())
        .unwrap();
    let response = send(&router, request).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "https://app.example.com"
    );
    assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
    assert_eq!(get_body_string(response).await, "hello");
}

#[tokio::test]
async fn test_session_cookie_issued_then_recognized() {
    let router = Router::new()
        .middleware(session(HttpSessionConfig::default()))
        .get("/whoami", |event: FetchEvent| async move {
            let session = event.data::<Session>().ok_or_else(|| Error::internal("no session"))?;
            Ok::<_, Error>(format!("{}:{}", session.id, session.is_new))
        });

    let response = send(&router, get_request("/whoami")).await;
    let cookie = response.headers()[header::SET_COOKIE].to_str().unwrap().to_string();
    assert!(cookie.starts_with("session_id="));
    assert!(cookie.contains("HttpOnly"));
    let body = get_body_string(response).await;
    let (id, is_new) = body.split_once(':').unwrap();
    assert_eq!(is_new, "true");
    assert!(cookie.contains(id));

    let request = Request::get("/whoami")
        .header(header::COOKIE, format!("session_id={id}"))
        .body(axum::body::Body::empty())
        .unwrap();
    let response = send(&router, request).await;
    assert!(response.headers().get(header::SET_COOKIE).is_none());
    assert_eq!(get_body_string(response).await, format!("{id}:false"));
}

#[tokio::test]
async fn test_from_config_installs_middleware() {
    let config: Config = r#"
        [http]
        include_debug_headers = true
        debug_routes = true

        [http.cors]
        allowed_origins = ["https://app.example.com"]

        [http.session]
        secure = false
    "#
    .parse()
    .unwrap();

    let router = hello(Router::from_config(&config).unwrap());
    assert!(router.router_options().include_debug_headers);

    let response = send(&router, get_request("/hello")).await;
    assert!(response.headers().contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
    let cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
    assert!(!cookie.contains("Secure"));

    let response = send(&router, get_request("/keywork/routes")).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_from_config_rejects_invalid_cors() {
    let config = Config::default().with_cors_config(HttpCorsConfig::default().with_allow_credentials());
    assert!(Router::from_config(&config).is_err());
}
