use {
    super::{Middleware, MiddlewareFuture},
    crate::{Error, FetchEvent, Next},
    http::StatusCode,
    std::sync::Arc,
};

/// Proxies every request it receives, verbatim, to the fetch-capable binding
/// `name` in the event's [`crate::Env`].
///
/// A missing or non-fetch binding answers 500 with a message listing every
/// binding the environment does have.
///
/// ```rust
/// use keywork::{Env, Router, fetcher_fn, middleware::service_binding};
/// use axum::body::Body;
/// use http::{Request, Response};
///
/// # #[tokio::main]
/// # async fn main() {
/// let assets = fetcher_fn(|request: Request<Body>| async move {
///     Ok(Response::new(Body::from(format!("asset {}", request.uri().path()))))
/// });
/// let env = Env::new().with_fetcher("ASSETS", assets);
/// let router = Router::new().get("/static/*", service_binding("ASSETS"));
///
/// let request = Request::get("/static/app.js").body(Body::empty()).unwrap();
/// assert!(router.fetch(request, env).await.status().is_success());
/// # }
/// ```
pub fn service_binding(name: impl Into<String>) -> impl Middleware {
    let name: String = name.into();
    let name: Arc<str> = Arc::from(name);
    move |event: FetchEvent, _next: Next| -> MiddlewareFuture {
        let name = name.clone();
        Box::pin(async move {
            let Some(fetcher) = event.env().fetcher(&name) else {
                let known = event.env().names().join(", ");
                tracing::error!(binding = %name, known = %known, "Service binding is missing");
                return Ok(Error::resource(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("No fetch-capable binding named `{name}`. Known bindings: [{known}]"),
                )
                .into_response());
            };
            tracing::trace!(binding = %name, path = %event.url().path(), "Proxying to service binding");
            fetcher.fetch(event.take_request()?).await
        })
    }
}
