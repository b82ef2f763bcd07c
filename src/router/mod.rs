//!
//! The ordered route table and its `next()`-chained dispatch.
//!
//! A [`Router`] holds route entries in registration order. Each entry is either a
//! handler bound to a method and URL pattern, or a mount that delegates every path
//! under a prefix to another router or [`Fetcher`].
//!
//! For each request the router walks the entries from the top:
//!
//! - A matching handler is invoked with the event and a [`Next`] continuation. If it
//!   returns nothing without calling `next`, the walk continues with the following
//!   entry. Otherwise its result is converted into the response.
//! - A matching mount rebases the path (the prefix is stripped) and delegates. When
//!   a mounted router runs out of entries the walk resumes in the parent.
//! - Exhausting the root table produces a 404.
//!
//! Registration order is match priority. There is no specificity sorting, so
//! register specific routes before catch-alls.
//!
//! ```rust
//! use keywork::{Env, Error, FetchEvent, Json, Router};
//! use axum::body::Body;
//! use http::{Request, StatusCode};
//!
//! async fn todo(event: FetchEvent) -> Result<Json<serde_json::Value>, Error> {
//!     let id = event.param("id").unwrap_or_default();
//!     Ok(Json(serde_json::json!({ "id": id })))
//! }
//!
//! # #[tokio::main]
//! # async fn main() {
//! let router = Router::new().get("/todo/:id", todo);
//!
//! let request = Request::get("/todo/2").body(Body::empty()).unwrap();
//! let response = router.fetch(request, Env::default()).await;
//! assert_eq!(response.status(), StatusCode::OK);
//! # }
//! ```
//!

mod entry;
mod handler;
mod next;

#[cfg(test)]
mod tests;

pub use entry::{HttpMethod, RouteInfo};
pub use handler::{HandlerFuture, RouteHandler};
pub use next::Next;

use {
    crate::{
        Config, Env, Error, FetchEvent, Fetcher, HttpCorsConfig, HttpSessionConfig, Json,
        MatchResult, Result, UrlPattern,
        event::DEFAULT_BODY_LIMIT,
        middleware,
        pattern::PatternInit,
        ssr::RenderOptions,
    },
    axum::body::Body,
    entry::{MountTarget, RouteEntry},
    futures::{FutureExt, future::BoxFuture},
    http::{HeaderValue, Method, Request, Response},
    std::{panic::AssertUnwindSafe, sync::Arc},
    tracing::Instrument,
    url::Url,
};

/// Path of the route listing served by [`Router::with_debug_routes`].
pub const DEBUG_ROUTES_PATH: &str = "/keywork/routes";

/// Header listing the attempted patterns on a 404 when debug headers are enabled.
pub const ATTEMPTED_ROUTES_HEADER: &str = "x-keywork-attempted-routes";

/// Router-wide settings.
#[derive(Debug, Clone)]
pub struct RouterOptions {
    /// Name used in log spans.
    pub display_name: String,
    /// Attach [`ATTEMPTED_ROUTES_HEADER`] to 404 responses.
    pub include_debug_headers: bool,
    /// Limit for request bodies read through the event.
    pub max_payload_size: usize,
}

impl Default for RouterOptions {
    fn default() -> Self {
        Self {
            display_name: "keywork".into(),
            include_debug_headers: false,
            max_payload_size: DEFAULT_BODY_LIMIT,
        }
    }
}

impl RouterOptions {
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    pub fn with_debug_headers(mut self, enable: bool) -> Self {
        self.include_debug_headers = enable;
        self
    }
}

#[derive(Clone, Default)]
struct RouterInner {
    options: RouterOptions,
    entries: Vec<RouteEntry>,
    render: RenderOptions,
}

/// An ordered route table. Cheap to clone; treat it as read-only once serving.
#[derive(Clone, Default)]
pub struct Router {
    inner: Arc<RouterInner>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: RouterOptions) -> Self {
        Self {
            inner: Arc::new(RouterInner {
                options,
                ..Default::default()
            }),
        }
    }

    /// Creates a router from configuration and installs the middleware it enables:
    /// CORS, sessions and the route listing, in that order.
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;
        let max_payload_size = usize::try_from(config.http.max_payload_size_bytes.as_u64())
            .map_err(|_| Error::config("max_payload_size_bytes does not fit in memory"))?;

        let router = Self::with_options(RouterOptions {
            include_debug_headers: config.http.include_debug_headers,
            max_payload_size,
            ..Default::default()
        });
        Ok(router.setup_middleware(config))
    }

    /// Installs the middleware enabled in `config`.
    pub fn setup_middleware(self, config: &Config) -> Self {
        let mut router = self;
        if let Some(cors) = &config.http.cors {
            router = router.setup_cors(cors.clone());
        }
        if let Some(session) = &config.http.session {
            router = router.setup_session(session.clone());
        }
        if config.http.debug_routes {
            router = router.with_debug_routes();
        }
        router
    }

    /// Registers the CORS middleware for every path.
    pub fn setup_cors(self, config: HttpCorsConfig) -> Self {
        self.middleware(middleware::cors(config))
    }

    /// Registers the session middleware for every path.
    pub fn setup_session(self, config: HttpSessionConfig) -> Self {
        self.middleware(middleware::session(config))
    }

    pub fn with_render_options(mut self, render: RenderOptions) -> Self {
        Arc::make_mut(&mut self.inner).render = render;
        self
    }

    pub fn render_options(&self) -> &RenderOptions {
        &self.inner.render
    }

    pub fn router_options(&self) -> &RouterOptions {
        &self.inner.options
    }

    pub fn display_name(&self) -> &str {
        &self.inner.options.display_name
    }

    fn push(mut self, entry: RouteEntry) -> Self {
        Arc::make_mut(&mut self.inner).entries.push(entry);
        self
    }

    pub(crate) fn entry(&self, index: usize) -> Option<&RouteEntry> {
        self.inner.entries.get(index)
    }

    /// Appends a handler for `method` and `pattern`.
    ///
    /// Registering several handlers for the same pattern chains them: each one
    /// reaches the next through its [`Next`].
    pub fn register<H, T>(self, method: HttpMethod, pattern: impl Into<PatternInit>, handler: H) -> Self
    where
        H: RouteHandler<T>,
        T: 'static,
    {
        self.push(RouteEntry::Handler {
            pattern: UrlPattern::new(pattern),
            method,
            handler: handler::boxed(handler),
        })
    }

    pub fn get<H: RouteHandler<T>, T: 'static>(self, pattern: impl Into<PatternInit>, handler: H) -> Self {
        self.register(HttpMethod::Get, pattern, handler)
    }

    pub fn post<H: RouteHandler<T>, T: 'static>(self, pattern: impl Into<PatternInit>, handler: H) -> Self {
        self.register(HttpMethod::Post, pattern, handler)
    }

    pub fn put<H: RouteHandler<T>, T: 'static>(self, pattern: impl Into<PatternInit>, handler: H) -> Self {
        self.register(HttpMethod::Put, pattern, handler)
    }

    pub fn patch<H: RouteHandler<T>, T: 'static>(self, pattern: impl Into<PatternInit>, handler: H) -> Self {
        self.register(HttpMethod::Patch, pattern, handler)
    }

    pub fn delete<H: RouteHandler<T>, T: 'static>(self, pattern: impl Into<PatternInit>, handler: H) -> Self {
        self.register(HttpMethod::Delete, pattern, handler)
    }

    pub fn head<H: RouteHandler<T>, T: 'static>(self, pattern: impl Into<PatternInit>, handler: H) -> Self {
        self.register(HttpMethod::Head, pattern, handler)
    }

    pub fn options<H: RouteHandler<T>, T: 'static>(self, pattern: impl Into<PatternInit>, handler: H) -> Self {
        self.register(HttpMethod::Options, pattern, handler)
    }

    /// Registers a handler for every method.
    pub fn all<H: RouteHandler<T>, T: 'static>(self, pattern: impl Into<PatternInit>, handler: H) -> Self {
        self.register(HttpMethod::Any, pattern, handler)
    }

    /// Registers a handler for every method and path. Middleware registered this way
    /// wraps every route registered after it.
    pub fn middleware<H: RouteHandler<T>, T: 'static>(self, handler: H) -> Self {
        self.all("*", handler)
    }

    /// Delegates every path under `prefix` to `router`, with the prefix stripped.
    pub fn mount(self, prefix: impl Into<PatternInit>, router: Router) -> Self {
        self.push_mount(prefix.into(), MountTarget::Router(router))
    }

    /// Forwards every request under `prefix` to `fetcher`, with the prefix stripped.
    pub fn mount_fetcher(self, prefix: impl Into<PatternInit>, fetcher: impl Fetcher) -> Self {
        self.push_mount(prefix.into(), MountTarget::Fetcher(Arc::new(fetcher)))
    }

    fn push_mount(self, prefix: PatternInit, target: MountTarget) -> Self {
        self.push(RouteEntry::Mount {
            prefix: UrlPattern::mount_prefix(prefix),
            target,
        })
    }

    /// Serves the route listing as JSON at [`DEBUG_ROUTES_PATH`].
    pub fn with_debug_routes(self) -> Self {
        self.get(DEBUG_ROUTES_PATH, |_event: FetchEvent, next: Next| async move {
            Ok::<_, Error>(Json(next.router().routes()))
        })
    }

    /// Lists the registered routes in match order.
    pub fn routes(&self) -> Vec<RouteInfo> {
        self.inner.entries.iter().map(RouteEntry::info).collect()
    }

    /// Returns the match of the first handler entry that would receive a request,
    /// without invoking anything. `url` may be a bare path.
    pub fn match_route(&self, method: &Method, url: &str) -> Option<MatchResult> {
        let url = Url::parse(url)
            .or_else(|_| Url::parse("http://localhost").and_then(|base| base.join(url)))
            .ok()?;
        self.match_url(method, &url)
    }

    fn match_url(&self, method: &Method, url: &Url) -> Option<MatchResult> {
        self.inner.entries.iter().find_map(|entry| match entry {
            RouteEntry::Handler {
                pattern,
                method: entry_method,
                ..
            } if entry_method.matches(method) => pattern.exec(url),
            RouteEntry::Handler { .. } => None,
            RouteEntry::Mount {
                prefix,
                target: MountTarget::Router(router),
                ..
            } => {
                let remainder = prefix.exec(url)?.remainder()?.to_string();
                let mut nested = url.clone();
                nested.set_path(&rebased_path(&remainder));
                router.match_url(method, &nested)
            }
            RouteEntry::Mount { prefix, .. } => prefix.exec(url),
        })
    }

    /// Handles a request end to end and schedules the deferred-task flush.
    ///
    /// Never fails: every error becomes an error response.
    pub async fn fetch(&self, request: Request<Body>, env: Env) -> Response<Body> {
        let event = match FetchEvent::with_body_limit(request, env, self.inner.options.max_payload_size) {
            Ok(event) => event,
            Err(err) => return err.into_response(),
        };
        let response = self.handle(&event).await;
        spawn_flush(event);
        response
    }

    /// Routes an existing event. The caller is responsible for flushing its
    /// deferred tasks.
    pub async fn handle(&self, event: &FetchEvent) -> Response<Body> {
        let span = tracing::info_span!(
            "fetch",
            method = %event.method(),
            path = %event.url().path(),
            router = %self.display_name(),
        );

        async {
            let outcome = AssertUnwindSafe(next::dispatch(self.clone(), 0, event.clone(), None))
                .catch_unwind()
                .await;
            let response = match outcome {
                Ok(Ok(response)) => response,
                Ok(Err(err)) => err.into_response(),
                Err(_) => {
                    tracing::error!("Route handler panicked");
                    Error::internal("route handler panicked").into_response()
                }
            };
            tracing::debug!(status = response.status().as_u16(), "Request handled");
            response
        }
        .instrument(span)
        .await
    }

    pub(crate) fn not_found(&self, event: &FetchEvent) -> Response<Body> {
        let attempted = event.attempted_routes();
        tracing::debug!(attempted = attempted.len(), "No route matched");

        let mut response = Error::not_found("Not Found").into_response();
        if self.inner.options.include_debug_headers {
            match HeaderValue::from_str(&attempted.join(", ")) {
                Ok(value) => {
                    response.headers_mut().insert(ATTEMPTED_ROUTES_HEADER, value);
                }
                Err(err) => {
                    tracing::warn!(error = %err, "Attempted routes are not a valid header value");
                }
            }
        }
        response
    }
}

/// The path a mounted target sees: the remainder after the prefix, rooted at `/`.
pub(crate) fn rebased_path(remainder: &str) -> String {
    if remainder.starts_with('/') {
        remainder.to_string()
    } else {
        format!("/{remainder}")
    }
}

pub(crate) fn spawn_flush(event: FetchEvent) {
    if event.pending_tasks() > 0 {
        tokio::spawn(async move {
            event.flush_deferred().await;
        });
    }
}

impl Fetcher for Router {
    /// Routes the request with an empty environment.
    fn fetch(&self, request: Request<Body>) -> BoxFuture<'static, Result<Response<Body>>> {
        let router = self.clone();
        Box::pin(async move { Ok(router.fetch(request, Env::default()).await) })
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("options", &self.inner.options)
            .field("routes", &self.routes())
            .finish()
    }
}
