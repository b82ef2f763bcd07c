//!
//! The thin layer between a network server and the router.
//!
//! [`KeyworkService`] turns a [`Router`] plus an [`Env`] into a
//! [`tower::Service`], so it can sit behind `axum::serve`, hyper, or any tower
//! stack. [`serve`] is a ready-made TCP server around it.
//!

mod server;
mod shutdown;

pub use server::{app, serve, serve_with_shutdown};
pub use shutdown::{ShutdownNotifier, ShutdownPhase};

use {
    crate::{Env, Fetcher, Result, Router},
    axum::body::{Body, Bytes},
    futures::future::BoxFuture,
    http::{Request, Response},
    std::{
        convert::Infallible,
        task::{Context, Poll},
    },
};

/// A router bound to its environment, usable as a tower service.
///
/// Responses are returned as soon as the router produces them; deferred tasks
/// registered with [`crate::FetchEvent::wait_until`] keep running on a spawned task.
///
/// ```rust
/// use keywork::{Env, KeyworkService, Router};
/// use axum::body::Body;
/// use http::Request;
/// use tower::ServiceExt;
///
/// # #[tokio::main]
/// # async fn main() {
/// let router = Router::new().get("/", |_event: keywork::FetchEvent| async {
///     Ok::<_, keywork::Error>("hello")
/// });
/// let service = KeyworkService::new(router, Env::default());
///
/// let response = service
///     .oneshot(Request::get("/").body(Body::empty()).unwrap())
///     .await
///     .unwrap();
/// assert!(response.status().is_success());
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct KeyworkService {
    router: Router,
    env: Env,
}

impl KeyworkService {
    pub fn new(router: Router, env: Env) -> Self {
        Self { router, env }
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn env(&self) -> &Env {
        &self.env
    }
}

impl<B> tower::Service<Request<B>> for KeyworkService
where
    B: http_body::Body<Data = Bytes> + Send + 'static,
    B::Error: Into<axum::BoxError>,
{
    type Response = Response<Body>;
    type Error = Infallible;
    type Future = BoxFuture<'static, std::result::Result<Response<Body>, Infallible>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<std::result::Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request<B>) -> Self::Future {
        let router = self.router.clone();
        let env = self.env.clone();
        Box::pin(async move { Ok(router.fetch(request.map(Body::new), env).await) })
    }
}

impl Fetcher for KeyworkService {
    fn fetch(&self, request: Request<Body>) -> BoxFuture<'static, Result<Response<Body>>> {
        let router = self.router.clone();
        let env = self.env.clone();
        Box::pin(async move { Ok(router.fetch(request, env).await) })
    }
}
