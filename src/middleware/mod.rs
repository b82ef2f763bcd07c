//!
//! Middleware built on the `next()` chain.
//!
//! Each function here returns a handler for [`crate::Router::middleware`] (or any
//! other registration method). The handler runs the rest of the chain through
//! [`crate::Next::run`] and adjusts the response on its way out.
//!
//! ```rust
//! use keywork::{HttpCorsConfig, Router, middleware};
//!
//! let router = Router::new()
//!     .middleware(middleware::cors(HttpCorsConfig::default()))
//!     .get("/", |_event: keywork::FetchEvent| async { Ok::<_, keywork::Error>("hello") });
//! ```
//!

mod binding;
mod cors;
mod session;

pub use binding::service_binding;
pub use cors::cors;
pub use session::{Session, session};

use {
    crate::{FetchEvent, Next, Result},
    axum::body::Body,
    futures::future::BoxFuture,
    http::Response,
};

/// The future returned by the middleware in this module.
pub type MiddlewareFuture = BoxFuture<'static, Result<Response<Body>>>;

/// The shape of every middleware in this module.
pub trait Middleware: Fn(FetchEvent, Next) -> MiddlewareFuture + Clone + Send + Sync + 'static {}

impl<F> Middleware for F where F: Fn(FetchEvent, Next) -> MiddlewareFuture + Clone + Send + Sync + 'static {}
