//!
//! Environment bindings handed to every request.
//!
//! An [`Env`] maps binding names to runtime-provided capabilities: plain text
//! variables and secrets, fetch-capable services, and arbitrary typed values such as
//! key-value store clients. The framework never locks or otherwise coordinates access
//! to a binding; each binding is responsible for its own concurrency.
//!

use {
    crate::Result,
    axum::body::Body,
    futures::future::BoxFuture,
    http::{Request, Response},
    std::{any::Any, collections::BTreeMap, fmt, future::Future, sync::Arc},
};

/// The explicit fetch capability.
///
/// Anything that can answer a request is a `Fetcher`: a [`crate::Router`], a proxied
/// upstream service, or a closure wrapped with [`fetcher_fn`].
pub trait Fetcher: Send + Sync + 'static {
    fn fetch(&self, request: Request<Body>) -> BoxFuture<'static, Result<Response<Body>>>;
}

impl<F: Fetcher + ?Sized> Fetcher for Arc<F> {
    fn fetch(&self, request: Request<Body>) -> BoxFuture<'static, Result<Response<Body>>> {
        (**self).fetch(request)
    }
}

/// A [`Fetcher`] backed by a closure. See [`fetcher_fn`].
#[derive(Clone)]
pub struct FnFetcher<F>(F);

/// Wraps an async function into a [`Fetcher`].
///
/// ```rust
/// use keywork::{Env, fetcher_fn};
/// use axum::body::Body;
/// use http::{Request, Response};
///
/// let upstream = fetcher_fn(|_req: Request<Body>| async {
///     Ok(Response::new(Body::from("from upstream")))
/// });
/// let env = Env::new().with_fetcher("UPSTREAM", upstream);
/// assert!(env.fetcher("UPSTREAM").is_some());
/// ```
pub fn fetcher_fn<F, Fut>(f: F) -> FnFetcher<F>
where
    F: Fn(Request<Body>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Response<Body>>> + Send + 'static,
{
    FnFetcher(f)
}

impl<F, Fut> Fetcher for FnFetcher<F>
where
    F: Fn(Request<Body>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Response<Body>>> + Send + 'static,
{
    fn fetch(&self, request: Request<Body>) -> BoxFuture<'static, Result<Response<Body>>> {
        Box::pin((self.0)(request))
    }
}

/// A single environment binding.
#[derive(Clone)]
pub enum Binding {
    /// A plain variable or secret.
    Text(String),
    /// A fetch-capable service.
    Fetcher(Arc<dyn Fetcher>),
    /// Any other runtime capability, retrieved with [`Env::get`].
    Value(Arc<dyn Any + Send + Sync>),
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // Text bindings are frequently secrets.
            Binding::Text(_) => f.write_str("Text(..)"),
            Binding::Fetcher(_) => f.write_str("Fetcher"),
            Binding::Value(_) => f.write_str("Value"),
        }
    }
}

/// A cheap-to-clone map of binding name to [`Binding`].
#[derive(Clone, Default)]
pub struct Env {
    bindings: Arc<BTreeMap<String, Binding>>,
}

impl Env {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a binding.
    pub fn with_binding(mut self, name: impl Into<String>, binding: Binding) -> Self {
        Arc::make_mut(&mut self.bindings).insert(name.into(), binding);
        self
    }

    /// Adds a text variable.
    pub fn with_text(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.with_binding(name, Binding::Text(value.into()))
    }

    /// Adds a fetch-capable service.
    pub fn with_fetcher(self, name: impl Into<String>, fetcher: impl Fetcher) -> Self {
        self.with_binding(name, Binding::Fetcher(Arc::new(fetcher)))
    }

    /// Adds a typed value.
    pub fn with_value<T: Any + Send + Sync>(self, name: impl Into<String>, value: T) -> Self {
        self.with_binding(name, Binding::Value(Arc::new(value)))
    }

    pub fn binding(&self, name: &str) -> Option<&Binding> {
        self.bindings.get(name)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        match self.bindings.get(name)? {
            Binding::Text(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the named binding if it is fetch-capable.
    pub fn fetcher(&self, name: &str) -> Option<Arc<dyn Fetcher>> {
        match self.bindings.get(name)? {
            Binding::Fetcher(fetcher) => Some(Arc::clone(fetcher)),
            _ => None,
        }
    }

    /// Returns the named value binding if it holds a `T`.
    pub fn get<T: Any + Send + Sync>(&self, name: &str) -> Option<Arc<T>> {
        match self.bindings.get(name)? {
            Binding::Value(value) => Arc::clone(value).downcast::<T>().ok(),
            _ => None,
        }
    }

    /// All binding names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.bindings.keys().map(String::as_str).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

impl fmt::Debug for Env {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.bindings.iter()).finish()
    }
}
