use {
    super::Next,
    crate::{FetchEvent, ResponseLike, Result},
    futures::future::BoxFuture,
    std::{future::Future, sync::Arc},
};

/// The future every route handler is reduced to.
pub type HandlerFuture = BoxFuture<'static, Result<ResponseLike>>;

pub(crate) type BoxedHandler = Arc<dyn Fn(FetchEvent, Next) -> HandlerFuture + Send + Sync>;

/// An async function usable as a route handler or middleware.
///
/// Two shapes are accepted:
///
/// - `async fn(FetchEvent) -> Result<R>` for terminal handlers.
/// - `async fn(FetchEvent, Next) -> Result<R>` for middleware that wants to run the
///   rest of the chain with [`Next::run`] and post-process the response.
///
/// `R` is anything that converts into a [`ResponseLike`]. Returning nothing (`()`,
/// `None`, [`ResponseLike::Empty`]) without having called `next` falls through to
/// the following matching route.
///
/// The type parameter only disambiguates the two blanket implementations.
pub trait RouteHandler<T>: Send + Sync + 'static {
    fn call(&self, event: FetchEvent, next: Next) -> HandlerFuture;
}

impl<F, Fut, R> RouteHandler<(FetchEvent,)> for F
where
    F: Fn(FetchEvent) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R>> + Send + 'static,
    R: Into<ResponseLike>,
{
    fn call(&self, event: FetchEvent, _next: Next) -> HandlerFuture {
        let future = self(event);
        Box::pin(async move { future.await.map(Into::into) })
    }
}

impl<F, Fut, R> RouteHandler<(FetchEvent, Next)> for F
where
    F: Fn(FetchEvent, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R>> + Send + 'static,
    R: Into<ResponseLike>,
{
    fn call(&self, event: FetchEvent, next: Next) -> HandlerFuture {
        let future = self(event, next);
        Box::pin(async move { future.await.map(Into::into) })
    }
}

pub(crate) fn boxed<H, T>(handler: H) -> BoxedHandler
where
    H: RouteHandler<T>,
    T: 'static,
{
    Arc::new(move |event, next| handler.call(event, next))
}
