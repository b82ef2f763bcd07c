use {
    super::{
        Router, rebased_path,
        entry::{MountTarget, RouteEntry},
    },
    crate::{Error, FetchEvent, ResponseLike, Result, cast_to_response},
    axum::body::Body,
    futures::future::BoxFuture,
    http::Response,
    std::{
        fmt,
        sync::{
            Arc,
            atomic::{AtomicBool, Ordering},
        },
    },
};

/// The continuation handed to every handler.
///
/// Calling [`Next::run`] resumes the route walk after the current entry and
/// resolves to the response the rest of the chain produced. Middleware typically
/// runs it, adjusts the response, and returns it.
#[derive(Clone)]
pub struct Next {
    router: Router,
    cursor: usize,
    event: FetchEvent,
    parent: Option<Arc<Next>>,
    invoked: Arc<AtomicBool>,
}

impl Next {
    fn new(router: Router, cursor: usize, event: FetchEvent, parent: Option<Arc<Next>>) -> Self {
        Self {
            router,
            cursor,
            event,
            parent,
            invoked: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Runs the rest of the chain.
    pub async fn run(self) -> Result<Response<Body>> {
        self.invoked.store(true, Ordering::SeqCst);
        dispatch(self.router, self.cursor, self.event, self.parent).await
    }

    /// The router that owns the current entry.
    pub fn router(&self) -> &Router {
        &self.router
    }

    fn was_invoked(&self) -> bool {
        self.invoked.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for Next {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Next")
            .field("router", &self.router.display_name())
            .field("cursor", &self.cursor)
            .field("nested", &self.parent.is_some())
            .finish()
    }
}

/// Walks the route table of `router` from `cursor`.
///
/// When the table is exhausted the walk continues in `parent` (the router that
/// mounted this one), and at the root it ends in a 404.
pub(crate) fn dispatch(
    router: Router,
    cursor: usize,
    event: FetchEvent,
    parent: Option<Arc<Next>>,
) -> BoxFuture<'static, Result<Response<Body>>> {
    Box::pin(async move {
        let mut index = cursor;
        while let Some(entry) = router.entry(index) {
            index += 1;
            event.record_attempt(entry.label());

            match entry {
                RouteEntry::Handler {
                    pattern,
                    method,
                    handler,
                } => {
                    if !method.matches(event.method()) {
                        continue;
                    }
                    let Some(matched) = pattern.exec(event.url()) else {
                        continue;
                    };

                    let scoped = event.with_match(matched);
                    let next = Next::new(router.clone(), index, event.clone(), parent.clone());
                    let invoked = next.clone();
                    tracing::trace!(route = %pattern, method = %method, "Route matched");

                    match (handler.as_ref())(scoped.clone(), next).await? {
                        ResponseLike::Empty if !invoked.was_invoked() => {
                            tracing::trace!(route = %pattern, "Handler fell through");
                        }
                        ResponseLike::Empty => {
                            return Err(Error::usage(format!(
                                "The handler for `{method} {pattern}` ran next() but returned nothing. \
                                 Return the response produced by next() instead"
                            )));
                        }
                        value => {
                            return cast_to_response(&scoped, value, router.render_options()).await;
                        }
                    }
                }
                RouteEntry::Mount { prefix, target } => {
                    let Some(matched) = prefix.exec(event.url()) else {
                        continue;
                    };
                    let path = rebased_path(matched.remainder().unwrap_or_default());
                    let nested = event.with_match(matched).rebased(&path);
                    tracing::trace!(prefix = %prefix, path = %path, "Delegating to mount");

                    return match target {
                        MountTarget::Router(subrouter) => {
                            let resume = Next::new(router.clone(), index, event.clone(), parent.clone());
                            dispatch(subrouter.clone(), 0, nested, Some(Arc::new(resume))).await
                        }
                        MountTarget::Fetcher(fetcher) => fetcher.fetch(nested.take_request()?).await,
                    };
                }
            }
        }

        match parent {
            Some(parent) => {
                let resume = Arc::unwrap_or_clone(parent);
                dispatch(resume.router, resume.cursor, resume.event, resume.parent).await
            }
            None => Ok(router.not_found(&event)),
        }
    })
}
