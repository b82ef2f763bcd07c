use {
    super::{Middleware, MiddlewareFuture},
    cookie::{Cookie, time::Duration as CookieDuration},
    crate::{FetchEvent, HttpSessionConfig, Next},
    http::{HeaderValue, header},
    std::sync::Arc,
    uuid::Uuid,
};

/// The session of the current request, available through
/// [`FetchEvent::data`] once the [`session`] middleware has run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub id: String,
    /// The request carried no session cookie, so one is issued on the response.
    pub is_new: bool,
}

/// Cookie-based session identifiers.
///
/// Reads the configured cookie, or issues a fresh UUIDv7 identifier when it is
/// missing, and stores a [`Session`] in the event data before running the rest of
/// the chain. New sessions get a `Set-Cookie` header on the response.
pub fn session(config: HttpSessionConfig) -> impl Middleware {
    let config = Arc::new(config);
    move |event: FetchEvent, next: Next| -> MiddlewareFuture {
        let config = config.clone();
        Box::pin(async move {
            let session = match cookie_value(&event, &config.cookie_name) {
                Some(id) => Session { id, is_new: false },
                None => Session {
                    id: Uuid::now_v7().to_string(),
                    is_new: true,
                },
            };
            tracing::trace!(session_id = %session.id, is_new = session.is_new, "Session resolved");
            event.insert_data(session.clone());

            let mut response = next.run().await?;
            if session.is_new {
                let cookie = HeaderValue::from_str(&session_cookie(&config, &session.id).to_string())?;
                response.headers_mut().append(header::SET_COOKIE, cookie);
            }
            Ok(response)
        })
    }
}

fn cookie_value(event: &FetchEvent, name: &str) -> Option<String> {
    event
        .headers()
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(|cookie| cookie.ok())
        .find(|cookie| cookie.name() == name && !cookie.value().is_empty())
        .map(|cookie| cookie.value().to_string())
}

fn session_cookie(config: &HttpSessionConfig, id: &str) -> Cookie<'static> {
    let mut cookie = Cookie::build((config.cookie_name.clone(), id.to_string()))
        .path(config.path.clone())
        .http_only(true)
        .same_site(config.same_site)
        .secure(config.secure);
    if let Some(max_age) = config.max_age {
        let seconds = i64::try_from(max_age.as_secs()).unwrap_or(i64::MAX);
        cookie = cookie.max_age(CookieDuration::seconds(seconds));
    }
    cookie.build()
}
