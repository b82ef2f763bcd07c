//!
//! The per-request fetch event.
//!
//! A [`FetchEvent`] wraps one inbound request together with the environment
//! bindings, the current route match, a typed data map for middleware, and the
//! queue of deferred tasks registered through [`FetchEvent::wait_until`].
//!
//! The event is cheap to clone. Clones share the request, data and deferred
//! queue; only the current URL view and match are per-clone, which is how nested
//! routers see a rebased path while [`FetchEvent::original_url`] keeps the
//! external one.
//!

use {
    crate::{Env, Error, MatchResult, Result},
    axum::body::{Body, Bytes},
    futures::{FutureExt, future::BoxFuture},
    http::{
        Extensions, HeaderMap, Method, Request, StatusCode, Uri, Version, header,
        uri::Authority,
    },
    http_body_util::{BodyExt, LengthLimitError, Limited},
    serde::{Deserialize, Serialize, de::DeserializeOwned},
    std::{
        fmt,
        future::Future,
        panic::AssertUnwindSafe,
        sync::{Arc, Mutex, MutexGuard, PoisonError},
    },
    url::Url,
};

/// Body limit used when an event is created without one.
pub const DEFAULT_BODY_LIMIT: usize = 1024 * 1024;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct EventShared {
    method: Method,
    uri: Uri,
    version: Version,
    headers: HeaderMap,
    body: Mutex<Option<Body>>,
    body_limit: usize,
    original_url: Url,
    env: Env,
    data: Mutex<Extensions>,
    client_data: Mutex<serde_json::Map<String, serde_json::Value>>,
    deferred: Mutex<Vec<BoxFuture<'static, Result<()>>>>,
    attempted: Mutex<Vec<String>>,
}

/// One in-flight request.
#[derive(Clone)]
pub struct FetchEvent {
    shared: Arc<EventShared>,
    url: Url,
    matched: Arc<MatchResult>,
}

/// The serializable subset of a [`FetchEvent`] sent to the client for hydration.
///
/// Environment bindings are never part of it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventInit {
    pub url: String,
    #[serde(rename = "match")]
    pub matched: MatchResult,
    pub data: serde_json::Map<String, serde_json::Value>,
}

impl FetchEvent {
    /// Creates an event with the default body limit.
    pub fn new(request: Request<Body>, env: Env) -> Result<Self> {
        Self::with_body_limit(request, env, DEFAULT_BODY_LIMIT)
    }

    /// Creates an event whose body readers reject payloads above `body_limit` bytes.
    ///
    /// The absolute URL is taken from the request URI when it carries a scheme and
    /// authority, and is otherwise rebuilt from the `Host` header.
    pub fn with_body_limit(request: Request<Body>, env: Env, body_limit: usize) -> Result<Self> {
        let (parts, body) = request.into_parts();
        let original_url = absolute_url(&parts.uri, &parts.headers)?;

        Ok(Self {
            url: original_url.clone(),
            matched: Arc::new(MatchResult::default()),
            shared: Arc::new(EventShared {
                method: parts.method,
                uri: parts.uri,
                version: parts.version,
                headers: parts.headers,
                body: Mutex::new(Some(body)),
                body_limit,
                original_url,
                env,
                data: Mutex::new(parts.extensions),
                client_data: Mutex::new(serde_json::Map::new()),
                deferred: Mutex::new(Vec::new()),
                attempted: Mutex::new(Vec::new()),
            }),
        })
    }

    ///
    /// Named pathname groups of the current match (a mount prefix such as
    /// `/t/:tenant`) carry over unless the new match captures the same name.
    pub(crate) fn with_match(&self, mut matched: MatchResult) -> Self {
        let inherited = self
            .matched
            .params()
            .iter()
            .filter(|(name, _)| !name.chars().all(|c| c.is_ascii_digit()));
        for (name, value) in inherited {
            matched
                .pathname
                .groups
                .entry(name.clone())
                .or_insert_with(|| value.clone());
        }
        Self {
            shared: Arc::clone(&self.shared),
            url: self.url.clone(),
            matched: Arc::new(matched),
        }
    }

    /// A view of this event whose current URL has the given path.
    pub(crate) fn rebased(&self, path: &str) -> Self {
        let mut url = self.url.clone();
        url.set_path(path);
        Self {
            shared: Arc::clone(&self.shared),
            url,
            matched: Arc::clone(&self.matched),
        }
    }

    pub fn method(&self) -> &Method {
        &self.shared.method
    }

    /// The request URI exactly as received.
    pub fn uri(&self) -> &Uri {
        &self.shared.uri
    }

    pub fn version(&self) -> Version {
        self.shared.version
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.shared.headers
    }

    /// Returns a header value when it is present and valid UTF-8.
    pub fn header(&self, name: impl header::AsHeaderName) -> Option<&str> {
        self.shared.headers.get(name)?.to_str().ok()
    }

    /// The URL as seen by the current router. Nested routers see the path with
    /// their mount prefix removed.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// The external URL of the request, unaffected by mount rebasing.
    pub fn original_url(&self) -> &Url {
        &self.shared.original_url
    }

    pub fn env(&self) -> &Env {
        &self.shared.env
    }

    /// The current route match.
    pub fn matched(&self) -> &MatchResult {
        &self.matched
    }

    /// Returns a pathname parameter from the current match, percent-decoded.
    pub fn param(&self, name: &str) -> Option<String> {
        let raw = self.matched.param(name)?;
        Some(
            urlencoding::decode(raw)
                .map(|decoded| decoded.into_owned())
                .unwrap_or_else(|_| raw.to_string()),
        )
    }

    /// All raw pathname parameters of the current match.
    pub fn params(&self) -> &std::collections::BTreeMap<String, String> {
        self.matched.params()
    }

    /// Returns the first query-string value for `name`.
    pub fn query(&self, name: &str) -> Option<String> {
        self.url
            .query_pairs()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    }

    /// Takes the request body. It can be taken only once.
    pub fn take_body(&self) -> Result<Body> {
        lock(&self.shared.body)
            .take()
            .ok_or_else(|| Error::usage("The request body has already been consumed"))
    }

    /// Reads the whole body, bounded by the configured limit.
    ///
    /// Bodies above the limit fail with a `413 Payload Too Large` resource error.
    pub async fn bytes(&self) -> Result<Bytes> {
        let body = self.take_body()?;
        match Limited::new(body, self.shared.body_limit).collect().await {
            Ok(collected) => Ok(collected.to_bytes()),
            Err(err) if err.downcast_ref::<LengthLimitError>().is_some() => Err(Error::resource(
                StatusCode::PAYLOAD_TOO_LARGE,
                format!(
                    "Request body exceeds the limit of {} bytes",
                    self.shared.body_limit
                ),
            )),
            Err(err) => {
                tracing::debug!(error = %err, "Failed to read request body");
                Err(Error::bad_request("Failed to read request body"))
            }
        }
    }

    /// Reads the body as UTF-8 text.
    pub async fn text(&self) -> Result<String> {
        let bytes = self.bytes().await?;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| Error::bad_request("Request body is not valid UTF-8"))
    }

    /// Reads and deserializes a JSON body.
    pub async fn json<T: DeserializeOwned>(&self) -> Result<T> {
        let bytes = self.bytes().await?;
        serde_json::from_slice(&bytes)
            .map_err(|err| Error::bad_request(format!("Invalid JSON body: {err}")))
    }

    /// Attaches typed data for later handlers, e.g. a session.
    pub fn insert_data<T: Clone + Send + Sync + 'static>(&self, value: T) -> Option<T> {
        lock(&self.shared.data).insert(value)
    }

    /// Returns a clone of previously attached typed data.
    pub fn data<T: Clone + Send + Sync + 'static>(&self) -> Option<T> {
        lock(&self.shared.data).get::<T>().cloned()
    }

    /// Adds a value to the data sent to the client with the hydration payload.
    pub fn insert_client_data(&self, key: impl Into<String>, value: impl Serialize) -> Result<()> {
        let value = serde_json::to_value(value)?;
        lock(&self.shared.client_data).insert(key.into(), value);
        Ok(())
    }

    /// Registers a task that must settle after the response is produced.
    ///
    /// Deferred tasks never affect the response: failures and panics are logged and
    /// discarded by [`FetchEvent::flush_deferred`].
    pub fn wait_until<F>(&self, task: F)
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        lock(&self.shared.deferred).push(Box::pin(task));
    }

    /// Number of deferred tasks waiting to be flushed.
    pub fn pending_tasks(&self) -> usize {
        lock(&self.shared.deferred).len()
    }

    /// Runs every queued deferred task concurrently and waits for all of them.
    ///
    /// Never fails. Returns the number of tasks that errored or panicked.
    pub async fn flush_deferred(&self) -> usize {
        let tasks = std::mem::take(&mut *lock(&self.shared.deferred));
        if tasks.is_empty() {
            return 0;
        }

        let total = tasks.len();
        let results = futures::future::join_all(
            tasks
                .into_iter()
                .map(|task| AssertUnwindSafe(task).catch_unwind()),
        )
        .await;

        let mut failed = 0;
        for (index, result) in results.into_iter().enumerate() {
            match result {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    failed += 1;
                    tracing::warn!(task = index, error = %err, "Deferred task failed");
                }
                Err(_) => {
                    failed += 1;
                    tracing::error!(task = index, "Deferred task panicked");
                }
            }
        }
        tracing::debug!(total, failed, "Flushed deferred tasks");
        failed
    }

    pub(crate) fn record_attempt(&self, pattern: String) {
        lock(&self.shared.attempted).push(pattern);
    }

    /// Patterns the router tried for this request, in order.
    pub fn attempted_routes(&self) -> Vec<String> {
        lock(&self.shared.attempted).clone()
    }

    /// Rebuilds a request for forwarding, using the current (rebased) URL.
    ///
    /// Takes the body; an already-consumed body is forwarded as empty.
    pub fn take_request(&self) -> Result<Request<Body>> {
        let body = lock(&self.shared.body).take().unwrap_or_else(Body::empty);
        let mut request = Request::builder()
            .method(self.shared.method.clone())
            .uri(self.url.as_str())
            .version(self.shared.version)
            .body(body)?;
        *request.headers_mut() = self.shared.headers.clone();
        Ok(request)
    }

    /// The serializable subset of this event for the hydration payload.
    pub fn event_init(&self) -> EventInit {
        EventInit {
            url: self.shared.original_url.to_string(),
            matched: (*self.matched).clone(),
            data: lock(&self.shared.client_data).clone(),
        }
    }
}

impl fmt::Debug for FetchEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchEvent")
            .field("method", &self.shared.method)
            .field("url", &self.url.as_str())
            .field("original_url", &self.shared.original_url.as_str())
            .field("env", &self.shared.env)
            .finish_non_exhaustive()
    }
}

fn absolute_url(uri: &Uri, headers: &HeaderMap) -> Result<Url> {
    if uri.scheme().is_some() && uri.authority().is_some() {
        return Ok(Url::parse(&uri.to_string())?);
    }

    let host = match headers.get(header::HOST) {
        Some(value) => match value.to_str().ok().and_then(|h| h.parse::<Authority>().ok()) {
            Some(authority) => Some(authority),
            None => {
                tracing::warn!(host = ?value, "Ignoring malformed Host header");
                None
            }
        },
        None => None,
    };
    let host = host
        .or_else(|| uri.authority().cloned())
        .map(|authority| authority.to_string())
        .unwrap_or_else(|| "localhost".to_string());
    let scheme = match headers.get("x-forwarded-proto").and_then(|h| h.to_str().ok()) {
        Some(proto) if proto.eq_ignore_ascii_case("https") => "https",
        _ => "http",
    };

    // Only the authority comes from headers; path and query always come from the
    // request line.
    let mut url = Url::parse(&format!("{scheme}://{host}/"))?;
    url.set_path(uri.path());
    url.set_query(uri.query());
    Ok(url)
}
