//!
//! Response construction.
//!
//! A single [`build_response`] function assembles every buffered response the
//! framework produces. The content kind, status, extra headers and caching
//! behaviour are described by [`ResponseOptions`].
//!

use {
    super::cache::{CacheOptions, etag_matches},
    crate::{Error, Result},
    axum::body::{Body, Bytes},
    http::{HeaderMap, HeaderName, HeaderValue, Response, StatusCode, header},
};

/// The content type family of a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentKind {
    Json,
    Html,
    Text,
    /// No `Content-Type` header.
    Empty,
    /// An explicit MIME type, e.g. from [`crate::mime_for_path`].
    Mime(String),
}

impl ContentKind {
    pub fn content_type(&self) -> Option<&str> {
        match self {
            ContentKind::Json => Some("application/json; charset=utf-8"),
            ContentKind::Html => Some("text/html; charset=utf-8"),
            ContentKind::Text => Some("text/plain; charset=utf-8"),
            ContentKind::Empty => None,
            ContentKind::Mime(mime) => Some(mime),
        }
    }
}

/// Options for [`build_response`].
#[derive(Debug, Clone)]
pub struct ResponseOptions {
    pub status: StatusCode,
    pub kind: ContentKind,
    pub headers: HeaderMap,
    pub cache: Option<CacheOptions>,
    /// Headers of the request being answered, consulted for `If-None-Match`.
    pub request_headers: Option<HeaderMap>,
}

impl ResponseOptions {
    pub fn new(kind: ContentKind) -> Self {
        Self {
            status: StatusCode::OK,
            kind,
            headers: HeaderMap::new(),
            cache: None,
            request_headers: None,
        }
    }

    pub fn json() -> Self {
        Self::new(ContentKind::Json)
    }

    pub fn html() -> Self {
        Self::new(ContentKind::Html)
    }

    pub fn text() -> Self {
        Self::new(ContentKind::Text)
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_cache(mut self, cache: CacheOptions) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Enables conditional handling against the given request headers.
    pub fn with_request_headers(mut self, headers: &HeaderMap) -> Self {
        self.request_headers = Some(headers.clone());
        self
    }
}

/// Builds a buffered response.
///
/// When an entity tag is configured and the request's `If-None-Match` matches it,
/// the result is a bodiless `304 Not Modified` carrying only the `ETag` header.
///
/// ```rust
/// use keywork::{CacheDirectives, CacheOptions, ResponseOptions, build_response};
///
/// let response = build_response(
///     r#"{"ok":true}"#,
///     ResponseOptions::json().with_cache(CacheOptions::new(CacheDirectives::no_store())),
/// )
/// .unwrap();
/// assert_eq!(response.headers()["cache-control"], "no-store");
/// ```
pub fn build_response(body: impl Into<Bytes>, options: ResponseOptions) -> Result<Response<Body>> {
    let body = body.into();
    let etag = options
        .cache
        .as_ref()
        .and_then(|cache| cache.resolve_etag(&body));

    if let (Some(etag), Some(request_headers)) = (&etag, &options.request_headers) {
        let if_none_match = request_headers
            .get(header::IF_NONE_MATCH)
            .and_then(|value| value.to_str().ok());
        if if_none_match.is_some_and(|candidates| etag_matches(candidates, etag)) {
            return Ok(Response::builder()
                .status(StatusCode::NOT_MODIFIED)
                .header(header::ETAG, HeaderValue::from_str(etag)?)
                .body(Body::empty())?);
        }
    }

    let mut response = Response::new(Body::from(body));
    *response.status_mut() = options.status;
    apply_headers(response.headers_mut(), &options)?;
    if let Some(etag) = etag {
        response
            .headers_mut()
            .insert(header::ETAG, HeaderValue::from_str(&etag)?);
    }
    Ok(response)
}

/// Builds a streaming response. Entity tags are ignored since the body is not
/// known up front.
pub fn build_stream_response(body: Body, options: ResponseOptions) -> Result<Response<Body>> {
    let mut response = Response::new(body);
    *response.status_mut() = options.status;
    apply_headers(response.headers_mut(), &options)?;
    Ok(response)
}

fn apply_headers(headers: &mut HeaderMap, options: &ResponseOptions) -> Result<()> {
    if let Some(content_type) = options.kind.content_type() {
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_str(content_type)?);
    }
    if let Some(cache_control) = options
        .cache
        .as_ref()
        .and_then(|cache| cache.directives.header_value())
    {
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_str(&cache_control)?);
    }
    for (name, value) in &options.headers {
        headers.insert(name.clone(), value.clone());
    }
    Ok(())
}

/// Builds a redirect to `location`. The status must be a 3xx code.
pub fn redirect(location: &str, status: StatusCode) -> Result<Response<Body>> {
    if !status.is_redirection() {
        return Err(Error::usage(format!(
            "Redirect status must be 3xx, got {}",
            status.as_u16()
        )));
    }
    Ok(Response::builder()
        .status(status)
        .header(header::LOCATION, HeaderValue::from_str(location)?)
        .body(Body::empty())?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CacheDirectives, generate_etag};
    use http_body_util::BodyExt;

    async fn body_bytes(response: Response<Body>) -> Bytes {
        response.into_body().collect().await.unwrap().to_bytes()
    }

    #[tokio::test]
    async fn test_build_json_response() {
        let response = build_response(r#"{"a":1}"#, ResponseOptions::json()).unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/json; charset=utf-8"
        );
        assert_eq!(&body_bytes(response).await[..], br#"{"a":1}"#);
    }

    #[test]
    fn test_empty_kind_has_no_content_type() {
        let response = build_response(
            Bytes::new(),
            ResponseOptions::new(ContentKind::Empty).with_status(StatusCode::NO_CONTENT),
        )
        .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert!(response.headers().get(header::CONTENT_TYPE).is_none());
    }

    #[test]
    fn test_extra_headers_and_mime() {
        let response = build_response(
            "body{}",
            ResponseOptions::new(ContentKind::Mime("text/css; charset=utf-8".into()))
                .with_header(HeaderName::from_static("x-served-by"), HeaderValue::from_static("keywork")),
        )
        .unwrap();
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/css; charset=utf-8");
        assert_eq!(response.headers()["x-served-by"], "keywork");
    }

    #[test]
    fn test_same_body_same_etag() {
        let options = || {
            ResponseOptions::text().with_cache(CacheOptions::new(CacheDirectives::new()).with_etag())
        };
        let a = build_response("same", options()).unwrap();
        let b = build_response("same", options()).unwrap();
        assert_eq!(a.headers()[header::ETAG], b.headers()[header::ETAG]);
        assert_eq!(a.headers()[header::ETAG], generate_etag(b"same", false).as_str());
    }

    #[tokio::test]
    async fn test_conditional_request_yields_bare_304() {
        let etag = generate_etag(b"cached body", false);
        for candidate in [etag.clone(), format!("W/{etag}")] {
            let mut request_headers = HeaderMap::new();
            request_headers.insert(header::IF_NONE_MATCH, HeaderValue::from_str(&candidate).unwrap());

            let response = build_response(
                "cached body",
                ResponseOptions::text()
                    .with_cache(
                        CacheOptions::new(CacheDirectives::new().set("max-age", 60u32)).with_etag(),
                    )
                    .with_request_headers(&request_headers),
            )
            .unwrap();

            assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
            assert_eq!(response.headers().len(), 1);
            assert_eq!(response.headers()[header::ETAG], etag.as_str());
            assert!(body_bytes(response).await.is_empty());
        }
    }

    #[test]
    fn test_non_matching_etag_returns_full_response() {
        let mut request_headers = HeaderMap::new();
        request_headers.insert(header::IF_NONE_MATCH, HeaderValue::from_static("\"stale\""));
        let response = build_response(
            "fresh",
            ResponseOptions::text()
                .with_cache(CacheOptions::new(CacheDirectives::new().set("max-age", 60u32)).with_etag())
                .with_request_headers(&request_headers),
        )
        .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CACHE_CONTROL], "max-age=60");
    }

    #[test]
    fn test_redirect() {
        let response = redirect("/login", StatusCode::FOUND).unwrap();
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()[header::LOCATION], "/login");
        assert!(redirect("/login", StatusCode::OK).is_err());
    }
}
