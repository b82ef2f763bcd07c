use {
    super::{Middleware, MiddlewareFuture},
    crate::{FetchEvent, HttpCorsConfig, Next, Result},
    axum::body::Body,
    http::{
        HeaderValue, Method, Response, StatusCode,
        header::{
            ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
            ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_EXPOSE_HEADERS, ACCESS_CONTROL_MAX_AGE,
            ACCESS_CONTROL_REQUEST_HEADERS, ACCESS_CONTROL_REQUEST_METHOD, ORIGIN, VARY,
        },
    },
    std::sync::Arc,
};

const DEFAULT_METHODS: &str = "GET, HEAD, PUT, PATCH, POST, DELETE";

/// Cross-origin resource sharing.
///
/// Preflight requests (`OPTIONS` carrying `Access-Control-Request-Method`) are
/// answered directly with `204 No Content`. Every other request runs the rest of
/// the chain and gets the origin headers added to its response.
pub fn cors(config: HttpCorsConfig) -> impl Middleware {
    let config = Arc::new(config);
    move |event: FetchEvent, next: Next| -> MiddlewareFuture {
        let config = config.clone();
        Box::pin(async move {
            let allow_origin = config.allow_origin_value(event.header(ORIGIN));

            if is_preflight(&event) {
                tracing::debug!(origin = %allow_origin, "Answering CORS preflight");
                return preflight(&config, &event, &allow_origin);
            }

            let mut response = next.run().await?;
            let headers = response.headers_mut();
            headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_str(&allow_origin)?);
            if config.credentials() {
                headers.insert(ACCESS_CONTROL_ALLOW_CREDENTIALS, HeaderValue::from_static("true"));
            }
            if let Some(exposed) = &config.exposed_headers {
                let exposed = exposed.iter().map(|h| h.0.as_str()).collect::<Vec<_>>().join(", ");
                headers.insert(ACCESS_CONTROL_EXPOSE_HEADERS, HeaderValue::from_str(&exposed)?);
            }
            if allow_origin != "*" {
                headers.append(VARY, HeaderValue::from_static("Origin"));
            }
            Ok(response)
        })
    }
}

fn is_preflight(event: &FetchEvent) -> bool {
    event.method() == Method::OPTIONS && event.headers().contains_key(ACCESS_CONTROL_REQUEST_METHOD)
}

fn preflight(config: &HttpCorsConfig, event: &FetchEvent, allow_origin: &str) -> Result<Response<Body>> {
    let methods = match &config.allowed_methods {
        Some(methods) => methods.iter().map(|m| m.0.as_str()).collect::<Vec<_>>().join(", "),
        None => DEFAULT_METHODS.to_string(),
    };

    let mut builder = Response::builder()
        .status(StatusCode::NO_CONTENT)
        .header(ACCESS_CONTROL_ALLOW_ORIGIN, allow_origin)
        .header(ACCESS_CONTROL_ALLOW_METHODS, methods);

    match &config.allowed_headers {
        Some(allowed) => {
            let allowed = allowed.iter().map(|h| h.0.as_str()).collect::<Vec<_>>().join(", ");
            builder = builder.header(ACCESS_CONTROL_ALLOW_HEADERS, allowed);
        }
        None => {
            if let Some(requested) = event.header(ACCESS_CONTROL_REQUEST_HEADERS) {
                builder = builder.header(ACCESS_CONTROL_ALLOW_HEADERS, requested);
            }
        }
    }
    if let Some(max_age) = config.max_age {
        builder = builder.header(ACCESS_CONTROL_MAX_AGE, max_age.as_secs());
    }
    if config.credentials() {
        builder = builder.header(ACCESS_CONTROL_ALLOW_CREDENTIALS, "true");
    }
    if allow_origin != "*" {
        builder = builder.header(VARY, "Origin");
    }

    Ok(builder.body(Body::empty())?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Env, config::CorsMethod};
    use http::Request;

    fn event(request: Request<Body>) -> FetchEvent {
        FetchEvent::new(request, Env::default()).unwrap()
    }

    #[test]
    fn test_preflight_detection() {
        let plain_options = event(Request::options("/").body(Body::empty()).unwrap());
        assert!(!is_preflight(&plain_options));

        let preflight_request = event(
            Request::options("/")
                .header(ACCESS_CONTROL_REQUEST_METHOD, "POST")
                .body(Body::empty())
                .unwrap(),
        );
        assert!(is_preflight(&preflight_request));
    }

    #[test]
    fn test_preflight_uses_configured_methods() {
        let config = HttpCorsConfig::default()
            .with_allowed_methods(vec![CorsMethod(Method::GET), CorsMethod(Method::POST)])
            .with_max_age(std::time::Duration::from_secs(600));
        let request = event(
            Request::options("/")
                .header(ACCESS_CONTROL_REQUEST_METHOD, "POST")
                .header(ACCESS_CONTROL_REQUEST_HEADERS, "x-custom")
                .body(Body::empty())
                .unwrap(),
        );

        let response = preflight(&config, &request, "*").unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(response.headers()[ACCESS_CONTROL_ALLOW_METHODS], "GET, POST");
        assert_eq!(response.headers()[ACCESS_CONTROL_ALLOW_HEADERS], "x-custom");
        assert_eq!(response.headers()[ACCESS_CONTROL_MAX_AGE], "600");
        assert!(response.headers().get(VARY).is_none());
    }
}
