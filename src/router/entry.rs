use {
    super::{Router, handler::BoxedHandler},
    crate::{Fetcher, UrlPattern},
    http::Method,
    serde::Serialize,
    std::{fmt, sync::Arc},
};

/// The method a route entry answers to. [`HttpMethod::Any`] is the `*` wildcard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
    Any,
}

impl HttpMethod {
    pub fn matches(&self, method: &Method) -> bool {
        match self {
            HttpMethod::Get => *method == Method::GET,
            HttpMethod::Post => *method == Method::POST,
            HttpMethod::Put => *method == Method::PUT,
            HttpMethod::Patch => *method == Method::PATCH,
            HttpMethod::Delete => *method == Method::DELETE,
            HttpMethod::Head => *method == Method::HEAD,
            HttpMethod::Options => *method == Method::OPTIONS,
            HttpMethod::Any => true,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
            HttpMethod::Any => "*",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone)]
pub(crate) enum MountTarget {
    Router(Router),
    Fetcher(Arc<dyn Fetcher>),
}

#[derive(Clone)]
pub(crate) enum RouteEntry {
    Handler {
        pattern: UrlPattern,
        method: HttpMethod,
        handler: BoxedHandler,
    },
    Mount {
        prefix: UrlPattern,
        target: MountTarget,
    },
}

impl RouteEntry {
    /// The label recorded in the attempted-routes list.
    pub(crate) fn label(&self) -> String {
        match self {
            RouteEntry::Handler {
                pattern, method, ..
            } => format!("{method} {pattern}"),
            RouteEntry::Mount { prefix, .. } => format!("mount {prefix}"),
        }
    }

    pub(crate) fn info(&self) -> RouteInfo {
        match self {
            RouteEntry::Handler {
                pattern, method, ..
            } => RouteInfo {
                method: method.to_string(),
                pattern: pattern.to_string(),
                routes: None,
            },
            RouteEntry::Mount { prefix, target, .. } => RouteInfo {
                method: HttpMethod::Any.to_string(),
                pattern: prefix.to_string(),
                routes: match target {
                    MountTarget::Router(router) => Some(router.routes()),
                    MountTarget::Fetcher(_) => None,
                },
            },
        }
    }
}

/// A registered route, as listed by [`Router::routes`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteInfo {
    pub method: String,
    pub pattern: String,
    /// Routes of a mounted router.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub routes: Option<Vec<RouteInfo>>,
}
