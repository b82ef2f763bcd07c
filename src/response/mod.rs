//!
//! Handler results and their conversion into responses.
//!
//! Handlers return anything that converts into a [`ResponseLike`]. The router then
//! calls [`cast_to_response`], which discriminates the variants in a fixed order:
//!
//! 1. A [`Response`] is returned as-is.
//! 2. An [`Error`] becomes an error response.
//! 3. A bare body stream is a usage error: it has no content type.
//! 4. Nothing becomes `204 No Content`.
//! 5. Text becomes `text/html` when it starts with a doctype, `text/plain` otherwise.
//! 6. An [`Element`] is rendered by the streaming SSR renderer.
//! 7. A JSON value becomes `application/json`.
//! 8. Anything else is a usage error naming the offending type.
//!

mod build;
mod cache;
mod mime;

pub use build::*;
pub use cache::*;
pub use mime::*;

use {
    crate::{
        Error, FetchEvent, Result,
        ssr::{Element, RenderOptions, render_response},
    },
    axum::body::{Body, Bytes},
    http::{Response, StatusCode},
    serde::Serialize,
    serde_json::Value,
    std::any::Any,
};

/// The closed set of values a handler may produce.
#[derive(Debug)]
pub enum ResponseLike {
    Response(Response<Body>),
    Error(Error),
    /// A raw body with no declared content type.
    Stream(Body),
    /// Nothing. From a handler this means "fall through to the next route".
    Empty,
    Text(String),
    Element(Element),
    /// A plain object or array.
    Json(Value),
    /// A value of a type that has no response mapping.
    Unsupported(&'static str),
}

impl ResponseLike {
    pub fn is_empty(&self) -> bool {
        matches!(self, ResponseLike::Empty)
    }

    /// Discriminates an arbitrary value by its runtime type.
    ///
    /// ```rust
    /// use keywork::ResponseLike;
    ///
    /// assert!(matches!(ResponseLike::from_value(String::from("hi")), ResponseLike::Text(_)));
    /// assert!(matches!(ResponseLike::from_value(()), ResponseLike::Empty));
    /// assert!(matches!(ResponseLike::from_value(42u8), ResponseLike::Unsupported("u8")));
    /// ```
    pub fn from_value<T: Any>(value: T) -> Self {
        let value: Box<dyn Any> = Box::new(value);
        let value = match value.downcast::<Response<Body>>() {
            Ok(response) => return ResponseLike::Response(*response),
            Err(value) => value,
        };
        let value = match value.downcast::<Error>() {
            Ok(error) => return ResponseLike::Error(*error),
            Err(value) => value,
        };
        let value = match value.downcast::<Body>() {
            Ok(body) => return ResponseLike::Stream(*body),
            Err(value) => value,
        };
        let value = match value.downcast::<()>() {
            Ok(_) => return ResponseLike::Empty,
            Err(value) => value,
        };
        let value = match value.downcast::<String>() {
            Ok(text) => return ResponseLike::Text(*text),
            Err(value) => value,
        };
        let value = match value.downcast::<&'static str>() {
            Ok(text) => return ResponseLike::Text(text.to_string()),
            Err(value) => value,
        };
        let value = match value.downcast::<Element>() {
            Ok(element) => return ResponseLike::Element(*element),
            Err(value) => value,
        };
        match value.downcast::<Value>() {
            Ok(json) => ResponseLike::from(*json),
            Err(_) => ResponseLike::Unsupported(std::any::type_name::<T>()),
        }
    }
}

impl From<Response<Body>> for ResponseLike {
    fn from(response: Response<Body>) -> Self {
        ResponseLike::Response(response)
    }
}

impl From<Error> for ResponseLike {
    fn from(error: Error) -> Self {
        ResponseLike::Error(error)
    }
}

impl From<Body> for ResponseLike {
    fn from(body: Body) -> Self {
        ResponseLike::Stream(body)
    }
}

impl From<()> for ResponseLike {
    fn from(_: ()) -> Self {
        ResponseLike::Empty
    }
}

impl From<String> for ResponseLike {
    fn from(text: String) -> Self {
        ResponseLike::Text(text)
    }
}

impl From<&str> for ResponseLike {
    fn from(text: &str) -> Self {
        ResponseLike::Text(text.to_string())
    }
}

impl From<Element> for ResponseLike {
    fn from(element: Element) -> Self {
        ResponseLike::Element(element)
    }
}

impl From<Value> for ResponseLike {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => ResponseLike::Empty,
            Value::Bool(_) => ResponseLike::Unsupported("bool"),
            Value::Number(_) => ResponseLike::Unsupported("number"),
            Value::String(text) => ResponseLike::Text(text),
            json @ (Value::Array(_) | Value::Object(_)) => ResponseLike::Json(json),
        }
    }
}

impl<T: Into<ResponseLike>> From<Option<T>> for ResponseLike {
    fn from(value: Option<T>) -> Self {
        value.map_or(ResponseLike::Empty, Into::into)
    }
}

/// Serializes any value as a JSON response.
///
/// Objects and arrays become `application/json`; other shapes follow the same
/// rules as a raw [`serde_json::Value`].
#[derive(Debug, Clone)]
pub struct Json<T>(pub T);

impl<T: Serialize> From<Json<T>> for ResponseLike {
    fn from(Json(value): Json<T>) -> Self {
        match serde_json::to_value(value) {
            Ok(value) => value.into(),
            Err(err) => ResponseLike::Error(err.into()),
        }
    }
}

/// An HTML string, sent as `text/html` whether or not it has a doctype.
#[derive(Debug, Clone)]
pub struct Html(pub String);

impl From<Html> for ResponseLike {
    fn from(Html(html): Html) -> Self {
        match build_response(html, ResponseOptions::html()) {
            Ok(response) => ResponseLike::Response(response),
            Err(err) => ResponseLike::Error(err),
        }
    }
}

fn looks_like_document(text: &str) -> bool {
    text.trim_start()
        .get(..9)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("<!doctype"))
}

/// Converts a handler result into a response.
pub async fn cast_to_response(
    event: &FetchEvent,
    value: ResponseLike,
    options: &RenderOptions,
) -> Result<Response<Body>> {
    match value {
        ResponseLike::Response(response) => Ok(response),
        ResponseLike::Error(error) => Ok(error.into_response()),
        ResponseLike::Stream(_) => Err(Error::usage(
            "A handler returned a bare body stream. The content type cannot be inferred; \
             wrap the stream in a Response with an explicit Content-Type",
        )),
        ResponseLike::Empty => build_response(
            Bytes::new(),
            ResponseOptions::new(ContentKind::Empty).with_status(StatusCode::NO_CONTENT),
        ),
        ResponseLike::Text(text) if looks_like_document(&text) => {
            build_response(text, ResponseOptions::html())
        }
        ResponseLike::Text(text) => build_response(text, ResponseOptions::text()),
        ResponseLike::Element(element) => render_response(event, element, options),
        ResponseLike::Json(value) => build_response(serde_json::to_vec(&value)?, ResponseOptions::json()),
        ResponseLike::Unsupported(type_name) => Err(Error::usage(format!(
            "A handler returned a value of type `{type_name}`, which cannot be converted into a response"
        ))),
    }
}
