//! Error types and handling for keywork.
//!
//! Errors fall into three groups, and each is reflected to the client differently:
//!
//! - **Resource errors** ([`ErrorKind::Resource`]) carry an explicit HTTP status and a
//!   public-safe message. They are reflected to the client as-is.
//! - **Usage errors** ([`ErrorKind::Usage`]) are programmer mistakes, such as returning a
//!   bare body stream from a handler. They are logged in full and surfaced only as a
//!   generic 500.
//! - **Everything else** (third-party errors, I/O, configuration) normalizes into a 500
//!   with the canonical reason phrase. The original message is logged, never sent.
//!
//! # Design
//!
//! This module uses an opaque `Error` struct paired with an `ErrorKind` enum,
//! following the `std::io::Error` pattern.
//!
//! # Example
//!
//! ```rust
//! use keywork::{Error, ErrorKind};
//! use http::StatusCode;
//!
//! let error = Error::not_found("Todo 99 not found");
//! assert_eq!(error.kind(), ErrorKind::Resource);
//! assert_eq!(error.status_code(), StatusCode::NOT_FOUND);
//! assert_eq!(error.public_message(), "Todo 99 not found");
//!
//! let error = Error::internal("database password rejected");
//! assert_eq!(error.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
//! assert_eq!(error.public_message(), "Internal Server Error");
//! ```

use axum::body::Body;
use http::{HeaderValue, Response, StatusCode, header};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// The kind of error that occurred.
///
/// # Stability
///
/// This enum is marked `#[non_exhaustive]`, so new variants may be added
/// in future versions without breaking existing code. Always include a
/// wildcard arm when matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Framework resource error with an explicit, client-safe status and message.
    #[error("resource error")]
    Resource,

    /// Programmer misuse of the framework (bad handler return value, missing
    /// hydration data, malformed manifests).
    #[error("usage error")]
    Usage,

    /// Configuration error (invalid TOML, missing values).
    #[error("configuration error")]
    Configuration,

    /// Invalid input (bad URL, header, request data).
    #[error("invalid input")]
    InvalidInput,

    /// I/O error (file operations, network).
    #[error("I/O error")]
    Io,

    /// Internal/unexpected error.
    #[error("internal error")]
    Internal,
}

/// An error that can occur while routing or rendering a request.
///
/// Use [`Error::kind()`] to determine the category of error, [`Error::status_code()`]
/// for the HTTP status it maps to, and [`Error::public_message()`] for the text that is
/// safe to send to a client.
///
/// # Creating Errors
///
/// ```rust
/// use keywork::Error;
/// use http::StatusCode;
///
/// let err = Error::resource(StatusCode::CONFLICT, "Todo already exists");
/// let err = Error::not_found("No such page");
/// let err = Error::usage("handler returned a bare stream");
/// let err = Error::internal("unexpected state");
/// ```
pub struct Error {
    kind: ErrorKind,
    status: Option<StatusCode>,
    source: Box<dyn std::error::Error + Send + Sync + 'static>,
}

impl Error {
    /// Creates a new error with the given kind and source.
    ///
    /// ```rust
    /// use keywork::{Error, ErrorKind};
    ///
    /// let err = Error::new(ErrorKind::Internal, "something went wrong");
    /// assert_eq!(err.kind(), ErrorKind::Internal);
    /// ```
    pub fn new<E>(kind: ErrorKind, error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
    {
        Self {
            kind,
            status: None,
            source: error.into(),
        }
    }

    /// Wraps any third-party error. It always maps to a generic 500.
    pub fn from_std<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::new(ErrorKind::Internal, error)
    }

    /// Returns the kind of this error.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the error code string for this error.
    ///
    /// This is a stable identifier suitable for client-side error handling.
    pub fn error_code(&self) -> &'static str {
        match self.kind {
            ErrorKind::Resource => "RESOURCE_ERROR",
            ErrorKind::Usage => "INTERNAL_ERROR",
            ErrorKind::Configuration => "CONFIG_ERROR",
            ErrorKind::InvalidInput => "INVALID_INPUT",
            ErrorKind::Io => "IO_ERROR",
            ErrorKind::Internal => "INTERNAL_ERROR",
        }
    }

    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self.kind {
            ErrorKind::Resource => self.status.unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
            ErrorKind::Usage
            | ErrorKind::Configuration
            | ErrorKind::Io
            | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the message that may be shown to a client.
    ///
    /// Only resource and invalid-input errors expose their own message. All other
    /// kinds expose the canonical reason phrase of their status code.
    pub fn public_message(&self) -> String {
        match self.kind {
            ErrorKind::Resource | ErrorKind::InvalidInput => self.source.to_string(),
            _ => self
                .status_code()
                .canonical_reason()
                .unwrap_or("Internal Server Error")
                .to_string(),
        }
    }

    /// Converts this error into a client-safe [`ErrorResponse`].
    pub fn to_error_response(&self) -> ErrorResponse {
        ErrorResponse::new(self.error_code(), self.public_message())
    }

    /// Converts this error into a JSON HTTP response, logging the full detail.
    ///
    /// Server errors are logged at `error` level with the private message; client
    /// errors are logged at `debug` level.
    pub fn into_response(self) -> Response<Body> {
        let status = self.status_code();
        let error_response = self.to_error_response();

        if status.is_server_error() {
            tracing::error!(
                error_code = %error_response.error_code,
                kind = %self.kind,
                detail = %self.source,
                status = %status.as_u16(),
                "Request failed"
            );
        } else {
            tracing::debug!(
                error_code = %error_response.error_code,
                message = %error_response.message,
                status = %status.as_u16(),
                "Request rejected"
            );
        }

        let body = serde_json::to_vec(&error_response).unwrap_or_default();
        let mut response = Response::new(Body::from(body));
        *response.status_mut() = status;
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json; charset=utf-8"),
        );
        response
    }

    /// Consumes the error and returns the inner error source.
    pub fn into_inner(self) -> Box<dyn std::error::Error + Send + Sync + 'static> {
        self.source
    }
}

// ============================================================================
// Convenience constructors
// ============================================================================

impl Error {
    /// Creates a resource error with an explicit status and public message.
    pub fn resource(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Resource,
            status: Some(status),
            source: msg.into().into(),
        }
    }

    /// Creates a `404 Not Found` resource error.
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::resource(StatusCode::NOT_FOUND, msg)
    }

    /// Creates a `400 Bad Request` resource error.
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::resource(StatusCode::BAD_REQUEST, msg)
    }

    /// Creates a usage error.
    pub fn usage(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Usage, msg.into())
    }

    /// Creates a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, msg.into())
    }

    /// Creates an I/O error from a message.
    pub fn io(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Io, msg.into())
    }

    /// Creates an invalid input error.
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidInput, msg.into())
    }

    /// Creates an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, msg.into())
    }
}

// ============================================================================
// Trait implementations
// ============================================================================

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Error")
            .field("kind", &self.kind)
            .field("status", &self.status)
            .field("source", &self.source)
            .finish()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&*self.source)
    }
}

// ============================================================================
// From implementations
// ============================================================================

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::new(ErrorKind::Io, err)
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Self::new(ErrorKind::Configuration, err)
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Self::new(ErrorKind::InvalidInput, err)
    }
}

impl From<std::env::VarError> for Error {
    fn from(err: std::env::VarError) -> Self {
        Self::new(ErrorKind::Configuration, err)
    }
}

impl From<http::header::InvalidHeaderValue> for Error {
    fn from(err: http::header::InvalidHeaderValue) -> Self {
        Self::new(ErrorKind::InvalidInput, err)
    }
}

impl From<http::Error> for Error {
    fn from(err: http::Error) -> Self {
        Self::new(ErrorKind::Internal, err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::new(ErrorKind::Internal, err)
    }
}

// ============================================================================
// ErrorResponse
// ============================================================================

/// Structured error body with error code and public message.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Unique error code for client-side error handling.
    pub error_code: String,
    /// Human-readable, client-safe error message.
    pub message: String,
    /// Optional additional details about the error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    /// Creates a new error response.
    pub fn new(error_code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error_code: error_code.into(),
            message: message.into(),
            details: None,
        }
    }

    /// Adds details to the error response.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use std::error::Error as StdError;

    #[test]
    fn test_error_kind_display() {
        assert_eq!(format!("{}", ErrorKind::Resource), "resource error");
        assert_eq!(format!("{}", ErrorKind::Usage), "usage error");
        assert_eq!(format!("{}", ErrorKind::InvalidInput), "invalid input");
    }

    #[test]
    fn test_resource_error_keeps_status_and_message() {
        let err = Error::resource(StatusCode::CONFLICT, "Todo already exists");
        assert_eq!(err.kind(), ErrorKind::Resource);
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert_eq!(err.public_message(), "Todo already exists");
        assert_eq!(err.error_code(), "RESOURCE_ERROR");
    }

    #[test]
    fn test_not_found_and_bad_request() {
        assert_eq!(Error::not_found("x").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(Error::bad_request("x").status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_usage_error_hides_message() {
        let err = Error::usage("returned a bare stream");
        assert_eq!(err.kind(), ErrorKind::Usage);
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.public_message(), "Internal Server Error");
        assert!(err.to_string().contains("bare stream"));
    }

    #[test]
    fn test_third_party_error_normalizes_to_500() {
        let io_err = std::io::Error::new(std::io::ErrorKind::Other, "secret path /etc/shadow");
        let err = Error::from_std(io_err);
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.public_message().contains("shadow"));
    }

    #[test]
    fn test_invalid_input_is_400_with_message() {
        let err = Error::invalid_input("bad header");
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.public_message(), "bad header");
    }

    #[test]
    fn test_from_conversions() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        assert_eq!(Error::from(io_err).kind(), ErrorKind::Io);

        let toml_err = "invalid".parse::<toml::Value>().unwrap_err();
        assert_eq!(Error::from(toml_err).kind(), ErrorKind::Configuration);

        let url_err = url::Url::parse("not a url").unwrap_err();
        assert_eq!(Error::from(url_err).kind(), ErrorKind::InvalidInput);

        let header_err = http::header::HeaderValue::from_bytes(b"\x00").unwrap_err();
        assert_eq!(Error::from(header_err).kind(), ErrorKind::InvalidInput);

        assert_eq!(
            Error::from(std::env::VarError::NotPresent).kind(),
            ErrorKind::Configuration
        );
    }

    #[test]
    fn test_error_response_with_details() {
        let response = ErrorResponse::new("CODE", "message").with_details("extra info");
        assert_eq!(response.error_code, "CODE");
        assert_eq!(response.details, Some("extra info".to_string()));
    }

    #[tokio::test]
    async fn test_into_response_serializes_public_message() {
        let response = Error::not_found("Todo 99 not found").into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/json; charset=utf-8"
        );
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["message"], "Todo 99 not found");
        assert_eq!(json["error_code"], "RESOURCE_ERROR");
    }

    #[tokio::test]
    async fn test_into_response_does_not_leak_internal_detail() {
        let response = Error::internal("connection string postgres://admin:pw").into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(!text.contains("postgres://"));
        assert!(text.contains("Internal Server Error"));
    }

    #[test]
    fn test_error_debug_and_source() {
        let err = Error::internal("test");
        assert!(format!("{:?}", err).contains("Internal"));
        assert!(StdError::source(&err).is_some());
        assert_eq!(format!("{}", err.into_inner()), "test");
    }
}
