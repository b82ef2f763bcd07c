use crate::{Error, Result};
use http::{HeaderName, Method};
use serde::Deserialize;
use std::{str::FromStr, time::Duration};

/// Configuration for the Cross-Origin Resource Sharing (CORS) middleware.
///
/// All fields are optional:
///
/// - Without `allowed_origins`, every origin is allowed and responses carry
///   `Access-Control-Allow-Origin: *`. With a list, matching origins are echoed
///   back and any other origin receives the literal value `false`.
/// - Without `allowed_methods`, preflights advertise the standard method set.
/// - Without `allowed_headers`, preflights echo `Access-Control-Request-Headers`.
///
/// When `allow_credentials` is `true`, an explicit `allowed_origins` list is required
/// because browsers reject a wildcard origin on credentialed requests.
///
/// # Examples
///
/// In TOML configuration:
/// ```toml
/// [http.cors]
/// allow_credentials = true
/// allowed_origins = ["https://app.example.com", "https://admin.example.com"]
/// allowed_methods = ["GET", "POST", "PUT", "DELETE"]
/// allowed_headers = ["content-type", "authorization"]
/// exposed_headers = ["x-request-id"]
/// max_age = "1h"
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
pub struct HttpCorsConfig {
    /// Whether to allow credentials (cookies, authorization headers) in CORS requests.
    pub allow_credentials: Option<bool>,

    /// Origins allowed to make CORS requests, e.g. `["https://app.example.com"]`.
    pub allowed_origins: Option<Vec<String>>,

    /// Methods advertised in preflight responses.
    pub allowed_methods: Option<Vec<CorsMethod>>,

    /// Request headers advertised in preflight responses.
    pub allowed_headers: Option<Vec<CorsHeader>>,

    /// Response headers exposed to browser JavaScript.
    pub exposed_headers: Option<Vec<CorsHeader>>,

    /// How long browsers may cache a preflight response, e.g. `"1h"`.
    #[serde(default, with = "humantime_serde")]
    pub max_age: Option<Duration>,
}

impl HttpCorsConfig {
    /// Enables credentials (cookies, authorization headers) in CORS requests.
    ///
    /// ```rust
    /// use keywork::HttpCorsConfig;
    ///
    /// let cors = HttpCorsConfig::default()
    ///     .with_allow_credentials()
    ///     .with_allowed_origins(vec!["https://app.example.com".into()]);
    /// assert!(cors.validate().is_ok());
    /// ```
    pub fn with_allow_credentials(mut self) -> Self {
        self.allow_credentials = Some(true);
        self
    }

    /// Sets the list of origins allowed to make CORS requests.
    pub fn with_allowed_origins(mut self, origins: Vec<String>) -> Self {
        self.allowed_origins = Some(origins);
        self
    }

    /// Sets the HTTP methods advertised in preflight responses.
    pub fn with_allowed_methods(mut self, methods: Vec<CorsMethod>) -> Self {
        self.allowed_methods = Some(methods);
        self
    }

    /// Sets the request headers advertised in preflight responses.
    pub fn with_allowed_headers(mut self, headers: Vec<CorsHeader>) -> Self {
        self.allowed_headers = Some(headers);
        self
    }

    /// Sets the response headers exposed to the browser.
    pub fn with_exposed_headers(mut self, headers: Vec<CorsHeader>) -> Self {
        self.exposed_headers = Some(headers);
        self
    }

    /// Sets the maximum time browsers should cache CORS preflight responses.
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    /// Whether credentialed requests are allowed.
    pub fn credentials(&self) -> bool {
        self.allow_credentials.unwrap_or(false)
    }

    /// Returns the value for `Access-Control-Allow-Origin` given a request origin.
    ///
    /// `*` when no origin list is configured (or the echoed origin when credentials
    /// are on), the origin itself when it is listed, and `false` otherwise.
    pub fn allow_origin_value(&self, origin: Option<&str>) -> String {
        match (&self.allowed_origins, origin) {
            (None, Some(origin)) if self.credentials() => origin.to_string(),
            (None, _) => "*".to_string(),
            (Some(list), Some(origin)) if list.iter().any(|o| o == origin || o == "*") => {
                origin.to_string()
            }
            (Some(_), _) => "false".to_string(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.credentials() && self.allowed_origins.is_none() {
            return Err(Error::invalid_input(
                "CORS allow_credentials requires an explicit allowed_origins list. \
                 Set [http.cors] allowed_origins = [\"https://app.example.com\"] in config.",
            ));
        }
        Ok(())
    }
}

/// Wrapper type for HTTP methods in CORS configuration.
///
/// Enables deserialization of methods such as `"GET"` or `"POST"` from TOML.
#[derive(Debug, Clone)]
pub struct CorsMethod(pub Method);

impl<'de> Deserialize<'de> for CorsMethod {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let method = Method::from_str(&s).map_err(serde::de::Error::custom)?;
        Ok(CorsMethod(method))
    }
}

/// Wrapper type for HTTP header names in CORS configuration.
///
/// Header names are validated according to HTTP rules when deserialized.
#[derive(Debug, Clone)]
pub struct CorsHeader(pub HeaderName);

impl<'de> Deserialize<'de> for CorsHeader {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let header = HeaderName::from_str(&s).map_err(serde::de::Error::custom)?;
        Ok(CorsHeader(header))
    }
}

#[cfg(test)]
mod tests {
    use super::HttpCorsConfig;
    use crate::Config;
    use std::time::Duration;

    #[test]
    fn test_cors_config_absent_by_default() {
        let config = "[http]\nbind_port = 3000".parse::<Config>().unwrap();
        assert!(config.http.cors.is_none());
    }

    #[test]
    fn test_cors_config_empty_section() {
        let config = "[http.cors]".parse::<Config>().unwrap();
        let cors = config.http.cors.unwrap();
        assert!(cors.allowed_origins.is_none());
        assert!(cors.allowed_methods.is_none());
        assert!(cors.max_age.is_none());
        assert!(!cors.credentials());
    }

    #[test]
    fn test_cors_config_complete() {
        let config_str = r#"
[http.cors]
allowed_origins = ["https://example.com"]
allowed_methods = ["GET", "POST", "CUSTOM_METHOD"]
allowed_headers = ["Content-Type", "Authorization"]
exposed_headers = ["X-Total-Count"]
max_age = "7200s"
allow_credentials = true
        "#;

        let cors = config_str.parse::<Config>().unwrap().http.cors.unwrap();
        assert_eq!(cors.allowed_origins.as_ref().unwrap().len(), 1);
        assert_eq!(cors.allowed_methods.as_ref().unwrap().len(), 3);
        assert_eq!(cors.allowed_headers.as_ref().unwrap().len(), 2);
        assert_eq!(cors.exposed_headers.as_ref().unwrap().len(), 1);
        assert_eq!(cors.max_age, Some(Duration::from_secs(7200)));
        assert!(cors.credentials());
        assert!(cors.validate().is_ok());
    }

    #[test]
    fn test_cors_config_invalid_header() {
        let config_str = r#"
[http.cors]
allowed_headers = ["Invalid Header Name!"]
        "#;
        assert!(config_str.parse::<Config>().is_err());
    }

    #[test]
    fn test_credentials_without_origins_is_rejected() {
        let cors = HttpCorsConfig::default().with_allow_credentials();
        assert!(cors.validate().is_err());
    }

    #[test]
    fn test_allow_origin_value() {
        let open = HttpCorsConfig::default();
        assert_eq!(open.allow_origin_value(Some("https://a.com")), "*");
        assert_eq!(open.allow_origin_value(None), "*");

        let strict = HttpCorsConfig::default().with_allowed_origins(vec!["https://a.com".into()]);
        assert_eq!(strict.allow_origin_value(Some("https://a.com")), "https://a.com");
        assert_eq!(strict.allow_origin_value(Some("https://evil.com")), "false");
        assert_eq!(strict.allow_origin_value(None), "false");
    }
}
