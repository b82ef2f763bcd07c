mod cors;
mod session;

pub use cors::*;
pub use session::*;

use {crate::Result, serde::Deserialize, std::time::Duration};

///
/// Configuration for the HTTP surface of a keywork application.
///
/// Covers the thin server adapter (bind address, shutdown), request body limits
/// used by the fetch event, router debugging aids, and the optional CORS and
/// session middleware.
///
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    /// IP address the server adapter binds to.
    /// The default `bind_addr` is "127.0.0.1".
    #[serde(default = "HttpConfig::default_bind_addr")]
    pub bind_addr: String,

    /// Port the server adapter binds to.
    /// The default `bind_port` is 8787.
    #[serde(default = "HttpConfig::default_bind_port")]
    pub bind_port: u16,

    /// Maximum request body size read through the `FetchEvent` body helpers.
    /// Larger bodies are rejected with a 413 Payload Too Large resource error.
    /// By default `max_payload_size_bytes` is 1MiB.
    #[serde(default = "HttpConfig::default_max_payload_size_bytes")]
    pub max_payload_size_bytes: byte_unit::Byte,

    /// Attach an `x-keywork-attempted-routes` header to 404 responses listing the
    /// patterns that were tried. Off by default; only enable while debugging.
    #[serde(default)]
    pub include_debug_headers: bool,

    /// Serve a JSON listing of the registered routes at `/keywork/routes`.
    #[serde(default)]
    pub debug_routes: bool,

    /// Maximum time to wait for graceful shutdown to complete.
    /// By default `shutdown_timeout` is set to 30 seconds.
    #[serde(
        default = "HttpConfig::default_shutdown_timeout",
        with = "humantime_serde"
    )]
    pub shutdown_timeout: Duration,

    /// CORS configuration. When absent, the CORS middleware is not installed
    /// by `Router::setup_middleware`.
    #[serde(default)]
    pub cors: Option<HttpCorsConfig>,

    /// Session cookie configuration. When absent, no session middleware is installed
    /// by `Router::setup_middleware`.
    #[serde(default)]
    pub session: Option<HttpSessionConfig>,
}

impl HttpConfig {
    ///
    /// Returns the full bind address as a string in the format "IP:PORT".
    ///
    pub fn full_bind_addr(&self) -> String {
        format!("{}:{}", self.bind_addr, self.bind_port)
    }

    fn default_bind_addr() -> String {
        "127.0.0.1".into()
    }

    fn default_bind_port() -> u16 {
        8787
    }

    fn default_max_payload_size_bytes() -> byte_unit::Byte {
        byte_unit::Byte::from_u64(1024 * 1024)
    }

    fn default_shutdown_timeout() -> Duration {
        Duration::from_secs(30)
    }

    pub fn validate(&self) -> Result<()> {
        if self.bind_addr.trim().is_empty() {
            return Err(crate::Error::invalid_input(
                "HTTP bind_addr is required. Set [http] bind_addr = \"0.0.0.0\" or \"127.0.0.1\" in config.",
            ));
        }

        if self.bind_addr.parse::<std::net::IpAddr>().is_err() {
            return Err(crate::Error::invalid_input(
                "HTTP bind_addr must be a valid IP address. Examples: \"127.0.0.1\", \"0.0.0.0\", \"::1\"",
            ));
        }

        if let Some(cors) = &self.cors {
            cors.validate()?;
        }

        if let Some(session) = &self.session {
            session.validate()?;
        }

        if self.include_debug_headers || self.debug_routes {
            tracing::warn!(
                "Router debug output is enabled. Attempted route patterns or the route \
                 table will be visible to clients."
            );
        }

        Ok(())
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        HttpConfig {
            bind_addr: Self::default_bind_addr(),
            bind_port: Self::default_bind_port(),
            max_payload_size_bytes: Self::default_max_payload_size_bytes(),
            include_debug_headers: false,
            debug_routes: false,
            shutdown_timeout: Self::default_shutdown_timeout(),
            cors: None,
            session: None,
        }
    }
}
