use crate::{Error, Result};
use serde::{Deserialize, Deserializer, de};
use std::time::Duration;

pub use cookie::SameSite;

/// Configuration for the cookie-based session middleware.
///
/// ```toml
/// [http.session]
/// cookie_name = "session_id"
/// max_age = "1h"
/// secure = true
/// same_site = "lax"
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct HttpSessionConfig {
    /// Name of the cookie carrying the session identifier.
    #[serde(default = "HttpSessionConfig::default_cookie_name")]
    pub cookie_name: String,

    /// Cookie lifetime. When absent the cookie lives for the browser session.
    #[serde(default, with = "humantime_serde")]
    pub max_age: Option<Duration>,

    /// Adds the `Secure` attribute. Defaults to true.
    #[serde(default = "HttpSessionConfig::default_secure")]
    pub secure: bool,

    /// The `SameSite` attribute. Defaults to `lax`.
    #[serde(
        default = "HttpSessionConfig::default_same_site",
        deserialize_with = "deserialize_same_site"
    )]
    pub same_site: SameSite,

    /// Cookie path. Defaults to `/`.
    #[serde(default = "HttpSessionConfig::default_path")]
    pub path: String,
}

impl HttpSessionConfig {
    fn default_cookie_name() -> String {
        "session_id".into()
    }

    fn default_secure() -> bool {
        true
    }

    fn default_path() -> String {
        "/".into()
    }

    fn default_same_site() -> SameSite {
        SameSite::Lax
    }

    /// Sets the cookie name.
    pub fn with_cookie_name(mut self, name: impl Into<String>) -> Self {
        self.cookie_name = name.into();
        self
    }

    /// Sets the cookie lifetime.
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    /// Enables or disables the `Secure` attribute.
    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn validate(&self) -> Result<()> {
        let valid_name = !self.cookie_name.is_empty()
            && self
                .cookie_name
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-');
        if !valid_name {
            return Err(Error::invalid_input(format!(
                "Session cookie_name `{}` must be non-empty and contain only ASCII letters, digits, `_` or `-`",
                self.cookie_name
            )));
        }
        if self.same_site.is_none() && !self.secure {
            return Err(Error::invalid_input(
                "Session same_site = \"none\" requires secure = true",
            ));
        }
        Ok(())
    }
}

impl Default for HttpSessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: Self::default_cookie_name(),
            max_age: None,
            secure: Self::default_secure(),
            same_site: Self::default_same_site(),
            path: Self::default_path(),
        }
    }
}

fn deserialize_same_site<'de, D>(deserializer: D) -> std::result::Result<SameSite, D::Error>
where
    D: Deserializer<'de>,
{
    let value = String::deserialize(deserializer)?;
    match value.to_ascii_lowercase().as_str() {
        "strict" => Ok(SameSite::Strict),
        "lax" => Ok(SameSite::Lax),
        "none" => Ok(SameSite::None),
        _ => Err(de::Error::unknown_variant(&value, &["strict", "lax", "none"])),
    }
}
