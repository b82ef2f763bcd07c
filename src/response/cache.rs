//!
//! `Cache-Control` synthesis and entity tags.
//!

use {
    base64::{Engine, engine::general_purpose::STANDARD},
    sha1::{Digest, Sha1},
    std::time::Duration,
};

/// The entity tag of an empty body.
pub const EMPTY_ENTITY_TAG: &str = "\"0-2jmj7l5rSw0yVb/vlWAYkK/YBwk\"";

/// The value of a single cache-control directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// `true` emits the bare directive name, `false` omits it.
    Flag(bool),
    /// Emitted as `name=value`.
    Value(String),
}

impl From<bool> for Directive {
    fn from(flag: bool) -> Self {
        Directive::Flag(flag)
    }
}

impl From<u32> for Directive {
    fn from(value: u32) -> Self {
        Directive::Value(value.to_string())
    }
}

impl From<u64> for Directive {
    fn from(value: u64) -> Self {
        Directive::Value(value.to_string())
    }
}

impl From<Duration> for Directive {
    fn from(value: Duration) -> Self {
        Directive::Value(value.as_secs().to_string())
    }
}

impl From<&str> for Directive {
    fn from(value: &str) -> Self {
        Directive::Value(value.to_string())
    }
}

impl From<String> for Directive {
    fn from(value: String) -> Self {
        Directive::Value(value)
    }
}

/// An insertion-ordered set of cache-control directives.
///
/// ```rust
/// use keywork::CacheDirectives;
///
/// let directives = CacheDirectives::new()
///     .set("public", true)
///     .set("max-age", 3600u32)
///     .set("no-transform", false)
///     .set("immutable", true);
/// assert_eq!(directives.header_value().as_deref(), Some("public, max-age=3600, immutable"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheDirectives {
    entries: Vec<(String, Directive)>,
}

impl CacheDirectives {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a directive. Replacing an existing directive keeps its original position.
    pub fn set(mut self, name: impl Into<String>, value: impl Into<Directive>) -> Self {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(key, _)| *key == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
        self
    }

    /// `no-store`.
    pub fn no_store() -> Self {
        Self::new().set("no-store", true)
    }

    /// `public, max-age=<secs>, immutable` for fingerprinted assets.
    pub fn immutable(max_age: Duration) -> Self {
        Self::new()
            .set("public", true)
            .set("max-age", max_age)
            .set("immutable", true)
    }

    /// Renders the header value, or `None` when no directive would be emitted.
    pub fn header_value(&self) -> Option<String> {
        let parts: Vec<String> = self
            .entries
            .iter()
            .filter_map(|(name, value)| match value {
                Directive::Flag(true) => Some(name.clone()),
                Directive::Flag(false) => None,
                Directive::Value(value) => Some(format!("{name}={value}")),
            })
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(", "))
        }
    }

    pub fn is_empty(&self) -> bool {
        self.header_value().is_none()
    }
}

/// How a response obtains its entity tag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ETagMode {
    #[default]
    None,
    /// Hash the body.
    Generate { weak: bool },
    /// Use this exact, already quoted, tag.
    Explicit(String),
}

/// Caching behaviour of a buffered response.
#[derive(Debug, Clone, Default)]
pub struct CacheOptions {
    pub directives: CacheDirectives,
    pub etag: ETagMode,
}

impl CacheOptions {
    pub fn new(directives: CacheDirectives) -> Self {
        Self {
            directives,
            etag: ETagMode::None,
        }
    }

    /// Generates a strong entity tag from the body.
    pub fn with_etag(mut self) -> Self {
        self.etag = ETagMode::Generate { weak: false };
        self
    }

    /// Generates a weak entity tag from the body.
    pub fn with_weak_etag(mut self) -> Self {
        self.etag = ETagMode::Generate { weak: true };
        self
    }

    pub fn with_explicit_etag(mut self, tag: impl Into<String>) -> Self {
        self.etag = ETagMode::Explicit(tag.into());
        self
    }

    pub(crate) fn resolve_etag(&self, body: &[u8]) -> Option<String> {
        match &self.etag {
            ETagMode::None => None,
            ETagMode::Generate { weak } => Some(generate_etag(body, *weak)),
            ETagMode::Explicit(tag) => Some(tag.clone()),
        }
    }
}

/// Computes the entity tag of a body: `"<hex length>-<27 chars of base64 SHA-1>"`,
/// prefixed with `W/` when weak.
///
/// ```rust
/// use keywork::{EMPTY_ENTITY_TAG, generate_etag};
///
/// assert_eq!(generate_etag(b"", false), EMPTY_ENTITY_TAG);
/// assert!(generate_etag(b"hello", true).starts_with("W/\"5-"));
/// ```
pub fn generate_etag(body: &[u8], weak: bool) -> String {
    let tag = if body.is_empty() {
        EMPTY_ENTITY_TAG.to_string()
    } else {
        let digest = Sha1::digest(body);
        let encoded = STANDARD.encode(digest);
        format!("\"{:x}-{}\"", body.len(), &encoded[..27])
    };
    if weak { format!("W/{tag}") } else { tag }
}

/// Returns `true` when an `If-None-Match` header value matches `etag`.
///
/// Comparison is weak: a `W/` prefix on either side is ignored.
pub fn etag_matches(if_none_match: &str, etag: &str) -> bool {
    let etag = strip_weak(etag.trim());
    if_none_match
        .split(',')
        .map(str::trim)
        .any(|candidate| candidate == "*" || strip_weak(candidate) == etag)
}

fn strip_weak(tag: &str) -> &str {
    tag.strip_prefix("W/").unwrap_or(tag)
}
