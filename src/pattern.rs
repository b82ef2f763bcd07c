//!
//! URL pattern compilation and matching.
//!
//! Patterns follow the familiar URL pattern syntax:
//!
//! - `:name` captures one or more characters up to the next delimiter
//!   (`/` in the pathname, `.` in the hostname) into `groups["name"]`.
//! - `*` captures everything (possibly nothing) into a numbered group, `"0"` for the
//!   first wildcard of a component, `"1"` for the second, and so on.
//! - A mount prefix ([`UrlPattern::mount_prefix`]) ends in a wildcard that only
//!   matches at a segment boundary, so `/api` covers `/api/users` but not `/apix`.
//! - `\` escapes the next character, so `\*` and `\:` match literally.
//! - Every other character matches itself.
//!
//! A bare string is a pathname pattern; every other component then defaults to `*`.
//! Patterns are compiled once, at construction, into a small token list and matched
//! with a backtracking walk over the input. No regular expressions are built from
//! user-provided text.
//!
//! ```rust
//! use keywork::UrlPattern;
//! use url::Url;
//!
//! let pattern = UrlPattern::new("/todo/:id");
//! let url = Url::parse("https://example.com/todo/42").unwrap();
//! let matched = pattern.exec(&url).unwrap();
//! assert_eq!(matched.param("id"), Some("42"));
//! ```
//!

use {
    serde::{Deserialize, Serialize},
    std::{collections::BTreeMap, fmt},
    url::Url,
};

/// A structured pattern: one optional pattern string per URL component.
///
/// Components left as `None` match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatternInit {
    pub protocol: Option<String>,
    pub hostname: Option<String>,
    pub port: Option<String>,
    pub pathname: Option<String>,
    pub search: Option<String>,
    pub hash: Option<String>,
}

impl PatternInit {
    /// A pattern that only constrains the pathname.
    pub fn pathname(pathname: impl Into<String>) -> Self {
        Self {
            pathname: Some(pathname.into()),
            ..Default::default()
        }
    }

    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = Some(hostname.into());
        self
    }

    pub fn with_protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocol = Some(protocol.into());
        self
    }

    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }
}

impl From<&str> for PatternInit {
    fn from(pathname: &str) -> Self {
        Self::pathname(pathname)
    }
}

impl From<String> for PatternInit {
    fn from(pathname: String) -> Self {
        Self::pathname(pathname)
    }
}

impl From<&String> for PatternInit {
    fn from(pathname: &String) -> Self {
        Self::pathname(pathname.as_str())
    }
}

impl fmt::Display for PatternInit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(protocol) = &self.protocol {
            write!(f, "{protocol}:")?;
        }
        if let Some(hostname) = &self.hostname {
            write!(f, "//{hostname}")?;
            if let Some(port) = &self.port {
                write!(f, ":{port}")?;
            }
        }
        write!(f, "{}", self.pathname.as_deref().unwrap_or("*"))?;
        if let Some(search) = &self.search {
            write!(f, "?{search}")?;
        }
        if let Some(hash) = &self.hash {
            write!(f, "#{hash}")?;
        }
        Ok(())
    }
}

/// Options for [`normalize`].
#[derive(Debug, Clone, Copy, Default)]
pub struct NormalizeOptions {
    /// Append a trailing `*` to the pathname unless it already ends with one.
    /// Used for mount prefixes so that every descendant path matches.
    pub append_wildcard: bool,
}

/// Normalizes a pattern-like value into a [`PatternInit`].
///
/// ```rust
/// use keywork::pattern::{NormalizeOptions, normalize};
///
/// let init = normalize("/api", NormalizeOptions { append_wildcard: true });
/// assert_eq!(init.pathname.as_deref(), Some("/api*"));
///
/// let init = normalize("/api/*", NormalizeOptions { append_wildcard: true });
/// assert_eq!(init.pathname.as_deref(), Some("/api/*"));
/// ```
pub fn normalize(pattern: impl Into<PatternInit>, options: NormalizeOptions) -> PatternInit {
    let mut init = pattern.into();
    if options.append_wildcard {
        let pathname = init.pathname.take().unwrap_or_default();
        init.pathname = Some(if ends_with_wildcard(&pathname) {
            pathname
        } else {
            format!("{pathname}*")
        });
    }
    init
}

fn ends_with_wildcard(pathname: &str) -> bool {
    // An escaped `\*` is a literal star, not a wildcard.
    pathname.ends_with('*') && !pathname.ends_with("\\*")
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Literal(String),
    Param(String),
    Wildcard(String),
    /// A trailing wildcard whose capture is empty or starts at a delimiter.
    Remainder(String),
}

#[derive(Debug, Clone)]
struct Component {
    tokens: Vec<Token>,
    delimiter: Option<char>,
}

impl Component {
    fn compile(source: Option<&str>, delimiter: Option<char>) -> Self {
        let tokens = match source {
            Some(source) => tokenize(source),
            None => vec![Token::Wildcard("0".into())],
        };
        Self { tokens, delimiter }
    }

    fn exec(&self, input: &str) -> Option<ComponentMatch> {
        let mut captures = Vec::new();
        if match_tokens(&self.tokens, input, self.delimiter, &mut captures) {
            Some(ComponentMatch {
                input: input.to_string(),
                groups: captures.into_iter().collect(),
            })
        } else {
            None
        }
    }

    fn last_wildcard(&self) -> Option<&str> {
        match self.tokens.last() {
            Some(Token::Wildcard(name) | Token::Remainder(name)) => Some(name),
            _ => None,
        }
    }

    /// Turns the trailing wildcard into a [`Token::Remainder`] unless what precedes
    /// it already ends at a delimiter (`/api/*`, `*`).
    fn bound_remainder(&mut self) {
        let Some((Token::Wildcard(name), head)) = self.tokens.split_last() else {
            return;
        };
        let open_ended = match head.last() {
            None => true,
            Some(Token::Literal(literal)) => self.delimiter.is_some_and(|d| literal.ends_with(d)),
            Some(_) => false,
        };
        if open_ended {
            return;
        }
        let name = name.clone();
        if let Some(last) = self.tokens.last_mut() {
            *last = Token::Remainder(name);
        }
    }
}

fn tokenize(source: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut literal = String::new();
    let mut wildcards = 0usize;
    let mut chars = source.chars().peekable();

    let flush = |literal: &mut String, tokens: &mut Vec<Token>| {
        if !literal.is_empty() {
            tokens.push(Token::Literal(std::mem::take(literal)));
        }
    };

    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some(escaped) => literal.push(escaped),
                None => literal.push('\\'),
            },
            '*' => {
                flush(&mut literal, &mut tokens);
                tokens.push(Token::Wildcard(wildcards.to_string()));
                wildcards += 1;
            }
            ':' if chars.peek().is_some_and(|n| is_name_char(*n)) => {
                flush(&mut literal, &mut tokens);
                let mut name = String::new();
                while let Some(n) = chars.peek().copied().filter(|n| is_name_char(*n)) {
                    name.push(n);
                    chars.next();
                }
                tokens.push(Token::Param(name));
            }
            _ => literal.push(c),
        }
    }
    flush(&mut literal, &mut tokens);
    tokens
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn match_tokens(
    tokens: &[Token],
    input: &str,
    delimiter: Option<char>,
    captures: &mut Vec<(String, String)>,
) -> bool {
    let Some((token, rest)) = tokens.split_first() else {
        return input.is_empty();
    };

    match token {
        Token::Literal(literal) => input
            .strip_prefix(literal.as_str())
            .is_some_and(|tail| match_tokens(rest, tail, delimiter, captures)),
        Token::Param(name) => {
            // Shortest capture first, never crossing a delimiter.
            let segment_end = delimiter
                .and_then(|d| input.find(d))
                .unwrap_or(input.len());
            let ends = input[..segment_end]
                .char_indices()
                .map(|(i, c)| i + c.len_utf8());
            for end in ends {
                captures.push((name.clone(), input[..end].to_string()));
                if match_tokens(rest, &input[end..], delimiter, captures) {
                    return true;
                }
                captures.pop();
            }
            false
        }
        Token::Wildcard(name) => {
            // Longest capture first.
            let mut ends: Vec<usize> = input.char_indices().map(|(i, _)| i).collect();
            ends.push(input.len());
            for end in ends.into_iter().rev() {
                captures.push((name.clone(), input[..end].to_string()));
                if match_tokens(rest, &input[end..], delimiter, captures) {
                    return true;
                }
                captures.pop();
            }
            false
        }
        Token::Remainder(name) => {
            let on_boundary = input.is_empty() || delimiter.is_some_and(|d| input.starts_with(d));
            if !on_boundary {
                return false;
            }
            captures.push((name.clone(), input.to_string()));
            if match_tokens(rest, "", delimiter, captures) {
                return true;
            }
            captures.pop();
            false
        }
    }
}

/// The match of a single URL component.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentMatch {
    /// The component text that was matched.
    pub input: String,
    /// Named and numbered captures.
    pub groups: BTreeMap<String, String>,
}

/// The result of matching a URL against a [`UrlPattern`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    pub protocol: ComponentMatch,
    pub hostname: ComponentMatch,
    pub port: ComponentMatch,
    pub pathname: ComponentMatch,
    pub search: ComponentMatch,
    pub hash: ComponentMatch,
    #[serde(skip)]
    remainder_key: Option<String>,
}

impl MatchResult {
    /// Returns a pathname capture by name.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.pathname.groups.get(name).map(String::as_str)
    }

    /// Returns all pathname captures.
    pub fn params(&self) -> &BTreeMap<String, String> {
        &self.pathname.groups
    }

    /// Returns what the trailing pathname wildcard captured, if the pattern ends with one.
    pub fn remainder(&self) -> Option<&str> {
        self.remainder_key
            .as_deref()
            .and_then(|key| self.param(key))
    }
}

/// A compiled URL pattern.
#[derive(Debug, Clone)]
pub struct UrlPattern {
    init: PatternInit,
    protocol: Component,
    hostname: Component,
    port: Component,
    pathname: Component,
    search: Component,
    hash: Component,
}

impl UrlPattern {
    /// Compiles a pattern without normalization options.
    pub fn new(pattern: impl Into<PatternInit>) -> Self {
        Self::compile(pattern.into())
    }

    /// Normalizes and then compiles a pattern.
    pub fn with_options(pattern: impl Into<PatternInit>, options: NormalizeOptions) -> Self {
        Self::compile(normalize(pattern, options))
    }

    /// Compiles a mount prefix: the pathname gets a trailing wildcard, and unless the
    /// prefix already ends in `/` that wildcard only matches at a segment boundary.
    ///
    /// ```rust
    /// use keywork::UrlPattern;
    /// use url::Url;
    ///
    /// let prefix = UrlPattern::mount_prefix("/t/:tenant");
    /// let url = Url::parse("https://example.com/t/acme/x").unwrap();
    /// let matched = prefix.exec(&url).unwrap();
    /// assert_eq!(matched.param("tenant"), Some("acme"));
    /// assert_eq!(matched.remainder(), Some("/x"));
    /// ```
    pub fn mount_prefix(prefix: impl Into<PatternInit>) -> Self {
        let mut pattern = Self::with_options(prefix, NormalizeOptions {
            append_wildcard: true,
        });
        pattern.pathname.bound_remainder();
        pattern
    }

    fn compile(init: PatternInit) -> Self {
        Self {
            protocol: Component::compile(init.protocol.as_deref(), None),
            hostname: Component::compile(init.hostname.as_deref(), Some('.')),
            port: Component::compile(init.port.as_deref(), None),
            pathname: Component::compile(init.pathname.as_deref(), Some('/')),
            search: Component::compile(init.search.as_deref(), None),
            hash: Component::compile(init.hash.as_deref(), None),
            init,
        }
    }

    /// The normalized pattern this matcher was compiled from.
    pub fn init(&self) -> &PatternInit {
        &self.init
    }

    /// Returns `true` when `url` matches every component of the pattern.
    pub fn test(&self, url: &Url) -> bool {
        self.exec(url).is_some()
    }

    /// Matches `url` and returns the captures of every component.
    pub fn exec(&self, url: &Url) -> Option<MatchResult> {
        let port = url.port().map(|p| p.to_string()).unwrap_or_default();
        Some(MatchResult {
            pathname: self.pathname.exec(url.path())?,
            protocol: self.protocol.exec(url.scheme())?,
            hostname: self.hostname.exec(url.host_str().unwrap_or_default())?,
            port: self.port.exec(&port)?,
            search: self.search.exec(url.query().unwrap_or_default())?,
            hash: self.hash.exec(url.fragment().unwrap_or_default())?,
            remainder_key: self.pathname.last_wildcard().map(str::to_string),
        })
    }
}

impl fmt::Display for UrlPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.init.fmt(f)
    }
}
