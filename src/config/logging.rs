use {
    crate::{Error, Result},
    serde::Deserialize,
    tracing_subscriber::EnvFilter,
};

///
/// Configuration for logging and tracing.
///
/// ```toml
/// [logging]
/// format = "json"
/// filter = "keywork=debug,tower_http=info"
/// ```
///
#[derive(Debug, Clone, Deserialize, Default)]
pub struct LoggingConfig {
    /// Format for log output.
    /// The default format is `default`, which is "full" human-readable format.
    /// Other options are `json`, `compact`, and `pretty`.
    #[serde(default)]
    pub format: LogFormat,

    /// Filter directives used when `RUST_LOG` is not set.
    #[serde(default)]
    pub filter: Option<String>,
}

impl LoggingConfig {
    /// Checks that `filter` parses as tracing filter directives.
    pub fn validate(&self) -> Result<()> {
        if let Some(filter) = &self.filter {
            EnvFilter::try_new(filter).map_err(|err| {
                Error::config(format!("Invalid logging filter `{filter}`: {err}"))
            })?;
        }
        Ok(())
    }

    /// The filter for the subscriber: `RUST_LOG` first, then `filter`.
    pub(crate) fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env()
            .ok()
            .or_else(|| {
                self.filter
                    .as_deref()
                    .and_then(|filter| EnvFilter::try_new(filter).ok())
            })
            .unwrap_or_else(EnvFilter::from_default_env)
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    #[default]
    Default,
    Compact,
    Pretty,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Config, ErrorKind};

    #[test]
    fn test_logging_filter_from_toml() {
        let config: Config = r#"
[logging]
format = "pretty"
filter = "keywork=debug,info"
        "#
        .parse()
        .unwrap();
        assert!(matches!(config.logging.format, LogFormat::Pretty));
        assert_eq!(config.logging.filter.as_deref(), Some("keywork=debug,info"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_logging_filter_is_rejected() {
        let config = LoggingConfig {
            filter: Some("keywork=loud".into()),
            ..Default::default()
        };
        assert_eq!(config.validate().unwrap_err().kind(), ErrorKind::Configuration);
    }
}
