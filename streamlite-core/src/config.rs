//! Extension configuration read from the host process environment.
//!
//! A loadable extension has no command line of its own, so the few knobs it
//! has come from environment variables read once at `init` time.

use crate::error::{Result, StreamLiteError};

pub const LOG_FILTER_ENV: &str = "STREAMLITE_LOG";
pub const LOG_FORMAT_ENV: &str = "STREAMLITE_LOG_FORMAT";

pub const DEFAULT_LOG_FILTER: &str = "streamlite=info";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = StreamLiteError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "compact" | "" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            other => Err(StreamLiteError::InvalidInput(format!(
                "{LOG_FORMAT_ENV}: unknown log format `{other}` (expected compact or json)"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionConfig {
    /// `EnvFilter` directives, e.g. `streamlite=debug`.
    pub log_filter: String,
    pub log_format: LogFormat,
}

impl Default for ExtensionConfig {
    fn default() -> Self {
        Self {
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            log_format: LogFormat::default(),
        }
    }
}

impl ExtensionConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup.
    ///
    /// # Example
    ///
    /// ```
    /// use streamlite_core::config::{ExtensionConfig, LogFormat};
    ///
    /// let cfg = ExtensionConfig::from_lookup(|key| match key {
    ///     "STREAMLITE_LOG_FORMAT" => Some("json".to_string()),
    ///     _ => None,
    /// })
    /// .unwrap();
    /// assert_eq!(cfg.log_format, LogFormat::Json);
    /// assert_eq!(cfg.log_filter, "streamlite=info");
    /// ```
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();
        if let Some(filter) = lookup(LOG_FILTER_ENV).filter(|f| !f.trim().is_empty()) {
            cfg.log_filter = filter;
        }
        if let Some(format) = lookup(LOG_FORMAT_ENV) {
            cfg.log_format = format.parse()?;
        }
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_environment_gives_defaults() {
        let cfg = ExtensionConfig::from_lookup(|_| None).unwrap();
        assert_eq!(cfg, ExtensionConfig::default());
    }

    #[test]
    fn blank_filter_keeps_default() {
        let cfg = ExtensionConfig::from_lookup(|key| {
            (key == LOG_FILTER_ENV).then(|| "  ".to_string())
        })
        .unwrap();
        assert_eq!(cfg.log_filter, DEFAULT_LOG_FILTER);
    }

    #[test]
    fn custom_filter_is_kept_verbatim() {
        let cfg = ExtensionConfig::from_lookup(|key| {
            (key == LOG_FILTER_ENV).then(|| "streamlite=trace,warn".to_string())
        })
        .unwrap();
        assert_eq!(cfg.log_filter, "streamlite=trace,warn");
    }

    #[test]
    fn unknown_format_is_rejected() {
        let err = ExtensionConfig::from_lookup(|key| {
            (key == LOG_FORMAT_ENV).then(|| "xml".to_string())
        })
        .unwrap_err();
        assert!(err.to_string().contains("xml"), "{err}");
    }

    #[test]
    fn format_is_case_insensitive() {
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
    }
}
