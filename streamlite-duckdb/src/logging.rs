//! One-shot `tracing` subscriber installation.
//!
//! The extension lives inside someone else's process. If the host already
//! installed a global subscriber, that one wins and ours is dropped.

use std::sync::Once;

use streamlite_core::config::{ExtensionConfig, LogFormat, DEFAULT_LOG_FILTER};
use tracing_subscriber::EnvFilter;

static INSTALL: Once = Once::new();

fn env_filter(cfg: &ExtensionConfig) -> EnvFilter {
    EnvFilter::try_new(&cfg.log_filter).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}

pub(crate) fn init_logging(cfg: &ExtensionConfig) {
    INSTALL.call_once(|| {
        let filter = env_filter(cfg);
        let installed = match cfg.log_format {
            LogFormat::Json => tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_writer(std::io::stderr)
                .try_init(),
            LogFormat::Compact => tracing_subscriber::fmt()
                .compact()
                .with_env_filter(filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .try_init(),
        };
        if installed.is_err() {
            tracing::debug!("host process already has a global subscriber");
        }
    });
}

/// Install logging from `STREAMLITE_LOG` / `STREAMLITE_LOG_FORMAT`.
///
/// Runs before anything else in init, so every init outcome is logged.
pub(crate) fn init_logging_from_env() {
    match ExtensionConfig::from_env() {
        Ok(cfg) => init_logging(&cfg),
        Err(e) => {
            init_logging(&ExtensionConfig::default());
            tracing::warn!(error = %e, "ignoring invalid logging configuration");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_filter_falls_back_to_default() {
        let cfg = ExtensionConfig {
            log_filter: "streamlite=notalevel".to_string(),
            ..ExtensionConfig::default()
        };
        assert_eq!(
            env_filter(&cfg).to_string(),
            EnvFilter::new(DEFAULT_LOG_FILTER).to_string()
        );
    }

    #[test]
    fn init_logging_is_idempotent() {
        let cfg = ExtensionConfig::default();
        init_logging(&cfg);
        init_logging(&cfg);
    }
}
