//! Tracing subscriber setup shared by Contact Scout binaries

use crate::config::LoggingConfig;
use crate::{Error, Result};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Install the global tracing subscriber
///
/// `RUST_LOG`, when set, takes precedence over the config file.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = match std::env::var("RUST_LOG") {
        Ok(value) if !value.trim().is_empty() => EnvFilter::new(value),
        _ => EnvFilter::new(filter_directives(config)),
    };

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_ansi(config.ansi)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| Error::Internal(format!("Failed to install tracing subscriber: {}", e)))
}

/// Combined `EnvFilter` directive string for a logging config
pub fn filter_directives(config: &LoggingConfig) -> String {
    match &config.directives {
        Some(extra) if !extra.trim().is_empty() => format!("{},{}", config.level, extra),
        _ => config.level.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directives_are_appended_to_level() {
        let config = LoggingConfig {
            level: "warn".to_string(),
            directives: Some("scout_research=debug".to_string()),
            ansi: false,
        };
        assert_eq!(filter_directives(&config), "warn,scout_research=debug");
    }

    #[test]
    fn blank_directives_ignored() {
        let config = LoggingConfig {
            level: "info".to_string(),
            directives: Some("  ".to_string()),
            ansi: false,
        };
        assert_eq!(filter_directives(&config), "info");
    }
}
