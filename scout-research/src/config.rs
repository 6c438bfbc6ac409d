//! Configuration for scout-research
//!
//! One TOML file (`scout-research.toml`) with a section per component. Every
//! section is optional and falls back to compiled defaults.

use crate::heuristics::HeuristicsConfig;
use crate::query_gen::{GeneratorConfig, QueryEngineConfig};
use crate::services::{HarvesterConfig, OrchestratorConfig};
use scout_common::config::{LoggingConfig, TomlConfig};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

/// Module name used for the default config file path
pub const MODULE_NAME: &str = "scout-research";

/// Environment variable consulted for the generation API key
pub const API_KEY_ENV: &str = "SCOUT_GENERATION_API_KEY";

/// `[server]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5740,
        }
    }
}

/// `[progress]` section: server side of the push channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressConfig {
    /// Event bus capacity; slower subscribers lag and get a fresh snapshot
    pub event_capacity: usize,
    pub heartbeat_interval_ms: u64,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            event_capacity: 1000,
            heartbeat_interval_ms: 30_000,
        }
    }
}

impl ProgressConfig {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms.max(1))
    }
}

/// Full service configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub root_folder: Option<String>,
    pub logging: LoggingConfig,
    pub server: ServerConfig,
    pub generation: GeneratorConfig,
    pub harvester: HarvesterConfig,
    pub query_engine: QueryEngineConfig,
    pub heuristics: HeuristicsConfig,
    pub search: OrchestratorConfig,
    pub progress: ProgressConfig,
}

impl ServiceConfig {
    /// Startup view consumed by root folder resolution
    pub fn toml_view(&self) -> TomlConfig {
        TomlConfig {
            root_folder: self.root_folder.clone(),
            logging: self.logging.clone(),
        }
    }
}

/// Resolve the generation API key
///
/// **Priority:** ENV → TOML. A missing key is not an error: local
/// OpenAI-compatible servers usually accept unauthenticated requests.
pub fn resolve_generation_api_key(config: &GeneratorConfig) -> Option<String> {
    let env_key = std::env::var(API_KEY_ENV).ok().filter(|k| is_valid_key(k));
    let toml_key = config.api_key.clone().filter(|k| is_valid_key(k));

    if env_key.is_some() && toml_key.is_some() {
        warn!(
            "Generation API key found in environment and TOML. Using environment (highest priority)."
        );
    }

    if let Some(key) = env_key {
        info!("Generation API key loaded from environment variable");
        return Some(key);
    }

    if let Some(key) = toml_key {
        info!("Generation API key loaded from TOML config");
        return Some(key);
    }

    info!("No generation API key configured; sending unauthenticated requests");
    None
}

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn sections_default_independently() {
        let config: ServiceConfig = toml::from_str(
            r#"
            [server]
            port = 6000

            [search]
            recall_max_queries = 30
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 6000);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.search.recall_max_queries, 30);
        assert_eq!(config.search.default_max_queries, 10);
        assert_eq!(config.heuristics, HeuristicsConfig::default());
    }

    #[test]
    fn whitespace_key_is_invalid() {
        assert!(!is_valid_key("   "));
        assert!(is_valid_key("sk-123"));
    }

    #[test]
    #[serial]
    fn environment_key_wins_over_toml() {
        std::env::set_var(API_KEY_ENV, "from-env");
        let config = GeneratorConfig {
            api_key: Some("from-toml".to_string()),
            ..Default::default()
        };
        assert_eq!(resolve_generation_api_key(&config).as_deref(), Some("from-env"));
        std::env::remove_var(API_KEY_ENV);
    }

    #[test]
    #[serial]
    fn toml_key_used_without_environment() {
        std::env::remove_var(API_KEY_ENV);
        let config = GeneratorConfig {
            api_key: Some("from-toml".to_string()),
            ..Default::default()
        };
        assert_eq!(resolve_generation_api_key(&config).as_deref(), Some("from-toml"));

        let blank = GeneratorConfig {
            api_key: Some(" ".to_string()),
            ..Default::default()
        };
        assert_eq!(resolve_generation_api_key(&blank), None);
    }
}
