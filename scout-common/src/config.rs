//! Configuration loading and root folder resolution
//!
//! Every Contact Scout service reads an optional TOML file. A missing file is
//! never fatal: the service logs a warning and falls back to compiled defaults.

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable consulted for the root folder
pub const ROOT_FOLDER_ENV: &str = "SCOUT_ROOT_FOLDER";

/// Logging section shared by all service config files
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default level filter ("trace", "debug", "info", "warn", "error")
    pub level: String,
    /// Extra `EnvFilter` directives, e.g. "scout_research=debug,sqlx=warn"
    pub directives: Option<String>,
    /// Emit ANSI colours
    pub ansi: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directives: None,
            ansi: true,
        }
    }
}

/// Minimal view of a service TOML file used during startup
///
/// Services deserialize their own richer structs from the same file; this
/// view only carries what root folder resolution and logging need.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub root_folder: Option<String>,
    pub logging: LoggingConfig,
}

/// Root folder resolution priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. TOML config file
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_root_folder(
    cli_arg: Option<&str>,
    env_var_name: &str,
    toml_config: Option<&TomlConfig>,
) -> PathBuf {
    if let Some(path) = cli_arg {
        return PathBuf::from(path);
    }

    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(root_folder) = toml_config.and_then(|c| c.root_folder.as_deref()) {
        return PathBuf::from(root_folder);
    }

    default_root_folder()
}

/// Default configuration file path for a module on this platform
///
/// Linux: `~/.config/contact-scout/<module>.toml`, falling back to
/// `/etc/contact-scout/<module>.toml` when only the system file exists.
pub fn default_config_path(module_name: &str) -> Option<PathBuf> {
    let file_name = format!("{}.toml", module_name);
    let user_config = dirs::config_dir().map(|d| d.join("contact-scout").join(&file_name));

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/contact-scout").join(&file_name);
        match &user_config {
            Some(path) if path.exists() => return user_config,
            _ if system_config.exists() => return Some(system_config),
            _ => {}
        }
    }

    user_config
}

/// OS-dependent default root folder path
pub fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        dirs::data_local_dir()
            .map(|d| d.join("contact-scout"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/contact-scout"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("contact-scout"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/contact-scout"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("contact-scout"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\contact-scout"))
    } else {
        PathBuf::from("./contact_scout_data")
    }
}

/// Load a TOML config file, falling back to defaults when it is missing
///
/// A file that exists but fails to parse is an error: silently ignoring a
/// typo in a weight or threshold would be worse than refusing to start.
pub fn load_toml_or_default<T>(path: &Path) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    if !path.exists() {
        warn!(
            path = %path.display(),
            "Config file not found, using compiled defaults"
        );
        return Ok(T::default());
    }

    let content = std::fs::read_to_string(path)?;
    let config = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;

    info!(path = %path.display(), "Loaded config file");
    Ok(config)
}

/// Write a TOML config atomically (temp file + rename)
pub fn write_toml_config<T: Serialize>(config: &T, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let tmp_path = path.with_extension("toml.tmp");
    std::fs::write(&tmp_path, content)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Create the root folder if it does not exist yet
pub fn ensure_root_folder(root_folder: &Path) -> Result<()> {
    if !root_folder.exists() {
        std::fs::create_dir_all(root_folder).map_err(|e| {
            Error::Config(format!(
                "Failed to create root folder {}: {}",
                root_folder.display(),
                e
            ))
        })?;
        info!(root_folder = %root_folder.display(), "Created root folder");
    }
    Ok(())
}
