//! Configuration loading and root folder resolution
//!
//! Uses serial_test: tests that touch SCOUT_ROOT_FOLDER run sequentially.

use scout_common::config::{
    ensure_root_folder, load_toml_or_default, resolve_root_folder, write_toml_config,
    TomlConfig, ROOT_FOLDER_ENV,
};
use serial_test::serial;
use std::env;
use std::path::PathBuf;
use tempfile::TempDir;

#[test]
#[serial]
fn test_env_var_overrides_toml() {
    env::set_var(ROOT_FOLDER_ENV, "/from/env");
    let toml = TomlConfig {
        root_folder: Some("/from/toml".to_string()),
        ..Default::default()
    };

    let resolved = resolve_root_folder(None, ROOT_FOLDER_ENV, Some(&toml));
    env::remove_var(ROOT_FOLDER_ENV);

    assert_eq!(resolved, PathBuf::from("/from/env"));
}

#[test]
#[serial]
fn test_cli_overrides_env() {
    env::set_var(ROOT_FOLDER_ENV, "/from/env");
    let resolved = resolve_root_folder(Some("/from/cli"), ROOT_FOLDER_ENV, None);
    env::remove_var(ROOT_FOLDER_ENV);

    assert_eq!(resolved, PathBuf::from("/from/cli"));
}

#[test]
#[serial]
fn test_blank_env_var_is_ignored() {
    env::set_var(ROOT_FOLDER_ENV, "   ");
    let toml = TomlConfig {
        root_folder: Some("/from/toml".to_string()),
        ..Default::default()
    };

    let resolved = resolve_root_folder(None, ROOT_FOLDER_ENV, Some(&toml));
    env::remove_var(ROOT_FOLDER_ENV);

    assert_eq!(resolved, PathBuf::from("/from/toml"));
}

#[test]
#[serial]
fn test_no_overrides_uses_platform_default() {
    env::remove_var(ROOT_FOLDER_ENV);
    let resolved = resolve_root_folder(None, ROOT_FOLDER_ENV, None);
    assert!(resolved.to_string_lossy().contains("contact"));
}

#[test]
fn test_missing_file_yields_defaults() {
    let dir = TempDir::new().unwrap();
    let config: TomlConfig = load_toml_or_default(&dir.path().join("absent.toml")).unwrap();

    assert!(config.root_folder.is_none());
    assert_eq!(config.logging.level, "info");
}

#[test]
fn test_partial_file_fills_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("research.toml");
    std::fs::write(&path, "[logging]\nlevel = \"debug\"\n").unwrap();

    let config: TomlConfig = load_toml_or_default(&path).unwrap();

    assert_eq!(config.logging.level, "debug");
    assert!(config.logging.ansi);
    assert!(config.root_folder.is_none());
}

#[test]
fn test_malformed_file_is_config_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.toml");
    std::fs::write(&path, "[logging\nlevel = ").unwrap();

    let result: scout_common::Result<TomlConfig> = load_toml_or_default(&path);
    assert!(matches!(result, Err(scout_common::Error::Config(_))));
}

#[test]
fn test_write_then_load() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("research.toml");
    let config = TomlConfig {
        root_folder: Some("/srv/scout".to_string()),
        ..Default::default()
    };

    write_toml_config(&config, &path).unwrap();
    let loaded: TomlConfig = load_toml_or_default(&path).unwrap();

    assert_eq!(loaded.root_folder.as_deref(), Some("/srv/scout"));
    assert!(!path.with_extension("toml.tmp").exists());
}

#[test]
fn test_ensure_root_folder_creates_directory() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("a").join("b");

    ensure_root_folder(&root).unwrap();
    assert!(root.is_dir());

    // Idempotent
    ensure_root_folder(&root).unwrap();
}
