//! Configuration module for ffgraph-rs
//!
//! Compiler settings are read from a TOML file:
//!
//! ```toml
//! binary = "/usr/local/bin/ffmpeg"
//! auto_fix = true
//! overwrite_output = true
//!
//! [filters.myfilter]
//! input_arity = 1
//! dynamic_outputs = true
//! ```
//!
//! # Config Location
//!
//! `$FFGRAPH_CONFIG` when set, otherwise `config.toml` in the platform
//! configuration directory:
//! - **Linux**: `~/.config/ffgraph-rs/`
//! - **macOS**: `~/Library/Application Support/ffgraph-rs/`
//! - **Windows**: `%APPDATA%\ffgraph-rs\`

use crate::catalog::FilterMetadata;
use crate::error::{FfgraphError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Application identifier for config directories
pub const APP_ID: &str = "ffgraph-rs";

/// Config filename
pub const CONFIG_FILE: &str = "config.toml";

/// Environment variable overriding the config path
pub const CONFIG_ENV: &str = "FFGRAPH_CONFIG";

/// Default external tool
pub const DEFAULT_BINARY: &str = "ffmpeg";

// ==================== Config Paths ====================

/// Get the configuration directory path
pub fn config_dir() -> Option<PathBuf> {
    dirs_next::config_dir().map(|p| p.join(APP_ID))
}

/// Get the path to the config file, honouring `FFGRAPH_CONFIG`
pub fn config_path() -> Option<PathBuf> {
    match std::env::var_os(CONFIG_ENV) {
        Some(path) if !path.is_empty() => Some(PathBuf::from(path)),
        _ => config_dir().map(|p| p.join(CONFIG_FILE)),
    }
}

// ==================== Compiler Config ====================

fn default_binary() -> String {
    DEFAULT_BINARY.to_string()
}

fn default_true() -> bool {
    true
}

/// Settings for [`Compiler`](crate::compiler::Compiler).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompilerConfig {
    /// Executable handed to the runner
    #[serde(default = "default_binary")]
    pub binary: String,

    /// Run split repair before generating code
    #[serde(default = "default_true")]
    pub auto_fix: bool,

    /// `Some(true)` prepends `-y`, `Some(false)` prepends `-n`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overwrite_output: Option<bool>,

    /// Extra filter metadata on top of the builtin catalog
    #[serde(default)]
    pub filters: BTreeMap<String, FilterMetadata>,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            binary: default_binary(),
            auto_fix: true,
            overwrite_output: None,
            filters: BTreeMap::new(),
        }
    }
}

impl CompilerConfig {
    /// Load config from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            FfgraphError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }

    /// Parse config from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| FfgraphError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Load from the default location, or fall back to defaults
    pub fn load_or_default() -> Self {
        let Some(path) = config_path() else {
            tracing::debug!("No config directory available, using defaults");
            return Self::default();
        };
        if !path.exists() {
            tracing::debug!("No config at {:?}, using defaults", path);
            return Self::default();
        }
        Self::load(&path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Save config to disk as TOML
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                FfgraphError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| FfgraphError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| FfgraphError::Config(format!("Failed to write config: {}", e)))?;

        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_from_empty_file() {
        let config = CompilerConfig::from_toml("").unwrap();
        assert_eq!(config, CompilerConfig::default());
        assert_eq!(config.binary, "ffmpeg");
        assert!(config.auto_fix);
        assert_eq!(config.overwrite_output, None);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let config = CompilerConfig::from_toml(
            "overwrite_output = true\n\n[filters.mysplit]\ndynamic_outputs = true\n",
        )
        .unwrap();

        assert_eq!(config.overwrite_output, Some(true));
        assert!(config.auto_fix);
        assert!(config.filters["mysplit"].dynamic_outputs);
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = CompilerConfig::from_toml("auto_fix = \"maybe\"").unwrap_err();
        assert!(matches!(err, FfgraphError::Config(_)));
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE);

        let mut config = CompilerConfig::default();
        config.binary = "/opt/ffmpeg/bin/ffmpeg".to_string();
        config.overwrite_output = Some(false);
        config
            .filters
            .insert("myfilter".to_string(), FilterMetadata::fixed(2, 1));

        config.save(&path).unwrap();
        assert_eq!(CompilerConfig::load(&path).unwrap(), config);
    }

    #[test]
    #[serial]
    fn test_env_override() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(&path, "binary = \"ffmpeg7\"\n").unwrap();

        std::env::set_var(CONFIG_ENV, &path);
        assert_eq!(config_path(), Some(path.clone()));
        assert_eq!(CompilerConfig::load_or_default().binary, "ffmpeg7");
        std::env::remove_var(CONFIG_ENV);
    }

    #[test]
    #[serial]
    fn test_broken_file_falls_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "binary = [").unwrap();

        std::env::set_var(CONFIG_ENV, &path);
        assert_eq!(CompilerConfig::load_or_default(), CompilerConfig::default());
        std::env::remove_var(CONFIG_ENV);
    }
}
