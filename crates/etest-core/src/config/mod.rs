//! Configuration loading and validation for calibration runs.
//!
//! Resolution order (highest to lowest priority):
//! 1. Explicit path (`--config` flag or `ETEST_CONFIG` env, resolved by the CLI)
//! 2. XDG config home (`~/.config/etest/calibrate.toml`)
//! 3. Built-in defaults
//!
//! Individual CLI flags are applied on top of the resolved file afterwards.

pub mod calibration;

pub use calibration::{CalibrationConfig, ValidationError, MAX_CANDIDATE_RATES};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV_VAR: &str = "ETEST_CONFIG";

/// Default XDG config directory name.
const CONFIG_DIR_NAME: &str = "etest";

/// Config file looked up inside the config directory.
const CONFIG_FILE_NAME: &str = "calibrate.toml";

/// Errors that can occur during config loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("Invalid TOML in config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("I/O error reading {path}: {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Semantic validation failed: {0}")]
    ValidationError(#[from] ValidationError),
}

/// Where the resolved configuration came from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigSource {
    /// Path of the file (None if using defaults).
    pub path: Option<PathBuf>,
    /// SHA-256 of the file content (None if using defaults).
    pub sha256: Option<String>,
}

impl ConfigSource {
    pub fn is_default(&self) -> bool {
        self.path.is_none()
    }
}

/// Resolved configuration with provenance information.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub calibration: CalibrationConfig,
    pub source: ConfigSource,
}

/// Configuration resolution options.
#[derive(Debug, Default)]
pub struct ConfigOptions {
    /// Explicit config file; must exist.
    pub config_path: Option<PathBuf>,
    /// Override for the config directory searched when no explicit file is set.
    pub config_dir: Option<PathBuf>,
}

/// Load configuration with the standard resolution order.
pub fn load_config(options: &ConfigOptions) -> Result<ResolvedConfig, ConfigError> {
    if let Some(path) = &options.config_path {
        if !path.exists() {
            return Err(ConfigError::NotFound { path: path.clone() });
        }
        return load_file(path);
    }

    if let Some(dir) = resolve_config_dir(options) {
        let candidate = dir.join(CONFIG_FILE_NAME);
        if candidate.exists() {
            return load_file(&candidate);
        }
    }

    tracing::debug!("no calibration config file found; using defaults");
    Ok(ResolvedConfig {
        calibration: CalibrationConfig::default(),
        source: ConfigSource::default(),
    })
}

/// Parse and validate config content.
pub fn parse_config(content: &str, path: &Path) -> Result<CalibrationConfig, ConfigError> {
    let config: CalibrationConfig =
        toml::from_str(content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;
    config.validate()?;
    Ok(config)
}

fn load_file(path: &Path) -> Result<ResolvedConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::IoError {
        path: path.to_path_buf(),
        source: e,
    })?;
    let calibration = parse_config(&content, path)?;
    tracing::debug!(path = %path.display(), "calibration config loaded");
    Ok(ResolvedConfig {
        calibration,
        source: ConfigSource {
            path: Some(path.to_path_buf()),
            sha256: Some(content_hash(&content)),
        },
    })
}

fn resolve_config_dir(options: &ConfigOptions) -> Option<PathBuf> {
    options
        .config_dir
        .clone()
        .or_else(|| dirs::config_dir().map(|d| d.join(CONFIG_DIR_NAME)))
}

fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn defaults_when_directory_is_empty() {
        let dir = TempDir::new().unwrap();
        let options = ConfigOptions {
            config_path: None,
            config_dir: Some(dir.path().to_path_buf()),
        };
        let resolved = load_config(&options).unwrap();
        assert_eq!(resolved.calibration, CalibrationConfig::default());
        assert!(resolved.source.is_default());
    }

    #[test]
    fn loads_file_from_config_dir() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("calibrate.toml"), "trials = 42\nalpha = 0.05\n").unwrap();
        let options = ConfigOptions {
            config_path: None,
            config_dir: Some(dir.path().to_path_buf()),
        };
        let resolved = load_config(&options).unwrap();
        assert_eq!(resolved.calibration.trials, 42);
        assert_eq!(resolved.calibration.alpha, 0.05);
        assert_eq!(
            resolved.source.path.as_deref(),
            Some(dir.path().join("calibrate.toml").as_path())
        );
        assert_eq!(resolved.source.sha256.as_ref().map(String::len), Some(64));
    }

    #[test]
    fn explicit_path_takes_priority() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("calibrate.toml"), "trials = 42\n").unwrap();
        let explicit = dir.path().join("other.toml");
        fs::write(&explicit, "trials = 7\n").unwrap();
        let options = ConfigOptions {
            config_path: Some(explicit),
            config_dir: Some(dir.path().to_path_buf()),
        };
        assert_eq!(load_config(&options).unwrap().calibration.trials, 7);
    }

    #[test]
    fn missing_explicit_path_is_an_error() {
        let dir = TempDir::new().unwrap();
        let options = ConfigOptions {
            config_path: Some(dir.path().join("nope.toml")),
            config_dir: None,
        };
        assert!(matches!(
            load_config(&options),
            Err(ConfigError::NotFound { .. })
        ));
    }

    #[test]
    fn invalid_toml_reports_path() {
        let err = parse_config("trials = [", Path::new("bad.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
        assert!(err.to_string().contains("bad.toml"));
    }

    #[test]
    fn semantic_errors_surface() {
        let err = parse_config("alpha = 2.0\n", Path::new("a.toml")).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::ValidationError(ValidationError::InvalidAlpha(_))
        ));
    }

    #[test]
    fn hash_is_stable() {
        assert_eq!(content_hash("trials = 1\n"), content_hash("trials = 1\n"));
        assert_ne!(content_hash("trials = 1\n"), content_hash("trials = 2\n"));
    }
}
