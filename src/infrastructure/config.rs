//! Configuration loading and persistence
//!
//! Options live in a single JSON file. Missing file or missing fields fall
//! back to defaults, so a fresh install works without any setup.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::info;

use crate::application::OptionsProvider;
use crate::domain::PagerOptions;

/// On-disk configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// Engine options snapshot handed to new sessions
    pub options: PagerOptions,

    /// Logging configuration
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive when RUST_LOG is not set, e.g. "pagerize=info"
    pub default_filter: String,

    /// Also write logs to a file under `log_dir`
    pub file_logging: bool,

    /// Directory for log files
    pub log_dir: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default_filter: "pagerize=info".to_string(),
            file_logging: false,
            log_dir: PathBuf::from("logs"),
        }
    }
}

/// Loads and saves [`AppConfig`], caching the latest snapshot.
#[derive(Debug, Clone)]
pub struct ConfigManager {
    path: PathBuf,
    current: AppConfig,
}

impl ConfigManager {
    /// Load configuration from `path`. A missing file yields defaults; a
    /// present but unreadable file is an error.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let current = if path.exists() {
            let raw = fs::read_to_string(&path)
                .await
                .with_context(|| format!("failed to read config file {}", path.display()))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("failed to parse config file {}", path.display()))?
        } else {
            info!(path = %path.display(), "no config file, using defaults");
            AppConfig::default()
        };

        Ok(Self { path, current })
    }

    /// Current in-memory snapshot.
    pub fn config(&self) -> &AppConfig {
        &self.current
    }

    /// Replace the snapshot and write it back to disk.
    pub async fn save(&mut self, config: AppConfig) -> Result<()> {
        let raw = serde_json::to_string_pretty(&config).context("failed to serialize config")?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await.with_context(|| {
                    format!("failed to create config directory {}", parent.display())
                })?;
            }
        }
        fs::write(&self.path, raw)
            .await
            .with_context(|| format!("failed to write config file {}", self.path.display()))?;
        self.current = config;
        Ok(())
    }
}

/// [`OptionsProvider`] backed by a loaded config snapshot.
#[derive(Debug, Clone)]
pub struct FileOptionsProvider {
    options: PagerOptions,
}

impl FileOptionsProvider {
    pub fn new(manager: &ConfigManager) -> Self {
        Self {
            options: manager.config().options.clone(),
        }
    }
}

impl OptionsProvider for FileOptionsProvider {
    fn options(&self) -> PagerOptions {
        self.options.clone()
    }
}
