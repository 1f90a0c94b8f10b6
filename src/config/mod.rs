use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Dialog framework configuration
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Stacking order of the first dialog; each later dialog gets its number added
    pub z_index_base: i32,

    /// Caption of the confirm button
    pub ok_label: String,

    /// Caption of the dismiss button when the dialog can be confirmed
    pub cancel_label: String,

    /// Caption of the dismiss button when the dialog has nothing to confirm
    pub close_label: String,

    /// Default tracing filter for the binary
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            z_index_base: 20,
            ok_label: "ok".to_string(),
            cancel_label: "cancel".to_string(),
            close_label: "close".to_string(),
            log_filter: "moderator_dialogs=info".to_string(),
        }
    }
}

impl Config {
    /// Initialize configuration from various sources
    pub async fn init() -> Result<Self> {
        debug!("Initializing configuration");

        let file_config = match Self::load_from_file().await {
            Ok(found) => found,
            Err(e) => {
                warn!("Ignoring configuration file: {:#}", e);
                None
            }
        };

        Self::from_sources(file_config)
    }

    /// Defaults, overlaid by `file_config`, overlaid by the environment.
    pub fn from_sources(file_config: Option<Self>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(file_config) = file_config {
            config.merge_with(file_config);
        }

        // Environment wins over files
        config.load_from_env();

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from environment variables
    pub fn load_from_env(&mut self) {
        if let Ok(base) = std::env::var("MODDLG_Z_INDEX_BASE") {
            if let Ok(base) = base.parse() {
                self.z_index_base = base;
            }
        }

        if let Ok(label) = std::env::var("MODDLG_OK_LABEL") {
            self.ok_label = label;
        }

        if let Ok(label) = std::env::var("MODDLG_CANCEL_LABEL") {
            self.cancel_label = label;
        }

        if let Ok(label) = std::env::var("MODDLG_CLOSE_LABEL") {
            self.close_label = label;
        }

        if let Ok(filter) = std::env::var("MODDLG_LOG") {
            self.log_filter = filter;
        }
    }

    /// Candidate configuration files, highest priority first
    pub fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![
            PathBuf::from("./.moderator-dialogs.json"),
            PathBuf::from("./moderator-dialogs.json"),
        ];

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("moderator-dialogs").join("config.json"));
        }

        paths
    }

    /// Load the first configuration file that exists
    pub async fn load_from_file() -> Result<Option<Self>> {
        for path in Self::config_paths() {
            if path.exists() {
                return Self::load_from_path(&path).await.map(Some);
            }
        }

        debug!("No configuration file found");
        Ok(None)
    }

    pub async fn load_from_path(path: &Path) -> Result<Self> {
        debug!("Loading configuration from: {}", path.display());
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(config)
    }

    /// Merge another configuration into this one, keeping our values where
    /// the other one only carries defaults
    pub fn merge_with(&mut self, other: Self) {
        let defaults = Self::default();

        if other.z_index_base != defaults.z_index_base {
            self.z_index_base = other.z_index_base;
        }
        if other.ok_label != defaults.ok_label {
            self.ok_label = other.ok_label;
        }
        if other.cancel_label != defaults.cancel_label {
            self.cancel_label = other.cancel_label;
        }
        if other.close_label != defaults.close_label {
            self.close_label = other.close_label;
        }
        if other.log_filter != defaults.log_filter {
            self.log_filter = other.log_filter;
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.z_index_base < 0 {
            return Err(anyhow::anyhow!("z_index_base must not be negative"));
        }

        for (name, label) in [
            ("ok_label", &self.ok_label),
            ("cancel_label", &self.cancel_label),
            ("close_label", &self.close_label),
        ] {
            if label.trim().is_empty() {
                return Err(anyhow::anyhow!("{} must not be empty", name));
            }
        }

        Ok(())
    }
}
