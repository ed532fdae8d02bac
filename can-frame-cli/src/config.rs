//! Configuration loading and parsing

use crate::display::DisplayConfig;
use anyhow::{Context, Result};
use can_frame_store::{MessageDefinition, SignalCatalog, StoreConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main application configuration (loaded from config.toml)
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub input: InputConfig,
    /// Store settings; when absent the store is sized to the capture
    pub store: Option<StoreConfig>,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub view: ViewConfig,
    /// Message layouts used to decode signals
    #[serde(default)]
    pub messages: Vec<MessageDefinition>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct InputConfig {
    /// candump log file to replay
    pub capture: Option<PathBuf>,
    /// Filter definition applied before replay
    pub filters: Option<PathBuf>,
    /// Start the time column at zero
    #[serde(default)]
    pub normalize_timing: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ViewConfig {
    /// Column name to sort by (see `Column`'s names)
    pub sort: Option<String>,
    /// Print the filtered view instead of the full store
    #[serde(default = "default_filtered")]
    pub filtered: bool,
    /// Maximum number of rows to print
    pub limit: Option<usize>,
    /// Protocol classes to hide (nmt, sync, emcy, time, heartbeat)
    #[serde(default)]
    pub hide_classes: Vec<String>,
}

fn default_filtered() -> bool {
    true
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            sort: None,
            filtered: default_filtered(),
            limit: None,
            hide_classes: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Dedup setting of the `[store]` section, off when the section is absent
    pub fn store_dedup(&self) -> bool {
        self.store.as_ref().map(|s| s.dedup).unwrap_or(false)
    }

    /// Build the signal catalog from the configured messages
    pub fn catalog(&self) -> SignalCatalog {
        let mut catalog = SignalCatalog::new();
        for message in &self.messages {
            catalog.add_message(message.clone());
        }
        catalog
    }
}

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    log::debug!(
        "Config has {} message definitions, sort: {:?}",
        config.messages.len(),
        config.view.sort
    );

    Ok(config)
}
