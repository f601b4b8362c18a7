use crate::core::bluetooth::{
    DEFAULT_BROADCAST_GRACE_SECS, DEFAULT_COMMAND_INTERVAL_MS, DEFAULT_COMMAND_TIMEOUT_SECS,
    DEFAULT_SCAN_TIMEOUT_SECS,
};
use crate::utils::ensure_directory_exists;
use anyhow::{Result, anyhow};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

const CONFIG_DIR_NAME: &str = "hotspot-remote";
const CONFIG_FILE_NAME: &str = "session_config.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Scan stops on its own after this many seconds.
    pub scan_timeout_secs: u64,

    /// Seconds to wait for a service-filtered hit before also scanning unfiltered.
    pub broadcast_grace_secs: u64,

    /// Minimum spacing between two commands.
    pub command_interval_ms: u64,

    /// An unacknowledged command is abandoned after this many seconds.
    pub command_timeout_secs: u64,

    /// Wi-Fi interface used to join the shared network. Platform default when unset.
    pub wifi_interface: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            scan_timeout_secs: DEFAULT_SCAN_TIMEOUT_SECS,
            broadcast_grace_secs: DEFAULT_BROADCAST_GRACE_SECS,
            command_interval_ms: DEFAULT_COMMAND_INTERVAL_MS,
            command_timeout_secs: DEFAULT_COMMAND_TIMEOUT_SECS,
            wifi_interface: None,
        }
    }
}

impl SessionConfig {
    /// `<config dir>/hotspot-remote/session_config.json`
    pub fn default_path() -> Result<PathBuf> {
        let config_dir =
            dirs::config_dir().ok_or_else(|| anyhow!("No configuration directory on this platform"))?;
        Ok(config_dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Loads the config from a configuration file.
    pub async fn load_config(file_path: &Path) -> Result<Self> {
        if !file_path.exists() {
            warn!("Config file not found at {:?}, using default.", file_path);
            return Ok(Self::default());
        }

        let config_json = fs::read_to_string(file_path).await?;
        let config: Self = serde_json::from_str(&config_json)?;

        info!("Config loaded from {:?}", file_path);
        Ok(config)
    }

    /// Saves the current config to a configuration file.
    pub async fn save_config(&self, file_path: &Path) -> Result<()> {
        if let Some(config_dir) = file_path.parent() {
            ensure_directory_exists(config_dir).await?;
        }

        let config_json = match serde_json::to_string_pretty(&self) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize session config to JSON: {}", e);
                return Err(e.into());
            }
        };

        fs::write(file_path, config_json).await?;

        info!("Session config saved to {:?}.", file_path);
        Ok(())
    }
}
