use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::player::locator::RemoteAsset;
use crate::transfer::TransferSettings;

/// Directory under the platform config dir holding `config.json`.
pub const APP_DIR: &str = "videoplayer";
pub const CONFIG_FILE: &str = "config.json";

pub const DEFAULT_REMOTE_ASSET: &str = "http://alohabrowser.com/tmp/test_video.mp4";
const DEFAULT_USER_AGENT: &str = concat!("VideoPlayer/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid remote asset {url:?}: {reason}")]
    InvalidAsset { url: String, reason: String },
    #[error("no document directory available on this platform")]
    NoStorageDir,
}

/// Application configuration.
///
/// Every field is optional in the file; missing ones take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AppConfig {
    /// The video to stream or download.
    pub remote_asset: String,
    /// Where the downloaded copy lives. Defaults to the user's document directory.
    pub storage_dir: Option<PathBuf>,
    /// Overall request timeout. Transfers never time out when unset.
    pub transfer_timeout_secs: Option<u64>,
    pub user_agent: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            remote_asset: DEFAULT_REMOTE_ASSET.to_string(),
            storage_dir: None,
            transfer_timeout_secs: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl AppConfig {
    /// `<config_dir>/videoplayer/config.json`, if the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
    }

    /// Load from the default location, or defaults when there is none.
    pub fn load() -> Result<Self, ConfigError> {
        match Self::default_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load from `path`. A missing file is not an error.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::debug!("No config at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let config = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn remote_asset(&self) -> Result<RemoteAsset, ConfigError> {
        RemoteAsset::parse(&self.remote_asset)
    }

    pub fn storage_dir(&self) -> Result<PathBuf, ConfigError> {
        self.storage_dir
            .clone()
            .or_else(dirs::document_dir)
            .ok_or(ConfigError::NoStorageDir)
    }

    pub fn transfer_settings(&self) -> TransferSettings {
        TransferSettings {
            timeout: self.transfer_timeout_secs.map(Duration::from_secs),
            user_agent: self.user_agent.clone(),
        }
    }
}
