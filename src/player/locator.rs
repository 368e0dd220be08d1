//! Where the downloaded copy of the remote asset lives.

use std::path::{Path, PathBuf};

use reqwest::Url;

use crate::config::ConfigError;

/// The fixed network video, with the file name its local copy is stored under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteAsset {
    url: Url,
    file_name: String,
}

impl RemoteAsset {
    pub fn parse(url: &str) -> Result<Self, ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidAsset {
            url: url.to_string(),
            reason: reason.to_string(),
        };

        let parsed = Url::parse(url).map_err(|e| invalid(&e.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(invalid("only http and https are supported"));
        }
        let segment = parsed
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .filter(|name| !name.is_empty())
            .ok_or_else(|| invalid("url has no file name"))?;
        let file_name = urlencoding::decode(segment)
            .map_err(|_| invalid("file name is not valid UTF-8"))?
            .into_owned();
        if file_name.contains(['/', '\\']) || matches!(file_name.as_str(), "." | "..") {
            return Err(invalid("file name escapes the storage directory"));
        }

        Ok(Self {
            url: parsed,
            file_name,
        })
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    /// Last path segment of the url, percent-decoded.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }
}

/// Resolves and checks the on-disk copy of a [`RemoteAsset`].
#[derive(Debug, Clone)]
pub struct AssetLocator {
    remote: RemoteAsset,
    storage_dir: PathBuf,
}

impl AssetLocator {
    pub fn new(remote: RemoteAsset, storage_dir: impl Into<PathBuf>) -> Self {
        Self {
            remote,
            storage_dir: storage_dir.into(),
        }
    }

    pub fn remote(&self) -> &RemoteAsset {
        &self.remote
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    /// No I/O.
    pub fn resolve_local_path(&self) -> PathBuf {
        self.storage_dir.join(self.remote.file_name())
    }

    /// Checked on every call; unreadable paths count as absent.
    pub fn exists(&self) -> bool {
        std::fs::metadata(self.resolve_local_path())
            .map(|meta| meta.is_file())
            .unwrap_or(false)
    }
}
