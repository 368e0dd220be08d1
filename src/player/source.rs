//! Media source abstraction for the two places a video can be played from.

use std::path::PathBuf;

use serde::Serialize;

use crate::player::state::PlaybackMode;

/// Represents the source a player is bound to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum MediaSource {
    /// HTTP/HTTPS stream of the remote asset
    Stream { url: String },
    /// Previously downloaded copy on disk
    Local { path: PathBuf },
}

impl MediaSource {
    /// Parse a URL string into the appropriate source type.
    ///
    /// HTTP/HTTPS URLs become `Stream`, everything else is treated as a local path.
    pub fn from_url(url: &str) -> Self {
        if url.starts_with("http://") || url.starts_with("https://") {
            MediaSource::Stream {
                url: url.to_string(),
            }
        } else {
            MediaSource::Local { path: url.into() }
        }
    }

    /// The playback mode a player bound to this source runs in.
    pub fn mode(&self) -> PlaybackMode {
        match self {
            MediaSource::Stream { .. } => PlaybackMode::Stream,
            MediaSource::Local { .. } => PlaybackMode::Local,
        }
    }
}
