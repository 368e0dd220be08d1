use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::player::source::MediaSource;

/// Which source the active player is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackMode {
    Local,
    Stream,
}

/// Coarse state of the download-and-play coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    #[default]
    Idle,
    StreamActive,
    LocalActive,
    Downloading,
}

impl Phase {
    /// Phase for a settled (non-downloading) playback mode.
    pub fn settled(mode: Option<PlaybackMode>) -> Self {
        match mode {
            None => Phase::Idle,
            Some(PlaybackMode::Stream) => Phase::StreamActive,
            Some(PlaybackMode::Local) => Phase::LocalActive,
        }
    }
}

/// Text shown on the download trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
pub enum TriggerLabel {
    #[default]
    #[serde(rename = "Download")]
    Download,
    #[serde(rename = "Play local")]
    PlayLocal,
}

/// Download progress as shown by the progress indicator.
///
/// Servers that omit `Content-Length` (or send zero) yield `Unknown` instead
/// of a ratio.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Progress {
    Unknown { written: u64 },
    Known { written: u64, total: u64, fraction: f32 },
}

impl Progress {
    pub fn from_counts(written: u64, total: Option<u64>) -> Self {
        match total {
            Some(total) if total > 0 => Progress::Known {
                written,
                total,
                fraction: (written as f64 / total as f64).clamp(0.0, 1.0) as f32,
            },
            _ => Progress::Unknown { written },
        }
    }

    pub fn written(&self) -> u64 {
        match self {
            Progress::Unknown { written } | Progress::Known { written, .. } => *written,
        }
    }

    pub fn fraction(&self) -> Option<f32> {
        match self {
            Progress::Unknown { .. } => None,
            Progress::Known { fraction, .. } => Some(*fraction),
        }
    }
}

/// Rectangle of the render surface, in frontend CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Bounds {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Everything the frontend renders: trigger, progress indicator, and the
/// source to draw at the surface bounds.
#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ControlsState {
    pub phase: Phase,
    pub mode: Option<PlaybackMode>,
    pub is_playing: bool,
    pub download_label: TriggerLabel,
    pub download_enabled: bool,
    pub progress_visible: bool,
    pub progress: Option<Progress>,
    pub source: Option<MediaSource>,
    pub surface: Bounds,
    pub duration_secs: Option<f64>,
    pub error: Option<String>,
}

impl ControlsState {
    pub fn new(asset_saved: bool) -> Self {
        Self {
            download_label: if asset_saved {
                TriggerLabel::PlayLocal
            } else {
                TriggerLabel::Download
            },
            download_enabled: true,
            ..Default::default()
        }
    }
}

pub type SharedState = Arc<RwLock<ControlsState>>;

pub fn create_shared_state() -> SharedState {
    Arc::new(RwLock::new(ControlsState::new(false)))
}
