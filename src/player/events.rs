use serde::Serialize;
use tauri::Emitter;

use crate::player::state::{ControlsState, Progress, SharedState};

/// How a transfer ended, as reported to the frontend.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum TransferOutcome {
    Stored { bytes: u64 },
    Failed { error: String },
    Cancelled,
}

/// Receives every user-visible output of the coordinator.
pub trait Presenter {
    fn state_changed(&self, state: &ControlsState);
    fn progress(&self, progress: &Progress);
    fn transfer_finished(&self, outcome: &TransferOutcome);
}

#[derive(Clone, Serialize)]
pub struct ProgressEvent {
    pub progress: Progress,
}

#[derive(Clone, Serialize)]
pub struct TransferFinishedEvent {
    pub ok: bool,
    pub outcome: TransferOutcome,
}

pub fn emit_state_update(app: &tauri::AppHandle, state: &ControlsState) {
    let _ = app.emit("player:state", state);
}

pub fn emit_progress(app: &tauri::AppHandle, progress: &Progress) {
    let _ = app.emit(
        "player:progress",
        ProgressEvent {
            progress: *progress,
        },
    );
}

pub fn emit_transfer_finished(app: &tauri::AppHandle, outcome: &TransferOutcome) {
    let _ = app.emit(
        "player:transfer-finished",
        TransferFinishedEvent {
            ok: matches!(outcome, TransferOutcome::Stored { .. }),
            outcome: outcome.clone(),
        },
    );
}

/// Publishes to the webview and keeps the snapshot behind `player_get_state` current.
pub struct AppPresenter {
    app: tauri::AppHandle,
    state: SharedState,
}

impl AppPresenter {
    pub fn new(app: tauri::AppHandle, state: SharedState) -> Self {
        Self { app, state }
    }
}

impl Presenter for AppPresenter {
    fn state_changed(&self, state: &ControlsState) {
        *self.state.write() = state.clone();
        emit_state_update(&self.app, state);
    }

    fn progress(&self, progress: &Progress) {
        self.state.write().progress = Some(*progress);
        emit_progress(&self.app, progress);
    }

    fn transfer_finished(&self, outcome: &TransferOutcome) {
        emit_transfer_finished(&self.app, outcome);
    }
}
