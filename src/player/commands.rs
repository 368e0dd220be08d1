use tauri::State;

use crate::player::engine::CoordinatorHandle;
use crate::player::state::{Bounds, ControlsState};

#[tauri::command]
pub fn player_play(engine: State<'_, CoordinatorHandle>) -> Result<(), String> {
    engine.play()
}

#[tauri::command]
pub fn player_download(engine: State<'_, CoordinatorHandle>) -> Result<(), String> {
    engine.download()
}

#[tauri::command]
pub fn player_cancel_download(engine: State<'_, CoordinatorHandle>) -> Result<(), String> {
    engine.cancel_download()
}

#[tauri::command]
pub fn player_layout_changed(bounds: Bounds, engine: State<'_, CoordinatorHandle>) {
    engine.layout_changed(bounds);
}

#[tauri::command]
pub fn player_view_hidden(engine: State<'_, CoordinatorHandle>) {
    engine.view_hidden();
}

#[tauri::command]
pub fn player_get_state(engine: State<'_, CoordinatorHandle>) -> ControlsState {
    engine.get_state()
}
