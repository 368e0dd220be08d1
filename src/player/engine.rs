//! Coordinator thread and its Tauri-managed handle.
//!
//! Architecture:
//! - `CoordinatorHandle`: Tauri-managed handle (Send + Sync) that sends commands to the coordinator thread
//! - The coordinator thread owns the mode selector, the Rodio output and the transfer launcher
//! - Transfer workers report back over their own crossbeam channel; the thread
//!   selects over both, so every state change happens on this one thread
//! - SharedState (Arc<RwLock<ControlsState>>) for reading state from any thread

use std::thread;
use std::time::Duration;

use crossbeam_channel::{bounded, select, unbounded, Receiver, Sender};

use crate::player::events::{emit_state_update, AppPresenter};
use crate::player::locator::AssetLocator;
use crate::player::media::RodioEngine;
use crate::player::selector::ModeSelector;
use crate::player::state::{create_shared_state, Bounds, ControlsState, SharedState};
use crate::transfer::{build_client, HttpTransfer, TransferEvent, TransferSettings};

/// Interval for end-of-media checks
const TICK_INTERVAL: Duration = Duration::from_millis(250);

/// Commands sent to the coordinator thread
#[derive(Debug)]
pub enum CoordinatorCommand {
    Play,
    Download,
    CancelDownload,
    LayoutChanged(Bounds),
    ViewHidden,
}

/// Handle for accessing the coordinator from Tauri commands.
pub struct CoordinatorHandle {
    cmd_tx: Sender<CoordinatorCommand>,
    state: SharedState,
}

impl CoordinatorHandle {
    /// Spawn the coordinator thread.
    pub fn new(
        app_handle: tauri::AppHandle,
        locator: AssetLocator,
        settings: TransferSettings,
    ) -> Result<Self, String> {
        let (cmd_tx, cmd_rx) = bounded::<CoordinatorCommand>(32);
        let state = create_shared_state();

        let state_clone = state.clone();
        thread::Builder::new()
            .name("videoplayer-coordinator".into())
            .spawn(move || {
                run_coordinator(cmd_rx, state_clone, app_handle, locator, settings);
            })
            .map_err(|e| format!("Failed to spawn coordinator thread: {}", e))?;

        log::info!("Playback coordinator initialized");
        Ok(Self { cmd_tx, state })
    }

    fn send(&self, cmd: CoordinatorCommand) -> Result<(), String> {
        self.cmd_tx
            .send(cmd)
            .map_err(|e| format!("Coordinator thread not responding: {}", e))
    }

    pub fn play(&self) -> Result<(), String> {
        self.send(CoordinatorCommand::Play)
    }

    pub fn download(&self) -> Result<(), String> {
        self.send(CoordinatorCommand::Download)
    }

    pub fn cancel_download(&self) -> Result<(), String> {
        self.send(CoordinatorCommand::CancelDownload)
    }

    pub fn layout_changed(&self, bounds: Bounds) {
        let _ = self.cmd_tx.send(CoordinatorCommand::LayoutChanged(bounds));
    }

    pub fn view_hidden(&self) {
        let _ = self.cmd_tx.send(CoordinatorCommand::ViewHidden);
    }

    pub fn get_state(&self) -> ControlsState {
        self.state.read().clone()
    }
}

/// Main loop for the coordinator thread.
fn run_coordinator(
    cmd_rx: Receiver<CoordinatorCommand>,
    state: SharedState,
    app_handle: tauri::AppHandle,
    locator: AssetLocator,
    settings: TransferSettings,
) {
    let (event_tx, event_rx) = unbounded::<TransferEvent>();

    // Clients are built here so their runtimes live off the UI thread.
    let launcher = match HttpTransfer::new(&settings, event_tx) {
        Ok(l) => l,
        Err(e) => {
            log::error!("Failed to create download client: {}", e);
            publish_unavailable(
                &app_handle,
                &state,
                unavailable(&locator, format!("Downloads unavailable: {}", e)),
            );
            return;
        }
    };
    let engine = match build_client(&settings) {
        Ok(client) => RodioEngine::new(client),
        Err(e) => {
            log::error!("Failed to create streaming client: {}", e);
            publish_unavailable(
                &app_handle,
                &state,
                unavailable(&locator, format!("Streaming unavailable: {}", e)),
            );
            return;
        }
    };

    let presenter = AppPresenter::new(app_handle, state);
    let mut selector = ModeSelector::new(locator, engine, launcher, presenter);
    log::info!("Coordinator thread started");

    loop {
        select! {
            recv(cmd_rx) -> cmd => match cmd {
                Ok(cmd) => handle_command(&mut selector, cmd),
                Err(_) => {
                    log::info!("Coordinator thread shutting down");
                    break;
                }
            },
            recv(event_rx) -> event => {
                if let Ok(event) = event {
                    selector.on_transfer_event(event);
                }
            },
            default(TICK_INTERVAL) => selector.tick(),
        }
    }
}

/// Controls for a coordinator that never started: nothing can be pressed.
fn unavailable(locator: &AssetLocator, error: String) -> ControlsState {
    ControlsState {
        download_enabled: false,
        error: Some(error),
        ..ControlsState::new(locator.exists())
    }
}

fn publish_unavailable(app: &tauri::AppHandle, state: &SharedState, controls: ControlsState) {
    *state.write() = controls.clone();
    emit_state_update(app, &controls);
}

fn handle_command(
    selector: &mut ModeSelector<RodioEngine, HttpTransfer, AppPresenter>,
    cmd: CoordinatorCommand,
) {
    match cmd {
        CoordinatorCommand::Play => selector.play(),
        CoordinatorCommand::Download => selector.download(),
        CoordinatorCommand::CancelDownload => selector.cancel_download(),
        CoordinatorCommand::LayoutChanged(bounds) => selector.layout_changed(bounds),
        CoordinatorCommand::ViewHidden => selector.view_hidden(),
    }
}
