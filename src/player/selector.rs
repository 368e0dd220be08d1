//! Mode selector: routes the `play` and `download` actions.
//!
//! Phases are `Idle`, `StreamActive`, `LocalActive` and `Downloading`. The
//! settled phase follows the playback mode; `Downloading` overlays it while a
//! transfer is in flight and falls back to it when the transfer ends, so the
//! coordinator resumes whatever phase it had before without starting playback.

use crate::player::events::{Presenter, TransferOutcome};
use crate::player::locator::AssetLocator;
use crate::player::media::MediaEngine;
use crate::player::playback::PlaybackCoordinator;
use crate::player::source::MediaSource;
use crate::player::state::{Bounds, ControlsState, Phase, PlaybackMode, Progress, TriggerLabel};
use crate::transfer::{self, CancelFlag, Launch, TransferEvent, TransferRequest, TransferState};

pub struct ModeSelector<E: MediaEngine, L: Launch, P: Presenter> {
    locator: AssetLocator,
    playback: PlaybackCoordinator<E>,
    launcher: L,
    presenter: P,
    /// Always agrees with the source the active player is bound to.
    mode: Option<PlaybackMode>,
    transfer: Option<TransferState>,
    next_transfer_id: u64,
    controls: ControlsState,
}

impl<E: MediaEngine, L: Launch, P: Presenter> ModeSelector<E, L, P> {
    /// Publishes the initial controls: the trigger reads "Play local" when a
    /// copy is already saved.
    pub fn new(locator: AssetLocator, engine: E, launcher: L, presenter: P) -> Self {
        let controls = ControlsState::new(locator.exists());
        let selector = Self {
            locator,
            playback: PlaybackCoordinator::new(engine),
            launcher,
            presenter,
            mode: None,
            transfer: None,
            next_transfer_id: 1,
            controls,
        };
        selector.presenter.state_changed(&selector.controls);
        selector
    }

    pub fn phase(&self) -> Phase {
        if self.transfer.is_some() {
            Phase::Downloading
        } else {
            Phase::settled(self.mode)
        }
    }

    pub fn mode(&self) -> Option<PlaybackMode> {
        self.mode
    }

    pub fn controls(&self) -> &ControlsState {
        &self.controls
    }

    pub fn transfer(&self) -> Option<&TransferState> {
        self.transfer.as_ref()
    }

    /// Stream the remote asset, or toggle it if it is already bound.
    pub fn play(&mut self) {
        let source = MediaSource::from_url(self.locator.remote().url());
        self.activate(source);
    }

    /// Play the saved copy (toggling if bound), or fetch it when absent.
    pub fn download(&mut self) {
        if self.transfer.is_some() {
            log::debug!("Download already in flight, ignoring");
            return;
        }

        if self.locator.exists() {
            let source = MediaSource::Local {
                path: self.locator.resolve_local_path(),
            };
            self.activate(source);
        } else {
            self.start_transfer();
        }
    }

    /// Abandon the transfer in flight. Ignored in any other phase.
    pub fn cancel_download(&mut self) {
        let Some(state) = self.transfer.take() else {
            log::debug!("No download in flight, nothing to cancel");
            return;
        };

        state.cancel.cancel();
        log::info!(
            "Cancelled download #{} after {} bytes",
            state.id,
            state.written
        );
        self.restore_trigger(TriggerLabel::Download, None);
        self.presenter.transfer_finished(&TransferOutcome::Cancelled);
        self.refresh();
    }

    pub fn layout_changed(&mut self, bounds: Bounds) {
        self.playback.layout_changed(bounds);
        self.refresh();
    }

    /// The view went away: pause, keep the player and any transfer.
    pub fn view_hidden(&mut self) {
        self.playback.stop();
        self.refresh();
    }

    /// Single entry point for everything the transfer worker reports.
    pub fn on_transfer_event(&mut self, event: TransferEvent) {
        let Some(state) = self.transfer.as_mut() else {
            log::debug!("Dropping event for finished download #{}", event.id());
            return;
        };
        if state.id != event.id() {
            log::debug!(
                "Dropping event for download #{} (current is #{})",
                event.id(),
                state.id
            );
            return;
        }

        match event {
            TransferEvent::Progress { written, total, .. } => {
                state.written = written;
                state.total = total;
                let progress = Progress::from_counts(written, total);
                self.controls.progress = Some(progress);
                self.presenter.progress(&progress);
            }
            TransferEvent::Finished {
                payload, written, ..
            } => {
                let outcome = match transfer::store(payload, &state.destination) {
                    Ok(()) => {
                        log::info!(
                            "Saved {} bytes to {}",
                            written,
                            state.destination.display()
                        );
                        TransferOutcome::Stored { bytes: written }
                    }
                    Err(e) => {
                        log::error!("Save error: {}", e);
                        TransferOutcome::Failed {
                            error: e.to_string(),
                        }
                    }
                };
                self.finish_transfer(outcome);
            }
            TransferEvent::Failed { cause, .. } => {
                log::error!("Download #{} failed: {}", state.id, cause);
                self.finish_transfer(TransferOutcome::Failed {
                    error: cause.to_string(),
                });
            }
        }
    }

    /// Periodic check for playback stopping on its own (end of media) or a
    /// stream that failed to load after it was bound.
    pub fn tick(&mut self) {
        if let Some(error) = self.playback.take_failure() {
            log::error!("{:?} playback failed: {}", self.mode, error);
            self.mode = None;
            self.controls.error = Some(error);
            self.refresh();
            return;
        }
        if self.playback.is_playing() != self.controls.is_playing {
            self.refresh();
        }
    }

    fn activate(&mut self, source: MediaSource) {
        let mode = source.mode();
        if self.mode == Some(mode) {
            self.playback.toggle();
            self.refresh();
            return;
        }

        match self.playback.bind(source) {
            Ok(()) => {
                self.mode = Some(mode);
                self.playback.play();
                self.controls.error = None;
            }
            Err(e) => {
                log::error!("Failed to start {:?} playback: {}", mode, e);
                self.mode = None;
                self.controls.error = Some(e.to_string());
            }
        }
        self.refresh();
    }

    fn start_transfer(&mut self) {
        let id = self.next_transfer_id;
        self.next_transfer_id += 1;

        let request = TransferRequest {
            id,
            url: self.locator.remote().url().to_string(),
            staging_dir: self.locator.storage_dir().to_path_buf(),
            cancel: CancelFlag::default(),
        };
        let state = TransferState::new(&request, self.locator.resolve_local_path());

        match self.launcher.launch(request) {
            Ok(()) => {
                self.transfer = Some(state);
                self.controls.progress_visible = true;
                self.controls.progress = Some(Progress::from_counts(0, None));
                self.controls.download_enabled = false;
                self.controls.error = None;
            }
            Err(e) => {
                log::error!("Could not start download: {}", e);
                self.controls.error = Some(e.to_string());
            }
        }
        self.refresh();
    }

    /// Terminal step, once per transfer whatever the outcome.
    fn finish_transfer(&mut self, outcome: TransferOutcome) {
        self.transfer = None;
        let error = match &outcome {
            TransferOutcome::Failed { error } => Some(error.clone()),
            _ => None,
        };
        self.restore_trigger(TriggerLabel::PlayLocal, error);
        self.presenter.transfer_finished(&outcome);
        self.refresh();
    }

    fn restore_trigger(&mut self, label: TriggerLabel, error: Option<String>) {
        self.controls.progress_visible = false;
        self.controls.progress = None;
        self.controls.download_label = label;
        self.controls.download_enabled = true;
        self.controls.error = error;
    }

    fn refresh(&mut self) {
        self.controls.phase = self.phase();
        self.controls.mode = self.mode;
        self.controls.is_playing = self.playback.is_playing();
        self.controls.source = self.playback.bound_source().cloned();
        self.controls.surface = self.playback.surface();
        self.controls.duration_secs = self.playback.duration_secs();
        self.presenter.state_changed(&self.controls);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::locator::RemoteAsset;
    use crate::player::testing::{EngineProbe, FakeEngine};
    use crate::transfer::TransferError;
    use std::cell::RefCell;
    use std::io::Write;
    use std::path::Path;
    use std::rc::Rc;
    use tempfile::{NamedTempFile, TempDir};

    const ASSET_URL: &str = "http://example.com/tmp/test_video.mp4";

    #[derive(Clone, Default)]
    struct FakeLauncher {
        requests: Rc<RefCell<Vec<TransferRequest>>>,
        refuse: Rc<RefCell<bool>>,
    }

    impl FakeLauncher {
        fn launched(&self) -> Vec<TransferRequest> {
            self.requests.borrow().clone()
        }
    }

    impl Launch for FakeLauncher {
        fn launch(&self, request: TransferRequest) -> Result<(), TransferError> {
            if *self.refuse.borrow() {
                return Err(TransferError::Spawn(std::io::Error::other("no threads")));
            }
            self.requests.borrow_mut().push(request);
            Ok(())
        }
    }

    #[derive(Clone, Default)]
    struct Recorder {
        states: Rc<RefCell<Vec<ControlsState>>>,
        progress: Rc<RefCell<Vec<Progress>>>,
        outcomes: Rc<RefCell<Vec<TransferOutcome>>>,
    }

    impl Recorder {
        fn last(&self) -> ControlsState {
            self.states.borrow().last().cloned().unwrap()
        }
    }

    impl Presenter for Recorder {
        fn state_changed(&self, state: &ControlsState) {
            self.states.borrow_mut().push(state.clone());
        }

        fn progress(&self, progress: &Progress) {
            self.progress.borrow_mut().push(*progress);
        }

        fn transfer_finished(&self, outcome: &TransferOutcome) {
            self.outcomes.borrow_mut().push(outcome.clone());
        }
    }

    struct Harness {
        dir: TempDir,
        selector: ModeSelector<FakeEngine, FakeLauncher, Recorder>,
        engine: EngineProbe,
        launcher: FakeLauncher,
        ui: Recorder,
    }

    impl Harness {
        fn new() -> Self {
            Self::with_saved(false)
        }

        fn with_saved(saved: bool) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let locator = AssetLocator::new(RemoteAsset::parse(ASSET_URL).unwrap(), dir.path());
            if saved {
                std::fs::write(locator.resolve_local_path(), b"saved video").unwrap();
            }
            let (engine, probe) = FakeEngine::new();
            let launcher = FakeLauncher::default();
            let ui = Recorder::default();
            let selector = ModeSelector::new(locator, engine, launcher.clone(), ui.clone());
            Self {
                dir,
                selector,
                engine: probe,
                launcher,
                ui,
            }
        }

        fn local_path(&self) -> std::path::PathBuf {
            self.dir.path().join("test_video.mp4")
        }

        fn payload(&self, bytes: &[u8]) -> NamedTempFile {
            staged(self.dir.path(), bytes)
        }
    }

    fn staged(dir: &Path, bytes: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new_in(dir).unwrap();
        file.write_all(bytes).unwrap();
        file
    }

    #[test]
    fn fresh_install_download_saves_asset_and_relabels_trigger() {
        let mut h = Harness::new();
        assert_eq!(h.ui.last().download_label, TriggerLabel::Download);

        h.selector.download();
        assert_eq!(h.selector.phase(), Phase::Downloading);
        let state = h.ui.last();
        assert!(state.progress_visible);
        assert!(!state.download_enabled);

        let id = h.launcher.launched()[0].id;
        for written in [1000, 4000, 6000] {
            h.selector.on_transfer_event(TransferEvent::Progress {
                id,
                written,
                total: Some(6000),
            });
        }
        let progress = h.ui.progress.borrow().clone();
        assert_eq!(progress.len(), 3);
        assert!(progress.windows(2).all(|w| w[0].written() <= w[1].written()));
        assert_eq!(progress[2].fraction(), Some(1.0));

        let payload = h.payload(&[9u8; 6000]);
        h.selector.on_transfer_event(TransferEvent::Finished {
            id,
            payload,
            written: 6000,
        });

        assert_eq!(
            h.ui.outcomes.borrow().as_slice(),
            &[TransferOutcome::Stored { bytes: 6000 }]
        );
        assert_eq!(std::fs::metadata(h.local_path()).unwrap().len(), 6000);
        assert_eq!(h.selector.phase(), Phase::Idle);
        assert!(h.selector.transfer().is_none());

        let state = h.ui.last();
        assert_eq!(state.download_label, TriggerLabel::PlayLocal);
        assert!(state.download_enabled);
        assert!(!state.progress_visible);
        // Completion does not start playback by itself.
        assert!(h.engine.opened().is_empty());
    }

    #[test]
    fn second_download_press_while_in_flight_is_ignored() {
        let mut h = Harness::new();
        h.selector.download();
        h.selector.download();
        h.selector.download();

        assert_eq!(h.launcher.launched().len(), 1);
        assert_eq!(h.selector.phase(), Phase::Downloading);
    }

    #[test]
    fn failed_download_leaves_no_asset_and_a_retryable_trigger() {
        let mut h = Harness::new();
        h.selector.download();
        let id = h.launcher.launched()[0].id;

        h.selector.on_transfer_event(TransferEvent::Failed {
            id,
            cause: TransferError::Status(reqwest::StatusCode::SERVICE_UNAVAILABLE),
        });

        assert!(!h.local_path().exists());
        let state = h.ui.last();
        assert!(state.download_enabled);
        assert!(!state.progress_visible);
        assert!(state.error.is_some());
        assert_eq!(h.ui.outcomes.borrow().len(), 1);

        // A new press starts over.
        h.selector.download();
        assert_eq!(h.launcher.launched().len(), 2);
        assert_ne!(h.launcher.launched()[1].id, id);
    }

    #[test]
    fn failed_save_reports_write_error() {
        let mut h = Harness::new();
        h.selector.download();
        let id = h.launcher.launched()[0].id;
        // A directory squatting on the final path makes the rename fail.
        std::fs::create_dir(h.local_path()).unwrap();
        std::fs::write(h.local_path().join("blocker"), b"x").unwrap();

        let payload = h.payload(b"video");
        h.selector.on_transfer_event(TransferEvent::Finished {
            id,
            payload,
            written: 5,
        });

        assert!(matches!(
            h.ui.outcomes.borrow().as_slice(),
            [TransferOutcome::Failed { .. }]
        ));
        assert!(h.ui.last().download_enabled);
        assert_eq!(h.selector.phase(), Phase::Idle);
    }

    #[test]
    fn saved_asset_plays_locally_then_pauses_without_rebinding() {
        let mut h = Harness::with_saved(true);
        assert_eq!(h.ui.last().download_label, TriggerLabel::PlayLocal);

        h.selector.download();
        assert_eq!(h.selector.phase(), Phase::LocalActive);
        assert_eq!(
            h.engine.opened(),
            vec![MediaSource::Local {
                path: h.local_path()
            }]
        );
        assert!(h.ui.last().is_playing);

        h.selector.download();
        assert!(!h.ui.last().is_playing);
        assert_eq!(h.engine.opened().len(), 1);
        assert!(h.launcher.launched().is_empty());
    }

    #[test]
    fn stream_play_toggles_without_rebinding() {
        let mut h = Harness::new();

        h.selector.play();
        assert_eq!(h.selector.phase(), Phase::StreamActive);
        assert!(h.ui.last().is_playing);

        h.selector.play();
        assert!(!h.ui.last().is_playing);

        h.selector.play();
        assert!(h.ui.last().is_playing);
        assert_eq!(
            h.engine.opened(),
            vec![MediaSource::Stream {
                url: ASSET_URL.to_string()
            }]
        );
    }

    #[test]
    fn switching_sources_keeps_a_single_player() {
        let mut h = Harness::with_saved(true);

        h.selector.play();
        h.selector.download();
        h.selector.play();

        assert_eq!(h.engine.opened().len(), 3);
        assert_eq!(h.engine.max_live(), 1);
        assert_eq!(h.engine.live(), 1);
        assert_eq!(h.selector.mode(), Some(PlaybackMode::Stream));
        assert!(h.ui.last().is_playing);
    }

    #[test]
    fn failed_bind_clears_the_mode() {
        let mut h = Harness::new();
        h.selector.play();
        std::fs::write(h.local_path(), b"saved").unwrap();

        h.engine.fail_next_open();
        h.selector.download();

        assert_eq!(h.selector.mode(), None);
        assert_eq!(h.selector.phase(), Phase::Idle);
        assert_eq!(h.engine.live(), 0);
        assert!(h.ui.last().error.is_some());
    }

    #[test]
    fn stream_that_fails_to_load_clears_the_mode_on_tick() {
        let mut h = Harness::new();
        h.selector.play();
        h.selector.tick();
        assert_eq!(h.selector.phase(), Phase::StreamActive);

        h.engine.fail_active("Cannot play stream: end of stream");
        h.selector.tick();

        assert_eq!(h.selector.mode(), None);
        assert_eq!(h.selector.phase(), Phase::Idle);
        assert_eq!(h.engine.live(), 0);
        let state = h.ui.last();
        assert!(!state.is_playing);
        assert_eq!(state.source, None);
        assert_eq!(
            state.error.as_deref(),
            Some("Cannot play stream: end of stream")
        );

        // Pressing play again binds a fresh stream.
        h.selector.play();
        assert_eq!(h.engine.opened().len(), 2);
        assert!(h.ui.last().is_playing);
        assert_eq!(h.ui.last().error, None);
    }

    #[test]
    fn published_state_names_the_bound_source() {
        let mut h = Harness::with_saved(true);
        assert_eq!(h.ui.last().source, None);

        h.selector.play();
        assert_eq!(
            h.ui.last().source,
            Some(MediaSource::Stream {
                url: ASSET_URL.to_string()
            })
        );

        h.selector.download();
        assert_eq!(
            h.ui.last().source,
            Some(MediaSource::Local {
                path: h.local_path()
            })
        );
    }

    #[test]
    fn download_completion_returns_to_previous_phase() {
        let mut h = Harness::new();
        h.selector.play();
        h.selector.download();
        assert_eq!(h.selector.phase(), Phase::Downloading);
        // The stream keeps playing while the download runs.
        assert!(h.ui.last().is_playing);

        let id = h.launcher.launched()[0].id;
        let payload = h.payload(b"video");
        h.selector.on_transfer_event(TransferEvent::Finished {
            id,
            payload,
            written: 5,
        });

        assert_eq!(h.selector.phase(), Phase::StreamActive);
        assert!(h.ui.last().is_playing);
    }

    #[test]
    fn play_during_download_stays_downloading() {
        let mut h = Harness::new();
        h.selector.download();
        h.selector.play();

        assert_eq!(h.selector.phase(), Phase::Downloading);
        assert_eq!(h.selector.mode(), Some(PlaybackMode::Stream));

        let id = h.launcher.launched()[0].id;
        h.selector.on_transfer_event(TransferEvent::Failed {
            id,
            cause: TransferError::Cancelled,
        });
        assert_eq!(h.selector.phase(), Phase::StreamActive);
    }

    #[test]
    fn cancel_discards_transfer_and_ignores_late_events() {
        let mut h = Harness::new();
        h.selector.download();
        let request = h.launcher.launched()[0].clone();

        h.selector.cancel_download();
        assert!(request.cancel.is_cancelled());
        assert_eq!(h.selector.phase(), Phase::Idle);
        let state = h.ui.last();
        assert_eq!(state.download_label, TriggerLabel::Download);
        assert!(state.download_enabled);
        assert_eq!(
            h.ui.outcomes.borrow().as_slice(),
            &[TransferOutcome::Cancelled]
        );

        let payload = h.payload(b"late");
        h.selector.on_transfer_event(TransferEvent::Finished {
            id: request.id,
            payload,
            written: 4,
        });
        assert!(!h.local_path().exists());
        assert_eq!(h.ui.outcomes.borrow().len(), 1);
    }

    #[test]
    fn events_from_an_older_transfer_are_ignored() {
        let mut h = Harness::new();
        h.selector.download();
        let first = h.launcher.launched()[0].id;
        h.selector.cancel_download();
        h.selector.download();

        h.selector.on_transfer_event(TransferEvent::Progress {
            id: first,
            written: 10,
            total: Some(20),
        });
        assert!(h.ui.progress.borrow().is_empty());
        assert_eq!(h.selector.phase(), Phase::Downloading);
    }

    #[test]
    fn unknown_total_shows_unknown_progress() {
        let mut h = Harness::new();
        h.selector.download();
        let id = h.launcher.launched()[0].id;

        h.selector.on_transfer_event(TransferEvent::Progress {
            id,
            written: 2048,
            total: None,
        });
        assert_eq!(
            h.selector.controls().progress,
            Some(Progress::Unknown { written: 2048 })
        );
        assert_eq!(h.selector.transfer().map(|t| t.written), Some(2048));
    }

    #[test]
    fn refused_launch_keeps_trigger_enabled() {
        let mut h = Harness::new();
        *h.launcher.refuse.borrow_mut() = true;

        h.selector.download();
        assert_eq!(h.selector.phase(), Phase::Idle);
        let state = h.ui.last();
        assert!(state.download_enabled);
        assert!(state.error.is_some());
    }

    #[test]
    fn view_hidden_pauses_but_keeps_download_running() {
        let mut h = Harness::with_saved(true);
        h.selector.download();
        std::fs::remove_file(h.local_path()).unwrap();
        h.selector.download();
        assert_eq!(h.selector.phase(), Phase::Downloading);

        h.selector.view_hidden();
        assert!(!h.ui.last().is_playing);
        assert_eq!(h.engine.live(), 1);
        assert_eq!(h.selector.phase(), Phase::Downloading);
        assert!(!h.launcher.launched()[0].cancel.is_cancelled());
    }

    #[test]
    fn layout_changes_reach_the_player() {
        let mut h = Harness::new();
        h.selector.play();
        let bounds = Bounds {
            x: 0.0,
            y: 0.0,
            width: 1024.0,
            height: 576.0,
        };

        h.selector.layout_changed(bounds);
        assert_eq!(h.engine.last_frame(), Some(bounds));
        assert_eq!(h.ui.last().surface, bounds);
    }
}
