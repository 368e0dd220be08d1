use crate::player::media::{MediaEngine, Player, PlayerError};
use crate::player::source::MediaSource;
use crate::player::state::Bounds;

/// Owns the single active player.
pub struct PlaybackCoordinator<E: MediaEngine> {
    engine: E,
    active: Option<E::Player>,
    surface: Bounds,
}

impl<E: MediaEngine> PlaybackCoordinator<E> {
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            active: None,
            surface: Bounds::default(),
        }
    }

    /// Replace the active player with one bound to `source`, paused.
    ///
    /// The old player is stopped and released before the new one is opened,
    /// so a failed open leaves no player at all.
    pub fn bind(&mut self, source: MediaSource) -> Result<(), PlayerError> {
        if let Some(mut old) = self.active.take() {
            old.pause();
            log::debug!("Released player for {:?}", old.source());
        }

        let mut player = self.engine.open(&source)?;
        player.set_frame(self.surface);
        self.active = Some(player);
        log::debug!("Bound player to {:?}", source);
        Ok(())
    }

    pub fn play(&mut self) {
        if let Some(player) = self.active.as_mut() {
            player.play();
        }
    }

    /// Flip play/pause based on the current rate.
    pub fn toggle(&mut self) {
        if let Some(player) = self.active.as_mut() {
            if player.rate() > 0.0 {
                player.pause();
            } else {
                player.play();
            }
        }
    }

    /// Pause without releasing.
    pub fn stop(&mut self) {
        if let Some(player) = self.active.as_mut() {
            player.pause();
        }
    }

    pub fn layout_changed(&mut self, bounds: Bounds) {
        self.surface = bounds;
        if let Some(player) = self.active.as_mut() {
            player.set_frame(bounds);
        }
    }

    /// Release the active player if its source failed to load, returning why.
    pub fn take_failure(&mut self) -> Option<String> {
        let error = self.active.as_ref()?.failure()?;
        if let Some(player) = self.active.take() {
            log::warn!("Releasing failed player for {:?}", player.source());
        }
        Some(error)
    }

    pub fn bound_source(&self) -> Option<&MediaSource> {
        self.active.as_ref().map(|p| p.source())
    }

    pub fn is_playing(&self) -> bool {
        self.active.as_ref().is_some_and(|p| p.rate() > 0.0)
    }

    pub fn duration_secs(&self) -> Option<f64> {
        self.active.as_ref().and_then(|p| p.duration_secs())
    }

    pub fn surface(&self) -> Bounds {
        self.surface
    }
}
