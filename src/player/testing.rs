//! In-memory engine for driving the coordinators without an audio device.

use std::cell::RefCell;
use std::rc::Rc;

use crate::player::media::{MediaEngine, Player, PlayerError};
use crate::player::source::MediaSource;
use crate::player::state::Bounds;

#[derive(Debug, Default)]
pub struct Counters {
    pub opened: Vec<MediaSource>,
    pub live: usize,
    pub max_live: usize,
    pub fail_next_open: bool,
    pub last_frame: Option<Bounds>,
    pub failure: Option<String>,
}

/// Shared view of what a [`FakeEngine`] and its players did.
#[derive(Debug, Clone, Default)]
pub struct EngineProbe(Rc<RefCell<Counters>>);

impl EngineProbe {
    pub fn opened(&self) -> Vec<MediaSource> {
        self.0.borrow().opened.clone()
    }

    pub fn live(&self) -> usize {
        self.0.borrow().live
    }

    pub fn max_live(&self) -> usize {
        self.0.borrow().max_live
    }

    pub fn last_frame(&self) -> Option<Bounds> {
        self.0.borrow().last_frame
    }

    pub fn fail_next_open(&self) {
        self.0.borrow_mut().fail_next_open = true;
    }

    /// Make the current player report a background load failure.
    pub fn fail_active(&self, error: &str) {
        self.0.borrow_mut().failure = Some(error.to_string());
    }
}

pub struct FakeEngine {
    probe: EngineProbe,
}

impl FakeEngine {
    pub fn new() -> (Self, EngineProbe) {
        let probe = EngineProbe::default();
        (
            Self {
                probe: probe.clone(),
            },
            probe,
        )
    }
}

impl MediaEngine for FakeEngine {
    type Player = FakePlayer;

    fn open(&mut self, source: &MediaSource) -> Result<FakePlayer, PlayerError> {
        let mut counters = self.probe.0.borrow_mut();
        if counters.fail_next_open {
            counters.fail_next_open = false;
            return Err(PlayerError::Output("no device".to_string()));
        }
        counters.failure = None;
        counters.opened.push(source.clone());
        counters.live += 1;
        counters.max_live = counters.max_live.max(counters.live);
        Ok(FakePlayer {
            source: source.clone(),
            playing: false,
            probe: self.probe.clone(),
        })
    }
}

pub struct FakePlayer {
    source: MediaSource,
    playing: bool,
    probe: EngineProbe,
}

impl Player for FakePlayer {
    fn source(&self) -> &MediaSource {
        &self.source
    }

    fn play(&mut self) {
        self.playing = true;
    }

    fn pause(&mut self) {
        self.playing = false;
    }

    fn rate(&self) -> f32 {
        if self.playing {
            1.0
        } else {
            0.0
        }
    }

    fn set_frame(&mut self, bounds: Bounds) {
        self.probe.0.borrow_mut().last_frame = Some(bounds);
    }

    fn duration_secs(&self) -> Option<f64> {
        Some(12.5)
    }

    fn failure(&self) -> Option<String> {
        self.probe.0.borrow().failure.clone()
    }
}

impl Drop for FakePlayer {
    fn drop(&mut self) {
        self.probe.0.borrow_mut().live -= 1;
    }
}
