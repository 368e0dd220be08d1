//! Media engine: opens sources into players.
//!
//! The production engine decodes through Rodio (symphonia decoders, so the
//! AAC track inside an MP4 plays). Streams are decoded on a loader thread so
//! binding returns at once. The picture belongs to the webview, which draws
//! the published source at the published bounds.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;
use reqwest::blocking::Client;
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};

use crate::player::http_reader::HttpReader;
use crate::player::source::MediaSource;
use crate::player::state::Bounds;

#[derive(Debug, thiserror::Error)]
pub enum PlayerError {
    #[error("audio output unavailable: {0}")]
    Output(String),
    #[error("cannot open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unsupported media format: {0}")]
    Decode(#[from] rodio::decoder::DecoderError),
    #[error("cannot start stream loader: {0}")]
    Spawn(#[source] std::io::Error),
}

/// A player bound to one source. Dropping it releases the source.
pub trait Player {
    fn source(&self) -> &MediaSource;
    fn play(&mut self);
    fn pause(&mut self);
    /// 0.0 while paused or finished.
    fn rate(&self) -> f32;
    fn set_frame(&mut self, bounds: Bounds);
    fn duration_secs(&self) -> Option<f64>;
    /// Set once a source that was still loading in the background failed.
    fn failure(&self) -> Option<String>;
}

/// Constructs players. Never starts playback on its own, and never blocks on
/// the network.
pub trait MediaEngine {
    type Player: Player;

    fn open(&mut self, source: &MediaSource) -> Result<Self::Player, PlayerError>;
}

/// Where a player's decoder is.
#[derive(Debug, Clone, PartialEq)]
enum LoadState {
    Loading,
    Ready { duration_secs: Option<f64> },
    Failed(String),
    /// The player was dropped; a late decoder must not be appended.
    Released,
}

type SharedLoad = Arc<Mutex<LoadState>>;

/// Rodio-backed engine.
///
/// Owns the output stream, which is not `Send`; build it on the thread that
/// will use it. The device is opened on first use.
pub struct RodioEngine {
    output: Option<(OutputStream, OutputStreamHandle)>,
    client: Client,
}

impl RodioEngine {
    pub fn new(client: Client) -> Self {
        Self {
            output: None,
            client,
        }
    }

    fn output_handle(&mut self) -> Result<OutputStreamHandle, PlayerError> {
        if let Some((_, handle)) = &self.output {
            return Ok(handle.clone());
        }
        let (stream, handle) =
            OutputStream::try_default().map_err(|e| PlayerError::Output(e.to_string()))?;
        log::info!("Audio output opened");
        self.output = Some((stream, handle.clone()));
        Ok(handle)
    }

    fn load_local_file(&self, sink: &Sink, path: &Path) -> Result<LoadState, PlayerError> {
        log::debug!("Loading local file: {}", path.display());

        let file = File::open(path).map_err(|source| PlayerError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let decoder = Decoder::new(BufReader::new(file))?;
        let duration_secs = decoder
            .total_duration()
            .map(|d| d.as_secs_f64())
            .or_else(|| probe_duration(path));

        sink.append(decoder);
        Ok(LoadState::Ready { duration_secs })
    }
}

/// Decode a stream on a loader thread reading through range requests, so
/// opening never waits on the network.
fn load_http_stream(
    client: Client,
    sink: &Arc<Sink>,
    url: &str,
) -> Result<SharedLoad, PlayerError> {
    log::debug!("Loading HTTP stream: {}", url);

    let load: SharedLoad = Arc::new(Mutex::new(LoadState::Loading));
    let reader = HttpReader::new(client, url);
    let sink = Arc::clone(sink);
    let loader_state = Arc::clone(&load);
    thread::Builder::new()
        .name("videoplayer-stream".into())
        .spawn(move || {
            let decoded = Decoder::new(BufReader::new(reader));
            let mut state = loader_state.lock();
            if *state == LoadState::Released {
                log::debug!("Stream player released before its decoder was ready");
                return;
            }
            *state = match decoded {
                Ok(decoder) => {
                    let duration_secs = decoder.total_duration().map(|d| d.as_secs_f64());
                    sink.append(decoder);
                    log::debug!("Stream decoder ready");
                    LoadState::Ready { duration_secs }
                }
                Err(e) => {
                    log::error!("Failed to open stream: {}", e);
                    LoadState::Failed(format!("Cannot play stream: {}", e))
                }
            };
        })
        .map_err(PlayerError::Spawn)?;

    Ok(load)
}

impl MediaEngine for RodioEngine {
    type Player = RodioPlayer;

    fn open(&mut self, source: &MediaSource) -> Result<RodioPlayer, PlayerError> {
        let handle = self.output_handle()?;
        let sink = Sink::try_new(&handle).map_err(|e| PlayerError::Output(e.to_string()))?;
        let sink = Arc::new(sink);
        sink.pause();

        let load = match source {
            MediaSource::Local { path } => {
                let loaded = self.load_local_file(&sink, path)?;
                Arc::new(Mutex::new(loaded))
            }
            MediaSource::Stream { url } => load_http_stream(self.client.clone(), &sink, url)?,
        };

        Ok(RodioPlayer {
            sink,
            source: source.clone(),
            load,
        })
    }
}

pub struct RodioPlayer {
    sink: Arc<Sink>,
    source: MediaSource,
    load: SharedLoad,
}

impl Player for RodioPlayer {
    fn source(&self) -> &MediaSource {
        &self.source
    }

    fn play(&mut self) {
        self.sink.play();
    }

    fn pause(&mut self) {
        self.sink.pause();
    }

    fn rate(&self) -> f32 {
        if self.sink.is_paused() {
            return 0.0;
        }
        match &*self.load.lock() {
            // Buffering counts as playing so a toggle pauses it.
            LoadState::Loading => self.sink.speed(),
            LoadState::Ready { .. } if !self.sink.empty() => self.sink.speed(),
            _ => 0.0,
        }
    }

    fn set_frame(&mut self, bounds: Bounds) {
        // The webview draws the picture; the sink only carries sound.
        log::trace!("Surface for {:?}: {:?}", self.source, bounds);
    }

    fn duration_secs(&self) -> Option<f64> {
        match &*self.load.lock() {
            LoadState::Ready { duration_secs } => *duration_secs,
            _ => None,
        }
    }

    fn failure(&self) -> Option<String> {
        match &*self.load.lock() {
            LoadState::Failed(error) => Some(error.clone()),
            _ => None,
        }
    }
}

impl Drop for RodioPlayer {
    fn drop(&mut self) {
        *self.load.lock() = LoadState::Released;
        self.sink.stop();
    }
}

/// Container duration of a local media file, read from its default track.
pub fn probe_duration(path: &Path) -> Option<f64> {
    use symphonia::core::formats::FormatOptions;
    use symphonia::core::io::MediaSourceStream;
    use symphonia::core::meta::MetadataOptions;
    use symphonia::core::probe::Hint;

    let file = File::open(path).ok()?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());
    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .ok()?;
    let params = &probed.format.default_track()?.codec_params;
    let time = params.time_base?.calc_time(params.n_frames?);
    Some(time.seconds as f64 + time.frac)
}
