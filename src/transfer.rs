//! Background download of the remote asset.
//!
//! A transfer runs on its own worker thread and reports back through a
//! channel of [`TransferEvent`]s:
//! - zero or more `Progress` events with a non-decreasing byte count
//! - exactly one `Finished` (payload staged in a temp file) or `Failed`
//!
//! The consumer moves a finished payload into place with [`store`]. Dropping
//! the payload instead deletes it, so an abandoned or failed transfer never
//! leaves a file under the final name.

use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::Sender;
use reqwest::blocking::Client;
use reqwest::StatusCode;
use tempfile::NamedTempFile;

/// Read buffer size; one progress event is emitted per chunk.
const CHUNK_SIZE: usize = 64 * 1024;

const STAGING_PREFIX: &str = ".videoplayer-";

#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("server responded with {0}")]
    Status(StatusCode),
    #[error("connection dropped while reading body: {0}")]
    Body(#[source] io::Error),
    #[error("cannot stage payload: {0}")]
    Io(#[from] io::Error),
    #[error("body ended after {written} of {expected} bytes")]
    Incomplete { written: u64, expected: u64 },
    #[error("transfer cancelled")]
    Cancelled,
    #[error("cannot start transfer worker: {0}")]
    Spawn(#[source] io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("cannot move payload to {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// HTTP client settings shared by transfers and streaming.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferSettings {
    pub timeout: Option<Duration>,
    pub user_agent: String,
}

/// Build a blocking client. Without a configured timeout requests may run forever.
pub fn build_client(settings: &TransferSettings) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(settings.user_agent.clone())
        .timeout(settings.timeout)
        .build()
}

/// Cancellation signal shared between the coordinator and a worker.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// One download to run.
#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub id: u64,
    pub url: String,
    /// Directory the payload is staged in. Must be on the same filesystem as
    /// the final path so [`store`] is a rename.
    pub staging_dir: PathBuf,
    pub cancel: CancelFlag,
}

#[derive(Debug)]
pub enum TransferEvent {
    Progress {
        id: u64,
        written: u64,
        total: Option<u64>,
    },
    Finished {
        id: u64,
        payload: NamedTempFile,
        written: u64,
    },
    Failed {
        id: u64,
        cause: TransferError,
    },
}

impl TransferEvent {
    pub fn id(&self) -> u64 {
        match self {
            TransferEvent::Progress { id, .. }
            | TransferEvent::Finished { id, .. }
            | TransferEvent::Failed { id, .. } => *id,
        }
    }
}

/// Bookkeeping for the transfer in flight.
#[derive(Debug)]
pub struct TransferState {
    pub id: u64,
    pub written: u64,
    pub total: Option<u64>,
    pub destination: PathBuf,
    pub cancel: CancelFlag,
}

impl TransferState {
    pub fn new(request: &TransferRequest, destination: PathBuf) -> Self {
        Self {
            id: request.id,
            written: 0,
            total: None,
            destination,
            cancel: request.cancel.clone(),
        }
    }
}

/// Starts transfers. Events for a launched request arrive asynchronously.
pub trait Launch {
    fn launch(&self, request: TransferRequest) -> Result<(), TransferError>;
}

/// Runs each transfer on a dedicated thread with a blocking reqwest client.
pub struct HttpTransfer {
    client: Client,
    events: Sender<TransferEvent>,
}

impl HttpTransfer {
    pub fn new(
        settings: &TransferSettings,
        events: Sender<TransferEvent>,
    ) -> Result<Self, TransferError> {
        Ok(Self {
            client: build_client(settings)?,
            events,
        })
    }
}

impl Launch for HttpTransfer {
    fn launch(&self, request: TransferRequest) -> Result<(), TransferError> {
        let client = self.client.clone();
        let events = self.events.clone();
        log::info!("Starting download #{} of {}", request.id, request.url);

        thread::Builder::new()
            .name(format!("videoplayer-transfer-{}", request.id))
            .spawn(move || run(&client, request, &events))
            .map(|_| ())
            .map_err(TransferError::Spawn)
    }
}

/// Worker body: fetch, then report exactly one terminal event.
pub fn run(client: &Client, request: TransferRequest, events: &Sender<TransferEvent>) {
    let id = request.id;
    let outcome = fetch(client, &request, |written, total| {
        let _ = events.send(TransferEvent::Progress { id, written, total });
    });

    let event = match outcome {
        Ok((payload, written)) => {
            log::debug!("Download #{id} staged {written} bytes");
            TransferEvent::Finished {
                id,
                payload,
                written,
            }
        }
        Err(cause) => TransferEvent::Failed { id, cause },
    };
    let _ = events.send(event);
}

fn fetch(
    client: &Client,
    request: &TransferRequest,
    mut on_progress: impl FnMut(u64, Option<u64>),
) -> Result<(NamedTempFile, u64), TransferError> {
    if request.cancel.is_cancelled() {
        return Err(TransferError::Cancelled);
    }

    std::fs::create_dir_all(&request.staging_dir)?;

    let mut response = client.get(&request.url).send()?;
    let status = response.status();
    if !status.is_success() {
        return Err(TransferError::Status(status));
    }
    let total = response.content_length();

    let mut payload = tempfile::Builder::new()
        .prefix(STAGING_PREFIX)
        .tempfile_in(&request.staging_dir)?;

    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut written: u64 = 0;
    loop {
        if request.cancel.is_cancelled() {
            return Err(TransferError::Cancelled);
        }
        let n = match response.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(TransferError::Body(e)),
        };
        payload.write_all(&buf[..n])?;
        written += n as u64;
        on_progress(written, total);
    }

    if let Some(expected) = total {
        if written < expected {
            return Err(TransferError::Incomplete { written, expected });
        }
    }

    payload.as_file_mut().sync_all()?;
    Ok((payload, written))
}

/// Atomically move a finished payload to `destination`, replacing any old file.
///
/// On failure the payload is deleted.
pub fn store(payload: NamedTempFile, destination: &Path) -> Result<(), StoreError> {
    payload
        .persist(destination)
        .map(|_| ())
        .map_err(|e| StoreError::WriteFailed {
            path: destination.to_path_buf(),
            source: e.error,
        })
}
