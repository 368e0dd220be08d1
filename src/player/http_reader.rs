//! `Read + Seek` over HTTP range requests, so decoders can pull a remote
//! file progressively instead of buffering it whole.

use std::io::{self, Read, Seek, SeekFrom};

use parking_lot::Mutex;
use reqwest::blocking::{Client, Response};
use reqwest::header::{CONTENT_RANGE, RANGE};
use reqwest::StatusCode;

pub struct HttpReader {
    client: Client,
    url: String,
    pos: u64,
    len: Option<u64>,
    // Only ever touched through `get_mut`; the lock makes the reader `Sync`
    // for the decoder without requiring it of the response body.
    response: Mutex<Option<Response>>,
}

impl HttpReader {
    pub fn new(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
            pos: 0,
            len: None,
            response: Mutex::new(None),
        }
    }

    /// Open a response positioned at `pos`. `None` means `pos` is past the end.
    fn open_at(&mut self, pos: u64) -> io::Result<Option<Response>> {
        let mut request = self.client.get(&self.url);
        if pos > 0 {
            request = request.header(RANGE, format!("bytes={}-", pos));
        }
        let mut response = request.send().map_err(io::Error::other)?;

        let status = response.status();
        if status == StatusCode::RANGE_NOT_SATISFIABLE {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(io::Error::other(format!(
                "server responded with {}",
                status
            )));
        }

        if status == StatusCode::PARTIAL_CONTENT {
            // Content-Range: bytes <start>-<end>/<total>
            if self.len.is_none() {
                self.len = response
                    .headers()
                    .get(CONTENT_RANGE)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.rsplit('/').next())
                    .and_then(|v| v.parse::<u64>().ok());
            }
        } else {
            if self.len.is_none() {
                self.len = response.content_length();
            }
            // Range ignored: the body starts at zero.
            if pos > 0 {
                log::debug!("Server ignored range, skipping {} bytes", pos);
                let skipped = io::copy(&mut response.by_ref().take(pos), &mut io::sink())?;
                if skipped < pos {
                    return Ok(None);
                }
            }
        }
        Ok(Some(response))
    }

    fn ensure_len(&mut self) -> io::Result<u64> {
        if self.len.is_none() && self.response.get_mut().is_none() {
            let response = self.open_at(self.pos)?;
            *self.response.get_mut() = response;
        }
        self.len
            .ok_or_else(|| io::Error::new(io::ErrorKind::Unsupported, "stream length unknown"))
    }
}

impl Read for HttpReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() || self.len.is_some_and(|len| self.pos >= len) {
            return Ok(0);
        }
        if self.response.get_mut().is_none() {
            match self.open_at(self.pos)? {
                Some(response) => *self.response.get_mut() = Some(response),
                None => return Ok(0),
            }
        }

        let n = match self.response.get_mut() {
            Some(response) => response.read(buf)?,
            None => 0,
        };
        self.pos += n as u64;
        Ok(n)
    }
}

impl Seek for HttpReader {
    fn seek(&mut self, from: SeekFrom) -> io::Result<u64> {
        let target = match from {
            SeekFrom::Start(pos) => Some(pos),
            SeekFrom::Current(delta) => self.pos.checked_add_signed(delta),
            SeekFrom::End(delta) => self.ensure_len()?.checked_add_signed(delta),
        }
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "seek before start"))?;

        if target != self.pos {
            *self.response.get_mut() = None;
            self.pos = target;
        }
        Ok(self.pos)
    }
}
