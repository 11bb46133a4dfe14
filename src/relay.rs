//! Stream relay: forwards a remote video to the caller without buffering it.
//!
//! [`StreamRelay::open`] performs the upstream GET and hands back a
//! [`RelayStream`], a lazy iterator over chunks of at most [`CHUNK_SIZE`] bytes
//! read straight off the socket. The stream is finite and cannot be
//! restarted; if the upstream drops mid-transfer the error is yielded once and
//! iteration stops, leaving the caller with a truncated body.

use std::fmt;
use std::io::{self, Read};
use std::str::FromStr;

use anyhow::bail;
use tracing::debug;

use crate::error::ResolveError;
use crate::http::describe_error;
use crate::pipeline::MediaProbe;

pub const CHUNK_SIZE: usize = 8 * 1024;
pub const CONTENT_TYPE: &str = "video/mp4";

/// Whether the browser should save the file or play it in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Attachment,
    Inline,
}

impl Disposition {
    /// Full `Content-Disposition` header value.
    pub fn header_value(self, filename: &str) -> String {
        let kind = match self {
            Self::Attachment => "attachment",
            Self::Inline => "inline",
        };
        format!("{kind}; filename=\"{filename}\"")
    }
}

impl FromStr for Disposition {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> anyhow::Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "attachment" | "download" => Ok(Self::Attachment),
            "inline" | "preview" => Ok(Self::Inline),
            other => bail!("unknown disposition {other:?} (expected attachment or inline)"),
        }
    }
}

/// Name offered to the browser for the relayed file.
pub fn generated_filename() -> String {
    format!("instagram_{}.mp4", chrono::Utc::now().timestamp())
}

pub struct StreamRelay {
    agent: ureq::Agent,
}

impl StreamRelay {
    pub fn new(agent: ureq::Agent) -> Self {
        Self { agent }
    }

    /// Issues the upstream GET. Nothing is read from the body yet.
    pub fn open(&self, media_url: &str) -> Result<RelayStream, ResolveError> {
        if media_url.trim().is_empty() {
            return Err(ResolveError::InvalidInput("Missing video url".into()));
        }

        let response = self.agent.get(media_url).call().map_err(|err| {
            debug!(%media_url, error = %err, "upstream GET failed");
            ResolveError::UpstreamUnavailable(format!(
                "Failed to fetch video: {}",
                describe_error(&err)
            ))
        })?;

        if !(200..300).contains(&response.status()) {
            return Err(ResolveError::UpstreamUnavailable(format!(
                "Failed to fetch video: upstream returned HTTP {}",
                response.status()
            )));
        }

        let content_length = response
            .header("Content-Length")
            .and_then(|value| value.trim().parse::<u64>().ok());

        Ok(RelayStream {
            reader: response.into_reader(),
            content_length,
            finished: false,
        })
    }
}

impl MediaProbe for StreamRelay {
    fn is_reachable(&self, media_url: &str) -> bool {
        match self.agent.head(media_url).call() {
            Ok(response) => (200..300).contains(&response.status()),
            Err(err) => {
                debug!(%media_url, error = %err, "cached media URL failed re-validation");
                false
            }
        }
    }
}

pub struct RelayStream {
    reader: Box<dyn Read + Send + Sync + 'static>,
    content_length: Option<u64>,
    finished: bool,
}

impl RelayStream {
    /// Upstream `Content-Length`, when it sent one.
    pub fn content_length(&self) -> Option<u64> {
        self.content_length
    }
}

impl fmt::Debug for RelayStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayStream")
            .field("content_length", &self.content_length)
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

impl Iterator for RelayStream {
    type Item = io::Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let mut buf = vec![0u8; CHUNK_SIZE];
        loop {
            match self.reader.read(&mut buf) {
                Ok(0) => {
                    self.finished = true;
                    return None;
                }
                Ok(n) => {
                    buf.truncate(n);
                    return Some(Ok(buf));
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => {
                    self.finished = true;
                    return Some(Err(err));
                }
            }
        }
    }
}
