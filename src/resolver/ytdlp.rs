//! Extraction through the `yt-dlp` program.
//!
//! yt-dlp already knows how to talk to Instagram, so this strategy only asks
//! it for the JSON description of the post (`--dump-single-json`) with the
//! best single-file format selected and playlist expansion disabled, then
//! reads the direct `url` out of it. Nothing is downloaded.

use std::io::Read;
use std::path::PathBuf;
use std::process::{Command, Output, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use serde::Deserialize;
use tracing::{debug, warn};

use super::{Extraction, Extractor};
use crate::error::ResolveError;

/// The subset of yt-dlp's info JSON this strategy reads.
#[derive(Debug, Deserialize)]
struct PostInfo {
    url: Option<String>,
    title: Option<String>,
    uploader: Option<String>,
    channel: Option<String>,
}

pub struct YtDlpResolver {
    program: PathBuf,
    user_agent: String,
    socket_timeout: Duration,
}

impl YtDlpResolver {
    pub fn new(
        program: impl Into<PathBuf>,
        user_agent: impl Into<String>,
        socket_timeout: Duration,
    ) -> Self {
        Self {
            program: program.into(),
            user_agent: user_agent.into(),
            socket_timeout,
        }
    }

    fn command(&self, source_url: &str) -> Command {
        let mut command = Command::new(&self.program);
        command
            .arg("--dump-single-json")
            .arg("--skip-download")
            .arg("--no-warnings")
            .arg("--no-progress")
            .arg("--no-playlist")
            .arg("--format")
            .arg("best")
            .arg("--user-agent")
            .arg(&self.user_agent)
            .arg("--socket-timeout")
            .arg(self.socket_timeout.as_secs().max(1).to_string())
            .arg(source_url)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        command
    }

    /// Runs yt-dlp and waits at most the socket timeout for the whole run.
    /// `--socket-timeout` only bounds individual reads, so a stalled process
    /// is killed here.
    fn run(&self, source_url: &str) -> Result<Output, ResolveError> {
        let mut child = self.command(source_url).spawn().map_err(|err| {
            ResolveError::ExtractionFailed(format!("could not run yt-dlp: {err}"))
        })?;
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let deadline = Instant::now() + self.socket_timeout.max(Duration::from_secs(1));
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) if Instant::now() >= deadline => {
                    if let Err(err) = child.kill() {
                        debug!("killing yt-dlp: {err}");
                    }
                    if let Err(err) = child.wait() {
                        debug!("reaping yt-dlp: {err}");
                    }
                    // Pipe readers are left to finish on their own; a grandchild
                    // may still hold the pipes open.
                    warn!(%source_url, timeout = ?self.socket_timeout, "yt-dlp timed out");
                    return Err(ResolveError::ExtractionFailed("yt-dlp timed out".into()));
                }
                Ok(None) => thread::sleep(POLL_INTERVAL),
                Err(err) => {
                    return Err(ResolveError::ExtractionFailed(format!(
                        "waiting for yt-dlp: {err}"
                    )));
                }
            }
        };

        Ok(Output {
            status,
            stdout: stdout.join().unwrap_or_default(),
            stderr: stderr.join().unwrap_or_default(),
        })
    }
}

const POLL_INTERVAL: Duration = Duration::from_millis(50);

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            if let Err(err) = pipe.read_to_end(&mut buf) {
                debug!("reading yt-dlp output: {err}");
            }
        }
        buf
    })
}

impl Extractor for YtDlpResolver {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    fn extract(&self, source_url: &str) -> Result<Extraction, ResolveError> {
        let output = self.run(source_url)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            debug!(%source_url, status = %output.status, "yt-dlp failed");
            return Err(ResolveError::ExtractionFailed(failure_reason(
                &stderr,
                &output.status.to_string(),
            )));
        }

        let info: PostInfo = serde_json::from_slice(&output.stdout).map_err(|err| {
            ResolveError::ExtractionFailed(format!("unreadable yt-dlp output: {err}"))
        })?;

        let media_url = info
            .url
            .filter(|url| !url.is_empty())
            .ok_or_else(|| ResolveError::NotFound("Could not extract video".into()))?;

        Ok(Extraction {
            media_url,
            title: info.title.filter(|title| !title.is_empty()),
            author: info.uploader.or(info.channel),
        })
    }

    fn retryable(&self) -> bool {
        true
    }
}

/// Last non-empty stderr line without yt-dlp's `ERROR: ` prefix. Falls back to
/// the exit status when yt-dlp printed nothing.
fn failure_reason(stderr: &str, status: &str) -> String {
    stderr
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(|line| line.strip_prefix("ERROR: ").unwrap_or(line).to_string())
        .unwrap_or_else(|| format!("yt-dlp exited with {status}"))
}
