//! Strategies that turn an Instagram post URL into a direct media URL.
//!
//! Every strategy implements [`Extractor`]; the pipeline picks one at startup
//! and never needs to know which. Strategies do no caching and no accounting.

use std::path::Path;
use std::process::{Command, Stdio};

use crate::error::ResolveError;

pub mod oembed;
pub mod scrape;
pub mod ytdlp;

pub use oembed::{OEmbedClient, OEmbedResolver};
pub use scrape::ScrapeResolver;
pub use ytdlp::YtDlpResolver;

/// Substring every accepted source URL must contain.
pub const TARGET_DOMAIN: &str = "instagram.com";
pub const DEFAULT_TITLE: &str = "Untitled";

/// What a strategy found for one post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub media_url: String,
    pub title: Option<String>,
    pub author: Option<String>,
}

pub trait Extractor: Send + Sync {
    /// Short label used in logs.
    fn name(&self) -> &'static str;

    fn extract(&self, source_url: &str) -> Result<Extraction, ResolveError>;

    /// Whether a transient failure deserves one more attempt.
    fn retryable(&self) -> bool {
        false
    }
}

/// Rejects empty and off-site URLs. Runs before any cache or network access.
pub fn validate_source_url(source_url: &str) -> Result<(), ResolveError> {
    if source_url.trim().is_empty() || !source_url.contains(TARGET_DOMAIN) {
        return Err(ResolveError::InvalidInput("Invalid Instagram URL".into()));
    }
    Ok(())
}

/// Runs `<program> --version` to find out whether yt-dlp can be used.
pub fn program_available(program: &Path) -> bool {
    Command::new(program)
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}
