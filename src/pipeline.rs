//! Resolve-then-cache pipeline.
//!
//! [`Pipeline::resolve`] is the only entry point the HTTP layer uses for
//! `/api/fetch`. It validates the URL, consults the cache, runs the configured
//! [`Extractor`] on a miss (retrying once when the strategy allows it), stores
//! the result and updates the usage counters. Everything here is blocking;
//! callers on an async runtime go through `spawn_blocking`.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::Result;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cache::ResolutionCache;
use crate::error::ResolveError;
use crate::resolver::{DEFAULT_TITLE, Extraction, Extractor, validate_source_url};
use crate::stats::{DownloadLog, UsageSnapshot, UsageStore};

/// Successful resolution handed back to `/api/fetch`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolutionResult {
    pub media_url: String,
    /// Absent on cache hits; metadata is not re-fetched.
    pub title: Option<String>,
    pub author: Option<String>,
    pub cached: bool,
}

impl ResolutionResult {
    fn fresh(extraction: Extraction) -> Self {
        Self {
            media_url: extraction.media_url,
            title: Some(extraction.title.unwrap_or_else(|| DEFAULT_TITLE.to_string())),
            author: Some(extraction.author.unwrap_or_default()),
            cached: false,
        }
    }

    fn cached(media_url: String) -> Self {
        Self {
            media_url,
            title: None,
            author: None,
            cached: true,
        }
    }
}

/// Checks whether a cached media URL still answers.
pub trait MediaProbe: Send + Sync {
    fn is_reachable(&self, media_url: &str) -> bool;
}

pub struct Pipeline {
    extractor: Arc<dyn Extractor>,
    cache: Arc<dyn ResolutionCache>,
    stats: Arc<dyn UsageStore>,
    retry_delay: Duration,
    probe: Option<Arc<dyn MediaProbe>>,
}

impl Pipeline {
    pub fn new(
        extractor: Arc<dyn Extractor>,
        cache: Arc<dyn ResolutionCache>,
        stats: Arc<dyn UsageStore>,
    ) -> Self {
        Self {
            extractor,
            cache,
            stats,
            retry_delay: Duration::from_secs(1),
            probe: None,
        }
    }

    /// Pause before the single retry of a retryable strategy.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Re-validate cached media URLs before serving them; dead entries are
    /// evicted and resolved again.
    pub fn with_probe(mut self, probe: Arc<dyn MediaProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    pub fn extractor_name(&self) -> &'static str {
        self.extractor.name()
    }

    pub fn resolve(
        &self,
        source_url: &str,
        client_id: &str,
    ) -> Result<ResolutionResult, ResolveError> {
        validate_source_url(source_url)?;

        log_failure("recording request", self.stats.record_request());
        log_failure("recording client", self.stats.record_client(client_id));

        let result = match self.cached(source_url) {
            Some(media_url) => {
                debug!(%source_url, "cache hit");
                ResolutionResult::cached(media_url)
            }
            None => {
                debug!(%source_url, extractor = self.extractor.name(), "cache miss");
                let extraction = self.extract_with_retry(source_url)?;
                log_failure(
                    "storing resolution",
                    self.cache.put(source_url, &extraction.media_url),
                );
                ResolutionResult::fresh(extraction)
            }
        };

        log_failure(
            "recording download",
            self.stats
                .record_served(DownloadLog::now(client_id, source_url), result.cached),
        );
        Ok(result)
    }

    pub fn stats(&self) -> Result<UsageSnapshot> {
        self.stats.snapshot()
    }

    /// Zeroes every counter and empties the cache. The two steps are not
    /// atomic together.
    pub fn reset(&self) -> Result<()> {
        self.stats.reset()?;
        self.cache.clear()?;
        info!("usage counters and resolution cache cleared");
        Ok(())
    }

    fn cached(&self, source_url: &str) -> Option<String> {
        let media_url = match self.cache.get(source_url) {
            Ok(hit) => hit?,
            Err(err) => {
                warn!(%source_url, "cache lookup failed, resolving again: {err:#}");
                return None;
            }
        };

        if let Some(probe) = &self.probe {
            if !probe.is_reachable(&media_url) {
                info!(%source_url, "cached media URL is dead, evicting");
                log_failure("evicting stale resolution", self.cache.remove(source_url));
                return None;
            }
        }
        Some(media_url)
    }

    fn extract_with_retry(&self, source_url: &str) -> Result<Extraction, ResolveError> {
        match self.extractor.extract(source_url) {
            Err(err) if err.is_transient() && self.extractor.retryable() => {
                warn!(
                    %source_url,
                    extractor = self.extractor.name(),
                    "extraction failed, retrying once: {err}"
                );
                thread::sleep(self.retry_delay);
                self.extractor.extract(source_url)
            }
            other => other,
        }
    }
}

fn log_failure(action: &str, outcome: Result<()>) {
    if let Err(err) = outcome {
        warn!("{action} failed: {err:#}");
    }
}
