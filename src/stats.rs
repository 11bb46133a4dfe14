//! Usage counters exposed on `/stats`.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Result;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// One served resolution. Field names follow the `/stats` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadLog {
    #[serde(rename = "ip")]
    pub client_id: String,
    #[serde(rename = "url")]
    pub source_url: String,
    pub timestamp: i64,
}

impl DownloadLog {
    pub fn now(client_id: &str, source_url: &str) -> Self {
        Self {
            client_id: client_id.to_owned(),
            source_url: source_url.to_owned(),
            timestamp: chrono::Utc::now().timestamp(),
        }
    }
}

/// Point-in-time copy of every counter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageSnapshot {
    pub requests: u64,
    pub downloads: u64,
    pub cache_hits: u64,
    pub videos_served: u64,
    pub unique_ips: u64,
    pub download_logs: Vec<DownloadLog>,
}

/// Each method is atomic on its own; nothing groups several of them into one
/// transaction, so a snapshot taken mid-request may see `requests` bumped but
/// not yet the matching log entry.
pub trait UsageStore: Send + Sync {
    fn record_request(&self) -> Result<()>;
    fn record_client(&self, client_id: &str) -> Result<()>;
    /// Bumps `downloads` and `videos_served` (plus `cache_hits` for a hit)
    /// and appends the log entry.
    fn record_served(&self, entry: DownloadLog, cache_hit: bool) -> Result<()>;
    fn snapshot(&self) -> Result<UsageSnapshot>;
    fn reset(&self) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct MemoryStats {
    requests: AtomicU64,
    downloads: AtomicU64,
    cache_hits: AtomicU64,
    videos_served: AtomicU64,
    clients: Mutex<HashSet<String>>,
    logs: Mutex<Vec<DownloadLog>>,
}

impl MemoryStats {
    pub fn new() -> Self {
        Self::default()
    }
}

impl UsageStore for MemoryStats {
    fn record_request(&self) -> Result<()> {
        self.requests.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn record_client(&self, client_id: &str) -> Result<()> {
        let mut clients = self.clients.lock();
        if !clients.contains(client_id) {
            clients.insert(client_id.to_owned());
        }
        Ok(())
    }

    fn record_served(&self, entry: DownloadLog, cache_hit: bool) -> Result<()> {
        self.downloads.fetch_add(1, Ordering::Relaxed);
        self.videos_served.fetch_add(1, Ordering::Relaxed);
        if cache_hit {
            self.cache_hits.fetch_add(1, Ordering::Relaxed);
        }
        self.logs.lock().push(entry);
        Ok(())
    }

    fn snapshot(&self) -> Result<UsageSnapshot> {
        Ok(UsageSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            downloads: self.downloads.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            videos_served: self.videos_served.load(Ordering::Relaxed),
            unique_ips: self.clients.lock().len() as u64,
            download_logs: self.logs.lock().clone(),
        })
    }

    fn reset(&self) -> Result<()> {
        self.requests.store(0, Ordering::Relaxed);
        self.downloads.store(0, Ordering::Relaxed);
        self.cache_hits.store(0, Ordering::Relaxed);
        self.videos_served.store(0, Ordering::Relaxed);
        self.clients.lock().clear();
        self.logs.lock().clear();
        Ok(())
    }
}
