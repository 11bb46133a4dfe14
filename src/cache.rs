//! Memoized resolutions keyed by the exact source URL.
//!
//! There is no expiry and no size bound: entries only disappear through
//! [`ResolutionCache::clear`] (the admin reset) or when the pipeline drops a
//! key whose media URL failed re-validation. Two concurrent first-time
//! resolutions of the same URL may both miss and both extract; the later `put`
//! simply wins.

use std::collections::HashMap;

use anyhow::Result;
use parking_lot::RwLock;

/// Storage contract for source URL → media URL mappings. Implementations only
/// need per-call atomicity.
pub trait ResolutionCache: Send + Sync {
    fn get(&self, source_url: &str) -> Result<Option<String>>;
    fn put(&self, source_url: &str, media_url: &str) -> Result<()>;
    fn remove(&self, source_url: &str) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

/// Process-local cache. Lost on restart.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl ResolutionCache for MemoryCache {
    fn get(&self, source_url: &str) -> Result<Option<String>> {
        Ok(self.entries.read().get(source_url).cloned())
    }

    fn put(&self, source_url: &str, media_url: &str) -> Result<()> {
        self.entries
            .write()
            .insert(source_url.to_owned(), media_url.to_owned());
        Ok(())
    }

    fn remove(&self, source_url: &str) -> Result<()> {
        self.entries.write().remove(source_url);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.entries.write().clear();
        Ok(())
    }
}
