//! Cache access with single-flight miss coalescing.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::warn;

use relevon_core::domain::block::BlockId;
use relevon_core::domain::cache::CacheEntry;
use relevon_db::repositories::{CacheRepository, RepositoryError};

/// Wraps the cache repository with the engine's read policy: storage
/// failures read as misses, and concurrent misses for one key are
/// funneled through a short-lived per-key slot so a popular key is
/// recomputed once, not once per waiting request.
pub struct CacheService {
    repo: Arc<dyn CacheRepository>,
    inflight: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl CacheService {
    pub fn new(repo: Arc<dyn CacheRepository>) -> Self {
        Self { repo, inflight: Mutex::new(HashMap::new()) }
    }

    /// Look up a live entry. Never fails: storage trouble is logged and
    /// reads as a miss so the resolver recomputes.
    pub async fn fetch(&self, cache_key: &str, now: DateTime<Utc>) -> Option<CacheEntry> {
        match self.repo.find_valid(cache_key, now).await {
            Ok(entry) => entry,
            Err(error) => {
                warn!(
                    event_name = "recommendation.cache.read_failed",
                    cache_key = %cache_key,
                    error = %error,
                    "cache read failed; treating as miss"
                );
                None
            }
        }
    }

    /// Store a computed result. Best-effort: a failed write only costs
    /// the next request a recomputation.
    pub async fn store(&self, entry: CacheEntry) {
        let cache_key = entry.cache_key.clone();
        if let Err(error) = self.repo.put(entry).await {
            warn!(
                event_name = "recommendation.cache.write_failed",
                cache_key = %cache_key,
                error = %error,
                "cache write failed; result served uncached"
            );
        }
    }

    /// Claim the in-flight slot for a key. Callers lock the returned
    /// mutex, re-check the cache, and compute only if still missing.
    pub async fn slot(&self, cache_key: &str) -> Arc<Mutex<()>> {
        let mut inflight = self.inflight.lock().await;
        Arc::clone(inflight.entry(cache_key.to_string()).or_default())
    }

    /// Drop the in-flight slot once the key is populated. Waiters still
    /// holding the old slot finish against the now-warm cache.
    pub async fn release_slot(&self, cache_key: &str) {
        self.inflight.lock().await.remove(cache_key);
    }

    /// Administrative invalidation: one block's entries, or everything.
    pub async fn invalidate(&self, block_id: Option<&BlockId>) -> Result<u64, RepositoryError> {
        match block_id {
            Some(block_id) => self.repo.invalidate_block(block_id).await,
            None => self.repo.invalidate_all().await,
        }
    }

    /// Maintenance sweep of expired rows.
    pub async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, RepositoryError> {
        self.repo.purge_expired(now).await
    }
}
