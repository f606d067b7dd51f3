use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::services::cache::client::{CacheClient, CacheError, CacheResult};

// Expired keys nobody reads again are dropped on every Nth write.
const SWEEP_EVERY: u64 = 256;

/// Process-local cache with per-key expiry. Used when no Valkey is
/// configured for local runs, and by tests.
#[derive(Clone, Debug, Default)]
pub struct MemoryCache {
    entries: Arc<Mutex<HashMap<String, (String, Instant)>>>,
    writes: Arc<AtomicU64>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(
        &self,
    ) -> CacheResult<std::sync::MutexGuard<'_, HashMap<String, (String, Instant)>>> {
        self.entries
            .lock()
            .map_err(|_| CacheError::BackendCommand("memory cache poisoned".to_string()))
    }

    fn sweep(entries: &mut HashMap<String, (String, Instant)>, now: Instant) {
        entries.retain(|_, (_, expires_at)| *expires_at > now);
    }
}

#[async_trait]
impl CacheClient for MemoryCache {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn get_string(&self, key: &str) -> CacheResult<Option<String>> {
        let mut entries = self.lock()?;
        match entries.get(key) {
            Some((value, expires_at)) if *expires_at > Instant::now() => Ok(Some(value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        let now = Instant::now();
        let expires_at = now + ttl.max(Duration::from_secs(1));

        let mut entries = self.lock()?;
        if self.writes.fetch_add(1, Ordering::Relaxed) % SWEEP_EVERY == SWEEP_EVERY - 1 {
            Self::sweep(&mut entries, now);
        }
        entries.insert(key.to_string(), (value.to_string(), expires_at));
        Ok(())
    }

    async fn del(&self, key: &str) -> CacheResult<u64> {
        Ok(u64::from(self.lock()?.remove(key).is_some()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn values_round_trip_until_deleted() {
        let cache = MemoryCache::new();
        cache
            .set_with_ttl("k", "v", Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(cache.get_string("k").await.unwrap().as_deref(), Some("v"));
        assert_eq!(cache.del("k").await.unwrap(), 1);
        assert_eq!(cache.get_string("k").await.unwrap(), None);
        assert_eq!(cache.del("k").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn periodic_sweep_drops_expired_keys_that_are_never_read() {
        let cache = MemoryCache::new();
        cache
            .set_with_ttl("stale", "v", Duration::from_secs(60))
            .await
            .unwrap();
        // age the entry without waiting
        cache.lock().unwrap().get_mut("stale").unwrap().1 = Instant::now();

        for i in 0..SWEEP_EVERY {
            cache
                .set_with_ttl(&format!("session:{i}"), "v", Duration::from_secs(60))
                .await
                .unwrap();
        }

        let entries = cache.lock().unwrap();
        assert!(!entries.contains_key("stale"));
        assert_eq!(entries.len() as u64, SWEEP_EVERY);
    }
}
