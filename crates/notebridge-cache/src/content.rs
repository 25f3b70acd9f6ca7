//! Bounded, time-expiring LRU cache of raw note text.

use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use lru::LruCache;
use tokio::time::Instant;

use notebridge_core::SourceError;

struct Entry {
    content: String,
    last_access: Instant,
}

/// Path → raw content, at most `max_items` entries.
///
/// Entries expire `ttl` after their last access; every hit slides the
/// window forward. When full, the least recently used entry is evicted.
pub struct ContentCache {
    entries: Mutex<LruCache<String, Entry>>,
    ttl: Duration,
}

impl ContentCache {
    /// Create a cache. A `max_items` of zero is treated as one.
    #[must_use]
    pub fn new(max_items: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(max_items).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<String, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Cached content for `path`, refreshing its recency and TTL.
    /// Expired entries are dropped and reported as a miss.
    pub fn get(&self, path: &str) -> Option<String> {
        let mut entries = self.lock();
        let now = Instant::now();
        match entries.get_mut(path) {
            None => return None,
            Some(entry) if now.duration_since(entry.last_access) <= self.ttl => {
                entry.last_access = now;
                return Some(entry.content.clone());
            }
            Some(_) => {}
        }
        entries.pop(path);
        None
    }

    /// Like [`get`](Self::get) but leaves recency and TTL untouched.
    pub fn peek(&self, path: &str) -> Option<String> {
        let entries = self.lock();
        entries
            .peek(path)
            .filter(|entry| entry.last_access.elapsed() <= self.ttl)
            .map(|entry| entry.content.clone())
    }

    /// Cache-through read: return the cached value or run `fetch`, store its
    /// result and return it. Fetch errors are returned and nothing is stored.
    ///
    /// # Errors
    ///
    /// Propagates the error returned by `fetch`.
    pub async fn get_or_fetch<F, Fut>(&self, path: &str, fetch: F) -> Result<String, SourceError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String, SourceError>>,
    {
        if let Some(content) = self.get(path) {
            return Ok(content);
        }
        let content = fetch().await?;
        self.insert(path, content.clone());
        Ok(content)
    }

    /// Store content, evicting the least recently used entry when full.
    pub fn insert(&self, path: &str, content: String) {
        self.lock().put(
            path.to_string(),
            Entry {
                content,
                last_access: Instant::now(),
            },
        );
    }

    /// Invalidate one entry.
    pub fn remove(&self, path: &str) {
        self.lock().pop(path);
    }

    pub fn contains(&self, path: &str) -> bool {
        self.peek(path).is_some()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Number of stored entries, expired ones included until touched.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evicts_least_recently_used_when_full() {
        let cache = ContentCache::new(2, Duration::from_secs(60));
        cache.insert("a.md", "A".to_string());
        cache.insert("b.md", "B".to_string());

        // Touch a so b becomes the eviction candidate.
        assert_eq!(cache.get("a.md").as_deref(), Some("A"));
        cache.insert("c.md", "C".to_string());

        assert_eq!(cache.len(), 2);
        assert!(cache.contains("a.md"));
        assert!(!cache.contains("b.md"));
        assert!(cache.contains("c.md"));
    }

    #[tokio::test(start_paused = true)]
    async fn entry_expires_after_ttl_without_access() {
        let cache = ContentCache::new(10, Duration::from_secs(30));
        cache.insert("a.md", "A".to_string());

        tokio::time::advance(Duration::from_secs(31)).await;
        assert_eq!(cache.get("a.md"), None);
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn access_slides_the_ttl_window() {
        let cache = ContentCache::new(10, Duration::from_secs(30));
        cache.insert("a.md", "A".to_string());

        tokio::time::advance(Duration::from_secs(20)).await;
        assert!(cache.get("a.md").is_some());
        tokio::time::advance(Duration::from_secs(20)).await;
        assert_eq!(cache.get("a.md").as_deref(), Some("A"));

        // peek does not slide the window
        tokio::time::advance(Duration::from_secs(20)).await;
        assert!(cache.peek("a.md").is_some());
        tokio::time::advance(Duration::from_secs(11)).await;
        assert!(cache.peek("a.md").is_none());
    }

    #[tokio::test]
    async fn get_or_fetch_only_fetches_on_miss() {
        let cache = ContentCache::new(10, Duration::from_secs(60));
        let mut fetches = 0;

        let first = cache
            .get_or_fetch("a.md", || {
                fetches += 1;
                async { Ok("fresh".to_string()) }
            })
            .await
            .unwrap();
        let second = cache
            .get_or_fetch("a.md", || {
                fetches += 1;
                async { Ok("other".to_string()) }
            })
            .await
            .unwrap();

        assert_eq!(first, "fresh");
        assert_eq!(second, "fresh");
        assert_eq!(fetches, 1);
    }

    #[tokio::test]
    async fn fetch_errors_are_not_cached() {
        let cache = ContentCache::new(10, Duration::from_secs(60));
        let err = cache
            .get_or_fetch("gone.md", || async { Err(SourceError::NotFound("gone.md".into())) })
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(!cache.contains("gone.md"));
    }

    #[test]
    fn remove_and_clear_invalidate() {
        let cache = ContentCache::new(10, Duration::from_secs(60));
        cache.insert("a.md", "A".to_string());
        cache.insert("b.md", "B".to_string());
        cache.remove("a.md");
        assert!(!cache.contains("a.md"));
        cache.clear();
        assert!(cache.is_empty());
    }
}
