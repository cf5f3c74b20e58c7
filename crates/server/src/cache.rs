use dashmap::DashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Clone)]
pub struct CacheEntry<T> {
    data: T,
    expires_at: Instant,
}

impl<T> CacheEntry<T> {
    pub fn new(data: T, ttl: Duration) -> Self {
        Self {
            data,
            expires_at: Instant::now() + ttl,
        }
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() > self.expires_at
    }

    pub fn data(&self) -> &T {
        &self.data
    }

    pub fn into_data(self) -> T {
        self.data
    }
}

/// Concurrent map whose entries expire after a time-to-live.
#[derive(Clone)]
pub struct TtlCache<K, V>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    cache: Arc<DashMap<K, CacheEntry<V>>>,
    default_ttl: Duration,
    last_cleanup: Arc<std::sync::Mutex<Instant>>,
}

impl<K, V> TtlCache<K, V>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            cache: Arc::new(DashMap::new()),
            default_ttl,
            last_cleanup: Arc::new(std::sync::Mutex::new(Instant::now())),
        }
    }

    /// Perform lazy cleanup if enough time has passed
    fn maybe_cleanup(&self) {
        const CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

        if let Ok(mut last_cleanup) = self.last_cleanup.try_lock() {
            if last_cleanup.elapsed() >= CLEANUP_INTERVAL {
                *last_cleanup = Instant::now();
                drop(last_cleanup); // Release lock before cleanup

                self.cache.retain(|_, entry| !entry.is_expired());
            }
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.maybe_cleanup();

        self.cache.get(key).and_then(|entry| {
            if entry.is_expired() {
                None
            } else {
                Some(entry.data().clone())
            }
        })
    }

    pub fn insert(&self, key: K, value: V) {
        self.maybe_cleanup();

        self.cache
            .insert(key, CacheEntry::new(value, self.default_ttl));
    }

    pub fn insert_with_ttl(&self, key: K, value: V, ttl: Duration) {
        self.cache.insert(key, CacheEntry::new(value, ttl));
    }

    /// Remove the entry and hand back its value if it had not expired yet.
    ///
    /// The removal is a single map operation, so of two concurrent callers
    /// for the same key at most one receives the value.
    pub fn take(&self, key: &K) -> Option<V> {
        self.cache
            .remove(key)
            .and_then(|(_, entry)| (!entry.is_expired()).then(|| entry.into_data()))
    }

    pub fn invalidate(&self, key: &K) {
        self.cache.remove(key);
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

/// Short-lived key-value store shared by concurrent requests.
///
/// State tokens and session tokens are kept behind this interface so the
/// flow can run against any backing store; [`TtlCache`] is the in-process one.
pub trait ExpiringStore<V>: Send + Sync {
    /// Store `value` under `key` with the store's default time-to-live.
    fn set(&self, key: String, value: V);
    fn get(&self, key: &str) -> Option<V>;
    fn delete(&self, key: &str);
    /// Atomic get-then-delete.
    fn take(&self, key: &str) -> Option<V>;
}

impl<V> ExpiringStore<V> for TtlCache<String, V>
where
    V: Clone + Send + Sync + 'static,
{
    fn set(&self, key: String, value: V) {
        self.insert(key, value);
    }

    fn get(&self, key: &str) -> Option<V> {
        TtlCache::get(self, &key.to_string())
    }

    fn delete(&self, key: &str) {
        self.invalidate(&key.to_string());
    }

    fn take(&self, key: &str) -> Option<V> {
        TtlCache::take(self, &key.to_string())
    }
}
