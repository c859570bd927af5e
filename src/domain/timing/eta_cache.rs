use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::fmt::Display;
use std::hash::Hash;
use std::sync::{PoisonError, RwLock};

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    created_at: DateTime<Utc>,
}

/// Time-to-live cache absorbing read pressure from display collaborators.
///
/// An entry is fresh while `now - created_at <= ttl`; an entry exactly `ttl` old is still
/// served. Stale entries are evicted by the read that notices them.
#[derive(Debug)]
pub struct EtaCache<K, V> {
    ttl: Duration,
    entries: RwLock<HashMap<K, CacheEntry<V>>>,
}

impl<K, V> EtaCache<K, V>
where
    K: Eq + Hash + Clone + Display,
    V: Clone,
{
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, entries: RwLock::new(HashMap::new()) }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn put(&self, key: K, value: V, observed_at: DateTime<Utc>) {
        let mut guard = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        guard.insert(key, CacheEntry { value, created_at: observed_at });
    }

    pub fn get_if_fresh(&self, key: &K, now: DateTime<Utc>) -> Option<V> {
        {
            let guard = self.entries.read().unwrap_or_else(PoisonError::into_inner);
            let entry = guard.get(key)?;
            if now - entry.created_at <= self.ttl {
                return Some(entry.value.clone());
            }
        }

        let mut guard = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        // Another writer may have refreshed the entry in between.
        match guard.get(key) {
            Some(entry) if now - entry.created_at <= self.ttl => Some(entry.value.clone()),
            Some(_) => {
                guard.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn invalidate(&self, key: &K) -> bool {
        self.entries.write().unwrap_or_else(PoisonError::into_inner).remove(key).is_some()
    }

    /// Removes every entry whose key renders with `prefix`, so `""` clears the cache.
    ///
    /// # Returns
    /// Returns the number of removed entries.
    pub fn invalidate_by_prefix(&self, prefix: &str) -> usize {
        let mut guard = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let before = guard.len();
        guard.retain(|key, _| !key.to_string().starts_with(prefix));
        before - guard.len()
    }

    pub fn clear(&self) {
        self.entries.write().unwrap_or_else(PoisonError::into_inner).clear();
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of all cached values, fresh or not.
    pub fn snapshot(&self) -> HashMap<K, V> {
        let guard = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        guard.iter().map(|(key, entry)| (key.clone(), entry.value.clone())).collect()
    }
}
