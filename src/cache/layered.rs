//! Two-tier object cache: a bounded process-local LRU in front of a backing store.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use lru::LruCache;
use serde_json::Value;
use tracing::debug;

use super::backend::{CacheEntry, ObjectCache};
use crate::utils::lock::mutex_lock;
use crate::SiteId;

const SOURCE: &str = "cache::layered";

/// Keeps recently used entries of the current site in memory.
///
/// Reads are served from the local layer unless `force` is set, in which case
/// the backing store is consulted and the local copy refreshed. Writes go
/// through to the backing store first; the local layer only mirrors what the
/// store accepted. The local layer is dropped whenever the site changes.
pub struct LayeredObjectCache {
    local: Mutex<LruCache<(String, String), CacheEntry>>,
    persistent: Arc<dyn ObjectCache>,
}

impl LayeredObjectCache {
    pub fn new(capacity: NonZeroUsize, persistent: Arc<dyn ObjectCache>) -> Self {
        Self {
            local: Mutex::new(LruCache::new(capacity)),
            persistent,
        }
    }

    /// Entries currently held in the local layer.
    pub fn local_len(&self) -> usize {
        mutex_lock(&self.local, SOURCE, "local_len").len()
    }

    pub fn persistent(&self) -> &Arc<dyn ObjectCache> {
        &self.persistent
    }

    fn remember(&self, key: &str, group: &str, entry: CacheEntry) {
        mutex_lock(&self.local, SOURCE, "remember").put((group.to_string(), key.to_string()), entry);
    }

    fn forget(&self, key: &str, group: &str) {
        mutex_lock(&self.local, SOURCE, "forget").pop(&(group.to_string(), key.to_string()));
    }

    fn local_hit(&self, key: &str, group: &str) -> Option<CacheEntry> {
        let mut local = mutex_lock(&self.local, SOURCE, "get");
        let local_key = (group.to_string(), key.to_string());
        match local.get(&local_key) {
            Some(entry) if !entry.is_expired() => Some(entry.clone()),
            Some(_) => {
                local.pop(&local_key);
                None
            }
            None => None,
        }
    }
}

impl ObjectCache for LayeredObjectCache {
    fn add(&self, key: &str, value: Value, group: &str, ttl: Duration) -> bool {
        // stamped before the store stamps its own, so the copy never outlives it
        let entry = CacheEntry::new(value.clone(), ttl);
        let added = self.persistent.add(key, value, group, ttl);
        if added {
            self.remember(key, group, entry);
        }
        added
    }

    fn set(&self, key: &str, value: Value, group: &str, ttl: Duration) -> bool {
        let entry = CacheEntry::new(value.clone(), ttl);
        let stored = self.persistent.set(key, value, group, ttl);
        if stored {
            self.remember(key, group, entry);
        } else {
            self.forget(key, group);
        }
        stored
    }

    fn replace(&self, key: &str, value: Value, group: &str, ttl: Duration) -> bool {
        let entry = CacheEntry::new(value.clone(), ttl);
        let replaced = self.persistent.replace(key, value, group, ttl);
        if replaced {
            self.remember(key, group, entry);
        } else {
            self.forget(key, group);
        }
        replaced
    }

    fn get_entry(&self, key: &str, group: &str, force: bool) -> Option<CacheEntry> {
        if !force {
            if let Some(entry) = self.local_hit(key, group) {
                return Some(entry);
            }
        }
        match self.persistent.get_entry(key, group, force) {
            // the local copy expires when the stored one does
            Some(entry) => {
                self.remember(key, group, entry.clone());
                Some(entry)
            }
            None => {
                self.forget(key, group);
                None
            }
        }
    }

    fn delete(&self, key: &str, group: &str) -> bool {
        self.forget(key, group);
        self.persistent.delete(key, group)
    }

    fn flush(&self) -> bool {
        mutex_lock(&self.local, SOURCE, "flush").clear();
        self.persistent.flush()
    }

    fn switch_to_site(&self, site_id: SiteId) {
        if self.persistent.current_site() != site_id {
            let dropped = {
                let mut local = mutex_lock(&self.local, SOURCE, "switch_to_site");
                let dropped = local.len();
                local.clear();
                dropped
            };
            debug!(site_id, dropped, "Local cache layer dropped on site switch");
        }
        self.persistent.switch_to_site(site_id);
    }

    fn current_site(&self) -> SiteId {
        self.persistent.current_site()
    }

    fn name(&self) -> &'static str {
        "layered"
    }
}
