//! Object cache backends.
//!
//! [`ObjectCache`] is the host key-value service every [`super::Cache`]
//! delegates to. Entries are addressed by `(key, group)` inside the partition
//! of the currently selected site; groups marked global live in one partition
//! shared by every site.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::{debug, info};

use crate::utils::lock::mutex_lock;
use crate::SiteId;

const SOURCE: &str = "cache::backend";

/// The site a fresh backend starts on.
pub const MAIN_SITE_ID: SiteId = 1;

pub trait ObjectCache: Send + Sync {
    /// Stores `value` unless the key already holds a live entry.
    fn add(&self, key: &str, value: Value, group: &str, ttl: Duration) -> bool;
    fn set(&self, key: &str, value: Value, group: &str, ttl: Duration) -> bool;
    /// Stores `value` only if the key already holds a live entry.
    fn replace(&self, key: &str, value: Value, group: &str, ttl: Duration) -> bool;
    /// The live entry with its expiry. `force` skips any process-local layer
    /// and reads the backing store.
    fn get_entry(&self, key: &str, group: &str, force: bool) -> Option<CacheEntry>;

    fn get(&self, key: &str, group: &str, force: bool) -> Option<Value> {
        self.get_entry(key, group, force).map(|entry| entry.value)
    }
    fn delete(&self, key: &str, group: &str) -> bool;
    /// Drops every entry in every partition and group.
    fn flush(&self) -> bool;
    fn switch_to_site(&self, site_id: SiteId);
    fn current_site(&self) -> SiteId;
    fn name(&self) -> &'static str;
}

/// A stored value and the instant it stops being served, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub value: Value,
    pub expires_at: Option<Instant>,
}

impl CacheEntry {
    pub fn new(value: Value, ttl: Duration) -> Self {
        let expires_at = if ttl.is_zero() { None } else { Instant::now().checked_add(ttl) };
        Self { value, expires_at }
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at.map(|at| Instant::now() >= at).unwrap_or(false)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Partition {
    Global,
    Site(SiteId),
}

type EntryKey = (Partition, String, String);

struct MemoryState {
    current_site: SiteId,
    global_groups: HashSet<String>,
    entries: HashMap<EntryKey, CacheEntry>,
}

impl MemoryState {
    fn entry_key(&self, key: &str, group: &str) -> EntryKey {
        let partition = if self.global_groups.contains(group) {
            Partition::Global
        } else {
            Partition::Site(self.current_site)
        };
        (partition, group.to_string(), key.to_string())
    }

    /// Looks up a live entry, dropping it first if it has expired.
    fn live(&mut self, entry_key: &EntryKey) -> Option<&CacheEntry> {
        if self.entries.get(entry_key).map(CacheEntry::is_expired).unwrap_or(false) {
            self.entries.remove(entry_key);
        }
        self.entries.get(entry_key)
    }
}

/// Non-persistent, per-process object cache.
pub struct MemoryObjectCache {
    state: Mutex<MemoryState>,
}

impl MemoryObjectCache {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState {
                current_site: MAIN_SITE_ID,
                global_groups: HashSet::new(),
                entries: HashMap::new(),
            }),
        }
    }

    /// Marks groups as shared across all sites.
    pub fn add_global_groups<I, S>(&self, groups: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut state = mutex_lock(&self.state, SOURCE, "add_global_groups");
        state.global_groups.extend(groups.into_iter().map(Into::into));
    }

    pub fn is_global_group(&self, group: &str) -> bool {
        mutex_lock(&self.state, SOURCE, "is_global_group").global_groups.contains(group)
    }

    /// Number of live entries across all partitions.
    pub fn len(&self) -> usize {
        mutex_lock(&self.state, SOURCE, "len").entries.values().filter(|e| !e.is_expired()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryObjectCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectCache for MemoryObjectCache {
    fn add(&self, key: &str, value: Value, group: &str, ttl: Duration) -> bool {
        let mut state = mutex_lock(&self.state, SOURCE, "add");
        let entry_key = state.entry_key(key, group);
        if state.live(&entry_key).is_some() {
            return false;
        }
        state.entries.insert(entry_key, CacheEntry::new(value, ttl));
        true
    }

    fn set(&self, key: &str, value: Value, group: &str, ttl: Duration) -> bool {
        let mut state = mutex_lock(&self.state, SOURCE, "set");
        let entry_key = state.entry_key(key, group);
        state.entries.insert(entry_key, CacheEntry::new(value, ttl));
        true
    }

    fn replace(&self, key: &str, value: Value, group: &str, ttl: Duration) -> bool {
        let mut state = mutex_lock(&self.state, SOURCE, "replace");
        let entry_key = state.entry_key(key, group);
        if state.live(&entry_key).is_none() {
            return false;
        }
        state.entries.insert(entry_key, CacheEntry::new(value, ttl));
        true
    }

    fn get_entry(&self, key: &str, group: &str, _force: bool) -> Option<CacheEntry> {
        let mut state = mutex_lock(&self.state, SOURCE, "get");
        let entry_key = state.entry_key(key, group);
        state.live(&entry_key).cloned()
    }

    fn delete(&self, key: &str, group: &str) -> bool {
        let mut state = mutex_lock(&self.state, SOURCE, "delete");
        let entry_key = state.entry_key(key, group);
        match state.entries.remove(&entry_key) {
            Some(entry) => !entry.is_expired(),
            None => false,
        }
    }

    fn flush(&self) -> bool {
        let mut state = mutex_lock(&self.state, SOURCE, "flush");
        let dropped = state.entries.len();
        state.entries.clear();
        debug!(dropped, "Memory object cache flushed");
        true
    }

    fn switch_to_site(&self, site_id: SiteId) {
        let mut state = mutex_lock(&self.state, SOURCE, "switch_to_site");
        if state.current_site != site_id {
            info!(from = state.current_site, to = site_id, "Object cache switched site");
            state.current_site = site_id;
        }
    }

    fn current_site(&self) -> SiteId {
        mutex_lock(&self.state, SOURCE, "current_site").current_site
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

/// Backend that stores nothing.
pub struct NullObjectCache {
    current_site: AtomicU64,
}

impl NullObjectCache {
    pub fn new() -> Self {
        Self { current_site: AtomicU64::new(MAIN_SITE_ID) }
    }
}

impl Default for NullObjectCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectCache for NullObjectCache {
    fn add(&self, _: &str, _: Value, _: &str, _: Duration) -> bool {
        false
    }
    fn set(&self, _: &str, _: Value, _: &str, _: Duration) -> bool {
        false
    }
    fn replace(&self, _: &str, _: Value, _: &str, _: Duration) -> bool {
        false
    }
    fn get_entry(&self, _: &str, _: &str, _: bool) -> Option<CacheEntry> {
        None
    }
    fn delete(&self, _: &str, _: &str) -> bool {
        false
    }
    fn flush(&self) -> bool {
        true
    }
    fn switch_to_site(&self, site_id: SiteId) {
        self.current_site.store(site_id, Ordering::Relaxed);
    }
    fn current_site(&self) -> SiteId {
        self.current_site.load(Ordering::Relaxed)
    }
    fn name(&self) -> &'static str {
        "null"
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    const NO_TTL: Duration = Duration::ZERO;

    #[test]
    fn add_only_when_absent() {
        let cache = MemoryObjectCache::new();
        assert!(cache.add("k", json!(1), "g", NO_TTL));
        assert!(!cache.add("k", json!(2), "g", NO_TTL));
        assert_eq!(cache.get("k", "g", false), Some(json!(1)));
    }

    #[test]
    fn replace_only_when_present() {
        let cache = MemoryObjectCache::new();
        assert!(!cache.replace("k", json!(1), "g", NO_TTL));
        assert_eq!(cache.get("k", "g", false), None);

        cache.set("k", json!(1), "g", NO_TTL);
        assert!(cache.replace("k", json!(2), "g", NO_TTL));
        assert_eq!(cache.get("k", "g", false), Some(json!(2)));
    }

    #[test]
    fn groups_are_separate_namespaces() {
        let cache = MemoryObjectCache::new();
        cache.set("k", json!("a"), "one", NO_TTL);
        cache.set("k", json!("b"), "two", NO_TTL);
        assert_eq!(cache.get("k", "one", false), Some(json!("a")));
        assert_eq!(cache.get("k", "two", false), Some(json!("b")));
    }

    #[test]
    fn stored_false_is_not_a_miss() {
        let cache = MemoryObjectCache::new();
        cache.set("flag", json!(false), "g", NO_TTL);
        assert_eq!(cache.get("flag", "g", false), Some(json!(false)));
    }

    #[test]
    fn expired_entries_are_absent() {
        let cache = MemoryObjectCache::new();
        cache.set("k", json!(1), "g", Duration::from_millis(1));
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(cache.get("k", "g", false), None);
        assert!(!cache.replace("k", json!(2), "g", NO_TTL));
        assert!(cache.add("k", json!(3), "g", NO_TTL));
    }

    #[test]
    fn delete_reports_removal() {
        let cache = MemoryObjectCache::new();
        cache.set("k", json!(1), "g", NO_TTL);
        assert!(cache.delete("k", "g"));
        assert!(!cache.delete("k", "g"));
    }

    #[test]
    fn sites_are_partitioned_except_global_groups() {
        let cache = MemoryObjectCache::new();
        cache.add_global_groups(["network"]);
        cache.set("k", json!("main"), "g", NO_TTL);
        cache.set("k", json!("shared"), "network", NO_TTL);

        cache.switch_to_site(2);
        assert_eq!(cache.current_site(), 2);
        assert_eq!(cache.get("k", "g", false), None);
        assert_eq!(cache.get("k", "network", false), Some(json!("shared")));
        cache.set("k", json!("second"), "g", NO_TTL);

        cache.switch_to_site(MAIN_SITE_ID);
        assert_eq!(cache.get("k", "g", false), Some(json!("main")));
    }

    #[test]
    fn flush_clears_every_partition() {
        let cache = MemoryObjectCache::new();
        cache.set("a", json!(1), "g", NO_TTL);
        cache.switch_to_site(3);
        cache.set("b", json!(2), "g", NO_TTL);
        assert_eq!(cache.len(), 2);

        assert!(cache.flush());
        assert!(cache.is_empty());
    }

    #[test]
    fn null_cache_never_stores() {
        let cache = NullObjectCache::new();
        assert!(!cache.set("k", json!(1), "g", NO_TTL));
        assert_eq!(cache.get("k", "g", true), None);
        assert!(!cache.delete("k", "g"));
        assert!(cache.flush());
        cache.switch_to_site(4);
        assert_eq!(cache.current_site(), 4);
        assert_eq!(cache.name(), "null");
    }
}
