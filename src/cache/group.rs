//! Object-cache backed [`Cache`] scoped to one base key and group.

use std::sync::{Arc, Weak};
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, info, warn};

use super::backend::ObjectCache;
use super::binding::{CacheActor, CacheDeletor};
use super::key::{derive_key, CacheKey, CallableId, KeyFragment};
use super::port::{ActorCallback, Cache, DEFAULT_GROUP};
use crate::hooks::{Hook, HookManager, DEFAULT_PRIORITY};
use crate::SiteId;

/// Bridge from fragment-keyed calls to an [`ObjectCache`].
///
/// Clones are handles onto the same backend and dispatcher. The dispatcher is
/// held weakly: listeners registered on it hold the cache, so a strong
/// reference back would keep both alive forever.
#[derive(Clone)]
pub struct GroupCache {
    key: String,
    group: String,
    backend: Arc<dyn ObjectCache>,
    hooks: Weak<HookManager>,
}

impl GroupCache {
    pub fn new(key: impl Into<String>, backend: Arc<dyn ObjectCache>, hooks: &Arc<HookManager>) -> Self {
        Self {
            key: key.into(),
            group: DEFAULT_GROUP.to_string(),
            backend,
            hooks: Arc::downgrade(hooks),
        }
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = group.into();
        self
    }

    pub fn base_key(&self) -> &str {
        &self.key
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn backend(&self) -> &Arc<dyn ObjectCache> {
        &self.backend
    }

    fn dispatcher(&self, purpose: &'static str) -> Option<Arc<HookManager>> {
        let hooks = self.hooks.upgrade();
        if hooks.is_none() {
            warn!(base_key = %self.key, group = %self.group, purpose, "Action dispatcher is gone; binding skipped");
        }
        hooks
    }
}

impl Cache for GroupCache {
    fn key_for(&self, fragments: &[KeyFragment]) -> CacheKey {
        derive_key(&self.key, fragments)
    }

    fn add(&self, data: Value, fragments: &[KeyFragment], ttl: Duration) -> bool {
        let key = self.key_for(fragments);
        let added = self.backend.add(key.as_str(), data, &self.group, ttl);
        debug!(%key, group = %self.group, added, "cache add");
        added
    }

    fn set(&self, data: Value, fragments: &[KeyFragment], ttl: Duration) -> bool {
        let key = self.key_for(fragments);
        let stored = self.backend.set(key.as_str(), data, &self.group, ttl);
        debug!(%key, group = %self.group, stored, "cache set");
        stored
    }

    fn replace(&self, data: Value, fragments: &[KeyFragment], ttl: Duration) -> bool {
        let key = self.key_for(fragments);
        let replaced = self.backend.replace(key.as_str(), data, &self.group, ttl);
        debug!(%key, group = %self.group, replaced, "cache replace");
        replaced
    }

    fn get(&self, fragments: &[KeyFragment], force: bool) -> Option<Value> {
        let key = self.key_for(fragments);
        let value = self.backend.get(key.as_str(), &self.group, force);
        debug!(%key, group = %self.group, force, hit = value.is_some(), "cache get");
        value
    }

    fn delete(&self, fragments: &[KeyFragment]) -> bool {
        let key = self.key_for(fragments);
        self.delete_for_key(key.as_str())
    }

    fn delete_for_key(&self, key: &str) -> bool {
        let deleted = self.backend.delete(key, &self.group);
        debug!(key, group = %self.group, deleted, "cache delete");
        deleted
    }

    fn flush(&self) -> bool {
        warn!(backend = self.backend.name(), requested_by = %self.key, "Flushing the entire object cache");
        self.backend.flush()
    }

    fn switch_to_site(&self, site_id: SiteId) {
        self.backend.switch_to_site(site_id);
    }

    fn register_callback_for_action(&self, callback: ActorCallback, actions: &[&str]) {
        let Some(hooks) = self.dispatcher("callback") else {
            return;
        };
        let actor = Arc::new(CacheActor::new(Arc::new(self.clone()), callback));
        let name = format!("cache_actor:{}:{}", self.key, CallableId::new());
        for action in actions {
            hooks.add_action(action, Hook::from_arc(name.clone(), DEFAULT_PRIORITY, actor.clone()));
        }
        info!(base_key = %self.key, ?actions, "Cache callback bound to actions");
    }

    fn register_deletion_action(&self, actions: &[&str], fragments: &[KeyFragment]) {
        let Some(hooks) = self.dispatcher("deletion") else {
            return;
        };
        let key = self.key_for(fragments);
        let name = format!("cache_deletor:{}:{}", self.group, key);
        let deletor = Arc::new(CacheDeletor::new(Arc::new(self.clone()), key.clone()));
        for action in actions {
            hooks.add_action(action, Hook::from_arc(name.clone(), DEFAULT_PRIORITY, deletor.clone()));
        }
        info!(%key, group = %self.group, ?actions, "Cache deletion bound to actions");
    }
}
