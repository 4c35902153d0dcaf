//! Listeners that tie cache operations to actions.

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use super::key::CacheKey;
use super::port::{ActorCallback, Cache};
use crate::hooks::Action;
use crate::Result;

/// Deletes one precomputed key when fired.
pub struct CacheDeletor {
    cache: Arc<dyn Cache>,
    key: CacheKey,
}

impl CacheDeletor {
    pub fn new(cache: Arc<dyn Cache>, key: CacheKey) -> Self {
        Self { cache, key }
    }

    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    /// Returns whether an entry was actually removed.
    pub fn delete(&self) -> bool {
        self.cache.delete_for_key(self.key.as_str())
    }
}

impl Action for CacheDeletor {
    fn call(&self, _args: &[Value]) -> Result<()> {
        let removed = self.delete();
        debug!(key = %self.key, removed, "Cache entry invalidated by action");
        Ok(())
    }
}

/// Runs a callback with the cache prepended to the action's arguments.
pub struct CacheActor {
    cache: Arc<dyn Cache>,
    callback: ActorCallback,
}

impl CacheActor {
    pub fn new(cache: Arc<dyn Cache>, callback: ActorCallback) -> Self {
        Self { cache, callback }
    }

    pub fn act(&self, args: &[Value]) -> Result<()> {
        (self.callback)(self.cache.as_ref(), args)
    }
}

impl Action for CacheActor {
    fn call(&self, args: &[Value]) -> Result<()> {
        self.act(args)
    }
}
