//! The cache port used by application code.

use std::sync::Arc;
use std::time::Duration;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::warn;

use super::key::{CacheKey, KeyFragment};
use crate::{Result, SiteId};

/// Group used when an adapter is not given one.
pub const DEFAULT_GROUP: &str = "mlp";

/// Callback bound to actions through [`Cache::register_callback_for_action`].
///
/// Receives the cache it was registered on, followed by the action's own arguments.
pub type ActorCallback = Arc<dyn Fn(&dyn Cache, &[Value]) -> Result<()> + Send + Sync>;

/// Fragment-keyed cache.
///
/// Every entry lives under a key derived from the implementation's base key
/// and the fragments passed to each call. Failures are reported as `false` or
/// as a miss; nothing here returns an error.
pub trait Cache: Send + Sync {
    /// The key the given fragments resolve to.
    fn key_for(&self, fragments: &[KeyFragment]) -> CacheKey;

    /// Stores `data` unless an entry already exists.
    fn add(&self, data: Value, fragments: &[KeyFragment], ttl: Duration) -> bool;

    fn set(&self, data: Value, fragments: &[KeyFragment], ttl: Duration) -> bool;

    /// Stores `data` only if an entry already exists.
    fn replace(&self, data: Value, fragments: &[KeyFragment], ttl: Duration) -> bool;

    /// `None` on a miss. `force` refreshes from the persistent store.
    fn get(&self, fragments: &[KeyFragment], force: bool) -> Option<Value>;

    fn delete(&self, fragments: &[KeyFragment]) -> bool;

    /// Deletes by an already derived key.
    fn delete_for_key(&self, key: &str) -> bool;

    /// Clears the whole backing cache, not just this cache's keys.
    fn flush(&self) -> bool;

    /// Points this cache, and every handle sharing its backend, at another site.
    fn switch_to_site(&self, site_id: SiteId);

    /// Runs `callback` with this cache whenever one of `actions` fires.
    fn register_callback_for_action(&self, callback: ActorCallback, actions: &[&str]);

    /// Deletes the entry for `fragments` whenever one of `actions` fires.
    ///
    /// The key is derived now, not when the action fires.
    fn register_deletion_action(&self, actions: &[&str], fragments: &[KeyFragment]);
}

/// Typed conveniences over [`Cache`].
pub trait CacheExt: Cache {
    /// Like [`Cache::get`], treating an undeserializable payload as a miss.
    fn get_as<T: DeserializeOwned>(&self, fragments: &[KeyFragment], force: bool) -> Option<T> {
        let value = self.get(fragments, force)?;
        match serde_json::from_value(value) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(key = %self.key_for(fragments), error = %e, "Cached payload has unexpected shape");
                None
            }
        }
    }

    fn set_as<T: Serialize + ?Sized>(&self, data: &T, fragments: &[KeyFragment], ttl: Duration) -> bool {
        match serde_json::to_value(data) {
            Ok(v) => self.set(v, fragments, ttl),
            Err(e) => {
                warn!(key = %self.key_for(fragments), error = %e, "Payload is not serializable");
                false
            }
        }
    }

    fn add_as<T: Serialize + ?Sized>(&self, data: &T, fragments: &[KeyFragment], ttl: Duration) -> bool {
        match serde_json::to_value(data) {
            Ok(v) => self.add(v, fragments, ttl),
            Err(e) => {
                warn!(key = %self.key_for(fragments), error = %e, "Payload is not serializable");
                false
            }
        }
    }

    /// Returns the cached value, computing and storing it on a miss.
    fn remember<T, F>(&self, fragments: &[KeyFragment], ttl: Duration, compute: F) -> T
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> T,
    {
        if let Some(hit) = self.get_as(fragments, false) {
            return hit;
        }
        let value = compute();
        self.set_as(&value, fragments, ttl);
        value
    }

    /// [`Cache::register_callback_for_action`] for a plain closure.
    fn on_actions<F>(&self, actions: &[&str], callback: F)
    where
        F: Fn(&dyn Cache, &[Value]) -> Result<()> + Send + Sync + 'static,
    {
        self.register_callback_for_action(Arc::new(callback), actions);
    }
}

impl<C: Cache + ?Sized> CacheExt for C {}
