//! Fragment-keyed object caching with action-bound invalidation.
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`Cache`] | The port application code talks to |
//! | [`CacheExt`] | Typed helpers (`get_as`, `set_as`, `remember`) over any [`Cache`] |
//! | [`GroupCache`] | [`Cache`] over an [`ObjectCache`], scoped to a base key and group |
//! | [`ObjectCache`] | Host key-value service, partitioned per site |
//! | [`MemoryObjectCache`] | Non-persistent in-process backend |
//! | [`LayeredObjectCache`] | Bounded local LRU in front of another backend |
//! | [`NullObjectCache`] | Backend that stores nothing |
//! | [`CacheDeletor`] / [`CacheActor`] | Listeners bound to actions |
//! | [`derive_key`] / [`KeyFragment`] | Cache key derivation |
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use mlp_cache::cache::{Cache, GroupCache, MemoryObjectCache};
//! use mlp_cache::fragments;
//! use mlp_cache::hooks::HookManager;
//!
//! let hooks = Arc::new(HookManager::new());
//! let cache = GroupCache::new("post_translations", Arc::new(MemoryObjectCache::new()), &hooks);
//!
//! let key = fragments![42, "en"];
//! cache.set(serde_json::json!([7, 9]), &key, Duration::ZERO);
//! cache.register_deletion_action(&["save_post"], &key);
//!
//! hooks.do_action("save_post", &[]).unwrap();
//! assert!(cache.get(&key, false).is_none());
//! ```

mod backend;
mod binding;
mod group;
mod key;
mod layered;
mod port;

pub use backend::{CacheEntry, MemoryObjectCache, NullObjectCache, ObjectCache, MAIN_SITE_ID};
pub use binding::{CacheActor, CacheDeletor};
pub use group::GroupCache;
pub use key::{derive_key, CacheKey, CallableId, KeyFragment, KEY_SEPARATOR};
pub use layered::LayeredObjectCache;
pub use port::{ActorCallback, Cache, CacheExt, DEFAULT_GROUP};
