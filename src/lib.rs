//! # mlp-cache
//!
//! Fragment-keyed caching for a multisite translation network, with cache
//! entries invalidated by named actions.
//!
//! ## Overview
//!
//! Application code talks to the [`cache::Cache`] port. A cache derives each
//! entry's key from a base key plus a list of fragments, stores JSON payloads
//! in a host object cache, and can bind deletion or arbitrary callbacks to
//! actions fired through the [`hooks::HookManager`]. Site and content relation
//! stores and the post trasher are built on top of it.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::time::Duration;
//! use mlp_cache::prelude::*;
//! use mlp_cache::fragments;
//!
//! let services = Services::new(CacheConfig::default()).unwrap();
//! let cache = services.cache("post_translations");
//!
//! let key = fragments![42, "en"];
//! cache.set_as(&vec![7, 9], &key, Duration::ZERO);
//! cache.register_deletion_action(&["save_post"], &key);
//!
//! services.hooks().do_action("save_post", &[]).unwrap();
//! assert_eq!(cache.get_as::<Vec<u64>>(&key, false), None);
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`cache`] | Key derivation, the cache port, backends and action bindings |
//! | [`hooks`] | In-process action dispatcher |
//! | [`relations`] | Site relations and translation groups |
//! | [`trasher`] | Trashing translations together with their post |
//! | [`config`] | Cache configuration from defaults, environment or YAML |
//! | [`bootstrap`] | Wires the services together |
//! | [`logging`] | Tracing subscriber setup |

pub mod bootstrap;
pub mod cache;
pub mod config;
pub mod hooks;
pub mod logging;
pub mod relations;
pub mod trasher;

mod utils;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext};

/// Numeric id of a site in the network.
pub type SiteId = u64;

/// Numeric id of a post or term on one site.
pub type ContentId = u64;

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Commonly used types.
pub mod prelude {
    pub use crate::bootstrap::Services;
    pub use crate::cache::{Cache, CacheExt, CacheKey, GroupCache, KeyFragment, ObjectCache};
    pub use crate::config::CacheConfig;
    pub use crate::hooks::{Action, HookManager, DEFAULT_PRIORITY};
    pub use crate::relations::{ContentKind, ContentRelations, SiteRelations};
    pub use crate::{ContentId, Error, Result, SiteId};
}
