//! Action hooks: named extension points fired synchronously during a request.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`HookManager`] | Registry and dispatcher for named actions |
//! | [`Action`] | Trait implemented by every listener |
//! | [`Hook`] | A named, prioritised listener entry |
//! | [`FnAction`] | Adapter turning a closure into an [`Action`] |
//!
//! ```rust
//! use mlp_cache::hooks::{HookManager, DEFAULT_PRIORITY};
//!
//! let hooks = HookManager::new();
//! hooks.add_action_fn("save_post", "log", DEFAULT_PRIORITY, |args| {
//!     assert_eq!(args.len(), 1);
//!     Ok(())
//! });
//! hooks.do_action("save_post", &[serde_json::json!(42)]).unwrap();
//! assert_eq!(hooks.did_action("save_post"), 1);
//! ```

mod manager;

pub use manager::{Action, FnAction, Hook, HookManager, DEFAULT_PRIORITY};
