//! Hook system.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde_json::Value;
use tracing::debug;

use crate::utils::lock::{rw_read, rw_write};
use crate::Result;

const SOURCE: &str = "hooks::manager";

/// Priority used when a listener does not ask for one.
pub const DEFAULT_PRIORITY: i32 = 10;

/// A listener attached to a named action.
pub trait Action: Send + Sync {
    fn call(&self, args: &[Value]) -> Result<()>;
}

pub struct Hook {
    pub name: String,
    pub priority: i32,
    callback: Arc<dyn Action>,
}

impl Hook {
    pub fn new<A: Action + 'static>(name: impl Into<String>, priority: i32, callback: A) -> Self {
        Self::from_arc(name, priority, Arc::new(callback))
    }

    /// Wraps an already shared listener, so one listener can sit on several actions.
    pub fn from_arc(name: impl Into<String>, priority: i32, callback: Arc<dyn Action>) -> Self {
        Self { name: name.into(), priority, callback }
    }

    pub fn call(&self, args: &[Value]) -> Result<()> {
        self.callback.call(args)
    }
}

pub struct FnAction<F> {
    func: F,
}

impl<F> FnAction<F>
where
    F: Fn(&[Value]) -> Result<()> + Send + Sync,
{
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F> Action for FnAction<F>
where
    F: Fn(&[Value]) -> Result<()> + Send + Sync,
{
    fn call(&self, args: &[Value]) -> Result<()> {
        (self.func)(args)
    }
}

/// Synchronous action dispatcher.
///
/// Listeners for one action run in ascending priority; listeners sharing a
/// priority run in registration order. Dispatch stops at the first failing
/// listener and hands its error back to whoever fired the action.
pub struct HookManager {
    hooks: RwLock<HashMap<String, Vec<Hook>>>,
    fired: RwLock<HashMap<String, usize>>,
}

impl HookManager {
    pub fn new() -> Self {
        Self {
            hooks: RwLock::new(HashMap::new()),
            fired: RwLock::new(HashMap::new()),
        }
    }

    pub fn add_action(&self, action: &str, hook: Hook) {
        debug!(action, hook = %hook.name, priority = hook.priority, "Action listener added");
        let mut hooks = rw_write(&self.hooks, SOURCE, "add_action");
        let entry = hooks.entry(action.to_string()).or_default();
        entry.push(hook);
        // stable: equal priorities keep registration order
        entry.sort_by_key(|h| h.priority);
    }

    pub fn add_action_fn<F>(&self, action: &str, name: impl Into<String>, priority: i32, func: F)
    where
        F: Fn(&[Value]) -> Result<()> + Send + Sync + 'static,
    {
        self.add_action(action, Hook::new(name, priority, FnAction::new(func)));
    }

    pub fn remove_action(&self, action: &str, name: &str) -> bool {
        let mut hooks = rw_write(&self.hooks, SOURCE, "remove_action");
        if let Some(entry) = hooks.get_mut(action) {
            let len = entry.len();
            entry.retain(|h| h.name != name);
            return entry.len() < len;
        }
        false
    }

    /// Fires `action`, handing `args` to every listener.
    pub fn do_action(&self, action: &str, args: &[Value]) -> Result<()> {
        *rw_write(&self.fired, SOURCE, "do_action").entry(action.to_string()).or_insert(0) += 1;

        // Snapshot so listeners may add listeners without deadlocking.
        let callbacks: Vec<Arc<dyn Action>> = {
            let hooks = rw_read(&self.hooks, SOURCE, "do_action");
            hooks
                .get(action)
                .map(|v| v.iter().map(|h| h.callback.clone()).collect())
                .unwrap_or_default()
        };
        debug!(action, listeners = callbacks.len(), "Dispatching action");
        for cb in callbacks {
            cb.call(args)?;
        }
        Ok(())
    }

    /// Number of times `action` has been fired.
    pub fn did_action(&self, action: &str) -> usize {
        rw_read(&self.fired, SOURCE, "did_action").get(action).copied().unwrap_or(0)
    }

    pub fn has_action(&self, action: &str) -> bool {
        self.count(action) > 0
    }

    pub fn count(&self, action: &str) -> usize {
        rw_read(&self.hooks, SOURCE, "count").get(action).map(|v| v.len()).unwrap_or(0)
    }

    pub fn clear(&self) {
        rw_write(&self.hooks, SOURCE, "clear").clear();
        rw_write(&self.fired, SOURCE, "clear").clear();
    }
}

impl Default for HookManager {
    fn default() -> Self {
        Self::new()
    }
}
