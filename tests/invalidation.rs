//! Action-bound deletion and callbacks.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use mlp_cache::cache::{Cache, CacheExt, GroupCache, MemoryObjectCache};
use mlp_cache::fragments;
use mlp_cache::hooks::{HookManager, DEFAULT_PRIORITY};
use mlp_cache::Error;
use serde_json::{json, Value};

fn cache() -> (GroupCache, Arc<HookManager>) {
    let hooks = Arc::new(HookManager::new());
    let cache = GroupCache::new("mlp", Arc::new(MemoryObjectCache::new()), &hooks);
    (cache, hooks)
}

#[test]
fn test_deletion_action_removes_registered_key() {
    let (cache, hooks) = cache();
    let key = fragments![42, "en"];
    cache.set(json!("cached"), &key, Duration::ZERO);
    cache.register_deletion_action(&["save_post"], &key);

    // the action carries no fragments of its own
    hooks.do_action("save_post", &[json!(99)]).expect("dispatch");
    assert_eq!(cache.get(&key, false), None);
}

#[test]
fn test_deletion_action_binds_every_event() {
    let (cache, hooks) = cache();
    let key = fragments![1];
    cache.register_deletion_action(&["save_post", "delete_post"], &key);
    assert_eq!(hooks.count("save_post"), 1);
    assert_eq!(hooks.count("delete_post"), 1);

    cache.set(json!(1), &key, Duration::ZERO);
    hooks.do_action("delete_post", &[]).expect("dispatch");
    assert_eq!(cache.get(&key, false), None);

    cache.set(json!(2), &key, Duration::ZERO);
    hooks.do_action("save_post", &[]).expect("dispatch");
    assert_eq!(cache.get(&key, false), None);
}

#[test]
fn test_deleting_missing_entry_is_not_an_error() {
    let (cache, hooks) = cache();
    cache.register_deletion_action(&["save_post"], &fragments!["never set"]);
    assert!(hooks.do_action("save_post", &[]).is_ok());
}

#[test]
fn test_deletion_leaves_other_keys() {
    let (cache, hooks) = cache();
    cache.set(json!(1), &fragments![1], Duration::ZERO);
    cache.set(json!(2), &fragments![2], Duration::ZERO);
    cache.register_deletion_action(&["save_post"], &fragments![1]);
    hooks.do_action("save_post", &[]).expect("dispatch");
    assert_eq!(cache.get(&fragments![2], false), Some(json!(2)));
}

#[test]
fn test_callback_receives_cache_and_arguments() {
    let (cache, hooks) = cache();
    let seen: Arc<Mutex<Vec<Value>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    cache.on_actions(&["switch_blog"], move |cache: &dyn Cache, args: &[Value]| {
        sink.lock().expect("lock").extend(args.iter().cloned());
        cache.set(json!("touched"), &fragments!["by_callback"], Duration::ZERO);
        Ok(())
    });

    hooks.do_action("switch_blog", &[json!(3), json!(1)]).expect("dispatch");
    assert_eq!(*seen.lock().expect("lock"), vec![json!(3), json!(1)]);
    assert_eq!(cache.get(&fragments!["by_callback"], false), Some(json!("touched")));
}

#[test]
fn test_callback_failure_reaches_dispatcher() {
    let (cache, hooks) = cache();
    let later = Arc::new(AtomicUsize::new(0));
    cache.on_actions(&["save_post"], |_: &dyn Cache, _: &[Value]| Err(Error::hook("save_post", "boom")));
    let counter = later.clone();
    hooks.add_action_fn("save_post", "later", DEFAULT_PRIORITY + 1, move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    let err = hooks.do_action("save_post", &[]).expect_err("callback error propagates");
    assert!(matches!(err, Error::Hook { .. }));
    assert_eq!(later.load(Ordering::SeqCst), 0);
}

#[test]
fn test_registration_after_dispatcher_drop_is_ignored() {
    let (cache, hooks) = cache();
    drop(hooks);
    cache.register_deletion_action(&["save_post"], &fragments![1]);
    cache.set(json!(1), &fragments![1], Duration::ZERO);
    assert_eq!(cache.get(&fragments![1], false), Some(json!(1)));
}
