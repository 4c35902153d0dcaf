//! Round-trip and conditional-write behavior of the cache port.

use std::sync::Arc;
use std::time::Duration;

use mlp_cache::cache::{derive_key, Cache, CacheExt, GroupCache, KeyFragment, MemoryObjectCache, NullObjectCache};
use mlp_cache::fragments;
use mlp_cache::hooks::HookManager;
use serde::{Deserialize, Serialize};
use serde_json::json;

fn cache() -> (GroupCache, Arc<HookManager>) {
    let hooks = Arc::new(HookManager::new());
    let cache = GroupCache::new("mlp", Arc::new(MemoryObjectCache::new()), &hooks);
    (cache, hooks)
}

#[test]
fn test_key_scenario() {
    let first = derive_key("mlp", &fragments![42, "en", None::<i64>]);
    let again = derive_key("mlp", &fragments![42, "en", None::<i64>]);
    let swapped = derive_key("mlp", &fragments!["en", 42, None::<i64>]);
    assert_eq!(first, again);
    assert_ne!(first, swapped);
    assert_eq!(first.as_str(), "mlp|42|en|NULL");
}

#[test]
fn test_composite_fragments_hash_by_value() {
    let a = KeyFragment::composite(&json!({"b": 2, "a": 1}));
    let b = KeyFragment::composite(&json!({"a": 1, "b": 2}));
    let c = KeyFragment::composite(&json!({"a": 1, "b": 3}));
    assert_eq!(derive_key("k", &[a.clone()]), derive_key("k", &[b]));
    assert_ne!(derive_key("k", &[a]), derive_key("k", &[c]));
}

#[test]
fn test_set_then_get_round_trips() {
    let (cache, _hooks) = cache();
    let key = fragments![1, "de"];
    assert!(cache.set(json!({"title": "Hallo"}), &key, Duration::ZERO));
    assert_eq!(cache.get(&key, false), Some(json!({"title": "Hallo"})));
    assert_eq!(cache.get(&key, true), Some(json!({"title": "Hallo"})));
}

#[test]
fn test_stored_false_is_not_a_miss() {
    let (cache, _hooks) = cache();
    let key = fragments!["flag"];
    cache.set(json!(false), &key, Duration::ZERO);
    assert_eq!(cache.get(&key, false), Some(json!(false)));
    assert_eq!(cache.get(&fragments!["other"], false), None);
}

#[test]
fn test_add_keeps_existing_value() {
    let (cache, _hooks) = cache();
    let key = fragments![7];
    cache.set(json!("first"), &key, Duration::ZERO);
    assert!(!cache.add(json!("second"), &key, Duration::ZERO));
    assert_eq!(cache.get(&key, false), Some(json!("first")));
}

#[test]
fn test_replace_without_entry_creates_nothing() {
    let (cache, _hooks) = cache();
    let key = fragments![8];
    assert!(!cache.replace(json!(1), &key, Duration::ZERO));
    assert_eq!(cache.get(&key, false), None);

    cache.set(json!(1), &key, Duration::ZERO);
    assert!(cache.replace(json!(2), &key, Duration::ZERO));
    assert_eq!(cache.get(&key, false), Some(json!(2)));
}

#[test]
fn test_delete_then_get_misses() {
    let (cache, _hooks) = cache();
    let key = fragments![9, true];
    cache.set(json!([1, 2]), &key, Duration::ZERO);
    assert!(cache.delete(&key));
    assert_eq!(cache.get(&key, false), None);
    assert!(!cache.delete(&key));
}

#[test]
fn test_delete_for_key_uses_derived_key() {
    let (cache, _hooks) = cache();
    let key = fragments![3, "fr"];
    cache.set(json!(3), &key, Duration::ZERO);
    let derived = cache.key_for(&key);
    assert!(cache.delete_for_key(derived.as_str()));
    assert_eq!(cache.get(&key, false), None);
}

#[test]
fn test_flush_clears_other_caches_too() {
    let hooks = Arc::new(HookManager::new());
    let backend = Arc::new(MemoryObjectCache::new());
    let posts = GroupCache::new("posts", backend.clone(), &hooks);
    let terms = GroupCache::new("terms", backend, &hooks).with_group("other");
    posts.set(json!(1), &fragments![1], Duration::ZERO);
    terms.set(json!(2), &fragments![1], Duration::ZERO);

    assert!(posts.flush());
    assert_eq!(terms.get(&fragments![1], false), None);
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct Translation {
    site_id: u64,
    post_id: u64,
}

#[test]
fn test_typed_helpers() {
    let (cache, _hooks) = cache();
    let key = fragments![1, 10];
    let stored = Translation { site_id: 2, post_id: 20 };
    assert!(cache.set_as(&stored, &key, Duration::ZERO));
    assert_eq!(cache.get_as::<Translation>(&key, false), Some(stored));

    // wrong shape reads as a miss
    cache.set(json!("nope"), &key, Duration::ZERO);
    assert_eq!(cache.get_as::<Translation>(&key, false), None);

    let mut computed = 0;
    let value: u32 = cache.remember(&fragments!["count"], Duration::ZERO, || {
        computed += 1;
        5
    });
    assert_eq!(value, 5);
    let value: u32 = cache.remember(&fragments!["count"], Duration::ZERO, || 6);
    assert_eq!(value, 5);
    assert_eq!(computed, 1);
}

#[test]
fn test_null_backend_always_misses() {
    let hooks = Arc::new(HookManager::new());
    let cache = GroupCache::new("mlp", Arc::new(NullObjectCache::new()), &hooks);
    assert!(!cache.set(json!(1), &fragments![1], Duration::ZERO));
    assert_eq!(cache.get(&fragments![1], false), None);
    assert!(cache.flush());
}
