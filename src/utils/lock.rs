//! Poison-tolerant lock acquisition.
//!
//! A panicking listener must not take the whole cache or dispatcher down with
//! it, so every lock in the crate is acquired through these helpers. A
//! poisoned lock is logged once per acquisition and its data used as is.

use std::sync::{Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::warn;

fn recover<G>(poisoned: PoisonError<G>, owner: &'static str, op: &'static str, access: &'static str) -> G {
    warn!(owner, op, access, "Lock poisoned by a panicking holder; using its data");
    poisoned.into_inner()
}

pub(crate) fn rw_read<'a, T>(lock: &'a RwLock<T>, owner: &'static str, op: &'static str) -> RwLockReadGuard<'a, T> {
    lock.read().unwrap_or_else(|e| recover(e, owner, op, "read"))
}

pub(crate) fn rw_write<'a, T>(lock: &'a RwLock<T>, owner: &'static str, op: &'static str) -> RwLockWriteGuard<'a, T> {
    lock.write().unwrap_or_else(|e| recover(e, owner, op, "write"))
}

pub(crate) fn mutex_lock<'a, T>(lock: &'a Mutex<T>, owner: &'static str, op: &'static str) -> MutexGuard<'a, T> {
    lock.lock().unwrap_or_else(|e| recover(e, owner, op, "exclusive"))
}
