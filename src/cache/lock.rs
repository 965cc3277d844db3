use std::sync::{Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::warn;

// A panic while a cache lock is held leaves either the previous snapshot or the
// newly swapped one in place, both complete, so poisoning is always recoverable.
fn recover<G>(
    poisoned: PoisonError<G>,
    cache: &'static str,
    lock_kind: &'static str,
    op: &'static str,
) -> G {
    warn!(
        op,
        cache,
        lock_kind,
        result = "poisoned_recovered",
        "Recovered from poisoned cache lock"
    );
    poisoned.into_inner()
}

pub(crate) fn rw_read<'a, T>(
    lock: &'a RwLock<T>,
    cache: &'static str,
    op: &'static str,
) -> RwLockReadGuard<'a, T> {
    lock.read()
        .unwrap_or_else(|poisoned| recover(poisoned, cache, "rwlock.read", op))
}

pub(crate) fn rw_write<'a, T>(
    lock: &'a RwLock<T>,
    cache: &'static str,
    op: &'static str,
) -> RwLockWriteGuard<'a, T> {
    lock.write()
        .unwrap_or_else(|poisoned| recover(poisoned, cache, "rwlock.write", op))
}

pub(crate) fn mutex_lock<'a, T>(
    lock: &'a Mutex<T>,
    cache: &'static str,
    op: &'static str,
) -> MutexGuard<'a, T> {
    lock.lock()
        .unwrap_or_else(|poisoned| recover(poisoned, cache, "mutex.lock", op))
}
