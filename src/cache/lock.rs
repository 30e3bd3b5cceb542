use std::sync::{Mutex, MutexGuard};

use tracing::warn;

/// Lock the store mutex, recovering the guard if a previous holder panicked.
///
/// Cache state is disposable, so a poisoned lock is never fatal: the worst
/// outcome is a stale entry that the next invalidation or expiry removes.
pub(crate) fn mutex_lock<'a, T>(
    lock: &'a Mutex<T>,
    target: &'static str,
    op: &'static str,
) -> MutexGuard<'a, T> {
    match lock.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!(
                op,
                target_module = target,
                lock_kind = "mutex.lock",
                result = "poisoned_recovered",
                "Recovered from poisoned cache lock"
            );
            lock.clear_poison();
            poisoned.into_inner()
        }
    }
}
