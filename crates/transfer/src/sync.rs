use std::sync::{Mutex, MutexGuard};

/// Locks `lock`, recovering the inner state if a previous holder panicked.
pub(crate) fn lock_unpoisoned<'a, T>(lock: &'a Mutex<T>, lock_name: &'static str) -> MutexGuard<'a, T> {
    match lock.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::warn!(lock = lock_name, "mutex poisoned; continuing with inner state");
            poisoned.into_inner()
        }
    }
}
