use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

/// Run `f` with the guarded value, logging lock acquisition and release.
///
/// Guarded state is consistent at every unlock point, so a poisoned lock is
/// recovered rather than propagated.
pub(crate) fn with_lock<T, F, R>(name: &str, lock: &Mutex<T>, f: F) -> R
where
    F: FnOnce(MutexGuard<'_, T>) -> R,
{
    let inner = lock_named(name, lock);
    let res = f(inner);
    tracing::trace!(%name, "releasing lock");
    res
}

pub(crate) fn lock_named<'a, T>(name: &str, lock: &'a Mutex<T>) -> MutexGuard<'a, T> {
    tracing::trace!(%name, "taking lock");
    lock.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn wait<'a, T>(cond: &Condvar, guard: MutexGuard<'a, T>) -> MutexGuard<'a, T> {
    cond.wait(guard).unwrap_or_else(PoisonError::into_inner)
}
