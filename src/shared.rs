use std::sync::{Mutex, MutexGuard, PoisonError};

/// Locks state shared between the event path and the scheduler worker.
///
/// A panic on the other side leaves the data consistent enough to keep
/// dispatching taps, so poisoning is ignored.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
