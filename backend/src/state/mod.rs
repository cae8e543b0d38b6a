pub mod carousel;
pub mod gallery;
pub mod history;
pub mod session;

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Guards in this crate are never held across an `.await`, so a poisoned
/// lock only means a panic elsewhere; the data itself is still consistent.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
