//! Acquisition-complete signal

use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;

use crate::error::CorrelatorError;

/// Flag raised by the terminal segment and awaited by the foreground
///
/// Clones share the same flag.
#[derive(Debug, Clone, Default)]
pub struct CompletionSignal {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl CompletionSignal {
    /// New, lowered signal
    pub fn new() -> Self {
        Self::default()
    }

    /// Lower the flag before a new acquisition starts
    pub fn clear(&self) {
        let (lock, _) = &*self.inner;
        *lock.lock().unwrap_or_else(PoisonError::into_inner) = false;
    }

    /// Raise the flag and wake any waiter
    pub fn notify(&self) {
        let (lock, cvar) = &*self.inner;
        *lock.lock().unwrap_or_else(PoisonError::into_inner) = true;
        cvar.notify_all();
    }

    /// Whether the flag is raised
    pub fn is_complete(&self) -> bool {
        let (lock, _) = &*self.inner;
        *lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Block until the flag is raised or `timeout` expires
    ///
    /// # Errors
    ///
    /// Returns `CorrelatorError::AcquisitionTimeout` if the flag is still lowered
    /// after `timeout`.
    pub fn wait(&self, timeout: Duration) -> Result<(), CorrelatorError> {
        let (lock, cvar) = &*self.inner;
        let guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        let (guard, _) = cvar
            .wait_timeout_while(guard, timeout, |complete| !*complete)
            .unwrap_or_else(PoisonError::into_inner);

        if *guard {
            Ok(())
        } else {
            Err(CorrelatorError::AcquisitionTimeout(timeout))
        }
    }
}
