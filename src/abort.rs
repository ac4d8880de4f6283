//! Cooperative cancellation for factory joins

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Fires an [`AbortSignal`]
///
/// # Examples
///
/// ```rust
/// use resultex::AbortController;
///
/// let controller = AbortController::new();
/// let signal = controller.signal();
/// assert!(!signal.is_aborted());
///
/// controller.abort();
/// assert!(signal.is_aborted());
/// ```
#[derive(Debug, Clone, Default)]
pub struct AbortController {
    aborted: Arc<AtomicBool>,
}

impl AbortController {
    /// Create a controller whose signal has not fired
    pub fn new() -> Self {
        Self::default()
    }

    /// A signal observing this controller
    pub fn signal(&self) -> AbortSignal {
        AbortSignal {
            aborted: Arc::clone(&self.aborted),
        }
    }

    /// Fire the signal. Firing twice is harmless.
    pub fn abort(&self) {
        if !self.aborted.swap(true, Ordering::SeqCst) {
            tracing::debug!("abort signal fired");
        }
    }
}

/// Read side of an [`AbortController`]
#[derive(Debug, Clone)]
pub struct AbortSignal {
    aborted: Arc<AtomicBool>,
}

impl AbortSignal {
    /// Whether the controller has fired
    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }
}
