//! Cooperative cancellation for long-running worker threads.
//!
//! A [`CancellationToken`] is shared between the thread that owns a worker
//! and the worker loop itself. The loop checks [`is_cancelled`] at its
//! iteration boundaries and uses [`wait_timeout`] instead of
//! `std::thread::sleep` for every pause, so a stop request wakes it
//! immediately rather than after the pause elapses.
//!
//! # Example
//!
//! ```
//! use relink_core::cancel::CancellationToken;
//! use std::time::Duration;
//!
//! let token = CancellationToken::new();
//! let token_clone = token.clone();
//!
//! let handle = std::thread::spawn(move || {
//!     let mut ticks = 0;
//!     // Returns true as soon as the token is cancelled.
//!     while !token_clone.wait_timeout(Duration::from_millis(10)) {
//!         ticks += 1;
//!     }
//!     ticks
//! });
//!
//! token.cancel();
//! let _ticks = handle.join().unwrap();
//! ```
//!
//! [`is_cancelled`]: CancellationToken::is_cancelled
//! [`wait_timeout`]: CancellationToken::wait_timeout

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// A cancellation token for cooperative task cancellation.
///
/// Cloning the token yields another handle to the same flag.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    inner: Arc<CancellationState>,
}

#[derive(Debug)]
struct CancellationState {
    cancelled: AtomicBool,
    condvar: Condvar,
    mutex: Mutex<()>,
}

impl CancellationToken {
    /// Create a new, non-cancelled token.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(CancellationState {
                cancelled: AtomicBool::new(false),
                condvar: Condvar::new(),
                mutex: Mutex::new(()),
            }),
        }
    }

    /// Check if cancellation has been requested.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// Request cancellation and wake every thread blocked in a wait.
    ///
    /// Calling this more than once has no further effect.
    pub fn cancel(&self) {
        // Hold the lock while flipping the flag to avoid a lost wakeup.
        let _guard = self.inner.mutex.lock();
        if !self.inner.cancelled.swap(true, Ordering::AcqRel) {
            self.inner.condvar.notify_all();
        }
    }

    /// Block for at most `timeout`, returning early if the token is cancelled.
    ///
    /// Returns `true` if the token is cancelled when the wait ends.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut guard = self.inner.mutex.lock();
        while !self.is_cancelled() {
            if self
                .inner
                .condvar
                .wait_until(&mut guard, deadline)
                .timed_out()
            {
                break;
            }
        }
        self.is_cancelled()
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}
