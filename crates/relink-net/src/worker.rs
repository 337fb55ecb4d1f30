//! Reconnecting worker thread shared by the Tx and Rx sides.
//!
//! A [`Worker`] runs a dedicated thread around one [`WorkUnit`]. Each pass of
//! its loop:
//!
//! 1. exits with [`WorkerState::Stopped`] if a stop was requested;
//! 2. while the connection is down and autoconnect is on, attempts a
//!    reconnect and pauses for the reconnect interval after each attempt;
//! 3. runs exactly one unit of work;
//! 4. pauses for the failure back-off if that unit reported failure.
//!
//! Every pause is a wait on the worker's [`CancellationToken`], so
//! [`Worker::stop`] interrupts it at once. Blocking I/O inside a unit is not
//! interrupted; a unit should bound it with a timeout.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use relink_net::{ConnectionState, Worker, WorkUnit};
//! use relink_core::CancellationToken;
//!
//! struct Heartbeat;
//!
//! impl WorkUnit for Heartbeat {
//!     fn name(&self) -> &'static str {
//!         "heartbeat"
//!     }
//!
//!     fn run_once(&mut self, connection: &ConnectionState, stop: &CancellationToken) -> bool {
//!         stop.wait_timeout(std::time::Duration::from_secs(5));
//!         connection.is_connected()
//!     }
//! }
//!
//! let connection = Arc::new(ConnectionState::with_address("127.0.0.1", 5025));
//! let worker = Worker::spawn(Heartbeat, connection)?;
//! // ...
//! worker.stop_and_join();
//! # Ok::<(), relink_net::NetworkError>(())
//! ```

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use relink_core::CancellationToken;
use relink_core::logging::span_names;
use tracing::{debug, trace};

use crate::connection::ConnectionState;
use crate::error::Result;
use crate::state::WorkerState;
use crate::targets;

/// One component-specific step of a worker loop.
pub trait WorkUnit: Send + 'static {
    /// Short name used for the thread and in log output.
    fn name(&self) -> &'static str;

    /// Perform one unit of work.
    ///
    /// Called once per loop pass, whether or not the connection is up.
    /// Returning `false` reports failure and makes the loop back off before
    /// the next pass. Pauses should wait on `stop` rather than sleep.
    fn run_once(&mut self, connection: &ConnectionState, stop: &CancellationToken) -> bool;
}

/// State shared between the worker handle and its thread.
struct Shared {
    state: Mutex<WorkerState>,
    changed: Condvar,
}

impl Shared {
    fn set(&self, state: WorkerState) {
        let mut current = self.state.lock();
        if *current != state {
            trace!(target: targets::WORKER, "{} -> {}", *current, state);
            *current = state;
            self.changed.notify_all();
        }
    }
}

/// A dedicated thread running a reconnect loop around a [`WorkUnit`].
///
/// Workers do not own the connection; they share it with any other worker
/// built on the same `Arc<ConnectionState>`. A worker runs until stopped and
/// is never restarted. Dropping the handle requests a stop but does not wait
/// for the thread.
pub struct Worker {
    name: &'static str,
    connection: Arc<ConnectionState>,
    stop: CancellationToken,
    shared: Arc<Shared>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Worker {
    /// Start a worker thread for `unit` on the given connection.
    pub fn spawn<U: WorkUnit>(unit: U, connection: Arc<ConnectionState>) -> Result<Self> {
        let name = unit.name();
        let stop = CancellationToken::new();
        let shared = Arc::new(Shared {
            state: Mutex::new(WorkerState::default()),
            changed: Condvar::new(),
        });

        let thread_connection = connection.clone();
        let thread_stop = stop.clone();
        let thread_shared = shared.clone();

        let handle = thread::Builder::new()
            .name(format!("relink-{name}"))
            .spawn(move || {
                run_loop(unit, &thread_connection, &thread_stop, &thread_shared);
                thread_shared.set(WorkerState::Stopped);
            })?;

        Ok(Self {
            name,
            connection,
            stop,
            shared,
            handle: Mutex::new(Some(handle)),
        })
    }

    /// The unit's name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The connection this worker operates on.
    pub fn connection(&self) -> &Arc<ConnectionState> {
        &self.connection
    }

    /// Current phase of the loop.
    pub fn state(&self) -> WorkerState {
        *self.shared.state.lock()
    }

    /// Check if the worker thread is still running.
    pub fn is_running(&self) -> bool {
        !self.state().is_stopped()
    }

    /// Request the worker to stop.
    ///
    /// Non-blocking. Pending pauses end immediately; a blocking call in
    /// progress inside the unit finishes first.
    pub fn stop(&self) {
        if !self.stop.is_cancelled() {
            debug!(target: targets::WORKER, "{}: stop requested", self.name);
        }
        self.stop.cancel();
    }

    /// Wait for the worker thread to finish.
    ///
    /// Returns `true` if the thread was joined, `false` if it was already
    /// joined or panicked.
    pub fn join(&self) -> bool {
        let handle = self.handle.lock().take();
        match handle {
            Some(h) => h.join().is_ok(),
            None => false,
        }
    }

    /// Stop the worker and wait for it to finish.
    pub fn stop_and_join(&self) -> bool {
        self.stop();
        self.join()
    }

    /// Wait until the worker reaches `state`, up to `timeout`.
    ///
    /// Returns whether the state was reached.
    pub fn wait_for_state(&self, state: WorkerState, timeout: Duration) -> bool {
        let mut current = self.shared.state.lock();
        let result = self
            .shared
            .changed
            .wait_while_for(&mut current, |s| *s != state, timeout);
        !result.timed_out() || *current == state
    }

    /// Wait for the worker to stop, up to `timeout`.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        self.wait_for_state(WorkerState::Stopped, timeout)
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.stop();
        // Joining is left to the owner.
    }
}

impl std::fmt::Debug for Worker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker")
            .field("name", &self.name)
            .field("address", &self.connection.address())
            .field("state", &self.state())
            .finish()
    }
}

/// The reconnect loop.
fn run_loop<U: WorkUnit>(
    mut unit: U,
    connection: &ConnectionState,
    stop: &CancellationToken,
    shared: &Shared,
) {
    let span = tracing::debug_span!(span_names::WORKER, worker = unit.name());
    let _enter = span.enter();
    let reconnect = &connection.config().reconnect;

    debug!(target: targets::WORKER, "{}: running against {}", unit.name(), connection.address());

    while !stop.is_cancelled() {
        while !connection.is_connected() && connection.autoconnect() && !stop.is_cancelled() {
            shared.set(WorkerState::Reconnecting);
            connection.reconnect();
            if stop.wait_timeout(reconnect.interval) {
                break;
            }
        }
        if stop.is_cancelled() {
            break;
        }

        shared.set(if connection.is_connected() {
            WorkerState::Connected
        } else {
            WorkerState::Disconnected
        });

        if !unit.run_once(connection, stop) {
            if !connection.is_connected() {
                shared.set(WorkerState::Disconnected);
            }
            stop.wait_timeout(reconnect.failure_backoff);
        }
    }

    debug!(target: targets::WORKER, "{}: stopped", unit.name());
}
