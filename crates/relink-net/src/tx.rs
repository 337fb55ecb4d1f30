//! Transmit side of the client.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use relink_core::CancellationToken;
use tracing::{debug, trace};

use crate::connection::ConnectionState;
use crate::error::Result;
use crate::payload::Payload;
use crate::state::WorkerState;
use crate::targets;
use crate::worker::{WorkUnit, Worker};

/// Tx has no queued work of its own; its loop only keeps the connection up.
struct Idle {
    interval: Duration,
}

impl WorkUnit for Idle {
    fn name(&self) -> &'static str {
        "tx"
    }

    fn run_once(&mut self, _connection: &ConnectionState, stop: &CancellationToken) -> bool {
        stop.wait_timeout(self.interval);
        true
    }
}

/// Worker that owns the transmit side of a connection.
///
/// Data is written synchronously by [`send`](Self::send) on the caller's
/// thread. The worker thread itself just idles, keeping the reconnect loop
/// turning so a dropped connection is re-established even when nothing is
/// being sent.
#[derive(Debug)]
pub struct TxWorker {
    worker: Worker,
    /// Serializes concurrent `send()` calls so payloads never interleave.
    write_lock: Mutex<()>,
}

impl TxWorker {
    /// Start a Tx worker on a shared connection.
    pub fn new(connection: Arc<ConnectionState>) -> Result<Self> {
        let unit = Idle {
            interval: connection.config().tx_idle_interval,
        };
        Ok(Self {
            worker: Worker::spawn(unit, connection)?,
            write_lock: Mutex::new(()),
        })
    }

    /// Start a Tx worker with a connection of its own to `host:port`.
    pub fn with_address(host: impl Into<String>, port: u16) -> Result<Self> {
        Self::new(Arc::new(ConnectionState::with_address(host, port)))
    }

    /// Send a payload to the peer.
    ///
    /// Returns `Ok(true)` once every byte was written and `Ok(false)` if the
    /// payload was dropped: either the connection is down, or the write
    /// failed, in which case the connection is marked lost and the workers
    /// reconnect. Delivery is only known through this return value.
    ///
    /// Text that is not pure ASCII is a caller bug and fails immediately
    /// with [`NetworkError::InvalidPayload`] without touching the connection.
    ///
    /// [`NetworkError::InvalidPayload`]: crate::NetworkError::InvalidPayload
    pub fn send(&self, data: impl Into<Payload>) -> Result<bool> {
        let bytes = data.into().into_bytes()?;
        let connection = self.worker.connection();

        let Some(lease) = connection.lease() else {
            debug!(
                target: targets::TX,
                "Could not send {} bytes: not connected",
                bytes.len()
            );
            return Ok(false);
        };

        let _guard = self.write_lock.lock();
        debug!(target: targets::TX, "Sending {} bytes", bytes.len());
        trace!(target: targets::TX, "Sending data: {:?}", String::from_utf8_lossy(&bytes));

        let mut stream = lease.stream();
        match stream.write_all(&bytes) {
            Ok(()) => Ok(true),
            Err(e) => {
                debug!(target: targets::TX, "Send failed: {}", e);
                connection.mark_lost(lease.generation(), format!("send failed: {e}"));
                Ok(false)
            }
        }
    }

    /// Connect manually and turn autoconnect on.
    pub fn connect(&self) -> bool {
        self.worker.connection().connect()
    }

    /// Disconnect and turn autoconnect off.
    pub fn disconnect(&self) {
        self.worker.connection().disconnect();
    }

    /// Check if the shared connection is up.
    pub fn is_connected(&self) -> bool {
        self.worker.connection().is_connected()
    }

    /// The shared connection.
    pub fn connection(&self) -> &Arc<ConnectionState> {
        self.worker.connection()
    }

    /// Current phase of the worker loop.
    pub fn state(&self) -> WorkerState {
        self.worker.state()
    }

    /// The underlying worker handle.
    pub fn worker(&self) -> &Worker {
        &self.worker
    }

    /// Request the worker to stop.
    pub fn stop(&self) {
        self.worker.stop();
    }

    /// Wait for the worker thread to finish.
    pub fn join(&self) -> bool {
        self.worker.join()
    }

    /// Stop the worker and wait for it to finish.
    pub fn stop_and_join(&self) -> bool {
        self.worker.stop_and_join()
    }
}
