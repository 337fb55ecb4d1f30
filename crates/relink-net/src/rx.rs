//! Receive side of the client.

use std::io::{ErrorKind, Read};
use std::sync::Arc;
use std::time::Duration;

use relink_core::CancellationToken;
use tracing::{debug, trace};

use crate::connection::ConnectionState;
use crate::error::Result;
use crate::queue::InboundQueue;
use crate::state::WorkerState;
use crate::targets;
use crate::worker::{WorkUnit, Worker};

/// One timeout-bounded receive per loop pass.
struct Receive {
    queue: Option<InboundQueue>,
    timeout: Duration,
    buffer: Vec<u8>,
}

impl Receive {
    fn new(connection: &ConnectionState, queue: Option<InboundQueue>) -> Self {
        let socket = &connection.config().socket;
        Self {
            queue,
            timeout: socket.read_timeout,
            buffer: vec![0u8; socket.read_buffer_size.max(1)],
        }
    }
}

impl WorkUnit for Receive {
    fn name(&self) -> &'static str {
        "rx"
    }

    fn run_once(&mut self, connection: &ConnectionState, _stop: &CancellationToken) -> bool {
        let Some(lease) = connection.lease() else {
            trace!(target: targets::RX, "Could not receive: not connected");
            return false;
        };
        let generation = lease.generation();
        let mut stream = lease.stream();

        if let Err(e) = stream.set_read_timeout(Some(self.timeout)) {
            connection.mark_lost(generation, format!("receive failed: {e}"));
            return false;
        }

        match stream.read(&mut self.buffer) {
            Ok(0) => {
                debug!(target: targets::RX, "Received 0 bytes: peer closed the connection");
                connection.mark_lost(generation, "peer closed the connection");
                false
            }
            Ok(n) => {
                trace!(target: targets::RX, "Received {} bytes", n);
                let chunk = self.buffer[..n].to_vec();
                let queue = self.queue.as_ref();
                let delivered = connection.with_live(generation, || {
                    if let Some(queue) = queue {
                        queue.push(chunk);
                    }
                });
                if !delivered {
                    debug!(
                        target: targets::RX,
                        "Dropping {} bytes received after the connection was closed",
                        n
                    );
                }
                true
            }
            // Nothing arrived within the timeout; the steady state.
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => true,
            Err(e) if e.kind() == ErrorKind::Interrupted => true,
            Err(e) => {
                debug!(target: targets::RX, "Receive failed: {}", e);
                connection.mark_lost(generation, format!("receive failed: {e}"));
                false
            }
        }
    }
}

/// Worker that continuously drains the connection into an [`InboundQueue`].
///
/// Each pass blocks for at most the configured read timeout (1s by default)
/// and reads at most one buffer's worth (1024 bytes by default). Received
/// chunks are pushed in arrival order. Chunks that arrive after
/// `disconnect()` has closed the connection are dropped.
#[derive(Debug)]
pub struct RxWorker {
    worker: Worker,
    queue: Option<InboundQueue>,
}

impl RxWorker {
    /// Start an Rx worker on a shared connection.
    ///
    /// Without a queue, received data is read and discarded.
    pub fn new(connection: Arc<ConnectionState>, queue: Option<InboundQueue>) -> Result<Self> {
        let unit = Receive::new(&connection, queue.clone());
        Ok(Self {
            worker: Worker::spawn(unit, connection)?,
            queue,
        })
    }

    /// Start an Rx worker with a connection of its own to `host:port`.
    pub fn with_address(
        host: impl Into<String>,
        port: u16,
        queue: Option<InboundQueue>,
    ) -> Result<Self> {
        Self::new(Arc::new(ConnectionState::with_address(host, port)), queue)
    }

    /// The queue received chunks are pushed to, if any.
    pub fn queue(&self) -> Option<&InboundQueue> {
        self.queue.as_ref()
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
