//! Client facade bundling one connection with its Tx and Rx workers.

use std::sync::Arc;

use tracing::debug;

use crate::config::ClientConfig;
use crate::connection::ConnectionState;
use crate::error::Result;
use crate::payload::Payload;
use crate::queue::InboundQueue;
use crate::rx::RxWorker;
use crate::state::WorkerState;
use crate::targets;
use crate::tx::TxWorker;

/// A resilient TCP client.
///
/// Owns one [`ConnectionState`], one [`TxWorker`] and one [`RxWorker`]
/// sharing it, and the [`InboundQueue`] received data lands in. With the
/// default configuration the workers connect on their own as soon as the
/// client starts and keep reconnecting until [`disconnect`] is called.
///
/// [`shutdown`] (or dropping the client) stops both workers and waits for
/// both threads before the connection state is released.
///
/// # Example
///
/// ```no_run
/// use relink_net::{ClientConfig, TcpClient};
/// use std::time::Duration;
///
/// let client = TcpClient::start(ClientConfig::new("192.168.1.20", 5025))?;
///
/// if !client.send("*IDN?\n")? {
///     eprintln!("not connected: {:?}", client.last_error());
/// }
///
/// while let Some(chunk) = client.inbound().pop_timeout(Duration::from_secs(1)) {
///     print!("{}", String::from_utf8_lossy(&chunk));
/// }
///
/// client.shutdown();
/// # Ok::<(), relink_net::NetworkError>(())
/// ```
///
/// [`disconnect`]: Self::disconnect
/// [`shutdown`]: Self::shutdown
#[derive(Debug)]
pub struct TcpClient {
    connection: Arc<ConnectionState>,
    inbound: InboundQueue,
    tx: TxWorker,
    rx: RxWorker,
}

impl TcpClient {
    /// Start a client with a fresh inbound queue.
    pub fn start(config: ClientConfig) -> Result<Self> {
        Self::with_queue(config, InboundQueue::new())
    }

    /// Start a client that pushes received data onto `inbound`.
    ///
    /// Fails with [`NetworkError::InvalidConfig`] if `config` does not
    /// pass [`ClientConfig::validate`].
    ///
    /// [`NetworkError::InvalidConfig`]: crate::NetworkError::InvalidConfig
    pub fn with_queue(config: ClientConfig, inbound: InboundQueue) -> Result<Self> {
        config.validate()?;
        Self::with_connection(Arc::new(ConnectionState::new(config)), inbound)
    }

    /// Start workers on an existing connection state.
    pub fn with_connection(connection: Arc<ConnectionState>, inbound: InboundQueue) -> Result<Self> {
        let tx = TxWorker::new(connection.clone())?;
        let rx = RxWorker::new(connection.clone(), Some(inbound.clone()))?;
        debug!(target: targets::WORKER, "Client started for {}", connection.address());
        Ok(Self {
            connection,
            inbound,
            tx,
            rx,
        })
    }

    /// Connect manually and turn autoconnect on.
    pub fn connect(&self) -> bool {
        self.connection.connect()
    }

    /// Disconnect and turn autoconnect off.
    pub fn disconnect(&self) {
        self.connection.disconnect();
    }

    /// Send a payload. See [`TxWorker::send`].
    pub fn send(&self, data: impl Into<Payload>) -> Result<bool> {
        self.tx.send(data)
    }

    /// Check if the connection is up.
    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    /// Reason for the last failed connect or lost connection.
    pub fn last_error(&self) -> Option<String> {
        self.connection.last_error()
    }

    /// The queue received chunks are pushed to.
    pub fn inbound(&self) -> &InboundQueue {
        &self.inbound
    }

    /// The shared connection state.
    pub fn connection(&self) -> &Arc<ConnectionState> {
        &self.connection
    }

    /// Phase of the Tx worker.
    pub fn tx_state(&self) -> WorkerState {
        self.tx.state()
    }

    /// Phase of the Rx worker.
    pub fn rx_state(&self) -> WorkerState {
        self.rx.state()
    }

    /// Get the full address (host:port).
    pub fn address(&self) -> String {
        self.connection.address()
    }

    /// Stop both workers and wait for both threads.
    ///
    /// Returns `true` if both threads were joined by this call.
    pub fn shutdown(&self) -> bool {
        self.tx.stop();
        self.rx.stop();
        let tx_joined = self.tx.join();
        let rx_joined = self.rx.join();
        tx_joined && rx_joined
    }
}

impl Drop for TcpClient {
    fn drop(&mut self) {
        self.shutdown();
    }
}
