//! Shared connection state for the Tx and Rx workers.
//!
//! [`ConnectionState`] owns the one TCP stream of a client. Both workers hold
//! an `Arc` to it and borrow the stream through a [`Lease`]; all flag and
//! socket updates go through a single mutex, and blocking I/O (connect, read,
//! write) is always done with the mutex released.
//!
//! Every successful connect bumps a generation counter. A lease remembers the
//! generation it was taken from, so a failure observed on an old stream can
//! never tear down the connection that replaced it.

use std::fmt;
use std::io;
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex, MutexGuard};
use relink_core::logging::span_names;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::error::{NetworkError, Result};
use crate::targets;

/// Who asked for a connect attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Origin {
    /// The user called [`ConnectionState::connect`].
    Manual,
    /// A worker's reconnect loop.
    Worker,
}

struct Inner {
    socket: Option<Arc<TcpStream>>,
    connected: bool,
    autoconnect: bool,
    last_error: Option<String>,
    /// An attempt is in flight with the lock released.
    connecting: bool,
    /// Bumped on every successful connect.
    generation: u64,
    /// Bumped on every `disconnect()`; invalidates in-flight attempts.
    epoch: u64,
}

/// A borrowed handle to the live stream.
///
/// Holding a lease keeps the stream object alive but does not keep the
/// connection open: `disconnect()` shuts the stream down underneath it.
#[derive(Clone, Debug)]
pub struct Lease {
    stream: Arc<TcpStream>,
    generation: u64,
}

impl Lease {
    /// The stream. `&TcpStream` implements `Read` and `Write`.
    pub fn stream(&self) -> &TcpStream {
        &self.stream
    }

    /// The connection generation this lease was taken from.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Connectivity flags and the socket for one logical connection.
///
/// Invariant: a socket is held if and only if [`is_connected`] is true.
///
/// `autoconnect` decides whether workers keep trying to reconnect. It starts
/// at [`ReconnectConfig::auto_connect`], is set by [`connect`], and is
/// cleared only by [`disconnect`].
///
/// [`is_connected`]: Self::is_connected
/// [`connect`]: Self::connect
/// [`disconnect`]: Self::disconnect
/// [`ReconnectConfig::auto_connect`]: crate::ReconnectConfig::auto_connect
pub struct ConnectionState {
    config: ClientConfig,
    inner: Mutex<Inner>,
    attempt_finished: Condvar,
}

impl ConnectionState {
    /// Create a disconnected state for the given configuration.
    ///
    /// Values that [`ClientConfig::validate`] rejects are replaced with
    /// their defaults and a warning is logged.
    pub fn new(config: ClientConfig) -> Self {
        let config = match config.validate() {
            Ok(()) => config,
            Err(err) => {
                warn!(target: targets::CONNECTION, "{}; using defaults", err);
                config.repaired()
            }
        };
        let autoconnect = config.reconnect.auto_connect;
        Self {
            config,
            inner: Mutex::new(Inner {
                socket: None,
                connected: false,
                autoconnect,
                last_error: None,
                connecting: false,
                generation: 0,
                epoch: 0,
            }),
            attempt_finished: Condvar::new(),
        }
    }

    /// Create a disconnected state for `host:port` with default settings.
    pub fn with_address(host: impl Into<String>, port: u16) -> Self {
        Self::new(ClientConfig::new(host, port))
    }

    /// The configuration this connection was created with.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Get the host this connection targets.
    pub fn host(&self) -> &str {
        &self.config.host
    }

    /// Get the port this connection targets.
    pub fn port(&self) -> u16 {
        self.config.port
    }

    /// Get the full address (host:port).
    pub fn address(&self) -> String {
        self.config.address()
    }

    /// Check if the connection is up.
    pub fn is_connected(&self) -> bool {
        self.inner.lock().connected
    }

    /// Whether workers should keep trying to reconnect.
    pub fn autoconnect(&self) -> bool {
        self.inner.lock().autoconnect
    }

    /// Human-readable reason for the last failed connect or lost connection.
    pub fn last_error(&self) -> Option<String> {
        self.inner.lock().last_error.clone()
    }

    /// Number of successful connects so far.
    pub fn generation(&self) -> u64 {
        self.inner.lock().generation
    }

    /// Borrow the live stream, or `None` while disconnected.
    pub fn lease(&self) -> Option<Lease> {
        let inner = self.inner.lock();
        inner.socket.as_ref().map(|stream| Lease {
            stream: stream.clone(),
            generation: inner.generation,
        })
    }

    /// Connect to the peer, blocking up to the configured connect timeout.
    ///
    /// Turns autoconnect on, so workers keep the connection up from now on
    /// even if this first attempt fails. Returns whether the connection is
    /// up afterwards. Calling it while already connected does nothing.
    pub fn connect(&self) -> bool {
        self.attempt(Origin::Manual)
    }

    /// Connect attempt made by a worker.
    ///
    /// Unlike [`connect`](Self::connect) this never turns autoconnect on, and
    /// the attempt is abandoned if autoconnect was cleared while it ran.
    pub(crate) fn reconnect(&self) -> bool {
        self.attempt(Origin::Worker)
    }

    fn attempt(&self, origin: Origin) -> bool {
        let mut inner = self.inner.lock();
        if origin == Origin::Manual {
            inner.autoconnect = true;
        }
        loop {
            if inner.connected {
                return true;
            }
            if origin == Origin::Worker && !inner.autoconnect {
                return false;
            }
            if !inner.connecting {
                break;
            }
            // Share the outcome of the attempt already in flight.
            let epoch = inner.epoch;
            while inner.connecting {
                self.attempt_finished.wait(&mut inner);
            }
            if origin == Origin::Worker || inner.epoch == epoch {
                return inner.connected;
            }
            // A disconnect discarded that attempt; a manual connect makes its own.
            inner.autoconnect = true;
        }

        inner.connecting = true;
        let epoch = inner.epoch;
        let result = MutexGuard::unlocked(&mut inner, || self.open_stream());
        inner.connecting = false;
        self.attempt_finished.notify_all();
        self.finish_attempt(&mut inner, epoch, result)
    }

    /// Record the outcome of an attempt started at `epoch`.
    fn finish_attempt(&self, inner: &mut Inner, epoch: u64, result: Result<TcpStream>) -> bool {
        match result {
            Ok(stream) if inner.epoch != epoch => {
                let _ = stream.shutdown(Shutdown::Both);
                debug!(
                    target: targets::CONNECTION,
                    "Discarding connection to {}: disconnect requested during attempt",
                    self.address()
                );
                inner.last_error = Some(format!(
                    "Connection to {} discarded: disconnect requested during attempt",
                    self.address()
                ));
                false
            }
            Ok(stream) => {
                inner.socket = Some(Arc::new(stream));
                inner.connected = true;
                inner.generation += 1;
                inner.last_error = None;
                info!(
                    target: targets::CONNECTION,
                    "Connected to {} (generation {})",
                    self.address(),
                    inner.generation
                );
                true
            }
            Err(err) => {
                debug!(target: targets::CONNECTION, "{}", err);
                inner.connected = false;
                inner.last_error = Some(err.to_string());
                false
            }
        }
    }

    /// Resolve the address and open a configured stream.
    fn open_stream(&self) -> Result<TcpStream> {
        let address = self.address();
        let socket = &self.config.socket;
        let _span = tracing::debug_span!(span_names::CONNECT, address = %address).entered();
        debug!(target: targets::CONNECTION, "Connecting to {}", address);

        let candidates = (self.config.host.as_str(), self.config.port)
            .to_socket_addrs()
            .map_err(|e| NetworkError::resolve(&address, e))?;

        let mut last_err: Option<io::Error> = None;
        for addr in candidates {
            match TcpStream::connect_timeout(&addr, socket.connect_timeout) {
                Ok(stream) => {
                    stream
                        .set_nodelay(socket.no_delay)
                        .and_then(|()| stream.set_write_timeout(socket.write_timeout))
                        .map_err(|e| NetworkError::connect(&address, e))?;
                    return Ok(stream);
                }
                Err(e) => last_err = Some(e),
            }
        }

        Err(match last_err {
            Some(e) => NetworkError::connect(address, e),
            None => NetworkError::resolve(address, "no addresses found"),
        })
    }

    /// Close the connection and stop automatic reconnection.
    ///
    /// This is the only way autoconnect is turned off: it records the user's
    /// intent, not a transient failure. Any connect attempt in flight is
    /// discarded when it completes. Calling it again changes nothing.
    pub fn disconnect(&self) {
        let mut inner = self.inner.lock();
        inner.autoconnect = false;
        inner.epoch += 1;
        if let Some(stream) = inner.socket.take() {
            let _ = stream.shutdown(Shutdown::Both);
            info!(target: targets::CONNECTION, "Disconnected from {}", self.address());
        }
        inner.connected = false;
    }

    /// Mark the connection of `generation` as lost and close its socket.
    ///
    /// Returns `true` only for the call that actually performed the
    /// transition; later calls, or calls for a superseded generation, do
    /// nothing. Autoconnect is left as it is.
    pub fn mark_lost(&self, generation: u64, reason: impl fmt::Display) -> bool {
        let mut inner = self.inner.lock();
        if !inner.connected || inner.generation != generation {
            return false;
        }
        if let Some(stream) = inner.socket.take() {
            let _ = stream.shutdown(Shutdown::Both);
        }
        inner.connected = false;
        inner.last_error = Some(reason.to_string());
        warn!(
            target: targets::CONNECTION,
            "Lost connection to {}: {}",
            self.address(),
            reason
        );
        true
    }

    /// Run `f` under the state lock if `generation` is still the live connection.
    ///
    /// Returns whether `f` ran. Used to make "still connected?" and
    /// "deliver the data" one atomic step with respect to `disconnect()`.
    pub(crate) fn with_live<F: FnOnce()>(&self, generation: u64, f: F) -> bool {
        let inner = self.inner.lock();
        if inner.connected && inner.generation == generation {
            f();
            true
        } else {
            false
        }
    }
}

impl fmt::Debug for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("ConnectionState")
            .field("address", &self.config.address())
            .field("connected", &inner.connected)
            .field("autoconnect", &inner.autoconnect)
            .field("last_error", &inner.last_error)
            .field("generation", &inner.generation)
            .finish()
    }
}
