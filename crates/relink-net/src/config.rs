//! Configuration types for the client runtime.
//!
//! Every type has a builder-style API and can also be deserialized from
//! TOML. Durations are written as integer milliseconds:
//!
//! ```toml
//! host = "192.168.1.20"
//! port = 5025
//! tx_idle_interval_ms = 1000
//!
//! [socket]
//! no_delay = true
//! connect_timeout_ms = 10000
//! read_timeout_ms = 1000
//! read_buffer_size = 1024
//!
//! [reconnect]
//! auto_connect = true
//! interval_ms = 500
//! failure_backoff_ms = 500
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{NetworkError, Result};

/// Default timeout for a single connect attempt.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Default receive timeout for one Rx cycle.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(1);
/// Default size of the Rx read buffer in bytes.
pub const DEFAULT_READ_BUFFER_SIZE: usize = 1024;
/// Default pause between reconnect attempts.
pub const DEFAULT_RECONNECT_INTERVAL: Duration = Duration::from_millis(500);
/// Default pause after a failed unit of work.
pub const DEFAULT_FAILURE_BACKOFF: Duration = Duration::from_millis(500);
/// Default length of one idle Tx iteration.
pub const DEFAULT_TX_IDLE_INTERVAL: Duration = Duration::from_secs(1);

/// Socket-level options applied to every new connection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SocketConfig {
    /// Enable TCP_NODELAY (disable Nagle's algorithm).
    pub no_delay: bool,
    /// Timeout for one connect attempt.
    #[serde(rename = "connect_timeout_ms", with = "millis")]
    pub connect_timeout: Duration,
    /// Receive timeout for one Rx cycle.
    #[serde(rename = "read_timeout_ms", with = "millis")]
    pub read_timeout: Duration,
    /// Largest chunk read by one Rx cycle.
    pub read_buffer_size: usize,
    /// Write timeout. `None` means writes may block indefinitely.
    #[serde(rename = "write_timeout_ms", with = "opt_millis")]
    pub write_timeout: Option<Duration>,
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            no_delay: false,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            write_timeout: None,
        }
    }
}

impl SocketConfig {
    /// Create a new socket configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable TCP_NODELAY.
    pub fn no_delay(mut self, enabled: bool) -> Self {
        self.no_delay = enabled;
        self
    }

    /// Set the connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the receive timeout.
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Set the read buffer size.
    pub fn read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size;
        self
    }

    /// Set the write timeout.
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = Some(timeout);
        self
    }
}

/// Automatic reconnection settings.
///
/// The back-off is fixed, not exponential: a disconnected worker retries
/// every [`interval`](Self::interval) for as long as autoconnect holds.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    /// Initial value of the connection's autoconnect flag.
    pub auto_connect: bool,
    /// Pause after each reconnect attempt.
    #[serde(rename = "interval_ms", with = "millis")]
    pub interval: Duration,
    /// Pause after a unit of work reports failure.
    #[serde(rename = "failure_backoff_ms", with = "millis")]
    pub failure_backoff: Duration,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            auto_connect: true,
            interval: DEFAULT_RECONNECT_INTERVAL,
            failure_backoff: DEFAULT_FAILURE_BACKOFF,
        }
    }
}

impl ReconnectConfig {
    /// Create a new reconnect configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set whether workers connect on their own before any manual `connect()`.
    pub fn auto_connect(mut self, enabled: bool) -> Self {
        self.auto_connect = enabled;
        self
    }

    /// Set the pause between reconnect attempts.
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Set the pause after a failed unit of work.
    pub fn failure_backoff(mut self, backoff: Duration) -> Self {
        self.failure_backoff = backoff;
        self
    }
}

/// Configuration for one client connection and its workers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// The host to connect to.
    pub host: String,
    /// The port to connect to.
    pub port: u16,
    /// Length of one idle Tx iteration.
    #[serde(
        rename = "tx_idle_interval_ms",
        with = "millis",
        default = "default_tx_idle_interval"
    )]
    pub tx_idle_interval: Duration,
    /// Socket-level options.
    #[serde(default)]
    pub socket: SocketConfig,
    /// Reconnect behaviour.
    #[serde(default)]
    pub reconnect: ReconnectConfig,
}

fn default_tx_idle_interval() -> Duration {
    DEFAULT_TX_IDLE_INTERVAL
}

impl ClientConfig {
    /// Create a new client configuration.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            tx_idle_interval: DEFAULT_TX_IDLE_INTERVAL,
            socket: SocketConfig::default(),
            reconnect: ReconnectConfig::default(),
        }
    }

    /// Parse a configuration from TOML text.
    ///
    /// The parsed values are checked with [`validate`](Self::validate).
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that every value can be applied to a socket.
    ///
    /// Sockets reject zero timeouts, so a zero connect or read timeout would
    /// fail every connect attempt or every receive.
    pub fn validate(&self) -> Result<()> {
        let zero = |field, value: Duration| {
            if value.is_zero() {
                Err(NetworkError::InvalidConfig {
                    field,
                    message: "must be greater than zero",
                })
            } else {
                Ok(())
            }
        };
        zero("socket.connect_timeout_ms", self.socket.connect_timeout)?;
        zero("socket.read_timeout_ms", self.socket.read_timeout)?;
        if let Some(timeout) = self.socket.write_timeout {
            zero("socket.write_timeout_ms", timeout)?;
        }
        if self.socket.read_buffer_size == 0 {
            return Err(NetworkError::InvalidConfig {
                field: "socket.read_buffer_size",
                message: "must be greater than zero",
            });
        }
        Ok(())
    }

    /// Replace values rejected by [`validate`](Self::validate) with defaults.
    pub(crate) fn repaired(mut self) -> Self {
        let socket = &mut self.socket;
        if socket.connect_timeout.is_zero() {
            socket.connect_timeout = DEFAULT_CONNECT_TIMEOUT;
        }
        if socket.read_timeout.is_zero() {
            socket.read_timeout = DEFAULT_READ_TIMEOUT;
        }
        if socket.write_timeout.is_some_and(|t| t.is_zero()) {
            socket.write_timeout = None;
        }
        if socket.read_buffer_size == 0 {
            socket.read_buffer_size = DEFAULT_READ_BUFFER_SIZE;
        }
        self
    }

    /// Load a configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| NetworkError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Set socket options.
    pub fn socket_config(mut self, config: SocketConfig) -> Self {
        self.socket = config;
        self
    }

    /// Set reconnect options.
    pub fn reconnect_config(mut self, config: ReconnectConfig) -> Self {
        self.reconnect = config;
        self
    }

    /// Enable TCP_NODELAY.
    pub fn no_delay(mut self, enabled: bool) -> Self {
        self.socket.no_delay = enabled;
        self
    }

    /// Set connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.socket.connect_timeout = timeout;
        self
    }

    /// Set the receive timeout.
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.socket.read_timeout = timeout;
        self
    }

    /// Set whether workers connect on their own at start.
    pub fn auto_connect(mut self, enabled: bool) -> Self {
        self.reconnect.auto_connect = enabled;
        self
    }

    /// Set the pause between reconnect attempts.
    pub fn reconnect_interval(mut self, interval: Duration) -> Self {
        self.reconnect.interval = interval;
        self
    }

    /// Set the pause after a failed unit of work.
    pub fn failure_backoff(mut self, backoff: Duration) -> Self {
        self.reconnect.failure_backoff = backoff;
        self
    }

    /// Set the length of one idle Tx iteration.
    pub fn tx_idle_interval(mut self, interval: Duration) -> Self {
        self.tx_idle_interval = interval;
        self
    }

    /// Get the address string (host:port).
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn to_millis<E: serde::ser::Error>(value: &Duration) -> Result<u64, E> {
        u64::try_from(value.as_millis())
            .map_err(|_| E::custom(format!("duration {value:?} does not fit in u64 milliseconds")))
    }

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(to_millis::<S::Error>(value)?)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

mod opt_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => serializer.serialize_some(&super::millis::to_millis::<S::Error>(d)?),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Option::<u64>::deserialize(deserializer).map(|v| v.map(Duration::from_millis))
    }
}
