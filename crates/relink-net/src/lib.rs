//! Resilient single-peer TCP client runtime.
//!
//! This crate keeps one outbound TCP connection alive and moves bytes over
//! it with two independent worker threads:
//!
//! - **[`TxWorker`]**: sends caller-supplied data via [`TxWorker::send`]
//! - **[`RxWorker`]**: drains received bytes into an [`InboundQueue`]
//!
//! Both workers share one [`ConnectionState`] and each reconnects on its own
//! whenever the connection drops and autoconnect is on. Nothing here frames
//! or parses messages: the queue carries raw receive chunks in arrival order.
//!
//! # Quick Start
//!
//! ```no_run
//! use relink_net::{ClientConfig, TcpClient};
//!
//! let config = ClientConfig::new("127.0.0.1", 5025).no_delay(true);
//! let client = TcpClient::start(config)?;
//!
//! client.send("MEAS:VOLT?\n")?;
//! for chunk in client.inbound().drain() {
//!     println!("{:?}", chunk);
//! }
//! # Ok::<(), relink_net::NetworkError>(())
//! ```
//!
//! # Sharing One Connection
//!
//! ```no_run
//! use std::sync::Arc;
//! use relink_net::{ConnectionState, InboundQueue, RxWorker, TxWorker};
//!
//! let connection = Arc::new(ConnectionState::with_address("127.0.0.1", 5025));
//! let inbound = InboundQueue::new();
//!
//! let tx = TxWorker::new(connection.clone())?;
//! let rx = RxWorker::new(connection.clone(), Some(inbound.clone()))?;
//!
//! tx.send(b"\x02PING\x03")?;
//!
//! // Stop both, then let the connection go.
//! tx.stop();
//! rx.stop();
//! tx.join();
//! rx.join();
//! # Ok::<(), relink_net::NetworkError>(())
//! ```
//!
//! # Errors
//!
//! Connectivity problems never surface as errors: failed connects are
//! recorded in [`ConnectionState::last_error`] and retried, dropped sends
//! return `Ok(false)`. Only caller mistakes, such as non-ASCII text passed to
//! `send()`, and configuration problems are returned as [`NetworkError`].

mod client;
pub mod config;
mod connection;
mod error;
mod payload;
mod queue;
mod rx;
mod state;
mod tx;
pub mod worker;

pub use client::TcpClient;
pub use config::{ClientConfig, ReconnectConfig, SocketConfig};
pub use connection::{ConnectionState, Lease};
pub use error::{NetworkError, Result};
pub use payload::Payload;
pub use queue::InboundQueue;
pub use rx::RxWorker;
pub use state::WorkerState;
pub use tx::TxWorker;
pub use worker::{WorkUnit, Worker};

/// Target names for log filtering.
///
/// Use these with `tracing` directives to filter logs by subsystem.
pub mod targets {
    /// Connect, disconnect and connection-loss events.
    pub const CONNECTION: &str = "relink_net::connection";
    /// Worker lifecycle and state changes.
    pub const WORKER: &str = "relink_net::worker";
    /// Outbound data.
    pub const TX: &str = "relink_net::tx";
    /// Inbound data.
    pub const RX: &str = "relink_net::rx";
}
