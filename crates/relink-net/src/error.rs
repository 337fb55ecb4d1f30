//! Error types for the networking crate.
//!
//! Only two kinds of error ever reach a caller: misuse of the API (an
//! unencodable payload handed to `send()`) and configuration problems.
//! Connectivity faults are absorbed into [`ConnectionState`] and retried by
//! the workers; they are represented here so they can be formatted into
//! `last_error` consistently.
//!
//! [`ConnectionState`]: crate::ConnectionState

use std::path::PathBuf;

/// Network-specific errors.
#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    /// Connection refused, timed out or otherwise failed.
    #[error("Connection to {address} failed: {message}")]
    Connect { address: String, message: String },

    /// The host name could not be resolved to any socket address.
    #[error("Could not resolve {address}: {message}")]
    Resolve { address: String, message: String },

    /// A text payload contained a character outside ASCII.
    #[error("Invalid payload: {character:?} at byte {position} is not ASCII")]
    InvalidPayload { character: char, position: usize },

    /// The configuration could not be parsed.
    #[error("Invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    /// A configuration value is out of range.
    #[error("Invalid configuration: {field} {message}")]
    InvalidConfig {
        field: &'static str,
        message: &'static str,
    },

    /// The configuration file could not be read.
    #[error("Failed to read configuration '{path}': {source}")]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl NetworkError {
    /// Create a connect error.
    pub fn connect(address: impl Into<String>, message: impl ToString) -> Self {
        Self::Connect {
            address: address.into(),
            message: message.to_string(),
        }
    }

    /// Create a resolve error.
    pub fn resolve(address: impl Into<String>, message: impl ToString) -> Self {
        Self::Resolve {
            address: address.into(),
            message: message.to_string(),
        }
    }

    /// Whether this error is a programmer error rather than a connectivity fault.
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidPayload { .. })
    }
}

/// A specialized Result type for network operations.
pub type Result<T> = std::result::Result<T, NetworkError>;
