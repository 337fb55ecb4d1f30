//! Core systems for relink.
//!
//! This crate provides the infrastructure shared by the relink networking
//! crates:
//!
//! - **Cancellation**: cooperative stop signal with cancellable timed waits
//! - **Logging**: tracing span names and an explicitly installed log sink
//!
//! # Cancellation Example
//!
//! ```
//! use relink_core::CancellationToken;
//! use std::time::Duration;
//!
//! let token = CancellationToken::new();
//! assert!(!token.wait_timeout(Duration::from_millis(1)));
//!
//! token.cancel();
//! assert!(token.wait_timeout(Duration::from_secs(60)));
//! ```

pub mod cancel;
mod error;
pub mod logging;

pub use cancel::CancellationToken;
pub use error::{CoreError, Result};
pub use logging::{LogConfig, LoggingGuard};
