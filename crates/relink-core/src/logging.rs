//! Logging facilities for relink.
//!
//! relink uses the `tracing` crate for instrumentation. Library code only
//! emits events; it never installs a subscriber on its own. The application
//! decides where events go by building a [`LogConfig`] and installing it
//! explicitly, either process-wide with [`LogConfig::install_global`] or for
//! the lifetime of a guard with [`LogConfig::install_scoped`].
//!
//! ```no_run
//! use relink_core::logging::LogConfig;
//!
//! fn main() -> Result<(), relink_core::CoreError> {
//!     LogConfig::new("relink_net=debug").install_global()?;
//!
//!     // Start the client...
//!     Ok(())
//! }
//! ```
//!
//! In tests, prefer a scoped sink so parallel tests don't fight over the
//! global default:
//!
//! ```
//! use relink_core::logging::LogConfig;
//!
//! let _guard = LogConfig::new("trace").install_scoped().unwrap();
//! tracing::info!("visible while the guard lives");
//! ```

use tracing::Subscriber;
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use crate::error::{CoreError, Result};

/// Span names used throughout relink.
///
/// These constants can be used to filter traces for specific subsystems.
pub mod span_names {
    /// One worker thread's lifetime.
    pub const WORKER: &str = "relink::worker";
    /// A single connect attempt.
    pub const CONNECT: &str = "relink::connect";
}

/// Default filter directives when nothing else is configured.
pub const DEFAULT_FILTER: &str = "info";

/// Configuration for the process's tracing sink.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Filter directives in `EnvFilter` syntax, e.g. `"relink_net=debug"`.
    pub filter: String,
    /// Prefer `RUST_LOG` over [`filter`](Self::filter) when it is set.
    pub use_env: bool,
    /// Include the event target in each line.
    pub with_target: bool,
    /// Include the thread name in each line.
    pub with_thread_names: bool,
    /// Emit ANSI colour codes.
    pub ansi: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: DEFAULT_FILTER.to_string(),
            use_env: true,
            with_target: true,
            with_thread_names: true,
            ansi: true,
        }
    }
}

impl LogConfig {
    /// Create a configuration with the given filter directives.
    pub fn new(filter: impl Into<String>) -> Self {
        Self {
            filter: filter.into(),
            ..Default::default()
        }
    }

    /// Ignore `RUST_LOG` and use only the configured directives.
    pub fn ignore_env(mut self) -> Self {
        self.use_env = false;
        self
    }

    /// Show or hide the event target.
    pub fn with_target(mut self, enabled: bool) -> Self {
        self.with_target = enabled;
        self
    }

    /// Show or hide thread names.
    pub fn with_thread_names(mut self, enabled: bool) -> Self {
        self.with_thread_names = enabled;
        self
    }

    /// Enable or disable ANSI colours.
    pub fn ansi(mut self, enabled: bool) -> Self {
        self.ansi = enabled;
        self
    }

    /// Resolve the effective filter.
    pub fn env_filter(&self) -> Result<EnvFilter> {
        if self.use_env
            && let Ok(filter) = EnvFilter::try_from_default_env()
        {
            return Ok(filter);
        }
        EnvFilter::try_new(&self.filter).map_err(|e| CoreError::InvalidFilter {
            directives: self.filter.clone(),
            message: e.to_string(),
        })
    }

    /// Build the subscriber without installing it.
    pub fn build(&self) -> Result<impl Subscriber + Send + Sync + 'static> {
        let filter = self.env_filter()?;
        let layer = fmt::layer()
            .with_target(self.with_target)
            .with_thread_names(self.with_thread_names)
            .with_ansi(self.ansi);

        Ok(tracing_subscriber::registry().with(layer).with(filter))
    }

    /// Install the sink as the process-wide default.
    ///
    /// Fails with [`CoreError::AlreadyInstalled`] if another global
    /// subscriber was set first.
    pub fn install_global(&self) -> Result<()> {
        let subscriber = self.build()?;
        tracing::subscriber::set_global_default(subscriber)
            .map_err(|_| CoreError::AlreadyInstalled)
    }

    /// Install the sink for the current thread until the guard is dropped.
    pub fn install_scoped(&self) -> Result<LoggingGuard> {
        let subscriber = self.build()?;
        Ok(LoggingGuard {
            _guard: tracing::subscriber::set_default(subscriber),
        })
    }
}

/// Keeps a scoped sink installed. Dropping it restores the previous default.
#[must_use = "dropping the guard uninstalls the sink"]
pub struct LoggingGuard {
    _guard: DefaultGuard,
}

impl std::fmt::Debug for LoggingGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoggingGuard").finish_non_exhaustive()
    }
}
