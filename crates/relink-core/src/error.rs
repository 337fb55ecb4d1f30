//! Error types for relink-core.

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors raised by the core infrastructure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    /// The log filter directives could not be parsed.
    #[error("Invalid log filter '{directives}': {message}")]
    InvalidFilter { directives: String, message: String },

    /// A global tracing subscriber has already been installed.
    #[error("A global log sink is already installed")]
    AlreadyInstalled,
}
