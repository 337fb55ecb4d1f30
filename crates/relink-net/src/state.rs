//! State enum for worker threads.

/// Current phase of a worker's reconnect loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkerState {
    /// Not connected and not trying to connect (autoconnect is off).
    Disconnected,
    /// Connection is down and the worker is attempting to re-establish it.
    Reconnecting,
    /// Connected; the worker is running its unit of work.
    Connected,
    /// The worker observed its stop request and exited.
    Stopped,
}

impl Default for WorkerState {
    fn default() -> Self {
        Self::Disconnected
    }
}

impl std::fmt::Display for WorkerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Reconnecting => write!(f, "Reconnecting"),
            Self::Connected => write!(f, "Connected"),
            Self::Stopped => write!(f, "Stopped"),
        }
    }
}

impl WorkerState {
    /// Whether the worker has exited.
    pub fn is_stopped(&self) -> bool {
        matches!(self, Self::Stopped)
    }
}
