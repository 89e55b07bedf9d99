//! Errors surfaced by the daemon client.

/// Message used when the daemon reports failure without one.
pub const UNKNOWN_ERROR: &str = "Unknown error occurred";

#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
    /// The daemon process could not be started.
    #[error("failed to start compiler daemon: {0}")]
    Spawn(String),

    /// The process exited or the channel closed; no response can arrive.
    #[error("compiler daemon is not reachable: {0}")]
    Connection(String),

    /// The daemon answered with a non-success case.
    #[error("{message}")]
    Compile { message: String },

    /// The daemon answered with a payload this client does not understand.
    #[error("unexpected response to {method}: {detail}")]
    Protocol { method: &'static str, detail: String },
}

impl DaemonError {
    pub(crate) fn compile(message: Option<String>) -> Self {
        Self::Compile {
            message: message
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| String::from(UNKNOWN_ERROR)),
        }
    }

    pub(crate) fn protocol(method: &'static str, detail: impl std::fmt::Display) -> Self {
        Self::Protocol {
            method,
            detail: detail.to_string(),
        }
    }

    #[must_use]
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Spawn(_))
    }
}
