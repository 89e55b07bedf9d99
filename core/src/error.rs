use std::path::PathBuf;

use fable_bridge_daemon::DaemonError;

/// Coarse classification used for logging and exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Connection,
    CompileFailure,
    Discovery,
    Unexpected,
}

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Daemon(#[from] DaemonError),

    #[error("no .fsproj file found in {}", dir.display())]
    Discovery {
        dir: PathBuf,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

impl OrchestratorError {
    pub(crate) fn discovery(dir: impl Into<PathBuf>, source: Option<std::io::Error>) -> Self {
        Self::Discovery {
            dir: dir.into(),
            source,
        }
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Daemon(e) if e.is_connection() => ErrorKind::Connection,
            Self::Daemon(DaemonError::Compile { .. }) => ErrorKind::CompileFailure,
            Self::Daemon(_) | Self::Unexpected(_) => ErrorKind::Unexpected,
            Self::Discovery { .. } => ErrorKind::Discovery,
        }
    }

    /// `false` when the session can no longer do anything useful.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Discovery { .. })
    }
}
