//! The command-line stand-in for a bundler.

use tokio::sync::mpsc;

use fable_bridge_core::{Host, HostFut};
use fable_bridge_types::SourcePath;

/// Logs through `tracing` and forwards watch registrations and reload
/// requests to the run loop.
pub struct CliHost {
    registrations: mpsc::UnboundedSender<SourcePath>,
    reloads: mpsc::UnboundedSender<SourcePath>,
}

pub struct HostChannels {
    pub registrations: mpsc::UnboundedReceiver<SourcePath>,
    pub reloads: mpsc::UnboundedReceiver<SourcePath>,
}

impl CliHost {
    pub fn new() -> (Self, HostChannels) {
        let (registrations_tx, registrations) = mpsc::unbounded_channel();
        let (reloads_tx, reloads) = mpsc::unbounded_channel();
        let host = Self {
            registrations: registrations_tx,
            reloads: reloads_tx,
        };
        (
            host,
            HostChannels {
                registrations,
                reloads,
            },
        )
    }
}

impl Host for CliHost {
    fn info(&self, message: &str) {
        tracing::info!("{message}");
    }

    fn warn(&self, message: &str) {
        tracing::warn!("{message}");
    }

    fn error(&self, message: &str) {
        tracing::error!("{message}");
    }

    fn add_watch_file(&self, path: &SourcePath) {
        // The receiver is gone in one-shot builds.
        let _ = self.registrations.send(path.clone());
    }

    fn load<'a>(&'a self, path: &'a SourcePath) -> HostFut<'a> {
        let _ = self.reloads.send(path.clone());
        Box::pin(async {})
    }
}
