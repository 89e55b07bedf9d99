//! The bundler side of the session.
//!
//! [`Host`] is what the orchestrator calls back into: log sinks, the watch
//! list and the module loader. [`PostProcessor`] is the optional JSX pass.

use std::future::Future;
use std::pin::Pin;

use fable_bridge_types::SourcePath;

use crate::config::JsxMode;

pub type HostFut<'a> = Pin<Box<dyn Future<Output = ()> + Send + 'a>>;

pub type PostProcessFut<'a> = Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send + 'a>>;

/// Callbacks into the bundler driving the session.
pub trait Host: Send + Sync {
    fn info(&self, message: &str);

    fn warn(&self, message: &str);

    fn error(&self, message: &str);

    /// Add `path` to the bundler's file watcher.
    fn add_watch_file(&self, path: &SourcePath);

    /// Ask the bundler to reload the module at `path` so its consumers pick
    /// up the new compiled output. May re-enter the transform hook.
    fn load<'a>(&'a self, path: &'a SourcePath) -> HostFut<'a>;
}

/// Rewrites JSX in compiled output. Supplied by the host.
pub trait PostProcessor: Send + Sync {
    fn process<'a>(&'a self, id: &'a SourcePath, code: &'a str, mode: JsxMode) -> PostProcessFut<'a>;
}

/// A module the bundler considers for a hot update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleNode {
    pub id: String,
    /// Number of modules importing this one.
    pub importers: usize,
}

impl ModuleNode {
    #[must_use]
    pub fn new(id: impl Into<String>, importers: usize) -> Self {
        Self {
            id: id.into(),
            importers,
        }
    }
}

/// Output of the transform hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformOutput {
    pub code: String,
    /// Always `None`: the daemon does not emit source maps.
    pub map: Option<String>,
}
