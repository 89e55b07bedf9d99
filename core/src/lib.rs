//! Build orchestration for the Fable compiler daemon.
//!
//! A [`Session`] keeps a cache of compiled JavaScript in step with an F#
//! project as files change. The bundler (or the `fable-bridge` binary) drives
//! it through lifecycle hooks and receives log lines, watch registrations and
//! reload requests through [`Host`].

mod cache;
pub mod config;
mod discovery;
mod dispatcher;
mod error;
mod host;
mod project;
mod reporter;
mod session;
mod watch_set;

pub use cache::{CompilationCache, SharedCache};
pub use config::{CONFIG_FILE_NAME, ConfigError, JsxMode, PluginOptions, ResolvedConfig};
pub use discovery::{find_project_file, locate_fable_library};
pub use dispatcher::{ChangeAction, DispatchState, classify};
pub use error::{ErrorKind, OrchestratorError};
pub use host::{Host, HostFut, ModuleNode, PostProcessFut, PostProcessor, TransformOutput};
pub use project::Hook;
pub use reporter::{DiagnosticSummary, report_diagnostics};
pub use session::Session;
pub use watch_set::WatchSet;
