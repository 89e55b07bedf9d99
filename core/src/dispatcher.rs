//! Routing of file-change events.
//!
//! Each event is classified against the current project state and handled to
//! completion before the next one is looked at. The session serializes
//! callers; this module only sees one event at a time.

use futures_util::future::join_all;
use tokio::sync::watch;

use fable_bridge_daemon::{Compiled, DaemonError};
use fable_bridge_types::{ProjectOptions, SourcePath};

use crate::cache::{CompilationCache, SharedCache};
use crate::host::Host;
use crate::project::{Hook, compile_project};
use crate::reporter::report_diagnostics;
use crate::session::CompileState;
use crate::watch_set::WatchSet;

/// What the dispatcher is doing right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispatchState {
    #[default]
    Idle,
    FullRebuilding,
    IncrementalCompiling,
}

/// How a change event was routed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeAction {
    /// No project options yet; nothing to compile against.
    NotReady,
    /// A dependent file changed; the whole project was rebuilt.
    FullRebuild,
    /// A cached source file changed; only it was recompiled.
    Incremental,
    /// Not a file the session tracks.
    Ignored,
}

#[must_use]
pub fn classify(
    project_options: Option<&ProjectOptions>,
    watch_set: &WatchSet,
    cache: &CompilationCache,
    path: &SourcePath,
) -> ChangeAction {
    if project_options.is_none() {
        ChangeAction::NotReady
    } else if watch_set.contains(path.as_str()) {
        ChangeAction::FullRebuild
    } else if path.is_compilable() && cache.contains(path.as_str()) {
        ChangeAction::Incremental
    } else {
        ChangeAction::Ignored
    }
}

pub(crate) async fn dispatch(
    state: &mut CompileState,
    cache: &SharedCache,
    phase: &watch::Sender<DispatchState>,
    host: &dyn Host,
    path: SourcePath,
) -> ChangeAction {
    let action = {
        let cache = cache.read();
        classify(state.project_options.as_ref(), &state.watch_set, &cache, &path)
    };
    tracing::debug!(%path, ?action, "Change classified");

    match action {
        ChangeAction::FullRebuild => {
            phase.send_replace(DispatchState::FullRebuilding);
            full_rebuild(state, cache, host, &path).await;
        }
        ChangeAction::Incremental => {
            phase.send_replace(DispatchState::IncrementalCompiling);
            incremental_compile(state, cache, host, &path).await;
        }
        ChangeAction::NotReady | ChangeAction::Ignored => {}
    }
    phase.send_replace(DispatchState::Idle);
    action
}

async fn full_rebuild(
    state: &mut CompileState,
    cache: &SharedCache,
    host: &dyn Host,
    path: &SourcePath,
) {
    host.info(&format!("[watchChange] {path} changed, rebuilding the project"));
    cache.write().clear();
    state.watch_set.clear();

    if let Err(e) = compile_project(state, cache, host, Hook::WatchChange).await {
        host.error(&format!(
            "[watchChange] Unexpected failure during full rebuild after {path} changed: {e}"
        ));
        // Keep the trigger watched so fixing it retries the rebuild.
        if state.watch_set.is_empty() {
            state.watch_set.insert(path.clone());
        }
    }
}

async fn incremental_compile(
    state: &mut CompileState,
    cache: &SharedCache,
    host: &dyn Host,
    path: &SourcePath,
) {
    host.info(&format!("[watchChange] {path} changed"));
    let Some(daemon) = state.daemon.as_mut() else {
        host.error(&format!(
            "[watchChange] compilation of {path} failed, the daemon is not running"
        ));
        return;
    };

    let Compiled { files, diagnostics } = match daemon.compile(path).await {
        Ok(compiled) => compiled,
        Err(DaemonError::Compile { message }) => {
            host.error(&format!("[watchChange] compilation of {path} failed, {message}"));
            return;
        }
        Err(e) => {
            host.error(&format!(
                "[watchChange] compilation of {path} failed, plugin could not handle this gracefully. {e}"
            ));
            return;
        }
    };

    host.info(&format!("[watchChange] {path} compiled"));
    report_diagnostics(host, &diagnostics);

    let updated: Vec<SourcePath> = {
        let mut cache = cache.write();
        let project = state.project_options.as_ref();
        files
            .into_iter()
            .filter_map(|(file, code)| {
                if project.is_some_and(|options| options.contains(&file)) {
                    cache.store(file.clone(), Some(code));
                    Some(file)
                } else {
                    tracing::debug!(%file, "Ignoring compiled output outside the project");
                    None
                }
            })
            .collect()
    };

    join_all(updated.iter().map(|file| host.load(file))).await;
}
