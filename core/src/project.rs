//! Two-phase full compile: type-check, then compile every source file.

use std::fmt;

use fable_bridge_daemon::{DaemonError, ProjectChanged, ProjectChangedParams};

use crate::cache::SharedCache;
use crate::discovery::locate_fable_library;
use crate::error::OrchestratorError;
use crate::host::Host;
use crate::reporter::report_diagnostics;
use crate::session::CompileState;

/// Lifecycle hook a full compile runs under; prefixes progress lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hook {
    BuildStart,
    WatchChange,
}

impl Hook {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Hook::BuildStart => "buildStart",
            Hook::WatchChange => "watchChange",
        }
    }
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Type-check the project and fill the cache from scratch.
///
/// The caller clears the cache and watch set first. Project options, the
/// watch set and the host watch list are updated after the type-check
/// succeeds; the cache only after the initial compile succeeds. Type-check
/// errors are reported but do not stop the compile.
pub(crate) async fn compile_project(
    state: &mut CompileState,
    cache: &SharedCache,
    host: &dyn Host,
    hook: Hook,
) -> Result<(), OrchestratorError> {
    let Some(project) = state.project_file.clone() else {
        return Err(anyhow::anyhow!("no project manifest was resolved").into());
    };
    let daemon = state
        .daemon
        .as_mut()
        .ok_or_else(|| DaemonError::Connection("daemon was not started".into()))?;

    let name = project.file_name();
    host.info(&format!("[{hook}] Full compile started of {name}"));

    let fable_library =
        locate_fable_library(&state.install_dir, state.options.fable_library.as_deref());
    host.info(&format!("[{hook}] fable-library located at {fable_library}"));

    host.info(&format!("[{hook}] About to type-check {name}"));
    let params = ProjectChangedParams {
        configuration: state.configuration,
        project: project.to_string(),
        fable_library: fable_library.into(),
        exclude: state.options.exclude.clone(),
        no_reflection: state.options.no_reflection,
    };
    let ProjectChanged {
        project_options,
        diagnostics,
        dependent_files,
    } = daemon.project_changed(&params).await?;
    host.info(&format!("[{hook}] {name} was type-checked"));
    report_diagnostics(host, &diagnostics);

    for file in dependent_files {
        if project_options.contains(&file) {
            tracing::debug!(%file, "Dependent file is a project source, not watching it for rebuilds");
            continue;
        }
        host.add_watch_file(&file);
        state.watch_set.insert(file);
    }
    let sources = project_options.source_files().to_vec();
    state.project_options = Some(project_options);

    let mut compiled = daemon.initial_compile().await?;
    host.info(&format!("[{hook}] Full compile completed of {name}"));

    for file in &sources {
        host.add_watch_file(file);
    }

    let mut missing = 0usize;
    {
        let mut cache = cache.write();
        for file in sources {
            let code = compiled.remove(&file);
            if code.is_none() {
                missing += 1;
            }
            cache.store(file, code);
        }
    }
    if missing > 0 {
        tracing::warn!(missing, "Daemon returned no output for some project files");
    }
    if !compiled.is_empty() {
        tracing::debug!(
            extra = compiled.len(),
            "Ignoring output for files outside the project"
        );
    }
    tracing::info!(
        hook = hook.as_str(),
        files = cache.read().len(),
        watched = state.watch_set.len(),
        "Full compile finished"
    );
    Ok(())
}
