//! One build or watch session and the hooks a bundler calls on it.
//!
//! Hooks that talk to the daemon go through a fair async mutex, so compiles
//! run one at a time in arrival order. The compiled-output cache sits outside
//! that mutex: transform and hot-update filtering read it directly, which
//! keeps a host that re-enters `transform` from inside `load` from waiting on
//! the compile that triggered the load.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError};

use tokio::sync::{Mutex, watch};

use fable_bridge_daemon::{DaemonClient, DaemonError, KillSwitch, Transport};
use fable_bridge_types::{BuildConfiguration, ProjectOptions, SourcePath};

use crate::cache::SharedCache;
use crate::config::{JsxMode, PluginOptions, ResolvedConfig};
use crate::discovery::find_project_file;
use crate::dispatcher::{ChangeAction, DispatchState, dispatch};
use crate::error::OrchestratorError;
use crate::host::{Host, ModuleNode, PostProcessor, TransformOutput};
use crate::project::{Hook, compile_project};
use crate::watch_set::WatchSet;

/// Everything a compile reads or writes, except the cache.
pub(crate) struct CompileState {
    pub(crate) options: PluginOptions,
    pub(crate) install_dir: PathBuf,
    pub(crate) configuration: BuildConfiguration,
    pub(crate) project_file: Option<SourcePath>,
    pub(crate) daemon: Option<DaemonClient>,
    pub(crate) project_options: Option<ProjectOptions>,
    pub(crate) watch_set: WatchSet,
}

impl CompileState {
    pub(crate) fn new(options: PluginOptions, install_dir: PathBuf) -> Self {
        Self {
            options,
            install_dir,
            configuration: BuildConfiguration::default(),
            project_file: None,
            daemon: None,
            project_options: None,
            watch_set: WatchSet::new(),
        }
    }
}

fn default_install_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
}

pub struct Session {
    state: Mutex<CompileState>,
    cache: SharedCache,
    phase: watch::Sender<DispatchState>,
    kill_switch: std::sync::Mutex<Option<KillSwitch>>,
    host: Arc<dyn Host>,
    jsx: Option<JsxMode>,
    post_processor: Option<Arc<dyn PostProcessor>>,
}

impl Session {
    #[must_use]
    pub fn new(options: PluginOptions, host: Arc<dyn Host>) -> Self {
        let jsx = options.jsx;
        let (phase, _) = watch::channel(DispatchState::Idle);
        Self {
            state: Mutex::new(CompileState::new(options, default_install_dir())),
            cache: SharedCache::new(),
            phase,
            kill_switch: std::sync::Mutex::new(None),
            host,
            jsx,
            post_processor: None,
        }
    }

    /// Directory fable-library is looked up from.
    pub fn with_install_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.state.get_mut().install_dir = dir.into();
        self
    }

    pub fn with_post_processor(mut self, processor: Arc<dyn PostProcessor>) -> Self {
        self.post_processor = Some(processor);
        self
    }

    // ========================================================================
    // Hooks
    // ========================================================================

    /// Pick the build configuration and the project manifest.
    ///
    /// A discovery failure is logged and returned; the session then stays
    /// inert and every later hook is a no-op.
    pub async fn config_resolved(
        &self,
        resolved: &ResolvedConfig,
    ) -> Result<SourcePath, OrchestratorError> {
        let mut state = self.state.lock().await;
        state.configuration = BuildConfiguration::from_mode(&resolved.mode);

        let dir = resolved.search_dir();
        let found = match &state.options.fsproj {
            Some(path) if path.is_relative() => Ok(dir.join(path)),
            Some(path) => Ok(path.clone()),
            None => match find_project_file(dir) {
                Ok(Some(path)) => Ok(path),
                Ok(None) => Err(OrchestratorError::discovery(dir, None)),
                Err(e) => Err(OrchestratorError::discovery(dir, Some(e))),
            },
        };

        match found {
            Ok(path) => {
                let project = SourcePath::from(path.as_path());
                self.host
                    .info(&format!("[configResolved] Entry fsproj {project}"));
                tracing::debug!(configuration = %state.configuration, %project, "Config resolved");
                state.project_file = Some(project.clone());
                Ok(project)
            }
            Err(e) => {
                self.host.error(&format!("[configResolved] {e}"));
                state.project_file = None;
                Err(e)
            }
        }
    }

    /// Start the daemon with `connect` and run the first full compile.
    ///
    /// Failures are logged and returned; the session keeps running with an
    /// empty cache either way.
    pub async fn build_start<F>(&self, connect: F) -> Result<(), OrchestratorError>
    where
        F: FnOnce() -> Result<Box<dyn Transport>, DaemonError> + Send,
    {
        let mut state = self.state.lock().await;
        let Some(project) = state.project_file.clone() else {
            self.host
                .warn("[buildStart] No project manifest resolved, nothing to compile");
            return Ok(());
        };

        self.host
            .info(&format!("[buildStart] Starting daemon for {}", project.file_name()));
        let transport = match connect() {
            Ok(transport) => transport,
            Err(e) => {
                let e = OrchestratorError::from(e);
                self.host
                    .error(&format!("[buildStart] Unexpected failure during buildStart: {e}"));
                return Err(e);
            }
        };
        let client = DaemonClient::new(transport);
        if let Some(previous) = self.kill_switch_slot().replace(client.kill_switch()) {
            previous.trigger();
        }
        state.daemon = Some(client);

        self.cache.write().clear();
        state.watch_set.clear();
        state.project_options = None;

        self.phase.send_replace(DispatchState::FullRebuilding);
        let result = compile_project(&mut state, &self.cache, self.host.as_ref(), Hook::BuildStart).await;
        self.phase.send_replace(DispatchState::Idle);

        if let Err(e) = &result {
            self.host
                .error(&format!("[buildStart] Unexpected failure during buildStart: {e}"));
        }
        result
    }

    /// Compiled code for `id`, or `None` to let the bundler handle it.
    pub async fn transform(&self, id: &str) -> Option<TransformOutput> {
        let path = SourcePath::new(id);
        if !path.is_compilable() {
            return None;
        }
        self.host.info(&format!("[transform] transform: {id}"));

        let code = {
            let cache = self.cache.read();
            if !cache.contains(path.as_str()) {
                drop(cache);
                self.host
                    .warn(&format!("[transform] {id} is not part of compilableFiles"));
                return None;
            }
            cache.code(path.as_str()).map(str::to_owned)
        };
        let Some(code) = code else {
            tracing::debug!(%path, "No compiled output for project file");
            return None;
        };

        let code = match (self.jsx, &self.post_processor) {
            (Some(mode), Some(processor)) => match processor.process(&path, &code, mode).await {
                Ok(code) => code,
                Err(e) => {
                    self.host
                        .error(&format!("[transform] JSX {mode} of {id} failed: {e:#}"));
                    return None;
                }
            },
            (Some(mode), None) => {
                tracing::debug!(%mode, "JSX mode set but no post-processor registered");
                code
            }
            (None, _) => code,
        };

        Some(TransformOutput { code, map: None })
    }

    /// Route a file change. Waits for any compile already in progress.
    pub async fn watch_change(&self, id: &str) -> ChangeAction {
        let path = SourcePath::new(id);
        let mut state = self.state.lock().await;
        dispatch(&mut state, &self.cache, &self.phase, self.host.as_ref(), path).await
    }

    /// Narrow a hot update for `file` to modules that are actually imported.
    ///
    /// `None` means no opinion: the file is not one this session compiles.
    #[must_use]
    pub fn handle_hot_update(&self, file: &str, modules: &[ModuleNode]) -> Option<Vec<ModuleNode>> {
        let path = SourcePath::new(file);
        if !self.cache.read().contains(path.as_str()) {
            return None;
        }
        Some(
            modules
                .iter()
                .filter(|module| module.importers > 0)
                .cloned()
                .collect(),
        )
    }

    /// Kill the daemon and drop all session data. Does not wait for an
    /// in-flight compile to finish first.
    pub async fn build_end(&self) {
        self.host.info("[buildEnd] Closing Fable daemon");
        if let Some(kill_switch) = self.kill_switch_slot().take() {
            kill_switch.trigger();
        }

        let mut state = self.state.lock().await;
        state.daemon = None;
        state.project_options = None;
        state.watch_set.clear();
        self.cache.write().clear();
    }

    // ========================================================================
    // Observation
    // ========================================================================

    #[must_use]
    pub fn dispatch_state(&self) -> DispatchState {
        *self.phase.borrow()
    }

    /// Follow dispatcher state transitions.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<DispatchState> {
        self.phase.subscribe()
    }

    #[must_use]
    pub fn compiled_code(&self, path: &str) -> Option<String> {
        self.cache
            .read()
            .code(SourcePath::new(path).as_str())
            .map(str::to_owned)
    }

    #[must_use]
    pub fn cache_snapshot(&self) -> BTreeMap<SourcePath, Option<String>> {
        self.cache.read().snapshot()
    }

    pub async fn watched_dependencies(&self) -> Vec<SourcePath> {
        self.state.lock().await.watch_set.iter().cloned().collect()
    }

    pub async fn project_options(&self) -> Option<ProjectOptions> {
        self.state.lock().await.project_options.clone()
    }

    pub async fn project_file(&self) -> Option<SourcePath> {
        self.state.lock().await.project_file.clone()
    }

    pub async fn configuration(&self) -> BuildConfiguration {
        self.state.lock().await.configuration
    }

    fn kill_switch_slot(&self) -> std::sync::MutexGuard<'_, Option<KillSwitch>> {
        self.kill_switch
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
