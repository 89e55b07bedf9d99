//! Shared test utilities and fixtures
//!
//! A scripted in-memory daemon, a host that records everything it is told,
//! and a project directory fixture.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock, Weak};

use serde_json::{Map, Value, json};
use tempfile::TempDir;
use tokio::sync::Semaphore;

use fable_bridge_core::{Host, HostFut, PluginOptions, ResolvedConfig, Session};
use fable_bridge_daemon::{DaemonError, KillSwitch, Method, Transport, TransportFut};
use fable_bridge_types::SourcePath;

// ============================================================================
// Project fixture
// ============================================================================

/// A temp directory holding `App.fsproj`.
pub struct Project {
    dir: TempDir,
}

impl Project {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("App.fsproj"), "<Project Sdk=\"Microsoft.NET.Sdk\" />")
            .expect("write fsproj");
        Self { dir }
    }

    pub fn empty() -> Self {
        Self {
            dir: tempfile::tempdir().expect("tempdir"),
        }
    }

    /// Normalized path of `name` inside the project.
    pub fn path(&self, name: &str) -> String {
        SourcePath::from(self.dir.path().join(name).as_path()).to_string()
    }

    pub fn resolved(&self) -> ResolvedConfig {
        ResolvedConfig::new(self.dir.path(), "development")
    }

    /// `project-changed` success listing `sources` and `dependents`.
    pub fn type_checked(&self, sources: &[&str], dependents: &[&str]) -> Value {
        let sources: Vec<String> = sources.iter().map(|s| self.path(s)).collect();
        let dependents: Vec<String> = dependents.iter().map(|s| self.path(s)).collect();
        json!({"case": "Success", "fields": [{"sourceFiles": sources}, [], dependents]})
    }

    /// `initial-compile` success.
    pub fn compiled_all(&self, files: &[(&str, &str)]) -> Value {
        json!({"case": "Success", "fields": [self.file_map(files)]})
    }

    /// `compile` success with no diagnostics.
    pub fn compiled(&self, files: &[(&str, &str)]) -> Value {
        json!({"case": "Success", "fields": [self.file_map(files), []]})
    }

    fn file_map(&self, files: &[(&str, &str)]) -> Map<String, Value> {
        files
            .iter()
            .map(|(name, code)| (self.path(name), json!(code)))
            .collect()
    }
}

pub fn failure(message: &str) -> Value {
    json!({"case": "Error", "fields": [message]})
}

// ============================================================================
// Scripted daemon
// ============================================================================

#[derive(Default)]
struct DaemonShared {
    replies: Mutex<VecDeque<Value>>,
    requests: Mutex<Vec<(Method, Option<Value>)>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

/// Cloneable handle to a scripted daemon; hand out [`transport`](Self::transport)
/// to the session and keep the handle for assertions.
#[derive(Clone)]
pub struct ScriptedDaemon {
    shared: Arc<DaemonShared>,
    gate: Option<Arc<Semaphore>>,
    kill_switch: KillSwitch,
}

impl ScriptedDaemon {
    pub fn new(replies: Vec<Value>) -> Self {
        let shared = DaemonShared {
            replies: Mutex::new(replies.into()),
            ..DaemonShared::default()
        };
        Self {
            shared: Arc::new(shared),
            gate: None,
            kill_switch: KillSwitch::new(),
        }
    }

    /// Every request waits for a permit from [`release`](Self::release).
    pub fn gated(replies: Vec<Value>) -> Self {
        Self {
            gate: Some(Arc::new(Semaphore::new(0))),
            ..Self::new(replies)
        }
    }

    pub fn release(&self, requests: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(requests);
        }
    }

    pub fn push(&self, reply: Value) {
        self.shared.replies.lock().unwrap().push_back(reply);
    }

    pub fn transport(&self) -> Box<dyn Transport> {
        Box::new(self.clone())
    }

    pub fn methods(&self) -> Vec<&'static str> {
        self.shared
            .requests
            .lock()
            .unwrap()
            .iter()
            .map(|(m, _)| m.as_str())
            .collect()
    }

    pub fn compiled_files(&self) -> Vec<String> {
        self.shared
            .requests
            .lock()
            .unwrap()
            .iter()
            .filter(|(m, _)| *m == Method::Compile)
            .filter_map(|(_, p)| p.as_ref()?["fileName"].as_str().map(String::from))
            .collect()
    }

    pub fn max_in_flight(&self) -> usize {
        self.shared.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn is_killed(&self) -> bool {
        self.kill_switch.is_triggered()
    }
}

impl Transport for ScriptedDaemon {
    fn request<'a>(&'a mut self, method: Method, params: Option<Value>) -> TransportFut<'a> {
        let shared = self.shared.clone();
        let gate = self.gate.clone();
        let kill_switch = self.kill_switch.clone();
        Box::pin(async move {
            shared.requests.lock().unwrap().push((method, params));
            let now = shared.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            shared.max_in_flight.fetch_max(now, Ordering::SeqCst);

            let released = async {
                if let Some(gate) = gate {
                    gate.acquire().await.expect("gate open").forget();
                }
            };
            let killed = tokio::select! {
                () = released => false,
                () = kill_switch.triggered() => true,
            };

            shared.in_flight.fetch_sub(1, Ordering::SeqCst);
            if killed {
                return Err(DaemonError::Connection("daemon stopped".into()));
            }
            shared
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| DaemonError::Connection("daemon exited".into()))
        })
    }

    fn kill_switch(&self) -> KillSwitch {
        self.kill_switch.clone()
    }
}

// ============================================================================
// Recording host
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    Info(String),
    Warn(String),
    Error(String),
    Watch(String),
    Load(String),
}

/// Records every callback in order. Optionally re-enters the session's
/// transform hook from `load`, the way a bundler would.
#[derive(Default)]
pub struct RecordingHost {
    events: Mutex<Vec<HostEvent>>,
    session: OnceLock<Weak<Session>>,
    transformed: Mutex<Vec<(String, Option<String>)>>,
}

impl RecordingHost {
    pub fn events(&self) -> Vec<HostEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.filter(|e| match e {
            HostEvent::Error(m) => Some(m.clone()),
            _ => None,
        })
    }

    pub fn warnings(&self) -> Vec<String> {
        self.filter(|e| match e {
            HostEvent::Warn(m) => Some(m.clone()),
            _ => None,
        })
    }

    pub fn loads(&self) -> Vec<String> {
        self.filter(|e| match e {
            HostEvent::Load(p) => Some(p.clone()),
            _ => None,
        })
    }

    pub fn watches(&self) -> Vec<String> {
        self.filter(|e| match e {
            HostEvent::Watch(p) => Some(p.clone()),
            _ => None,
        })
    }

    /// What re-entrant transforms returned during loads.
    pub fn transformed(&self) -> Vec<(String, Option<String>)> {
        self.transformed.lock().unwrap().clone()
    }

    pub fn reenter(&self, session: &Arc<Session>) {
        let _ = self.session.set(Arc::downgrade(session));
    }

    fn filter(&self, pick: impl Fn(&HostEvent) -> Option<String>) -> Vec<String> {
        self.events.lock().unwrap().iter().filter_map(pick).collect()
    }

    fn push(&self, event: HostEvent) {
        self.events.lock().unwrap().push(event);
    }
}

impl Host for RecordingHost {
    fn info(&self, message: &str) {
        self.push(HostEvent::Info(message.to_string()));
    }

    fn warn(&self, message: &str) {
        self.push(HostEvent::Warn(message.to_string()));
    }

    fn error(&self, message: &str) {
        self.push(HostEvent::Error(message.to_string()));
    }

    fn add_watch_file(&self, path: &SourcePath) {
        self.push(HostEvent::Watch(path.to_string()));
    }

    fn load<'a>(&'a self, path: &'a SourcePath) -> HostFut<'a> {
        self.push(HostEvent::Load(path.to_string()));
        Box::pin(async move {
            let Some(session) = self.session.get().and_then(Weak::upgrade) else {
                return;
            };
            let code = session.transform(path.as_str()).await.map(|o| o.code);
            self.transformed
                .lock()
                .unwrap()
                .push((path.to_string(), code));
        })
    }
}

// ============================================================================
// Session helpers
// ============================================================================

pub fn session(options: PluginOptions) -> (Arc<Session>, Arc<RecordingHost>) {
    let host = Arc::new(RecordingHost::default());
    let session = Arc::new(Session::new(options, host.clone()).with_install_dir("/opt/fable-bridge"));
    (session, host)
}

/// Resolve `project` and run build start against `daemon`.
pub async fn started(project: &Project, daemon: &ScriptedDaemon) -> (Arc<Session>, Arc<RecordingHost>) {
    let (session, host) = session(PluginOptions::default());
    session
        .config_resolved(&project.resolved())
        .await
        .expect("manifest found");
    let transport = daemon.transport();
    let _ = session.build_start(move || Ok(transport)).await;
    (session, host)
}
