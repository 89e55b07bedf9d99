//! Daemon connection: owns the child process and the JSON-RPC channel.
//!
//! A reader task routes responses to pending requests by id, a writer task
//! serializes outgoing frames. When either side of the channel dies every
//! pending request is failed and later requests fail immediately.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{Mutex, Notify, mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::codec::{MessageReader, MessageWriter};
use crate::error::DaemonError;
use crate::protocol::{Method, Request};

const WRITER_CHANNEL_CAPACITY: usize = 16;

/// Set to run the daemon with its debug log viewer enabled.
pub const DEBUG_ENV_VAR: &str = "FABLE_DAEMON_DEBUG";

const DEBUG_VIEWER_URL: &str = "http://localhost:9014";

/// How to launch the daemon: `dotnet <assembly> --stdio`.
#[derive(Debug, Clone)]
pub struct DaemonLaunch {
    pub assembly: PathBuf,
    pub working_dir: Option<PathBuf>,
}

impl DaemonLaunch {
    #[must_use]
    pub fn new(assembly: impl Into<PathBuf>) -> Self {
        Self {
            assembly: assembly.into(),
            working_dir: None,
        }
    }

    fn command(&self) -> Result<Command, DaemonError> {
        let dotnet = which::which("dotnet")
            .map_err(|e| DaemonError::Spawn(format!("dotnet not found in PATH: {e}")))?;
        let mut cmd = Command::new(dotnet);
        cmd.arg(&self.assembly)
            .arg("--stdio")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }
        Ok(cmd)
    }
}

/// Cloneable handle that terminates a daemon connection from anywhere.
///
/// Triggering it kills the child process (if any) and fails every pending and
/// future request with a connection error. It does not wait for the lock that
/// serializes compiles, so teardown never queues behind a hung request.
#[derive(Debug, Clone, Default)]
pub struct KillSwitch {
    inner: Arc<KillSwitchInner>,
}

#[derive(Debug, Default)]
struct KillSwitchInner {
    fired: AtomicBool,
    notify: Notify,
}

impl KillSwitch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.inner.fired.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    #[must_use]
    pub fn is_triggered(&self) -> bool {
        self.inner.fired.load(Ordering::SeqCst)
    }

    /// Resolves once [`trigger`](Self::trigger) has been called.
    pub async fn triggered(&self) {
        loop {
            let notified = self.inner.notify.notified();
            if self.is_triggered() {
                return;
            }
            notified.await;
        }
    }
}

enum WriterCommand {
    Send(Value),
    Shutdown,
}

enum Incoming {
    Response { id: u64, body: Value },
    DaemonRequest { id: Value, method: String },
    Notification { method: String },
}

fn classify(frame: &Value) -> Option<Incoming> {
    let id = frame.get("id");
    let method = frame.get("method").and_then(Value::as_str).map(String::from);
    let is_response = frame.get("result").is_some() || frame.get("error").is_some();

    match (id, method, is_response) {
        (Some(id), None, true) => Some(Incoming::Response {
            id: id.as_u64()?,
            body: frame.clone(),
        }),
        (Some(id), Some(method), _) => Some(Incoming::DaemonRequest {
            id: id.clone(),
            method,
        }),
        (None, Some(method), _) => Some(Incoming::Notification { method }),
        _ => None,
    }
}

#[derive(Default)]
struct PendingRequests {
    waiting: HashMap<u64, oneshot::Sender<Value>>,
    /// Set once the channel is gone; the reason is reported to later callers.
    closed: Option<String>,
}

type Pending = Arc<Mutex<PendingRequests>>;

async fn close_pending(pending: &Pending, reason: String) {
    let mut guard = pending.lock().await;
    if guard.closed.is_none() {
        guard.closed = Some(reason);
    }
    // Dropping the senders wakes every waiter with a receive error.
    guard.waiting.clear();
}

/// Turn a JSON-RPC response into its `result`, or an error.
fn into_result(body: Value) -> Result<Value, DaemonError> {
    if let Some(error) = body.get("error") {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .map(String::from);
        return Err(DaemonError::compile(message));
    }
    Ok(body.get("result").cloned().unwrap_or(Value::Null))
}

/// A live channel to the compiler daemon.
pub struct DaemonConnection {
    kill_switch: KillSwitch,
    writer_tx: mpsc::Sender<WriterCommand>,
    pending: Pending,
    next_id: u64,
    reader_handle: JoinHandle<()>,
    writer_handle: JoinHandle<()>,
}

impl DaemonConnection {
    /// Start the daemon process and attach to its stdio.
    pub fn spawn(launch: &DaemonLaunch) -> Result<Self, DaemonError> {
        if std::env::var_os(DEBUG_ENV_VAR).is_some() {
            tracing::info!("Running daemon in debug mode, visit {DEBUG_VIEWER_URL} to view logs");
        }

        let mut child = launch
            .command()?
            .spawn()
            .map_err(|e| DaemonError::Spawn(format!("{}: {e}", launch.assembly.display())))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| DaemonError::Spawn("daemon stdin unavailable".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| DaemonError::Spawn("daemon stdout unavailable".into()))?;
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    tracing::debug!(target: "fable_daemon", "{line}");
                }
            });
        }

        tracing::debug!(pid = ?child.id(), "Fable daemon started");
        let connection = Self::from_io(stdout, stdin);
        let kill_switch = connection.kill_switch.clone();
        tokio::spawn(supervise(child, kill_switch));
        Ok(connection)
    }

    /// Attach to an already-open duplex channel (no child process).
    pub fn from_io<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let pending: Pending = Arc::default();
        let kill_switch = KillSwitch::new();
        let (writer_tx, mut writer_rx) = mpsc::channel::<WriterCommand>(WRITER_CHANNEL_CAPACITY);

        let writer_pending = pending.clone();
        let writer_handle = tokio::spawn(async move {
            let mut writer = MessageWriter::new(writer);
            while let Some(cmd) = writer_rx.recv().await {
                match cmd {
                    WriterCommand::Send(frame) => {
                        if let Err(e) = writer.write_message(&frame).await {
                            tracing::warn!("Daemon write error: {e:#}");
                            close_pending(&writer_pending, format!("write failed: {e}")).await;
                            break;
                        }
                    }
                    WriterCommand::Shutdown => break,
                }
            }
        });

        let reader_pending = pending.clone();
        let reply_tx = writer_tx.clone();
        let reader_kill = kill_switch.clone();
        let reader_handle = tokio::spawn(async move {
            let mut reader = MessageReader::new(reader);
            let reason = loop {
                let message = tokio::select! {
                    () = reader_kill.triggered() => break String::from("daemon stopped"),
                    message = reader.read_message() => message,
                };
                match message {
                    Ok(Some(frame)) => Self::dispatch(&frame, &reader_pending, &reply_tx).await,
                    Ok(None) => {
                        tracing::info!("Fable daemon closed its output");
                        break String::from("daemon exited");
                    }
                    Err(e) => {
                        tracing::warn!("Daemon read error: {e:#}");
                        break format!("read failed: {e}");
                    }
                }
            };
            close_pending(&reader_pending, reason).await;
        });

        Self {
            kill_switch,
            writer_tx,
            pending,
            next_id: 1,
            reader_handle,
            writer_handle,
        }
    }

    async fn dispatch(frame: &Value, pending: &Pending, writer_tx: &mpsc::Sender<WriterCommand>) {
        let Some(incoming) = classify(frame) else {
            tracing::trace!("Ignoring malformed frame from daemon");
            return;
        };

        match incoming {
            Incoming::Response { id, body } => {
                let sender = pending.lock().await.waiting.remove(&id);
                match sender {
                    Some(tx) => {
                        let _ = tx.send(body);
                    }
                    None => tracing::debug!(id, "Response for unknown request id"),
                }
            }
            Incoming::DaemonRequest { id, method } => {
                tracing::debug!("Daemon sent request {method}, replying method not found");
                let reply = serde_json::json!({
                    "jsonrpc": "2.0",
                    "id": id,
                    "error": {
                        "code": -32601,
                        "message": format!("Method not found: {method}")
                    }
                });
                let _ = writer_tx.send(WriterCommand::Send(reply)).await;
            }
            Incoming::Notification { method } => {
                tracing::trace!("Ignoring daemon notification {method}");
            }
        }
    }

    /// Send one request and wait for its response.
    ///
    /// There is no timeout: a hung daemon blocks the caller until teardown.
    pub async fn request(
        &mut self,
        method: Method,
        params: Option<Value>,
    ) -> Result<Value, DaemonError> {
        let id = self.next_id;
        self.next_id += 1;

        let frame = serde_json::to_value(Request::new(id, method, params))
            .map_err(|e| DaemonError::protocol(method.as_str(), e))?;

        let (tx, rx) = oneshot::channel();
        {
            let mut guard = self.pending.lock().await;
            if let Some(reason) = &guard.closed {
                return Err(DaemonError::Connection(reason.clone()));
            }
            guard.waiting.insert(id, tx);
        }

        tracing::debug!(id, %method, "Daemon request");
        if self
            .writer_tx
            .send(WriterCommand::Send(frame))
            .await
            .is_err()
        {
            self.pending.lock().await.waiting.remove(&id);
            return Err(DaemonError::Connection("writer channel closed".into()));
        }

        match rx.await {
            Ok(body) => into_result(body),
            Err(_) => {
                let reason = self.pending.lock().await.closed.clone();
                Err(DaemonError::Connection(
                    reason.unwrap_or_else(|| "response channel dropped".into()),
                ))
            }
        }
    }

    #[must_use]
    pub fn kill_switch(&self) -> KillSwitch {
        self.kill_switch.clone()
    }

    /// Forcibly stop the daemon and wait for the channel tasks to wind down.
    pub async fn kill(&mut self) {
        self.kill_switch.trigger();
        let _ = self.writer_tx.send(WriterCommand::Shutdown).await;
        close_pending(&self.pending, "daemon stopped".into()).await;
        let _ = (&mut self.reader_handle).await;
        let _ = (&mut self.writer_handle).await;
    }
}

impl Drop for DaemonConnection {
    fn drop(&mut self) {
        self.kill_switch.trigger();
        self.writer_handle.abort();
    }
}

/// Owns the child process until it exits or the kill switch fires.
async fn supervise(mut child: Child, kill_switch: KillSwitch) {
    tokio::select! {
        status = child.wait() => match status {
            Ok(status) => tracing::info!(%status, "Fable daemon exited"),
            Err(e) => tracing::warn!("Waiting for Fable daemon failed: {e}"),
        },
        () = kill_switch.triggered() => {
            if let Err(e) = child.kill().await {
                tracing::debug!("Killing Fable daemon failed: {e}");
            } else {
                tracing::info!("Fable daemon killed");
            }
        }
    }
}
