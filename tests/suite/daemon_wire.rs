//! A session talking JSON-RPC to a simulated daemon over an in-memory pipe.

use serde_json::{Value, json};
use tokio::io::{DuplexStream, duplex};

use fable_bridge_core::{ChangeAction, PluginOptions};
use fable_bridge_daemon::codec::{MessageReader, MessageWriter};
use fable_bridge_daemon::{DaemonConnection, Transport};

use crate::common::{Project, session};

/// Answers requests by method until the pipe closes; returns what it saw.
async fn simulated_daemon(
    project_changed: Value,
    initial_compile: Value,
    compile: Value,
    input: DuplexStream,
    output: DuplexStream,
) -> Vec<Value> {
    let mut reader = MessageReader::new(input);
    let mut writer = MessageWriter::new(output);
    let mut seen = Vec::new();

    // Ask the client something first; it must answer without stalling.
    writer
        .write_message(&json!({"jsonrpc": "2.0", "id": "probe", "method": "window/workDoneProgress/create"}))
        .await
        .unwrap();

    while let Ok(Some(frame)) = reader.read_message().await {
        let result = match frame["method"].as_str() {
            Some("fable/project-changed") => project_changed.clone(),
            Some("fable/initial-compile") => initial_compile.clone(),
            Some("fable/compile") => compile.clone(),
            _ => {
                seen.push(frame);
                continue;
            }
        };
        writer
            .write_message(&json!({"jsonrpc": "2.0", "id": frame["id"], "result": result}))
            .await
            .unwrap();
        seen.push(frame);
    }
    seen
}

#[tokio::test]
async fn full_session_over_json_rpc() {
    let project = Project::new();
    let (client_out, daemon_in) = duplex(64 * 1024);
    let (daemon_out, client_in) = duplex(64 * 1024);
    let daemon = tokio::spawn(simulated_daemon(
        project.type_checked(&["a.fs"], &["App.fsproj"]),
        project.compiled_all(&[("a.fs", "out-a")]),
        project.compiled(&[("a.fs", "out-a2")]),
        daemon_in,
        daemon_out,
    ));

    let (session, host) = session(PluginOptions {
        exclude: vec!["Fable.Core".into()],
        no_reflection: true,
        ..PluginOptions::default()
    });
    session.config_resolved(&project.resolved()).await.unwrap();
    session
        .build_start(move || {
            Ok(Box::new(DaemonConnection::from_io(client_in, client_out)) as Box<dyn Transport>)
        })
        .await
        .unwrap();

    assert_eq!(session.compiled_code(&project.path("a.fs")).as_deref(), Some("out-a"));
    assert_eq!(
        session.watch_change(&project.path("a.fs")).await,
        ChangeAction::Incremental
    );
    assert_eq!(session.compiled_code(&project.path("a.fs")).as_deref(), Some("out-a2"));

    session.build_end().await;
    let seen = daemon.await.unwrap();

    let probe_reply = seen.iter().find(|f| f["id"] == "probe").unwrap();
    assert_eq!(probe_reply["error"]["code"], -32601);

    let project_changed = seen
        .iter()
        .find(|f| f["method"] == "fable/project-changed")
        .unwrap();
    let params = &project_changed["params"];
    assert_eq!(params["project"], project.path("App.fsproj"));
    assert_eq!(params["configuration"], "Debug");
    assert_eq!(params["exclude"], json!(["Fable.Core"]));
    assert_eq!(params["noReflection"], true);
    assert!(params["fableLibrary"].as_str().unwrap().ends_with("@fable-org/fable-library-js"));

    let compile = seen.iter().find(|f| f["method"] == "fable/compile").unwrap();
    assert_eq!(compile["params"]["fileName"], project.path("a.fs"));
    assert!(host.errors().is_empty());
}

#[tokio::test]
async fn daemon_exit_surfaces_as_connection_error() {
    let project = Project::new();
    let (client_out, daemon_in) = duplex(64 * 1024);
    let (daemon_out, client_in) = duplex(64 * 1024);
    // The daemon dies before answering anything.
    drop((daemon_in, daemon_out));

    let (session, host) = session(PluginOptions::default());
    session.config_resolved(&project.resolved()).await.unwrap();
    let err = session
        .build_start(move || {
            Ok(Box::new(DaemonConnection::from_io(client_in, client_out)) as Box<dyn Transport>)
        })
        .await
        .unwrap_err();

    assert_eq!(err.kind(), fable_bridge_core::ErrorKind::Connection);
    assert_eq!(host.errors().len(), 1);
    assert!(session.cache_snapshot().is_empty());
}
