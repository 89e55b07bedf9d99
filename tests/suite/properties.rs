//! Invariants that hold across every successful or failed compile.

use std::collections::BTreeSet;

use serde_json::json;

use fable_bridge_core::DispatchState;

use crate::common::{HostEvent, Project, ScriptedDaemon, failure, started};

fn build_script(project: &Project) -> Vec<serde_json::Value> {
    vec![
        project.type_checked(&["a.fs", "b.fs"], &["App.fsproj"]),
        project.compiled_all(&[("a.fs", "out-a"), ("b.fs", "out-b")]),
    ]
}

#[tokio::test]
async fn full_rebuild_is_idempotent() {
    let project = Project::new();
    let mut script = build_script(&project);
    script.extend(build_script(&project));
    let daemon = ScriptedDaemon::new(script);
    let (session, _host) = started(&project, &daemon).await;
    let first = session.cache_snapshot();

    session.watch_change(&project.path("App.fsproj")).await;

    assert_eq!(session.cache_snapshot(), first);
}

#[tokio::test]
async fn cache_keys_equal_source_list_after_build() {
    let project = Project::new();
    let daemon = ScriptedDaemon::new(build_script(&project));
    let (session, _host) = started(&project, &daemon).await;

    let options = session.project_options().await.unwrap();
    let sources: BTreeSet<String> = options
        .source_files()
        .iter()
        .map(ToString::to_string)
        .collect();
    let keys: BTreeSet<String> = session
        .cache_snapshot()
        .keys()
        .map(ToString::to_string)
        .collect();
    assert_eq!(keys, sources);
}

#[tokio::test]
async fn watch_set_and_cache_are_disjoint() {
    let project = Project::new();
    let daemon = ScriptedDaemon::new(vec![
        // The daemon lists a source file among the dependents.
        project.type_checked(&["a.fs"], &["App.fsproj", "a.fs"]),
        project.compiled_all(&[("a.fs", "out-a")]),
    ]);
    let (session, _host) = started(&project, &daemon).await;

    let cache = session.cache_snapshot();
    for watched in session.watched_dependencies().await {
        assert!(!cache.contains_key(&watched), "{watched} is in both sets");
    }
}

#[tokio::test]
async fn failed_compiles_leave_entries_byte_identical() {
    let project = Project::new();
    let daemon = ScriptedDaemon::new(vec![
        project.type_checked(&["a.fs", "b.fs"], &["App.fsproj"]),
        project.compiled_all(&[("a.fs", "export const a = \"\\u00e9\";\n"), ("b.fs", "out-b")]),
        failure("syntax error"),
        json!({"case": "Success", "fields": []}),
    ]);
    let (session, host) = started(&project, &daemon).await;
    let before = session.cache_snapshot();

    session.watch_change(&project.path("a.fs")).await;
    session.watch_change(&project.path("a.fs")).await;
    // Script exhausted: the daemon is gone.
    session.watch_change(&project.path("a.fs")).await;

    assert_eq!(session.cache_snapshot(), before);
    let errors = host.errors();
    assert_eq!(errors.len(), 3);
    assert!(errors[1].contains(fable_bridge_daemon::UNKNOWN_ERROR));
    assert!(errors[2].contains("could not handle this gracefully"));
    assert_eq!(session.dispatch_state(), DispatchState::Idle);
}

#[tokio::test]
async fn watch_set_and_cache_fill_before_any_load() {
    let project = Project::new();
    let daemon = ScriptedDaemon::new(vec![
        project.type_checked(&["a.fs"], &["App.fsproj"]),
        project.compiled_all(&[("a.fs", "out-a")]),
        project.compiled(&[("a.fs", "out-a2")]),
    ]);
    let (session, host) = started(&project, &daemon).await;
    session.watch_change(&project.path("a.fs")).await;

    let events = host.events();
    let position = |wanted: &HostEvent| events.iter().position(|e| e == wanted).unwrap();
    let dependent = position(&HostEvent::Watch(project.path("App.fsproj")));
    let source = position(&HostEvent::Watch(project.path("a.fs")));
    let load = position(&HostEvent::Load(project.path("a.fs")));
    assert!(dependent < source);
    assert!(source < load);
}

#[tokio::test]
async fn type_check_diagnostics_are_reported_without_stopping_the_build() {
    let project = Project::new();
    let a = project.path("a.fs");
    let diagnostic = |severity: &str, code: &str| {
        json!({
            "errorNumberText": code,
            "message": "Something is off",
            "range": {"startLine": 1, "startColumn": 2, "endLine": 1, "endColumn": 8},
            "severity": severity,
            "fileName": a,
        })
    };
    let daemon = ScriptedDaemon::new(vec![
        json!({
            "case": "Success",
            "fields": [
                {"sourceFiles": [a]},
                [diagnostic("Error", "FS0039"), diagnostic("Warning", "FS0064"), diagnostic("hidden", "FS3370")],
                [project.path("App.fsproj")]
            ]
        }),
        project.compiled_all(&[("a.fs", "out-a")]),
    ]);
    let (session, host) = started(&project, &daemon).await;

    let warnings = host.warnings();
    assert_eq!(warnings.len(), 2);
    assert_eq!(
        warnings[0],
        format!("ERROR FS0039: Something is off {a} (1,2) (1,8)")
    );
    assert!(warnings[1].starts_with("WARNING FS0064"));
    assert!(host.events().contains(&HostEvent::Info(format!(
        "HIDDEN FS3370: Something is off {a} (1,2) (1,8)"
    ))));
    assert_eq!(session.compiled_code(&a).as_deref(), Some("out-a"));
}
