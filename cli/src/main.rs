//! fable-bridge - compile an F# project through the Fable daemon.
//!
//! ```text
//! main() -> run() -> Session::config_resolved -> build_start -> emit_all
//!                                                                  |
//!                        build: build_end <------------------------+
//!                        watch: watch_loop (file events, reloads, Ctrl-C) -> build_end
//! ```
//!
//! The binary plays the bundler's part: it logs host lines through `tracing`,
//! watches every file the session registers, and re-emits a module whenever
//! the session asks for it to be reloaded.

mod args;
mod emit;
mod host;
mod watcher;

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use fable_bridge_core::{ChangeAction, PluginOptions, Session};
use fable_bridge_daemon::{DaemonConnection, DaemonLaunch, Transport};
use fable_bridge_types::SourcePath;

use crate::args::Cli;
use crate::emit::Emitter;
use crate::host::{CliHost, HostChannels};
use crate::watcher::FileWatcher;

fn init_tracing(verbose: bool) {
    let env_filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new("info"))
            .unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(env_filter)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            tracing::error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let args = cli.command.args();
    let dir = args
        .dir
        .canonicalize()
        .with_context(|| format!("project directory {} not found", args.dir.display()))?;

    let mut options = PluginOptions::discover(args.config.as_deref(), &dir)?;
    args.apply(&mut options);
    let assembly = options
        .daemon
        .clone()
        .context("no daemon assembly: pass --daemon or set `daemon` in fable-bridge.toml")?;

    let (host, channels) = CliHost::new();
    let session = Session::new(options, Arc::new(host));

    if session.config_resolved(&args.resolved(&dir)).await.is_err() {
        return Ok(ExitCode::FAILURE);
    }

    let mut launch = DaemonLaunch::new(assembly);
    launch.working_dir = Some(dir.clone());
    // Failures are already logged; an empty cache is handled below.
    let _ = session
        .build_start(|| {
            DaemonConnection::spawn(&launch).map(|c| Box::new(c) as Box<dyn Transport>)
        })
        .await;

    let out_dir = if args.out_dir.is_absolute() {
        args.out_dir.clone()
    } else {
        dir.join(&args.out_dir)
    };
    let emitter = Emitter::new(&dir, out_dir);
    let written = emit_all(&session, &emitter).await?;
    tracing::info!(files = written, "Wrote compiled output");

    let code = if cli.command.is_watch() {
        if let Err(e) = watch_loop(&session, &emitter, channels).await {
            tracing::error!("{e:#}");
        }
        ExitCode::SUCCESS
    } else if written == 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    };

    session.build_end().await;
    Ok(code)
}

async fn emit_all(session: &Session, emitter: &Emitter) -> Result<usize> {
    let Some(options) = session.project_options().await else {
        return Ok(0);
    };
    let mut written = 0;
    for file in options.source_files() {
        if emit_one(session, emitter, file).await? {
            written += 1;
        }
    }
    Ok(written)
}

async fn emit_one(session: &Session, emitter: &Emitter, file: &SourcePath) -> Result<bool> {
    match session.transform(file.as_str()).await {
        Some(output) => {
            emitter.write(file, &output.code)?;
            Ok(true)
        }
        None => Ok(false),
    }
}

async fn watch_loop(session: &Session, emitter: &Emitter, channels: HostChannels) -> Result<()> {
    let HostChannels {
        mut registrations,
        mut reloads,
    } = channels;
    let mut watcher = FileWatcher::new()?;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    tracing::info!("Watching for changes, press Ctrl-C to stop");

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                tracing::info!("Stopping");
                break;
            }
            Some(path) = registrations.recv() => {
                if let Err(e) = watcher.watch(&path) {
                    tracing::warn!("{e:#}");
                }
            }
            Some(path) = reloads.recv() => {
                if let Err(e) = emit_one(session, emitter, &path).await {
                    tracing::error!("{e:#}");
                }
            }
            Some(path) = watcher.recv() => {
                let action = session.watch_change(path.as_str()).await;
                tracing::debug!(%path, ?action, "Handled change");
                if action == ChangeAction::FullRebuild {
                    match emit_all(session, emitter).await {
                        Ok(written) => tracing::info!(files = written, "Wrote compiled output"),
                        Err(e) => tracing::error!("{e:#}"),
                    }
                }
            }
        }
    }
    Ok(())
}
