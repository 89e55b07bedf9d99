use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};

use fable_bridge_core::{PluginOptions, ResolvedConfig};

#[derive(Debug, Parser)]
#[command(name = "fable-bridge")]
#[command(about = "Incremental Fable builds driven by the Fable daemon")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Compile the project once and write the output
    Build(BuildArgs),

    /// Compile, then recompile as files change until Ctrl-C
    Watch(BuildArgs),
}

impl Command {
    pub fn args(&self) -> &BuildArgs {
        match self {
            Command::Build(args) | Command::Watch(args) => args,
        }
    }

    pub fn is_watch(&self) -> bool {
        matches!(self, Command::Watch(_))
    }
}

#[derive(Debug, Args)]
pub struct BuildArgs {
    /// Project directory
    #[arg(default_value = ".")]
    pub dir: PathBuf,

    /// Project file to compile instead of the first .fsproj in DIR
    #[arg(long)]
    pub fsproj: Option<PathBuf>,

    /// Config file (defaults to DIR/fable-bridge.toml when present)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Build with the Release configuration
    #[arg(long)]
    pub release: bool,

    /// Where compiled files are written
    #[arg(long, default_value = "dist")]
    pub out_dir: PathBuf,

    /// Path to Fable.Daemon.dll
    #[arg(long)]
    pub daemon: Option<PathBuf>,
}

impl BuildArgs {
    /// Flags win over values from the config file.
    pub fn apply(&self, options: &mut PluginOptions) {
        if let Some(fsproj) = &self.fsproj {
            options.fsproj = Some(fsproj.clone());
        }
        if let Some(daemon) = &self.daemon {
            options.daemon = Some(daemon.clone());
        }
    }

    /// Host view of the run, rooted at the project directory.
    ///
    /// `--config` only feeds option values; the manifest is still looked up
    /// in `dir`, and a relative `--fsproj` resolves against it.
    pub fn resolved(&self, dir: &Path) -> ResolvedConfig {
        ResolvedConfig::new(dir, self.mode())
    }

    pub fn mode(&self) -> &'static str {
        if self.release {
            "production"
        } else {
            "development"
        }
    }
}
