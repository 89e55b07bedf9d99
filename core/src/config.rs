use serde::Deserialize;
use std::sync::LazyLock;
use std::{env, fs, path::Path, path::PathBuf};

use regex::Regex;

/// File name looked up next to the project when no `--config` is given.
pub const CONFIG_FILE_NAME: &str = "fable-bridge.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl ConfigError {
    pub fn path(&self) -> &PathBuf {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => path,
        }
    }
}

/// Post-transform applied to compiled output before it reaches the bundler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JsxMode {
    Transform,
    Preserve,
    Automatic,
}

impl JsxMode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            JsxMode::Transform => "transform",
            JsxMode::Preserve => "preserve",
            JsxMode::Automatic => "automatic",
        }
    }
}

impl std::fmt::Display for JsxMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User-facing options of the orchestrator.
///
/// Every field is optional in the file; path values may reference
/// environment variables as `${NAME}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PluginOptions {
    /// Project manifest to compile instead of the discovered one.
    pub fsproj: Option<PathBuf>,
    pub jsx: Option<JsxMode>,
    #[serde(alias = "noReflection")]
    pub no_reflection: bool,
    /// Passed verbatim to the daemon.
    pub exclude: Vec<String>,
    /// Overrides the fable-library lookup.
    #[serde(alias = "fableLibrary")]
    pub fable_library: Option<PathBuf>,
    /// Path of the daemon assembly (`Fable.Daemon.dll`).
    pub daemon: Option<PathBuf>,
}

impl PluginOptions {
    /// Read options from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!("Failed to read config at {:?}: {}", path, err);
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source: err,
                });
            }
        };

        match Self::from_toml_str(&content) {
            Ok(options) => Ok(options),
            Err(err) => {
                tracing::warn!("Failed to parse config at {:?}: {}", path, err);
                Err(ConfigError::Parse {
                    path: path.to_path_buf(),
                    source: err,
                })
            }
        }
    }

    /// Load `path` if given, else `<dir>/fable-bridge.toml` when it exists,
    /// else defaults.
    pub fn discover(path: Option<&Path>, dir: &Path) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            return Self::load(path);
        }
        let candidate = dir.join(CONFIG_FILE_NAME);
        if candidate.is_file() {
            Self::load(&candidate)
        } else {
            Ok(Self::default())
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        let mut options: Self = toml::from_str(content)?;
        options.fsproj = options.fsproj.map(expand_path);
        options.fable_library = options.fable_library.map(expand_path);
        options.daemon = options.daemon.map(expand_path);
        Ok(options)
    }
}

static ENV_REFERENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]*)\}").expect("valid env reference regex"));

/// Replace `${NAME}` with the variable's value; unset variables become empty.
pub fn expand_env_vars(value: &str) -> String {
    ENV_REFERENCE
        .replace_all(value, |caps: &regex::Captures<'_>| {
            let name = &caps[1];
            if name.is_empty() {
                String::new()
            } else {
                env::var(name).unwrap_or_default()
            }
        })
        .into_owned()
}

fn expand_path(path: PathBuf) -> PathBuf {
    match path.to_str() {
        Some(raw) if raw.contains("${") => PathBuf::from(expand_env_vars(raw)),
        _ => path,
    }
}

/// What the host knows once its own configuration is settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    /// The host's config file, if it has one. Discovery looks beside it.
    pub config_file: Option<PathBuf>,
    /// Project root, used when there is no config file.
    pub root: PathBuf,
    /// Host mode, e.g. `development` or `production`.
    pub mode: String,
}

impl ResolvedConfig {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, mode: impl Into<String>) -> Self {
        Self {
            config_file: None,
            root: root.into(),
            mode: mode.into(),
        }
    }

    #[must_use]
    pub fn with_config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_file = Some(path.into());
        self
    }

    /// Directory searched for a project manifest.
    #[must_use]
    pub fn search_dir(&self) -> &Path {
        self.config_file
            .as_deref()
            .and_then(Path::parent)
            .filter(|dir| !dir.as_os_str().is_empty())
            .unwrap_or(&self.root)
    }
}
