//! Normalized source-file identity.
//!
//! The daemon, the host bundler and the file watcher each report paths in their
//! own spelling. Every cache and watch-set key goes through [`normalize_path`]
//! so that `C:\app\A.fs` and `C:/app/./A.fs` name the same file.

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Extensions reserved for the project's primary language.
const COMPILABLE_EXTENSIONS: [&str; 2] = ["fs", "fsi"];

/// Normalize a path to forward slashes with `.`/`..` segments resolved.
///
/// Leading `..` segments of relative paths are kept; `..` never climbs above
/// the root or a drive prefix.
#[must_use]
pub fn normalize_path(raw: &str) -> String {
    let slashed = raw.replace('\\', "/");
    let absolute = slashed.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();

    for segment in slashed.split('/') {
        match segment {
            "" | "." => {}
            ".." => match parts.last() {
                Some(last) if *last != ".." && !is_drive(last, parts.len()) => {
                    parts.pop();
                }
                Some(last) if is_drive(last, parts.len()) => {}
                _ if absolute => {}
                _ => parts.push(".."),
            },
            other => parts.push(other),
        }
    }

    let joined = parts.join("/");
    if absolute {
        format!("/{joined}")
    } else if joined.is_empty() {
        String::from(".")
    } else {
        joined
    }
}

fn is_drive(segment: &str, depth: usize) -> bool {
    depth == 1 && segment.len() == 2 && segment.ends_with(':')
}

/// Whether the path names a compilable source file (`.fs` / `.fsi`).
#[must_use]
pub fn is_compilable_source(path: &str) -> bool {
    path.rsplit_once('.')
        .is_some_and(|(stem, ext)| !stem.is_empty() && COMPILABLE_EXTENSIONS.contains(&ext))
}

/// A normalized file path used as a cache or watch-set key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct SourcePath(String);

impl SourcePath {
    #[must_use]
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(normalize_path(raw.as_ref()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_compilable(&self) -> bool {
        is_compilable_source(&self.0)
    }

    /// File name portion (after the last `/`).
    #[must_use]
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }
}

impl From<String> for SourcePath {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for SourcePath {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<&std::path::Path> for SourcePath {
    fn from(value: &std::path::Path) -> Self {
        Self::new(value.to_string_lossy())
    }
}

impl From<SourcePath> for String {
    fn from(value: SourcePath) -> Self {
        value.0
    }
}

impl Borrow<str> for SourcePath {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for SourcePath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourcePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
