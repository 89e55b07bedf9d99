//! Writing compiled modules to the output directory.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use fable_bridge_types::SourcePath;

/// Maps source files under `root` to `<out_dir>/<relative>.js`.
#[derive(Debug, Clone)]
pub struct Emitter {
    root: SourcePath,
    out_dir: PathBuf,
}

impl Emitter {
    pub fn new(root: &Path, out_dir: PathBuf) -> Self {
        Self {
            root: SourcePath::from(root),
            out_dir,
        }
    }

    /// Files outside `root` land directly in the output directory.
    pub fn output_path(&self, source: &SourcePath) -> PathBuf {
        let relative = source
            .as_str()
            .strip_prefix(self.root.as_str())
            .and_then(|rest| rest.strip_prefix('/'))
            .unwrap_or_else(|| source.file_name());
        self.out_dir.join(format!("{relative}.js"))
    }

    pub fn write(&self, source: &SourcePath, code: &str) -> Result<PathBuf> {
        let path = self.output_path(source);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        fs::write(&path, code).with_context(|| format!("failed to write {}", path.display()))?;
        tracing::debug!(source = %source, output = %path.display(), "Emitted");
        Ok(path)
    }
}
