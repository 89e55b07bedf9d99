//! Locating the project manifest and the fable-library runtime.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use fable_bridge_types::SourcePath;

const PROJECT_EXTENSION: &str = "fsproj";

const FABLE_LIBRARY_PACKAGE: &str = "@fable-org/fable-library-js";

/// First `*.fsproj` in `dir` by file name, compared case-insensitively on the
/// extension. `Ok(None)` when the directory has none.
pub fn find_project_file(dir: &Path) -> io::Result<Option<PathBuf>> {
    let mut candidates: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_ok_and(|ty| ty.is_file()))
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case(PROJECT_EXTENSION))
        })
        .collect();
    candidates.sort();
    Ok(candidates.into_iter().next())
}

/// Where the daemon should load fable-library from.
///
/// `install_dir` is the directory this tool is installed in; a package-local
/// `node_modules` copy wins over a sibling package.
#[must_use]
pub fn locate_fable_library(install_dir: &Path, override_path: Option<&Path>) -> SourcePath {
    if let Some(path) = override_path {
        return SourcePath::from(path);
    }
    let local = install_dir.join("node_modules").join(FABLE_LIBRARY_PACKAGE);
    if local.exists() {
        return SourcePath::from(local.as_path());
    }
    SourcePath::from(install_dir.join("..").join(FABLE_LIBRARY_PACKAGE).as_path())
}
