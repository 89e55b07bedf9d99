//! Files whose change invalidates the whole project.

use std::collections::BTreeSet;

use fable_bridge_types::SourcePath;

/// Dependent files reported by the type-check phase: the project manifest and
/// referenced non-source files. Changing one triggers a full rebuild.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchSet {
    paths: BTreeSet<SourcePath>,
}

impl WatchSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if the path was already present.
    pub fn insert(&mut self, path: SourcePath) -> bool {
        self.paths.insert(path)
    }

    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.paths.contains(path)
    }

    pub fn clear(&mut self) {
        self.paths.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SourcePath> {
        self.paths.iter()
    }
}
