//! Compiled output keyed by normalized source path.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use fable_bridge_types::SourcePath;

/// Compiled JavaScript per project source file.
///
/// A key with `None` is a project file the daemon produced no output for;
/// the transform hook declines it like an unknown file.
#[derive(Debug, Default)]
pub struct CompilationCache {
    entries: HashMap<SourcePath, Option<String>>,
}

impl CompilationCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&mut self, path: SourcePath, code: Option<String>) {
        self.entries.insert(path, code);
    }

    /// Compiled text for `path`, if any.
    #[must_use]
    pub fn code(&self, path: &str) -> Option<&str> {
        self.entries.get(path).and_then(Option::as_deref)
    }

    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Ordered copy of every entry.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<SourcePath, Option<String>> {
        self.entries
            .iter()
            .map(|(path, code)| (path.clone(), code.clone()))
            .collect()
    }
}

/// Cache shared between the compile queue and the transform hook.
///
/// Guards are synchronous and must never be held across an `.await`.
#[derive(Debug, Clone, Default)]
pub struct SharedCache(Arc<RwLock<CompilationCache>>);

impl SharedCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read(&self) -> RwLockReadGuard<'_, CompilationCache> {
        self.0.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, CompilationCache> {
        self.0.write().unwrap_or_else(PoisonError::into_inner)
    }
}
