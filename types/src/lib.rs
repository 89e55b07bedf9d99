//! Core domain types for fable-bridge.
//!
//! This crate contains pure domain types with no IO, no async, and minimal dependencies.
//! The daemon client, the orchestrator and the command-line host all speak in these types.

// Pedantic lint configuration - these are intentional design choices
#![allow(clippy::missing_errors_doc)] // Result-returning functions are self-explanatory
#![allow(clippy::missing_panics_doc)] // Panics are documented in assertions

mod diagnostic;
mod path;

pub use diagnostic::{Diagnostic, DiagnosticRange, DiagnosticSeverity};
pub use path::{SourcePath, is_compilable_source, normalize_path};

use serde::{Deserialize, Serialize};

// ============================================================================
// Build Configuration
// ============================================================================

/// Build configuration forwarded to the compiler daemon.
///
/// Development builds map to `Debug`, production builds to `Release`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BuildConfiguration {
    #[default]
    Debug,
    Release,
}

impl BuildConfiguration {
    /// Derive the configuration from the host's mode string (e.g. `production`).
    #[must_use]
    pub fn from_mode(mode: &str) -> Self {
        if mode.eq_ignore_ascii_case("production") {
            Self::Release
        } else {
            Self::Debug
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "Debug",
            Self::Release => "Release",
        }
    }
}

impl std::fmt::Display for BuildConfiguration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Project Options
// ============================================================================

/// Resolved compiler configuration for a project.
///
/// Produced by the type-check phase of a full compile and replaced wholesale on
/// every full recompile. `source_files` is in compile order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectOptions {
    #[serde(default)]
    source_files: Vec<SourcePath>,
}

impl ProjectOptions {
    #[must_use]
    pub fn new(source_files: Vec<SourcePath>) -> Self {
        Self { source_files }
    }

    /// Source files in compile order.
    #[must_use]
    pub fn source_files(&self) -> &[SourcePath] {
        &self.source_files
    }

    #[must_use]
    pub fn contains(&self, path: &SourcePath) -> bool {
        self.source_files.contains(path)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.source_files.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.source_files.is_empty()
    }
}
