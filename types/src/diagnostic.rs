//! Compiler diagnostics.
//!
//! Diagnostics are ephemeral: produced per compile call, reported, dropped.

use std::fmt;

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DiagnosticSeverity {
    Error,
    Warning,
    Info,
}

impl DiagnosticSeverity {
    /// Parse the daemon's severity string, case-insensitively.
    ///
    /// Anything other than `error` or `warning` is informational.
    #[must_use]
    pub fn from_wire(raw: &str) -> Self {
        if raw.eq_ignore_ascii_case("error") {
            Self::Error
        } else if raw.eq_ignore_ascii_case("warning") {
            Self::Warning
        } else {
            Self::Info
        }
    }

    #[must_use]
    pub fn is_error(self) -> bool {
        self == Self::Error
    }

    /// Errors and warnings go to the host's warning sink.
    #[must_use]
    pub fn is_warning_class(self) -> bool {
        matches!(self, Self::Error | Self::Warning)
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Info => "info",
        }
    }
}

/// Half-open line/column range of a diagnostic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiagnosticRange {
    pub start_line: u32,
    pub start_column: u32,
    pub end_line: u32,
    pub end_column: u32,
}

/// A single diagnostic emitted by the compiler daemon.
///
/// Fields are private; construct via [`Diagnostic::new`] or
/// [`Diagnostic::from_wire`] and read via accessors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    severity: DiagnosticSeverity,
    /// Severity as the daemon spelled it; shown verbatim even when routed as info.
    label: String,
    /// Compiler error number, e.g. `FS0039`.
    code: String,
    message: String,
    file: String,
    range: DiagnosticRange,
}

impl Diagnostic {
    #[must_use]
    pub fn new(
        severity: DiagnosticSeverity,
        code: impl Into<String>,
        message: impl Into<String>,
        file: impl Into<String>,
        range: DiagnosticRange,
    ) -> Self {
        Self {
            severity,
            label: severity.label().to_string(),
            code: code.into(),
            message: message.into(),
            file: file.into(),
            range,
        }
    }

    /// Build from the daemon's raw severity string.
    #[must_use]
    pub fn from_wire(
        severity: &str,
        code: impl Into<String>,
        message: impl Into<String>,
        file: impl Into<String>,
        range: DiagnosticRange,
    ) -> Self {
        Self {
            label: severity.to_string(),
            ..Self::new(DiagnosticSeverity::from_wire(severity), code, message, file, range)
        }
    }

    #[must_use]
    pub fn severity(&self) -> DiagnosticSeverity {
        self.severity
    }

    #[must_use]
    pub fn range(&self) -> DiagnosticRange {
        self.range
    }
}

/// `SEVERITY CODE: message file (startLine,startCol) (endLine,endCol)`
impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let r = self.range;
        write!(
            f,
            "{} {}: {} {} ({},{}) ({},{})",
            self.label.to_ascii_uppercase(),
            self.code,
            self.message,
            self.file,
            r.start_line,
            r.start_column,
            r.end_line,
            r.end_column,
        )
    }
}
