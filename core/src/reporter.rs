//! Routes compiler diagnostics to the host's log sinks.

use fable_bridge_types::Diagnostic;

use crate::host::Host;

/// Counts of what was reported, for the caller's own summary line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiagnosticSummary {
    pub errors: usize,
    pub warnings: usize,
    pub infos: usize,
}

/// Log every diagnostic as one line. Errors and warnings go to the warning
/// sink; compilation continues regardless of severity.
pub fn report_diagnostics(host: &dyn Host, diagnostics: &[Diagnostic]) -> DiagnosticSummary {
    let mut summary = DiagnosticSummary::default();
    for diagnostic in diagnostics {
        let line = diagnostic.to_string();
        let severity = diagnostic.severity();
        if severity.is_warning_class() {
            host.warn(&line);
        } else {
            host.info(&line);
        }
        if severity.is_error() {
            summary.errors += 1;
        } else if severity.is_warning_class() {
            summary.warnings += 1;
        } else {
            summary.infos += 1;
        }
    }
    if !diagnostics.is_empty() {
        tracing::debug!(
            errors = summary.errors,
            warnings = summary.warnings,
            infos = summary.infos,
            "Reported diagnostics"
        );
    }
    summary
}
