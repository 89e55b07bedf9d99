//! Wire types for the Fable daemon protocol.
//!
//! Every call returns an F# discriminated union serialized as
//! `{ "case": "...", "fields": [...] }`. [`TaggedResult::into_outcome`] turns it
//! into an explicit [`Outcome`], and the `decode_*` functions give each method's
//! success payload a concrete shape.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use fable_bridge_types::{BuildConfiguration, Diagnostic, DiagnosticRange, ProjectOptions, SourcePath};

use crate::error::{DaemonError, UNKNOWN_ERROR};

const SUCCESS_CASE: &str = "Success";

/// The three calls the daemon understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    ProjectChanged,
    InitialCompile,
    Compile,
}

impl Method {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ProjectChanged => "fable/project-changed",
            Self::InitialCompile => "fable/initial-compile",
            Self::Compile => "fable/compile",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct Request {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl Request {
    pub fn new(id: u64, method: Method, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method: method.as_str(),
            params,
        }
    }
}

// ============================================================================
// Tagged results
// ============================================================================

/// Raw `{ case, fields }` union as sent by the daemon.
#[derive(Debug, Clone, Deserialize)]
pub struct TaggedResult {
    pub case: String,
    #[serde(default)]
    pub fields: Vec<Value>,
}

/// Decoded result of a daemon call.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success(Vec<Value>),
    Failure(String),
}

impl TaggedResult {
    /// Any case other than `Success` is a failure whose message is `fields[0]`.
    #[must_use]
    pub fn into_outcome(self) -> Outcome {
        if self.case == SUCCESS_CASE {
            return Outcome::Success(self.fields);
        }
        let message = match self.fields.into_iter().next() {
            Some(Value::String(s)) if !s.is_empty() => s,
            Some(Value::Null | Value::Bool(false)) | None => String::from(UNKNOWN_ERROR),
            Some(Value::String(_)) => String::from(UNKNOWN_ERROR),
            Some(other) => other.to_string(),
        };
        Outcome::Failure(message)
    }
}

/// Decode a JSON-RPC `result` into success fields, or the failure as an error.
pub(crate) fn success_fields(method: Method, result: Value) -> Result<Vec<Value>, DaemonError> {
    let tagged: TaggedResult = serde_json::from_value(result)
        .map_err(|e| DaemonError::protocol(method.as_str(), e))?;
    match tagged.into_outcome() {
        Outcome::Success(fields) => Ok(fields),
        Outcome::Failure(message) => Err(DaemonError::compile(Some(message))),
    }
}

fn required_field<T: DeserializeOwned>(
    fields: &mut std::vec::IntoIter<Value>,
    method: Method,
    name: &str,
) -> Result<T, DaemonError> {
    let value = fields
        .next()
        .ok_or_else(|| DaemonError::protocol(method.as_str(), format!("missing {name}")))?;
    serde_json::from_value(value)
        .map_err(|e| DaemonError::protocol(method.as_str(), format!("{name}: {e}")))
}

fn optional_field<T: DeserializeOwned + Default>(
    fields: &mut std::vec::IntoIter<Value>,
    method: Method,
    name: &str,
) -> Result<T, DaemonError> {
    match fields.next() {
        None | Some(Value::Null) => Ok(T::default()),
        Some(value) => serde_json::from_value(value)
            .map_err(|e| DaemonError::protocol(method.as_str(), format!("{name}: {e}"))),
    }
}

// ============================================================================
// Parameters
// ============================================================================

/// Parameters of `fable/project-changed`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectChangedParams {
    pub configuration: BuildConfiguration,
    pub project: String,
    pub fable_library: String,
    pub exclude: Vec<String>,
    pub no_reflection: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CompileParams<'a> {
    pub file_name: &'a str,
}

// ============================================================================
// Payloads
// ============================================================================

/// Compiled JavaScript keyed by normalized source path.
pub type CompiledFiles = BTreeMap<SourcePath, String>;

/// Success payload of `fable/project-changed`.
#[derive(Debug, Clone, Default)]
pub struct ProjectChanged {
    pub project_options: ProjectOptions,
    pub diagnostics: Vec<Diagnostic>,
    /// Non-primary files whose change invalidates the whole project.
    pub dependent_files: Vec<SourcePath>,
}

/// Success payload of `fable/compile`.
#[derive(Debug, Clone, Default)]
pub struct Compiled {
    pub files: CompiledFiles,
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireDiagnostic {
    #[serde(default)]
    error_number_text: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    range: Option<WireRange>,
    #[serde(default)]
    severity: String,
    #[serde(default)]
    file_name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct WireRange {
    start_line: u32,
    start_column: u32,
    end_line: u32,
    end_column: u32,
}

impl WireDiagnostic {
    fn into_diagnostic(self) -> Diagnostic {
        let range = self.range.unwrap_or_default();
        Diagnostic::from_wire(
            &self.severity,
            self.error_number_text,
            self.message,
            self.file_name,
            DiagnosticRange {
                start_line: range.start_line,
                start_column: range.start_column,
                end_line: range.end_line,
                end_column: range.end_column,
            },
        )
    }
}

fn diagnostics(wire: Vec<WireDiagnostic>) -> Vec<Diagnostic> {
    wire.into_iter().map(WireDiagnostic::into_diagnostic).collect()
}

fn compiled_files(raw: BTreeMap<String, String>) -> CompiledFiles {
    raw.into_iter()
        .map(|(file, code)| (SourcePath::new(file), code))
        .collect()
}

pub(crate) fn decode_project_changed(fields: Vec<Value>) -> Result<ProjectChanged, DaemonError> {
    let method = Method::ProjectChanged;
    let mut fields = fields.into_iter();
    let project_options: ProjectOptions = required_field(&mut fields, method, "projectOptions")?;
    let wire: Vec<WireDiagnostic> = optional_field(&mut fields, method, "diagnostics")?;
    let dependent_files: Vec<SourcePath> = optional_field(&mut fields, method, "dependentFiles")?;
    Ok(ProjectChanged {
        project_options,
        diagnostics: diagnostics(wire),
        dependent_files,
    })
}

pub(crate) fn decode_initial_compile(fields: Vec<Value>) -> Result<CompiledFiles, DaemonError> {
    let mut fields = fields.into_iter();
    let raw: BTreeMap<String, String> =
        required_field(&mut fields, Method::InitialCompile, "compiledFiles")?;
    Ok(compiled_files(raw))
}

/// A success case with no fields counts as a failure.
pub(crate) fn decode_compile(fields: Vec<Value>) -> Result<Compiled, DaemonError> {
    if fields.is_empty() {
        return Err(DaemonError::compile(None));
    }
    let method = Method::Compile;
    let mut fields = fields.into_iter();
    let raw: BTreeMap<String, String> = required_field(&mut fields, method, "compiledFiles")?;
    let wire: Vec<WireDiagnostic> = optional_field(&mut fields, method, "diagnostics")?;
    Ok(Compiled {
        files: compiled_files(raw),
        diagnostics: diagnostics(wire),
    })
}
