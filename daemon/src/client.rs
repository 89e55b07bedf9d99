//! Typed client for the three daemon calls.
//!
//! [`Transport`] is the seam between the typed calls and the wire: the real
//! implementation is [`DaemonConnection`]; tests script responses in memory.

use std::future::Future;
use std::pin::Pin;

use serde_json::Value;

use fable_bridge_types::SourcePath;

use crate::connection::{DaemonConnection, KillSwitch};
use crate::error::DaemonError;
use crate::protocol::{
    self, CompileParams, Compiled, CompiledFiles, Method, ProjectChanged, ProjectChangedParams,
};

pub type TransportFut<'a> = Pin<Box<dyn Future<Output = Result<Value, DaemonError>> + Send + 'a>>;

/// A request/response channel to a compiler daemon.
///
/// `request` resolves to the JSON-RPC `result` of the call. Implementations
/// must fail with [`DaemonError::Connection`] once the channel is gone.
pub trait Transport: Send {
    fn request<'a>(&'a mut self, method: Method, params: Option<Value>) -> TransportFut<'a>;

    /// Handle that tears the channel down without going through `&mut self`.
    fn kill_switch(&self) -> KillSwitch;
}

impl Transport for DaemonConnection {
    fn request<'a>(&'a mut self, method: Method, params: Option<Value>) -> TransportFut<'a> {
        Box::pin(DaemonConnection::request(self, method, params))
    }

    fn kill_switch(&self) -> KillSwitch {
        DaemonConnection::kill_switch(self)
    }
}

/// Typed calls over a [`Transport`]. One request in flight at a time (`&mut self`).
pub struct DaemonClient {
    transport: Box<dyn Transport>,
}

impl DaemonClient {
    #[must_use]
    pub fn new(transport: Box<dyn Transport>) -> Self {
        Self { transport }
    }

    async fn call(&mut self, method: Method, params: Option<Value>) -> Result<Vec<Value>, DaemonError> {
        let result = self.transport.request(method, params).await?;
        protocol::success_fields(method, result)
    }

    /// Type-check the project and resolve its options.
    pub async fn project_changed(
        &mut self,
        params: &ProjectChangedParams,
    ) -> Result<ProjectChanged, DaemonError> {
        let method = Method::ProjectChanged;
        let params =
            serde_json::to_value(params).map_err(|e| DaemonError::protocol(method.as_str(), e))?;
        let fields = self.call(method, Some(params)).await?;
        protocol::decode_project_changed(fields)
    }

    /// Compile every source file of the project last passed to `project_changed`.
    pub async fn initial_compile(&mut self) -> Result<CompiledFiles, DaemonError> {
        let fields = self.call(Method::InitialCompile, None).await?;
        protocol::decode_initial_compile(fields)
    }

    /// Recompile one changed source file.
    pub async fn compile(&mut self, file: &SourcePath) -> Result<Compiled, DaemonError> {
        let method = Method::Compile;
        let params = serde_json::to_value(CompileParams {
            file_name: file.as_str(),
        })
        .map_err(|e| DaemonError::protocol(method.as_str(), e))?;
        let fields = self.call(method, Some(params)).await?;
        protocol::decode_compile(fields)
    }

    #[must_use]
    pub fn kill_switch(&self) -> KillSwitch {
        self.transport.kill_switch()
    }
}
