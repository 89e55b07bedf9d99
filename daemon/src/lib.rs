//! JSON-RPC client for the Fable compiler daemon.

pub mod codec;
pub mod protocol;

mod client;
mod connection;
mod error;

pub use client::{DaemonClient, Transport, TransportFut};
pub use connection::{DEBUG_ENV_VAR, DaemonConnection, DaemonLaunch, KillSwitch};
pub use error::{DaemonError, UNKNOWN_ERROR};
pub use protocol::{Compiled, CompiledFiles, Method, Outcome, ProjectChanged, ProjectChangedParams};
