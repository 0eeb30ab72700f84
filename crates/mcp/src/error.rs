//! Tool transport error types.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that prevent a tool transport session from being established.
///
/// A connect error is recoverable: the transport stays usable and the next
/// [`ToolTransport::initialize`](crate::ToolTransport::initialize) call
/// retries from scratch.
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum ConnectError {
    /// The tool server could not be reached or the handshake failed.
    #[error("tool server unreachable: {0}")]
    Unreachable(String),

    /// The handshake did not finish within the connect timeout.
    #[error("timed out after {0}ms waiting for tool server")]
    Timeout(u64),

    /// The tool catalog could not be fetched.
    #[error("failed to list tools: {0}")]
    Catalog(String),

    /// The server answered but advertised no tools.
    #[error("tool server advertised no tools")]
    EmptyCatalog,
}

/// Errors from a single tool invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[non_exhaustive]
pub enum ToolError {
    /// `call_tool` was used before the transport was initialized.
    #[error("tool transport not connected")]
    NotConnected,

    /// The underlying connection was lost during the call.
    #[error("tool transport disconnected: {0}")]
    Disconnected(String),

    /// The arguments could not be sent in the shape the transport needs.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The tool ran and reported a failure.
    #[error("execution failed: {0}")]
    Execution(String),
}

pub type Result<T, E = ToolError> = std::result::Result<T, E>;
