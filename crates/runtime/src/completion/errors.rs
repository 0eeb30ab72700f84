use reqwest::StatusCode;
use thiserror::Error;

/// Errors from a completion round.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CompletionError {
    /// The endpoint answered with a non-2xx status. Never retried here.
    #[error("completion endpoint returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    /// The request did not reach the endpoint or the response was cut off.
    #[error("network: {0}")]
    Network(String),

    /// The response body could not be decoded or had no choices.
    #[error("invalid completion response: {0}")]
    InvalidResponse(String),
}
