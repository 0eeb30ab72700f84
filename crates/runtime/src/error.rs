use thiserror::Error;

use crate::orchestrator::OrchestrationError;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Orchestration(#[from] OrchestrationError),

    #[error(transparent)]
    Connect(#[from] mcp::ConnectError),
}

pub type Result<T> = std::result::Result<T, Error>;
