//! Transport failures, logical "not found", routing failure and
//! precondition violations each get their own variant so callers can
//! decide how to propagate them instead of pattern-matching on string
//! messages.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("key not found")]
    NotFound,

    #[error("no available successor")]
    NoAvailableSuccessor,

    #[error("precondition violated: {0}")]
    Precondition(&'static str),

    #[error("transport error: {0}")]
    Transport(#[from] tonic::Status),

    #[error("transport error: {0}")]
    Connect(#[from] tonic::transport::Error),
}

impl NodeError {
    /// Maps this error onto the gRPC status the service boundary returns
    /// to the caller; state is left unchanged on failure in every case.
    pub fn into_status(self) -> tonic::Status {
        match self {
            NodeError::NotFound => tonic::Status::not_found("key not found"),
            NodeError::NoAvailableSuccessor => {
                tonic::Status::unavailable("no available successor")
            }
            NodeError::Precondition(msg) => tonic::Status::failed_precondition(msg),
            NodeError::Transport(status) => status,
            NodeError::Connect(err) => tonic::Status::unavailable(err.to_string()),
        }
    }
}

impl From<NodeError> for tonic::Status {
    fn from(err: NodeError) -> Self {
        err.into_status()
    }
}

pub type NodeResult<T> = Result<T, NodeError>;
