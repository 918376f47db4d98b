//! Error types for the document database client.
//!
//! This module defines the central `Error` enum shared by every layer of the
//! client. The request executor is the only place that inspects an error to
//! decide between retrying and surfacing it; see [`Error::is_transient`].
//!
//! ## Error Cases
//! - `Rpc`: The backend answered with an explicit gRPC status.
//! - `Transport`: The call failed without ever producing a status (e.g. the
//!   channel was not ready).
//! - `InvalidArgument`: The request was rejected locally before any network
//!   interaction.
//! - `MissingResult`: A batched read finished without a result for a
//!   requested document.
//! - `UnexpectedResponse`: The backend returned a payload of the wrong shape.
//! - `ProjectIdUnavailable`: No project id was configured or detectable.

use tonic::{Code, Status};

pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Unified error type for the document database client.
#[derive(Clone, thiserror::Error, Debug)]
pub enum Error {
    /// The backend returned an explicit status.
    #[error("RPC error: {0}")]
    Rpc(#[from] Status),

    /// The call failed before the transport produced a status.
    #[error("Transport error: {context}")]
    Transport { context: String },

    /// The request was malformed and never left the process.
    #[error("Invalid argument: {reason}")]
    InvalidArgument { reason: String },

    /// A batched read ended without delivering a requested document.
    #[error("Did not receive document for \"{path}\".")]
    MissingResult { path: String },

    /// The backend response could not be interpreted.
    #[error("Unexpected response: {context}")]
    UnexpectedResponse { context: String },

    /// The project id was neither configured nor detectable.
    #[error("Unable to detect a project id for this client")]
    ProjectIdUnavailable,
}

impl Error {
    /// Shorthand for [`Error::InvalidArgument`].
    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            reason: reason.into(),
        }
    }

    /// Shorthand for [`Error::UnexpectedResponse`].
    pub fn unexpected(context: impl Into<String>) -> Self {
        Self::UnexpectedResponse {
            context: context.into(),
        }
    }

    /// Returns the gRPC code carried by this error, if it has one.
    ///
    /// Only [`Error::Transport`] is code-less: it describes a call that never
    /// reached the point of producing a status. Errors raised locally map to
    /// the code a server would have used for them.
    pub fn code(&self) -> Option<Code> {
        match self {
            Self::Rpc(status) => Some(status.code()),
            Self::Transport { .. } => None,
            Self::InvalidArgument { .. } => Some(Code::InvalidArgument),
            Self::MissingResult { .. } | Self::UnexpectedResponse { .. } => Some(Code::Internal),
            Self::ProjectIdUnavailable => Some(Code::FailedPrecondition),
        }
    }

    /// Whether a failed attempt may be re-issued.
    ///
    /// Only code-less failures and `UNAVAILABLE` qualify. Every other code is
    /// terminal.
    pub fn is_transient(&self) -> bool {
        matches!(self.code(), None | Some(Code::Unavailable))
    }
}

impl From<Error> for Status {
    fn from(err: Error) -> Self {
        match err {
            Error::Rpc(status) => status,
            Error::Transport { context } => Status::unavailable(context),
            Error::InvalidArgument { reason } => Status::invalid_argument(reason),
            Error::MissingResult { path } => {
                Status::internal(format!("Did not receive document for \"{path}\"."))
            }
            Error::UnexpectedResponse { context } => Status::internal(context),
            Error::ProjectIdUnavailable => {
                Status::failed_precondition("Unable to detect a project id for this client")
            }
        }
    }
}
