//! Service error taxonomy.

use thiserror::Error;
use warp::http::StatusCode;

use crate::runtime::RuntimeError;
use crate::voice::VoiceError;

/// Classification callers can branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    NotFound,
    RuntimeFailure,
    TransportFailure,
}

/// Errors returned by [`GenerationService`](super::GenerationService) operations.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Unavailable(String),

    #[error("{0}")]
    RuntimeFailure(String),

    #[error("{0}")]
    TransportFailure(String),
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::InvalidInput(_) => ErrorKind::InvalidInput,
            ServiceError::NotFound(_) => ErrorKind::NotFound,
            ServiceError::Unavailable(_) | ServiceError::RuntimeFailure(_) => ErrorKind::RuntimeFailure,
            ServiceError::TransportFailure(_) => ErrorKind::TransportFailure,
        }
    }

    /// HTTP status reported for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            ServiceError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ServiceError::RuntimeFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
            // the request body could not be read
            ServiceError::TransportFailure(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl From<VoiceError> for ServiceError {
    fn from(err: VoiceError) -> Self {
        match err {
            VoiceError::InvalidAudio(msg) => ServiceError::InvalidInput(msg),
            VoiceError::NotFound(id) => ServiceError::NotFound(format!("Voice not found: {id}")),
            other => ServiceError::RuntimeFailure(other.to_string()),
        }
    }
}

impl From<RuntimeError> for ServiceError {
    fn from(err: RuntimeError) -> Self {
        match err {
            RuntimeError::NotReady(_) => ServiceError::Unavailable(err.to_string()),
            RuntimeError::Inference(msg) => ServiceError::RuntimeFailure(msg),
            other => ServiceError::RuntimeFailure(other.to_string()),
        }
    }
}
