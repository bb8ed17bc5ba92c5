//! Error types shared across the client core.
//!
//! Transport problems are [`ApiError`]; workflow rule violations (submitting a
//! closed session, double submission, illegal status changes) are
//! [`WorkflowError`]. None of them are fatal: callers log and surface them.

use thiserror::Error;

use crate::models::RequestStatus;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    /// No response: connect failure, timeout, broken transfer.
    #[error("{0}")]
    Network(String),

    /// The backend answered with a non-2xx status.
    #[error("{message} (HTTP {status})")]
    Server { status: u16, message: String },

    /// The body was not the JSON shape we expected.
    #[error("Invalid JSON from inventory backend: {0}")]
    Parse(String),

    #[error("Invalid inventory backend URL: {0}")]
    InvalidUrl(String),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Server { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("No reconciliation session is open")]
    SessionClosed,

    #[error("A return is already being submitted")]
    AlreadySubmitting,

    #[error("Cannot change request status from {from} to {to}")]
    InvalidTransition {
        from: RequestStatus,
        to: RequestStatus,
    },

    #[error("Request {request_id} cannot be returned in status {status:?}")]
    NotReturnable {
        request_id: i64,
        status: Option<RequestStatus>,
    },

    #[error("Shelf slot {0} does not exist")]
    NoSuchSlot(u8),

    #[error(transparent)]
    Api(#[from] ApiError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config file: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid config value: {0}")]
    Invalid(String),
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Credential store error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("Stored operator identity is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;
