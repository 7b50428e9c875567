//! Error types for the vCloud Director volume adapter.

use thiserror::Error;

use crate::config::ConfigError;
use crate::vcloud::codec::CodecError;
use crate::volume::VolumeRequestError;

/// Errors raised by the vCloud Director volume adapter.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum VolumeError {
    /// Raised when the caller asked for something the provider cannot do.
    #[error("invalid volume request: {0}")]
    InvalidRequest(String),
    /// Raised when a referenced resource does not exist.
    #[error("{kind} {id} not found")]
    NotFound {
        /// Kind of resource that was looked up.
        kind: String,
        /// Identifier that was looked up.
        id: String,
    },
    /// Raised when the account is not entitled to use volumes.
    #[error("not subscribed to volume support (operation: {operation})")]
    NotSubscribed {
        /// Operation that required the entitlement.
        operation: String,
    },
    /// Raised when the provider reported success with an unusable response.
    #[error("general failure: {0}")]
    GeneralFailure(String),
    /// Raised when an asynchronous task finished in an error state.
    #[error("remote task {task} failed: {message}")]
    RemoteOperationFailed {
        /// Task reference reported by the provider.
        task: String,
        /// Error detail attached to the task.
        message: String,
    },
    /// Raised when provider data contradicts itself.
    #[error("internal inconsistency: {0}")]
    InternalInconsistency(String),
    /// Raised when an asynchronous operation exceeds its time bound.
    #[error("timeout waiting for {action} on {resource_id}")]
    Timeout {
        /// Action being waited on.
        action: String,
        /// Resource being waited on.
        resource_id: String,
    },
    /// Wrapper for transport and unexpected HTTP failures.
    #[error("provider error: {message}")]
    Provider {
        /// Message describing the failure.
        message: String,
    },
    /// Raised when the configuration is incomplete.
    #[error("configuration error: {0}")]
    Config(String),
}

impl VolumeError {
    /// Builds a [`VolumeError::NotFound`] for the given resource kind.
    pub(crate) fn not_found(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: kind.into(),
            id: id.into(),
        }
    }

    /// Returns `true` for [`VolumeError::NotFound`].
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<reqwest::Error> for VolumeError {
    fn from(value: reqwest::Error) -> Self {
        Self::Provider {
            message: value.to_string(),
        }
    }
}

impl From<VolumeRequestError> for VolumeError {
    fn from(value: VolumeRequestError) -> Self {
        match value {
            VolumeRequestError::Validation(field) => {
                Self::InvalidRequest(format!("missing or empty field: {field}"))
            }
        }
    }
}

impl From<ConfigError> for VolumeError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value.to_string())
    }
}

impl From<CodecError> for VolumeError {
    fn from(value: CodecError) -> Self {
        Self::GeneralFailure(value.to_string())
    }
}
