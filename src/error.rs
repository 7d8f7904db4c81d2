use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum AuthzError {
    #[error("invalid entity: {0}")]
    InvalidEntity(String),

    #[error("invalid attribute FQN: {0}")]
    InvalidAttributeFqn(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("crypto error: {0}")]
    Crypto(String),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("policy store unavailable: {0}")]
    PolicyStoreUnavailable(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("invalid token: {0}")]
    InvalidToken(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("Poisoned lock error: {0}")]
    PoisonedLock(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AuthzError {
    /// The status name the transport layer should surface for this error.
    pub fn code(&self) -> &'static str {
        match self {
            AuthzError::InvalidEntity(_)
            | AuthzError::InvalidAttributeFqn(_)
            | AuthzError::InvalidKey(_)
            | AuthzError::InvalidRequest(_) => "INVALID_ARGUMENT",
            AuthzError::InvalidToken(_) => "UNAUTHENTICATED",
            AuthzError::PermissionDenied(_) => "PERMISSION_DENIED",
            AuthzError::PolicyStoreUnavailable(_) => "UNAVAILABLE",
            AuthzError::Crypto(_)
            | AuthzError::Config(_)
            | AuthzError::PoisonedLock(_)
            | AuthzError::Internal(_) => "INTERNAL",
        }
    }
}

impl From<hex::FromHexError> for AuthzError {
    fn from(err: hex::FromHexError) -> Self {
        AuthzError::Crypto(format!("malformed hex: {err}"))
    }
}

impl From<serde_json::Error> for AuthzError {
    fn from(err: serde_json::Error) -> Self {
        AuthzError::InvalidRequest(err.to_string())
    }
}

impl From<base64::DecodeError> for AuthzError {
    fn from(err: base64::DecodeError) -> Self {
        AuthzError::InvalidRequest(format!("base64: {err}"))
    }
}

impl From<jsonwebtoken::errors::Error> for AuthzError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        AuthzError::InvalidToken(err.to_string())
    }
}

impl From<rsa::Error> for AuthzError {
    fn from(err: rsa::Error) -> Self {
        AuthzError::Crypto(err.to_string())
    }
}

impl From<tokio::task::JoinError> for AuthzError {
    fn from(err: tokio::task::JoinError) -> Self {
        AuthzError::Internal(format!("evaluation task failed: {err}"))
    }
}

impl<T> From<std::sync::PoisonError<T>> for AuthzError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        AuthzError::PoisonedLock(err.to_string())
    }
}
