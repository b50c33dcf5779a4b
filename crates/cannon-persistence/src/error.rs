//! Errores de persistencia.
//! Mapea errores de IO / serde a variantes semánticas y los traduce a
//! `ExecutionError` cuando cruzan hacia el core.

use cannon_core::errors::ExecutionError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid url `{0}`")]
    InvalidUrl(String),
    #[error("unsupported url scheme in `{0}`")]
    UnsupportedScheme(String),
    #[error("variant {0} is locked by another process")]
    Locked(String),
    #[error("invalid package reference: {0}")]
    InvalidRef(String),
    #[error("registry error: {0}")]
    Registry(String),
}

impl From<PersistenceError> for ExecutionError {
    fn from(err: PersistenceError) -> Self {
        match err {
            PersistenceError::NotFound(what) => ExecutionError::PackageNotFound(what),
            other => ExecutionError::Storage(other.to_string()),
        }
    }
}
