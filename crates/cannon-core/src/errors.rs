//! Taxonomía de errores del core.
//!
//! - `DefinitionError`: el mapa crudo de acciones no se puede convertir en grafo.
//! - `GraphReport` (ver `graph`): problemas estructurales, fatales antes de ejecutar.
//! - `SchemaError`: la config de una acción no cumple la forma de su kind.
//! - `ExecutionError`: fallo de red/cadena durante `execute`; recuperable.
//! - `MergeCollisionError`: dos ramas declaran el mismo artifact; siempre fatal.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::engine::BuildOutcome;
use crate::graph::GraphReport;

#[derive(Debug, Error, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub enum DefinitionError {
    #[error("action map must be a JSON object")]
    NotAnObject,
    #[error("invalid action key `{0}` (expected `<kind>.<label>`)")]
    InvalidKey(String),
    #[error("unknown action kind `{kind}` in `{key}`")]
    UnknownKind { key: String, kind: String },
    #[error("config of `{0}` must be an object")]
    ConfigNotObject(String),
    #[error("invalid `depends` entry in `{key}`: {message}")]
    InvalidDepends { key: String, message: String },
    #[error("template error in `{key}`: {source}")]
    Template { key: String, source: TemplateError },
}

#[derive(Debug, Error, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub enum TemplateError {
    #[error("unterminated template expression in `{0}`")]
    Unterminated(String),
    #[error("invalid template path `{0}`")]
    InvalidPath(String),
    #[error("template reference `{0}` could not be resolved")]
    Unresolved(String),
}

#[derive(Debug, Error, PartialEq, Eq, Clone, Serialize, Deserialize)]
#[error("invalid config for `{key}`: {message}")]
pub struct SchemaError {
    pub key: String,
    pub message: String,
}

impl SchemaError {
    pub fn new(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self { key: key.into(),
               message: message.into() }
    }
}

#[derive(Debug, Error, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub enum ExecutionError {
    #[error("chain error: {0}")]
    Chain(String),
    #[error("transaction reverted: {reason}")]
    Reverted { hash: Option<String>, reason: String },
    #[error("timed out after {secs}s waiting for {what}")]
    Timeout { what: String, secs: u64 },
    #[error("build cancelled")]
    Cancelled,
    #[error("contract `{0}` not found in context")]
    MissingContract(String),
    #[error("function `{func}` not found in ABI of `{contract}`")]
    MissingFunction { contract: String, func: String },
    #[error("contract artifact `{0}` not found")]
    MissingArtifact(String),
    #[error("package `{0}` not found")]
    PackageNotFound(String),
    #[error("router selector collision: `{signature}` in `{first}` and `{second}`")]
    SelectorCollision { signature: String, first: String, second: String },
    #[error("event `{event}` not emitted by `{key}`")]
    MissingEvent { key: String, event: String },
    #[error("render error: {0}")]
    Render(#[from] TemplateError),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("nested build of `{package}` failed: {message}")]
    Nested { package: String, message: String },
    #[error("dependency `{0}` did not complete")]
    DependencyFailed(String),
}

/// Fallo atribuible a una sola acción.
#[derive(Debug, Error, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub enum StepError {
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    Execution(#[from] ExecutionError),
}

#[derive(Debug, Error, PartialEq, Eq, Clone, Serialize, Deserialize)]
#[error("merge collision on `{section}.{key}`")]
pub struct MergeCollisionError {
    pub section: String,
    pub key: String,
}

/// Error de una invocación completa de build.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("invalid action graph:\n{0}")]
    Validation(GraphReport),
    /// La acción `key` falló sin partial deploy. `partial` conserva el estado
    /// hasta la última acción completada para poder reanudar.
    #[error("action `{key}` failed: {source}")]
    Step { key: String, source: StepError, partial: Box<BuildOutcome> },
    #[error(transparent)]
    MergeCollision(#[from] MergeCollisionError),
}

impl BuildError {
    /// Estado parcial recuperable, si el error lo trae.
    pub fn partial(&self) -> Option<&BuildOutcome> {
        match self {
            BuildError::Step { partial, .. } => Some(partial),
            _ => None,
        }
    }
}
