//! Contrato uniforme que implementa cada kind de acción.
//!
//! El engine invoca, en orden: `validate_config` -> `config_inject` ->
//! `get_state` (fingerprint) -> `execute`. `references`, `provides` y
//! `required_imports` son análisis estático usado por el grafo.

use std::fmt::Debug;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::runtime::StepRuntime;
use crate::errors::{SchemaError, StepError};
use crate::event::EventSink;
use crate::injection::render_config;
use crate::model::{ActionKey, ActionState, BuildContext, ChainArtifacts};
use crate::template::Output;

/// Coordenadas de un paquete upstream que el caller puede pre-descargar.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportRequirement {
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preset: Option<String>,
}

/// Datos de la acción en curso que no forman parte de su config.
pub struct StepScope<'s> {
    pub key: &'s ActionKey,
    /// Entrada persistida de la ejecución anterior, si existe.
    pub prior: Option<&'s ActionState>,
    pub sink: &'s mut dyn EventSink,
}

pub trait StepPlugin {
    type Config: Serialize + DeserializeOwned + Clone + Debug + PartialEq;

    /// Validación estructural, independiente del contexto.
    fn validate_config(&self, key: &ActionKey, raw: &Value) -> Result<Self::Config, SchemaError> {
        serde_json::from_value(raw.clone()).map_err(|e| SchemaError::new(key.as_str(), e.to_string()))
    }

    /// Interpola todos los strings de la config contra `ctx`. Puro.
    fn config_inject(&self, key: &ActionKey, ctx: &BuildContext, config: &Self::Config) -> Result<Self::Config, StepError> {
        render_config(key.as_str(), config, ctx)
    }

    /// Todo lo que afecta al resultado de `execute`. El engine lo hashea.
    fn get_state(&self,
                 _rt: &StepRuntime<'_>,
                 key: &ActionKey,
                 _ctx: &BuildContext,
                 config: &Self::Config)
                 -> Result<Value, StepError> {
        serde_json::to_value(config).map_err(|e| SchemaError::new(key.as_str(), e.to_string()).into())
    }

    fn execute(&self,
               rt: &StepRuntime<'_>,
               scope: &mut StepScope<'_>,
               ctx: &BuildContext,
               config: &Self::Config)
               -> Result<ChainArtifacts, StepError>;

    /// Referencias propias del kind, además de las de templates.
    fn references(&self, _config: &Self::Config) -> Vec<Output> {
        Vec::new()
    }

    fn provides(&self, key: &ActionKey, config: &Self::Config) -> Vec<Output>;

    fn required_imports(&self, _config: &Self::Config) -> Vec<ImportRequirement> {
        Vec::new()
    }
}
