//! `keeper`: comando fuera de cadena. El fingerprint es la config
//! renderizada (`exec`, `args`, `env`); `execute` no produce artifacts y
//! deja la ejecución real al caller.

use serde::{Deserialize, Serialize};

use super::plugin::{StepPlugin, StepScope};
use super::runtime::StepRuntime;
use crate::errors::StepError;
use crate::model::{ActionKey, BuildContext, ChainArtifacts};
use crate::template::Output;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct KeeperConfig {
    pub exec: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    /// Entradas `NAME=value`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct KeeperStep;

impl StepPlugin for KeeperStep {
    type Config = KeeperConfig;

    fn execute(&self,
               _rt: &StepRuntime<'_>,
               scope: &mut StepScope<'_>,
               _ctx: &BuildContext,
               config: &KeeperConfig)
               -> Result<ChainArtifacts, StepError> {
        log::debug!("{}: keeper `{}` left to the caller", scope.key, config.exec);
        Ok(ChainArtifacts::default())
    }

    fn provides(&self, _key: &ActionKey, _config: &KeeperConfig) -> Vec<Output> {
        Vec::new()
    }
}
