//! `var`: declara settings con valores por defecto. Los settings del caller
//! tienen prioridad.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::plugin::{StepPlugin, StepScope};
use super::runtime::StepRuntime;
use crate::errors::StepError;
use crate::model::{ActionKey, BuildContext, ChainArtifacts};
use crate::template::{Output, Section};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct VarConfig {
    pub defaults: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct VarStep;

impl VarStep {
    fn effective(&self, rt: &StepRuntime<'_>, config: &VarConfig) -> BTreeMap<String, String> {
        config.defaults
              .iter()
              .map(|(k, v)| (k.clone(), rt.options.settings.get(k).unwrap_or(v).clone()))
              .collect()
    }
}

impl StepPlugin for VarStep {
    type Config = VarConfig;

    fn get_state(&self,
                 rt: &StepRuntime<'_>,
                 _key: &ActionKey,
                 _ctx: &BuildContext,
                 config: &VarConfig)
                 -> Result<Value, StepError> {
        Ok(json!({ "settings": self.effective(rt, config) }))
    }

    fn execute(&self,
               rt: &StepRuntime<'_>,
               _scope: &mut StepScope<'_>,
               _ctx: &BuildContext,
               config: &VarConfig)
               -> Result<ChainArtifacts, StepError> {
        Ok(ChainArtifacts { settings: self.effective(rt, config),
                            ..ChainArtifacts::default() })
    }

    fn provides(&self, _key: &ActionKey, config: &VarConfig) -> Vec<Output> {
        config.defaults
              .keys()
              .map(|k| Output::new(Section::Settings, k.as_str()))
              .collect()
    }
}
