//! `deploy` / `contract`: crea un contrato a partir de un artifact compilado.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::plugin::{StepPlugin, StepScope};
use super::runtime::{StepRuntime, TxInput, TxRequest};
use super::tx::send_and_wait;
use crate::errors::{ExecutionError, StepError};
use crate::hashing::hash_str;
use crate::model::{ActionKey, BuildContext, ChainArtifacts, ContractArtifact};
use crate::template::{Output, Section};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DeployConfig {
    pub artifact: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salt: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DeployStep;

impl StepPlugin for DeployStep {
    type Config = DeployConfig;

    /// Config renderizada más el hash del bytecode: recompilar con cambios
    /// fuerza el redeploy aunque la config sea idéntica.
    fn get_state(&self,
                 rt: &StepRuntime<'_>,
                 _key: &ActionKey,
                 _ctx: &BuildContext,
                 config: &DeployConfig)
                 -> Result<Value, StepError> {
        let artifact = rt.artifacts.get_artifact(&config.artifact)?;
        Ok(json!({ "config": config, "bytecode": hash_str(&artifact.bytecode) }))
    }

    fn execute(&self,
               rt: &StepRuntime<'_>,
               scope: &mut StepScope<'_>,
               _ctx: &BuildContext,
               config: &DeployConfig)
               -> Result<ChainArtifacts, StepError> {
        let artifact = rt.artifacts.get_artifact(&config.artifact)?;
        let from = rt.signer(config.from.as_deref())?;
        let tx = TxRequest { from,
                             to: None,
                             input: TxInput::Create { bytecode: artifact.bytecode.clone(),
                                                      args: config.args.clone(),
                                                      salt: config.salt.clone() },
                             value: config.value.clone() };
        let (hash, receipt) = send_and_wait(rt, &tx)?;
        let address = receipt.contract_address
                             .ok_or_else(|| ExecutionError::Chain(format!("no contract address in receipt of {hash}")))?;
        log::info!("deployed {} at {address}", artifact.contract_name);

        let mut out = ChainArtifacts::default();
        out.contracts.insert(scope.key.label().to_string(),
                             ContractArtifact { address,
                                                abi: artifact.abi,
                                                deploy_txn_hash: hash,
                                                contract_name: artifact.contract_name,
                                                source_name: artifact.source_name,
                                                constructor_args: config.args.clone(),
                                                deployed_on: scope.key.to_string() });
        Ok(out)
    }

    fn provides(&self, key: &ActionKey, _config: &DeployConfig) -> Vec<Output> {
        vec![Output::new(Section::Contracts, key.label())]
    }
}
