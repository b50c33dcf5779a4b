//! `invoke`: llamada a una función de un contrato ya registrado.
//!
//! `factory` registra contratos creados por la llamada a partir de un
//! argumento de evento; `extra` copia argumentos de evento a `settings`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::plugin::{StepPlugin, StepScope};
use super::runtime::{StepRuntime, TxInput, TxRequest};
use super::tx::{decode_events, scalar_string, send_and_wait};
use crate::errors::{ExecutionError, StepError};
use crate::model::abi::find_function;
use crate::model::{ActionKey, BuildContext, ChainArtifacts, ContractArtifact, DecodedEvent, TxnArtifact};
use crate::template::{contains_template, Output, Section};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FactoryConfig {
    pub event: String,
    /// Índice del argumento del evento que contiene la dirección.
    pub arg: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ExtraConfig {
    pub event: String,
    pub arg: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct InvokeConfig {
    /// Ruta de contrato (`Foo`, `lib.Foo`) o dirección literal.
    pub target: String,
    pub func: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub factory: BTreeMap<String, FactoryConfig>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, ExtraConfig>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct InvokeStep;

fn is_address(target: &str) -> bool {
    target.starts_with("0x")
}

fn resolve_target<'c>(ctx: &'c BuildContext, target: &str) -> Result<&'c ContractArtifact, ExecutionError> {
    let found = if is_address(target) { ctx.contract_at(target) } else { ctx.lookup_contract(target) };
    found.ok_or_else(|| ExecutionError::MissingContract(target.to_string()))
}

fn event_arg(key: &ActionKey,
             events: &BTreeMap<String, Vec<DecodedEvent>>,
             event: &str,
             arg: usize)
             -> Result<String, ExecutionError> {
    events.get(event)
          .and_then(|list| list.first())
          .and_then(|e| e.args.get(arg))
          .and_then(scalar_string)
          .ok_or_else(|| ExecutionError::MissingEvent { key: key.to_string(),
                                                        event: event.to_string() })
}

impl StepPlugin for InvokeStep {
    type Config = InvokeConfig;

    /// La dirección resuelta entra en el estado: redeployar el target
    /// invalida la llamada.
    fn get_state(&self,
                 _rt: &StepRuntime<'_>,
                 _key: &ActionKey,
                 ctx: &BuildContext,
                 config: &InvokeConfig)
                 -> Result<Value, StepError> {
        let target = resolve_target(ctx, &config.target)?;
        Ok(json!({ "config": config, "target": target.address }))
    }

    fn execute(&self,
               rt: &StepRuntime<'_>,
               scope: &mut StepScope<'_>,
               ctx: &BuildContext,
               config: &InvokeConfig)
               -> Result<ChainArtifacts, StepError> {
        let contract = resolve_target(ctx, &config.target)?;
        let function = find_function(&contract.abi, &config.func)
            .ok_or_else(|| ExecutionError::MissingFunction { contract: config.target.clone(),
                                                             func: config.func.clone() })?;
        let from = rt.signer(config.from.as_deref())?;
        let tx = TxRequest { from,
                             to: Some(contract.address.clone()),
                             input: TxInput::Call { function: function.signature.clone(),
                                                    args: config.args.clone() },
                             value: config.value.clone() };
        let (hash, receipt) = send_and_wait(rt, &tx)?;
        log::info!("invoked {}.{} ({hash})", config.target, function.signature);

        let events = decode_events(&receipt, &contract.abi, ctx);
        let mut out = ChainArtifacts::default();

        for (name, factory) in &config.factory {
            let address = event_arg(scope.key, &events, &factory.event, factory.arg)?;
            let (abi, contract_name, source_name) = match &factory.artifact {
                Some(artifact) => {
                    let built = rt.artifacts.get_artifact(artifact)?;
                    (built.abi, built.contract_name, built.source_name)
                }
                None => (json!([]), name.clone(), String::new()),
            };
            out.contracts.insert(name.clone(),
                                 ContractArtifact { address,
                                                    abi,
                                                    deploy_txn_hash: hash.clone(),
                                                    contract_name,
                                                    source_name,
                                                    constructor_args: Vec::new(),
                                                    deployed_on: scope.key.to_string() });
        }
        for (name, extra) in &config.extra {
            out.settings.insert(name.clone(), event_arg(scope.key, &events, &extra.event, extra.arg)?);
        }

        out.txns.insert(scope.key.label().to_string(),
                        TxnArtifact { hash,
                                      events,
                                      deployed_on: scope.key.to_string() });
        Ok(out)
    }

    fn references(&self, config: &InvokeConfig) -> Vec<Output> {
        if contains_template(&config.target) || is_address(&config.target) {
            return Vec::new();
        }
        Output::for_contract_path(&config.target).into_iter().collect()
    }

    fn provides(&self, key: &ActionKey, config: &InvokeConfig) -> Vec<Output> {
        let mut out = vec![Output::new(Section::Txns, key.label())];
        out.extend(config.factory.keys().map(|n| Output::new(Section::Contracts, n.as_str())));
        out.extend(config.extra.keys().map(|n| Output::new(Section::Settings, n.as_str())));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provides_txn_factory_contracts_and_extra_settings() {
        let key = ActionKey::parse("invoke.create_pool").unwrap();
        let cfg: InvokeConfig = serde_json::from_value(json!({
            "target": "Factory",
            "func": "createPool",
            "factory": {"Pool": {"event": "PoolCreated", "arg": 0}},
            "extra": {"poolId": {"event": "PoolCreated", "arg": 1}}
        })).unwrap();
        let outputs: Vec<String> = InvokeStep.provides(&key, &cfg).iter().map(|o| o.to_string()).collect();
        assert_eq!(outputs, vec!["txns.create_pool", "contracts.Pool", "settings.poolId"]);
        assert_eq!(InvokeStep.references(&cfg), vec![Output::new(Section::Contracts, "Factory")]);
    }

    #[test]
    fn rejects_unknown_fields() {
        let key = ActionKey::parse("invoke.x").unwrap();
        let raw = json!({"target": "A", "func": "f", "bogus": 1});
        assert!(InvokeStep.validate_config(&key, &raw).is_err());
    }
}
