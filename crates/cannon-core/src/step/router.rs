//! `router`: genera y despliega un dispatcher que enruta cada firma de
//! función de los contratos nombrados a su dirección de implementación.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::plugin::{StepPlugin, StepScope};
use super::runtime::{StepRuntime, TxInput, TxRequest};
use super::tx::send_and_wait;
use crate::errors::{ExecutionError, StepError};
use crate::model::abi::functions;
use crate::model::{ActionKey, BuildContext, ChainArtifacts, ContractArtifact};
use crate::template::{contains_template, Output, Section};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RouterConfig {
    pub contracts: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salt: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends: Vec<String>,
}

/// Tabla firma -> (ruta, dirección) de un router.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteTable {
    pub routes: BTreeMap<String, (String, String)>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RouterStep;

fn routed<'c>(ctx: &'c BuildContext, config: &'c RouterConfig) -> Result<Vec<(&'c str, &'c ContractArtifact)>, ExecutionError> {
    config.contracts
          .iter()
          .map(|path| {
              ctx.lookup_contract(path)
                 .map(|c| (path.as_str(), c))
                 .ok_or_else(|| ExecutionError::MissingContract(path.clone()))
          })
          .collect()
}

/// Construye la tabla de rutas. Una firma expuesta por dos contratos es una
/// colisión de selector.
pub fn route_table(contracts: &[(&str, &ContractArtifact)]) -> Result<RouteTable, ExecutionError> {
    let mut routes: BTreeMap<String, (String, String)> = BTreeMap::new();
    for (path, contract) in contracts {
        for f in functions(&contract.abi) {
            if let Some((first, _)) = routes.get(&f.signature) {
                if first != path {
                    return Err(ExecutionError::SelectorCollision { signature: f.signature,
                                                                   first: first.clone(),
                                                                   second: path.to_string() });
                }
                continue;
            }
            routes.insert(f.signature, (path.to_string(), contract.address.clone()));
        }
    }
    Ok(RouteTable { routes })
}

/// Fuente del dispatcher. Determinista para una tabla dada.
pub fn generate_source(name: &str, table: &RouteTable) -> String {
    let routes: String = table.routes
                              .iter()
                              .map(|(signature, (path, address))| format!("    route \"{signature}\" => {address}; // {path}\n"))
                              .collect();
    format!("// generated by cannonflow\ncontract {name} {{\n{routes}}}\n")
}

/// Unión de las entradas de función de los ABIs enrutados.
fn merged_abi(contracts: &[(&str, &ContractArtifact)]) -> Value {
    let mut seen = std::collections::BTreeSet::new();
    let mut entries = Vec::new();
    for (_, contract) in contracts {
        for entry in contract.abi.as_array().into_iter().flatten() {
            if entry.get("type").and_then(Value::as_str) != Some("function") {
                continue;
            }
            if seen.insert(crate::hashing::to_canonical_json(entry)) {
                entries.push(entry.clone());
            }
        }
    }
    Value::Array(entries)
}

impl StepPlugin for RouterStep {
    type Config = RouterConfig;

    fn get_state(&self,
                 _rt: &StepRuntime<'_>,
                 _key: &ActionKey,
                 ctx: &BuildContext,
                 config: &RouterConfig)
                 -> Result<Value, StepError> {
        let contracts = routed(ctx, config)?;
        let addresses: Vec<&str> = contracts.iter().map(|(_, c)| c.address.as_str()).collect();
        Ok(json!({ "config": config, "addresses": addresses }))
    }

    fn execute(&self,
               rt: &StepRuntime<'_>,
               scope: &mut StepScope<'_>,
               ctx: &BuildContext,
               config: &RouterConfig)
               -> Result<ChainArtifacts, StepError> {
        let contracts = routed(ctx, config)?;
        let table = route_table(&contracts)?;
        let name = scope.key.label().to_string();
        let source = generate_source(&name, &table);
        let compiled = rt.artifacts.compile(&name, &source)?;

        let from = rt.signer(config.from.as_deref())?;
        let tx = TxRequest { from,
                             to: None,
                             input: TxInput::Create { bytecode: compiled.bytecode.clone(),
                                                      args: Vec::new(),
                                                      salt: config.salt.clone() },
                             value: None };
        let (hash, receipt) = send_and_wait(rt, &tx)?;
        let address = receipt.contract_address
                             .ok_or_else(|| ExecutionError::Chain(format!("no contract address in receipt of {hash}")))?;
        log::info!("deployed router {name} at {address} ({} routes)", table.routes.len());

        let mut out = ChainArtifacts::default();
        out.contracts.insert(name,
                             ContractArtifact { address,
                                                abi: merged_abi(&contracts),
                                                deploy_txn_hash: hash,
                                                contract_name: compiled.contract_name,
                                                source_name: compiled.source_name,
                                                constructor_args: Vec::new(),
                                                deployed_on: scope.key.to_string() });
        Ok(out)
    }

    fn references(&self, config: &RouterConfig) -> Vec<Output> {
        config.contracts
              .iter()
              .filter(|p| !contains_template(p))
              .filter_map(|p| Output::for_contract_path(p))
              .collect()
    }

    fn provides(&self, key: &ActionKey, _config: &RouterConfig) -> Vec<Output> {
        vec![Output::new(Section::Contracts, key.label())]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contract(address: &str, fns: &[&str]) -> ContractArtifact {
        let abi: Vec<Value> = fns.iter()
                                 .map(|f| json!({"type": "function", "name": f, "inputs": []}))
                                 .collect();
        ContractArtifact { address: address.into(),
                           abi: Value::Array(abi),
                           deploy_txn_hash: "0x0".into(),
                           contract_name: "C".into(),
                           source_name: "C.sol".into(),
                           constructor_args: vec![],
                           deployed_on: "deploy.C".into() }
    }

    #[test]
    fn routes_every_signature_to_its_implementation() {
        let a = contract("0xa", &["foo"]);
        let b = contract("0xb", &["bar"]);
        let table = route_table(&[("A", &a), ("B", &b)]).unwrap();
        assert_eq!(table.routes["foo()"], ("A".to_string(), "0xa".to_string()));
        assert_eq!(table.routes["bar()"], ("B".to_string(), "0xb".to_string()));
        let src = generate_source("Router", &table);
        assert!(src.contains("route \"bar()\" => 0xb; // B"));
        assert_eq!(merged_abi(&[("A", &a), ("B", &b)]).as_array().map(Vec::len), Some(2));
    }

    #[test]
    fn generated_source_lists_routes_in_signature_order() {
        let a = contract("0xa", &["zeta", "alpha"]);
        let table = route_table(&[("A", &a)]).unwrap();
        assert_eq!(generate_source("R", &table),
                   "// generated by cannonflow\ncontract R {\n    route \"alpha()\" => 0xa; // A\n    route \"zeta()\" => 0xa; // A\n}\n");
    }

    #[test]
    fn routed_borrows_paths_from_config() {
        let mut ctx = BuildContext::new(crate::model::PackageMeta::new("app", "1.0.0"), 1);
        ctx.contracts.insert("A".into(), contract("0xa", &["foo"]));
        let config = RouterConfig { contracts: vec!["A".into()],
                                    from: None,
                                    salt: None,
                                    depends: vec![] };
        let found = routed(&ctx, &config).unwrap();
        assert_eq!(found[0].0, "A");
        assert!(matches!(routed(&ctx, &RouterConfig { contracts: vec!["B".into()], ..config.clone() }),
                         Err(ExecutionError::MissingContract(_))));
    }

    #[test]
    fn duplicated_signature_is_a_collision() {
        let a = contract("0xa", &["foo"]);
        let b = contract("0xb", &["foo"]);
        let err = route_table(&[("A", &a), ("B", &b)]).unwrap_err();
        assert_eq!(err,
                   ExecutionError::SelectorCollision { signature: "foo()".into(),
                                                       first: "A".into(),
                                                       second: "B".into() });
    }
}
