//! Contexto de build y artifacts de cadena.
//!
//! `BuildContext` es el entorno de lectura que recibe cada step: outputs
//! previos (contracts, txns, settings, imports anidados), metadatos del
//! paquete, chain id y timestamp. Los artifacts se agregan, nunca se mutan.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::MergeCollisionError;
use crate::injection::merge::union_into;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PackageMeta {
    pub name: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl PackageMeta {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self { name: name.into(),
               version: version.into(),
               description: None }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractArtifact {
    pub address: String,
    pub abi: Value,
    pub deploy_txn_hash: String,
    pub contract_name: String,
    pub source_name: String,
    #[serde(default)]
    pub constructor_args: Vec<Value>,
    /// Acción que registró el contrato.
    #[serde(default)]
    pub deployed_on: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodedEvent {
    pub name: String,
    pub args: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxnArtifact {
    pub hash: String,
    #[serde(default)]
    pub events: BTreeMap<String, Vec<DecodedEvent>>,
    #[serde(default)]
    pub deployed_on: String,
}

/// Fragmento de contexto producido por un step (lo que se persiste como
/// `artifacts` de la acción).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChainArtifacts {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub contracts: BTreeMap<String, ContractArtifact>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub txns: BTreeMap<String, TxnArtifact>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub imports: BTreeMap<String, BuildContext>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub settings: BTreeMap<String, String>,
}

impl ChainArtifacts {
    pub fn is_empty(&self) -> bool {
        self.contracts.is_empty() && self.txns.is_empty() && self.imports.is_empty() && self.settings.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildContext {
    pub package: PackageMeta,
    pub chain_id: u64,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub settings: BTreeMap<String, String>,
    #[serde(default)]
    pub contracts: BTreeMap<String, ContractArtifact>,
    #[serde(default)]
    pub txns: BTreeMap<String, TxnArtifact>,
    #[serde(default)]
    pub imports: BTreeMap<String, BuildContext>,
    /// Registro de despliegue del que se cargó este contexto (sólo en imports).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl BuildContext {
    pub fn new(package: PackageMeta, chain_id: u64) -> Self {
        Self { package,
               chain_id,
               timestamp: Utc::now(),
               settings: BTreeMap::new(),
               contracts: BTreeMap::new(),
               txns: BTreeMap::new(),
               imports: BTreeMap::new(),
               url: None }
    }

    /// Agrega el fragmento de un step. Una clave ya presente sólo se acepta
    /// si el valor es idéntico.
    pub fn merge_artifacts(&mut self, artifacts: &ChainArtifacts) -> Result<(), MergeCollisionError> {
        union_into("contracts", &mut self.contracts, &artifacts.contracts)?;
        union_into("txns", &mut self.txns, &artifacts.txns)?;
        union_into("imports", &mut self.imports, &artifacts.imports)?;
        union_into("settings", &mut self.settings, &artifacts.settings)?;
        Ok(())
    }

    /// Resuelve un contrato por ruta de labels: `Foo` busca en `contracts`,
    /// `lib.Foo` en `imports.lib.contracts`, y así sucesivamente.
    pub fn lookup_contract(&self, path: &str) -> Option<&ContractArtifact> {
        let mut segments: Vec<&str> = path.split('.').collect();
        let name = segments.pop()?;
        let mut scope = self;
        for seg in segments {
            scope = scope.imports.get(seg)?;
        }
        scope.contracts.get(name)
    }

    /// Busca un contrato por dirección en este contexto y sus imports.
    pub fn contract_at(&self, address: &str) -> Option<&ContractArtifact> {
        self.contracts
            .values()
            .find(|c| c.address.eq_ignore_ascii_case(address))
            .or_else(|| self.imports.values().find_map(|i| i.contract_at(address)))
    }

    /// Vista JSON usada por el evaluador de templates.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn contract(address: &str) -> ContractArtifact {
        ContractArtifact { address: address.to_string(),
                           abi: json!([]),
                           deploy_txn_hash: "0x01".into(),
                           contract_name: "Foo".into(),
                           source_name: "src/Foo.sol".into(),
                           constructor_args: vec![],
                           deployed_on: "deploy.Foo".into() }
    }

    #[test]
    fn lookup_walks_nested_imports() {
        let mut lib = BuildContext::new(PackageMeta::new("lib", "1.0.0"), 1);
        lib.contracts.insert("Foo".into(), contract("0xaa"));
        let mut root = BuildContext::new(PackageMeta::new("app", "1.0.0"), 1);
        root.imports.insert("lib".into(), lib);

        assert!(root.lookup_contract("Foo").is_none());
        assert_eq!(root.lookup_contract("lib.Foo").map(|c| c.address.as_str()), Some("0xaa"));
        assert!(root.contract_at("0xAA").is_some());
    }

    #[test]
    fn merge_rejects_mutation_of_recorded_artifact() {
        let mut ctx = BuildContext::new(PackageMeta::new("app", "1.0.0"), 1);
        let mut first = ChainArtifacts::default();
        first.contracts.insert("Foo".into(), contract("0xaa"));
        ctx.merge_artifacts(&first).unwrap();
        // mismo valor: idempotente
        ctx.merge_artifacts(&first).unwrap();

        let mut second = ChainArtifacts::default();
        second.contracts.insert("Foo".into(), contract("0xbb"));
        let err = ctx.merge_artifacts(&second).unwrap_err();
        assert_eq!(err.section, "contracts");
        assert_eq!(err.key, "Foo");
    }

    #[test]
    fn context_serializes_with_camel_case_paths() {
        let ctx = BuildContext::new(PackageMeta::new("app", "1.0.0"), 10);
        let v = ctx.to_value();
        assert_eq!(v["chainId"], json!(10));
        assert_eq!(v["package"]["name"], json!("app"));
    }
}
