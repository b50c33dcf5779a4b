//! Colaboradores externos que consumen los steps.
//!
//! El core no implementa RPC, compilación ni almacenamiento: sólo define
//! los contratos mínimos. Implementaciones concretas viven en
//! `cannon-adapters` y `cannon-persistence`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::options::BuildOptions;
use crate::errors::ExecutionError;
use crate::model::{PackageRecord, PackageRef};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum TxInput {
    /// Creación de contrato.
    Create {
        bytecode: String,
        args: Vec<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        salt: Option<String>,
    },
    /// Llamada a una función por firma (`name(types)`).
    Call { function: String, args: Vec<Value> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TxRequest {
    pub from: String,
    pub to: Option<String>,
    pub input: TxInput,
    pub value: Option<String>,
}

/// Log emitido por una transacción, ya asociado a su nombre de evento.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawLog {
    pub address: String,
    pub event: String,
    pub args: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxReceipt {
    pub transaction_hash: String,
    pub block_number: u64,
    /// `false` si la transacción revirtió.
    pub status: bool,
    pub contract_address: Option<String>,
    #[serde(default)]
    pub logs: Vec<RawLog>,
}

/// Conexión a cadena. Agnóstica del cliente RPC concreto.
pub trait ChainClient: Send + Sync {
    fn chain_id(&self) -> u64;
    /// Devuelve la dirección firmante; `None` pide el firmante por defecto.
    fn get_signer(&self, address: Option<&str>) -> Result<String, ExecutionError>;
    /// Envía la transacción y devuelve su hash.
    fn send_transaction(&self, tx: &TxRequest) -> Result<String, ExecutionError>;
    fn call(&self, to: &str, function: &str, args: &[Value]) -> Result<Value, ExecutionError>;
    fn get_transaction_receipt(&self, hash: &str) -> Result<Option<TxReceipt>, ExecutionError>;
    fn get_block_number(&self) -> Result<u64, ExecutionError>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractBuildArtifact {
    pub contract_name: String,
    pub source_name: String,
    pub abi: Value,
    pub bytecode: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// Fuente de artifacts compilados (ABI + bytecode).
pub trait ArtifactSource: Send + Sync {
    fn get_artifact(&self, name: &str) -> Result<ContractBuildArtifact, ExecutionError>;

    /// Compila un contrato generado (lo usa `router`).
    fn compile(&self, name: &str, _source: &str) -> Result<ContractBuildArtifact, ExecutionError> {
        Err(ExecutionError::MissingArtifact(name.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadedPackage {
    pub url: String,
    pub record: PackageRecord,
}

/// Resolución de paquetes upstream para clone/pull/import/provision.
pub trait PackageLoader: Send + Sync {
    fn resolve(&self, package: &PackageRef, chain_id: u64) -> Result<Option<LoadedPackage>, ExecutionError>;
    fn load_url(&self, url: &str) -> Result<PackageRecord, ExecutionError>;
    /// Persiste el registro de un build anidado y devuelve su URL.
    fn save_nested(&self, package: &PackageRef, chain_id: u64, record: &PackageRecord) -> Result<String, ExecutionError>;
}

/// Loader vacío: ningún paquete resuelve y no se puede guardar.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPackages;

impl PackageLoader for NoPackages {
    fn resolve(&self, _package: &PackageRef, _chain_id: u64) -> Result<Option<LoadedPackage>, ExecutionError> {
        Ok(None)
    }

    fn load_url(&self, url: &str) -> Result<PackageRecord, ExecutionError> {
        Err(ExecutionError::PackageNotFound(url.to_string()))
    }

    fn save_nested(&self, package: &PackageRef, _chain_id: u64, _record: &PackageRecord) -> Result<String, ExecutionError> {
        Err(ExecutionError::Storage(format!("no package store configured for {package}")))
    }
}

/// Señal de cancelación compartida entre el caller y el engine.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Vista de los colaboradores que recibe cada step.
#[derive(Clone, Copy)]
pub struct StepRuntime<'r> {
    pub chain: &'r dyn ChainClient,
    pub artifacts: &'r dyn ArtifactSource,
    pub packages: &'r dyn PackageLoader,
    pub options: &'r BuildOptions,
    pub cancel: &'r CancelFlag,
    /// 0 para el build raíz; +1 por cada `clone` anidado.
    pub depth: usize,
}

impl<'r> StepRuntime<'r> {
    pub fn chain_id(&self) -> u64 {
        self.chain.chain_id()
    }

    pub fn ensure_not_cancelled(&self) -> Result<(), ExecutionError> {
        if self.cancel.is_cancelled() {
            return Err(ExecutionError::Cancelled);
        }
        Ok(())
    }

    /// Firmante explícito del step o, en su defecto, el de las opciones.
    pub fn signer(&self, from: Option<&str>) -> Result<String, ExecutionError> {
        self.chain.get_signer(from.or(self.options.default_from.as_deref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_flag_is_shared_between_clones() {
        let flag = CancelFlag::new();
        let other = flag.clone();
        assert!(!other.is_cancelled());
        flag.cancel();
        assert!(other.is_cancelled());
    }

    #[test]
    fn tx_input_is_tagged() {
        let v = serde_json::to_value(TxInput::Call { function: "f()".into(),
                                                     args: vec![] }).unwrap();
        assert_eq!(v["type"], "call");
    }
}
