//! Fuentes de artifacts de contrato.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use cannon_core::errors::ExecutionError;
use cannon_core::hashing::hash_str;
use cannon_core::step::{ArtifactSource, ContractBuildArtifact};
use serde_json::Value;

/// "Compilación" determinista de una fuente generada: el bytecode es el
/// hash del texto.
pub fn pseudo_compile(name: &str, source: &str) -> ContractBuildArtifact {
    ContractBuildArtifact { contract_name: name.to_string(),
                            source_name: format!("generated/{name}.sol"),
                            abi: Value::Array(Vec::new()),
                            bytecode: format!("0x{}", hash_str(source)),
                            source: Some(source.to_string()) }
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryArtifacts {
    contracts: HashMap<String, ContractBuildArtifact>,
}

impl InMemoryArtifacts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_contract(mut self, name: &str, abi: Value, bytecode: &str) -> Self {
        self.insert(name, abi, bytecode);
        self
    }

    /// Registra (o reemplaza, como una recompilación) un artifact.
    pub fn insert(&mut self, name: &str, abi: Value, bytecode: &str) {
        self.contracts.insert(name.to_string(),
                              ContractBuildArtifact { contract_name: name.to_string(),
                                                      source_name: format!("src/{name}.sol"),
                                                      abi,
                                                      bytecode: bytecode.to_string(),
                                                      source: None });
    }
}

impl ArtifactSource for InMemoryArtifacts {
    fn get_artifact(&self, name: &str) -> Result<ContractBuildArtifact, ExecutionError> {
        self.contracts
            .get(name)
            .cloned()
            .ok_or_else(|| ExecutionError::MissingArtifact(name.to_string()))
    }

    fn compile(&self, name: &str, source: &str) -> Result<ContractBuildArtifact, ExecutionError> {
        Ok(pseudo_compile(name, source))
    }
}

/// Lee `<dir>/<Name>.json` con la forma de `ContractBuildArtifact`.
#[derive(Debug, Clone)]
pub struct DirectoryArtifacts {
    dir: PathBuf,
}

impl DirectoryArtifacts {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self { dir: dir.as_ref().to_path_buf() }
    }

    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.json"))
    }
}

impl ArtifactSource for DirectoryArtifacts {
    fn get_artifact(&self, name: &str) -> Result<ContractBuildArtifact, ExecutionError> {
        let path = self.path_for(name);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(ExecutionError::MissingArtifact(name.to_string())),
            Err(e) => return Err(ExecutionError::Storage(format!("{}: {e}", path.display()))),
        };
        serde_json::from_str(&raw).map_err(|e| ExecutionError::Storage(format!("{}: {e}", path.display())))
    }

    fn compile(&self, name: &str, source: &str) -> Result<ContractBuildArtifact, ExecutionError> {
        Ok(pseudo_compile(name, source))
    }
}
