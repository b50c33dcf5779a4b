//! Loader de paquetes en memoria.

use std::collections::HashMap;
use std::sync::Mutex;

use cannon_core::errors::ExecutionError;
use cannon_core::hashing::hash_value;
use cannon_core::model::{PackageRecord, PackageRef};
use cannon_core::step::{LoadedPackage, PackageLoader};

#[derive(Debug, Default)]
struct Inner {
    /// `name:version@preset` + chain id -> url
    index: HashMap<(String, u64), String>,
    records: HashMap<String, PackageRecord>,
}

/// Registros indexados por referencia y cadena; URLs `mem://<hash>`.
#[derive(Debug, Default)]
pub struct InMemoryPackages {
    inner: Mutex<Inner>,
}

impl InMemoryPackages {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publica `record` bajo `package` en `chain_id` y devuelve su URL.
    pub fn publish(&self, package: &PackageRef, chain_id: u64, record: &PackageRecord) -> Result<String, ExecutionError> {
        let value = serde_json::to_value(record).map_err(|e| ExecutionError::Storage(e.to_string()))?;
        let url = format!("mem://{}", hash_value(&value));
        let mut inner = self.inner
                            .lock()
                            .map_err(|_| ExecutionError::Storage("package index poisoned".into()))?;
        inner.records.insert(url.clone(), record.clone());
        inner.index.insert((package.to_string(), chain_id), url.clone());
        Ok(url)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|i| i.records.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PackageLoader for InMemoryPackages {
    fn resolve(&self, package: &PackageRef, chain_id: u64) -> Result<Option<LoadedPackage>, ExecutionError> {
        let inner = self.inner
                        .lock()
                        .map_err(|_| ExecutionError::Storage("package index poisoned".into()))?;
        Ok(inner.index
                .get(&(package.to_string(), chain_id))
                .and_then(|url| {
                    inner.records.get(url).map(|record| LoadedPackage { url: url.clone(),
                                                                        record: record.clone() })
                }))
    }

    fn load_url(&self, url: &str) -> Result<PackageRecord, ExecutionError> {
        let inner = self.inner
                        .lock()
                        .map_err(|_| ExecutionError::Storage("package index poisoned".into()))?;
        inner.records
             .get(url)
             .cloned()
             .ok_or_else(|| ExecutionError::PackageNotFound(url.to_string()))
    }

    fn save_nested(&self, package: &PackageRef, chain_id: u64, record: &PackageRecord) -> Result<String, ExecutionError> {
        self.publish(package, chain_id, record)
    }
}
