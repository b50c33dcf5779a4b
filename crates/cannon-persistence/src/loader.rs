//! `PackageLoader` del core sobre las fachadas de persistencia.
//!
//! Resolución: registry -> blob; si el registry no conoce la referencia, se
//! mira el registro local de la variante. Los registros anidados de `clone`
//! se escriben como blob, en disco y en el registry.

use cannon_core::errors::ExecutionError;
use cannon_core::model::{PackageRecord, PackageRef};
use cannon_core::step::{LoadedPackage, PackageLoader};

use crate::blob::BlobStore;
use crate::error::PersistenceError;
use crate::publish::{load_record, persist_build, store_record};
use crate::registry::Registry;
use crate::storage::LocalStorage;

pub struct StorePackageLoader<'a> {
    storage: &'a LocalStorage,
    blobs: &'a dyn BlobStore,
    registry: &'a dyn Registry,
}

impl<'a> StorePackageLoader<'a> {
    pub fn new(storage: &'a LocalStorage, blobs: &'a dyn BlobStore, registry: &'a dyn Registry) -> Self {
        Self { storage,
               blobs,
               registry }
    }

    fn resolve_inner(&self, package: &PackageRef, chain_id: u64) -> Result<Option<LoadedPackage>, PersistenceError> {
        if let Some(url) = self.registry.resolve(package, chain_id)? {
            let record = load_record(self.blobs, &url)?;
            return Ok(Some(LoadedPackage { url, record }));
        }
        match self.storage.read_package(package, chain_id)? {
            Some(record) => {
                // el registro local no tiene URL hasta que se guarda como blob
                let url = store_record(self.blobs, &record)?;
                log::debug!("{package} on chain {chain_id} loaded from local storage");
                Ok(Some(LoadedPackage { url, record }))
            }
            None => Ok(None),
        }
    }
}

impl PackageLoader for StorePackageLoader<'_> {
    fn resolve(&self, package: &PackageRef, chain_id: u64) -> Result<Option<LoadedPackage>, ExecutionError> {
        Ok(self.resolve_inner(package, chain_id)?)
    }

    fn load_url(&self, url: &str) -> Result<PackageRecord, ExecutionError> {
        Ok(load_record(self.blobs, url)?)
    }

    fn save_nested(&self, package: &PackageRef, chain_id: u64, record: &PackageRecord) -> Result<String, ExecutionError> {
        let url = persist_build(self.storage, self.blobs, package, chain_id, record)?;
        self.registry
            .publish(std::slice::from_ref(package), chain_id, &url, None)?;
        Ok(url)
    }
}
