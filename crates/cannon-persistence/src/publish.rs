//! Persistencia de builds y publicación en el registry.

use cannon_core::model::{MiscBundle, PackageRecord, PackageRef};

use crate::blob::{read_json, write_json, BlobStore};
use crate::error::PersistenceError;
use crate::registry::Registry;
use crate::storage::LocalStorage;

#[derive(Debug, Clone, PartialEq)]
pub struct PublishReceipt {
    pub url: String,
    pub meta_url: Option<String>,
    pub packages: Vec<PackageRef>,
    pub txn_hashes: Vec<String>,
}

/// Guarda `record` como blob: los ABIs van a un blob aparte cuya URL queda
/// en `misc_url`. Devuelve la URL del registro ligero.
pub fn store_record(blobs: &dyn BlobStore, record: &PackageRecord) -> Result<String, PersistenceError> {
    let (mut slim, misc) = record.split_misc();
    slim.misc_url = if misc.is_empty() { None } else { Some(write_json(blobs, &misc)?) };
    write_json(blobs, &slim)
}

/// Lee un registro y, si tiene `misc_url`, le devuelve los ABIs.
pub fn load_record(blobs: &dyn BlobStore, url: &str) -> Result<PackageRecord, PersistenceError> {
    let mut record: PackageRecord = read_json(blobs, url)?;
    if let Some(misc_url) = record.misc_url.as_deref() {
        let misc: MiscBundle = read_json(blobs, misc_url)?;
        record.hydrate_misc(&misc);
    }
    Ok(record)
}

/// Escribe `record` en disco bajo su variante y como blob. Devuelve la URL.
pub fn persist_build(storage: &LocalStorage,
                     blobs: &dyn BlobStore,
                     package: &PackageRef,
                     chain_id: u64,
                     record: &PackageRecord)
                     -> Result<String, PersistenceError> {
    storage.write_package(package, chain_id, record)?;
    let url = store_record(blobs, record)?;
    log::info!("persisted {package} on chain {chain_id} as {url}");
    Ok(url)
}

/// Publica el registro local de `package` en `chain_id` bajo su versión y
/// bajo cada tag. Los tags quedan además como aliases locales.
pub fn publish_package(storage: &LocalStorage,
                       blobs: &dyn BlobStore,
                       registry: &dyn Registry,
                       package: &PackageRef,
                       chain_id: u64,
                       tags: &[String])
                       -> Result<PublishReceipt, PersistenceError> {
    let record = storage.read_package(package, chain_id)?
                        .ok_or_else(|| PersistenceError::NotFound(format!("{package} on chain {chain_id}")))?;
    let url = store_record(blobs, &record)?;
    let meta_url = Some(write_json(blobs, &record.meta)?);

    let canonical = storage.aliases(&package.name)?.resolve(&package.version);
    let mut packages = vec![package.with_version(&canonical)];
    packages.extend(tags.iter().filter(|t| **t != canonical).map(|t| package.with_version(t)));

    let mut aliases = storage.aliases(&package.name)?;
    for tag in tags.iter().filter(|t| **t != canonical) {
        aliases.set(tag, &canonical)?;
    }
    aliases.save()?;

    let txn_hashes = registry.publish(&packages, chain_id, &url, meta_url.as_deref())?;
    log::info!("published {} refs of {package} on chain {chain_id}", packages.len());
    Ok(PublishReceipt { url,
                        meta_url,
                        packages,
                        txn_hashes })
}
