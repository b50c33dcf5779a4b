use std::collections::BTreeMap;

use cannon_core::errors::ExecutionError;
use cannon_core::model::{ActionKey, ActionState, ChainArtifacts, ContractArtifact, DeploymentState, PackageMeta,
                         PackageRecord, PackageRef, RawActionMap, RecordStatus};
use cannon_core::step::PackageLoader;
use cannon_persistence::{load_record, persist_build, publish_package, FallbackRegistry, InMemoryBlobStore,
                         InMemoryRegistry, LocalBlobStore, LocalStorage, PersistenceError, Registry,
                         StorePackageLoader};
use serde_json::json;

fn record(name: &str, version: &str, chain_id: u64) -> PackageRecord {
    let mut def = RawActionMap::new();
    def.insert("deploy.Foo".into(), serde_json::json!({"artifact": "Foo"}));
    PackageRecord::new(def,
                       DeploymentState::new(),
                       BTreeMap::new(),
                       PackageMeta::new(name, version),
                       chain_id,
                       RecordStatus::Complete)
}

fn pkg(raw: &str) -> PackageRef {
    PackageRef::parse(raw).unwrap()
}

#[test]
fn published_packages_resolve_through_registry_and_aliases() {
    let dir = tempfile::tempdir().unwrap();
    let storage = LocalStorage::new(dir.path());
    let blobs = LocalBlobStore::new(dir.path());
    let registry = InMemoryRegistry::new();

    let written = record("greeter", "1.0.0", 1);
    storage.write_package(&pkg("greeter:1.0.0"), 1, &written).unwrap();
    let receipt = publish_package(&storage, &blobs, &registry, &pkg("greeter:1.0.0"), 1, &["latest".to_string()]).unwrap();
    assert_eq!(receipt.packages, vec![pkg("greeter:1.0.0"), pkg("greeter:latest")]);
    assert_eq!(receipt.txn_hashes.len(), 2);
    assert!(receipt.url.starts_with("local://"));

    // el alias local apunta al directorio canónico
    assert_eq!(storage.read_package(&pkg("greeter:latest"), 1).unwrap(), Some(written.clone()));

    let loader = StorePackageLoader::new(&storage, &blobs, &registry);
    let loaded = loader.resolve(&pkg("greeter:latest"), 1).unwrap().unwrap();
    assert_eq!(loaded.url, receipt.url);
    assert_eq!(loaded.record, written);
    assert_eq!(loader.load_url(&receipt.url).unwrap(), written);
    assert!(loader.resolve(&pkg("greeter:1.0.0"), 2).unwrap().is_none());
}

#[test]
fn local_records_resolve_without_registry_entry() {
    let dir = tempfile::tempdir().unwrap();
    let storage = LocalStorage::new(dir.path());
    let blobs = InMemoryBlobStore::new();
    let registry = InMemoryRegistry::new();
    storage.write_package(&pkg("lib:0.1.0"), 13370, &record("lib", "0.1.0", 13370)).unwrap();

    let loader = StorePackageLoader::new(&storage, &blobs, &registry);
    let loaded = loader.resolve(&pkg("lib:0.1.0"), 13370).unwrap().unwrap();
    assert!(loaded.url.starts_with("mem://"));
    assert_eq!(loaded.record.meta.name, "lib");
    assert!(registry.is_empty());
}

#[test]
fn nested_records_are_written_to_disk_and_registry() {
    let dir = tempfile::tempdir().unwrap();
    let storage = LocalStorage::new(dir.path());
    let blobs = InMemoryBlobStore::new();
    let registry = InMemoryRegistry::new();
    let loader = StorePackageLoader::new(&storage, &blobs, &registry);

    let target = pkg("lib:0.1.0@with-app");
    let url = loader.save_nested(&target, 1337, &record("lib", "0.1.0", 1337)).unwrap();
    assert_eq!(registry.resolve(&target, 1337).unwrap(), Some(url.clone()));
    assert!(dir.path().join("lib/0.1.0/1337-with-app.json").exists());
    assert_eq!(blobs.len(), 1);
}

#[test]
fn publishing_missing_record_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let storage = LocalStorage::new(dir.path());
    let blobs = InMemoryBlobStore::new();
    let registry = InMemoryRegistry::new();
    let err = publish_package(&storage, &blobs, &registry, &pkg("ghost:1.0.0"), 1, &[]).unwrap_err();
    assert!(matches!(err, cannon_persistence::PersistenceError::NotFound(_)));
}

fn deployed(name: &str, chain_id: u64) -> PackageRecord {
    let mut artifacts = ChainArtifacts::default();
    artifacts.contracts.insert("Foo".into(),
                               ContractArtifact { address: "0x00000000000000000000000000000000000000f0".into(),
                                                  abi: json!([{"type": "function", "name": "foo", "inputs": []}]),
                                                  deploy_txn_hash: "0x01".into(),
                                                  contract_name: "Foo".into(),
                                                  source_name: "Foo.sol".into(),
                                                  constructor_args: vec![],
                                                  deployed_on: "deploy.Foo".into() });
    let mut record = record(name, "1.0.0", chain_id);
    record.state.insert(ActionKey::parse("deploy.Foo").unwrap(),
                        ActionState { fingerprint: "fp".into(),
                                      artifacts });
    record
}

#[test]
fn abis_travel_in_the_misc_blob() {
    let dir = tempfile::tempdir().unwrap();
    let storage = LocalStorage::new(dir.path());
    let blobs = InMemoryBlobStore::new();
    let registry = InMemoryRegistry::new();
    let full = deployed("greeter", 1);

    let url = persist_build(&storage, &blobs, &pkg("greeter:1.0.0"), 1, &full).unwrap();
    assert_eq!(blobs.len(), 2);

    let raw: PackageRecord = cannon_persistence::blob::read_json(&blobs, &url).unwrap();
    let misc_url = raw.misc_url.clone().unwrap();
    assert!(misc_url.starts_with("mem://"));
    assert!(raw.state.get(&ActionKey::parse("deploy.Foo").unwrap()).unwrap().artifacts.contracts["Foo"]
               .abi
               .is_null());

    let loader = StorePackageLoader::new(&storage, &blobs, &registry);
    let loaded = loader.load_url(&url).unwrap();
    assert_eq!(loaded.context().unwrap().contracts["Foo"].abi, full.context().unwrap().contracts["Foo"].abi);
    assert_eq!(load_record(&blobs, &url).unwrap().state, full.state);

    // meta y misc viajan en blobs distintos
    let receipt = publish_package(&storage, &blobs, &registry, &pkg("greeter:1.0.0"), 1, &[]).unwrap();
    assert_eq!(receipt.url, url);
    let meta: PackageMeta = cannon_persistence::blob::read_json(&blobs, receipt.meta_url.as_deref().unwrap()).unwrap();
    assert_eq!(meta.name, "greeter");
    assert_ne!(receipt.meta_url.as_deref(), Some(misc_url.as_str()));
}

struct Offline;

impl Registry for Offline {
    fn name(&self) -> &str {
        "offline"
    }

    fn resolve(&self, _package: &PackageRef, _chain_id: u64) -> Result<Option<String>, PersistenceError> {
        Err(PersistenceError::Registry("connection refused".into()))
    }

    fn resolve_meta(&self, package: &PackageRef, chain_id: u64) -> Result<Option<String>, PersistenceError> {
        self.resolve(package, chain_id)
    }

    fn publish(&self,
               _packages: &[PackageRef],
               _chain_id: u64,
               _url: &str,
               _meta_url: Option<&str>)
               -> Result<Vec<String>, PersistenceError> {
        Err(PersistenceError::Registry("connection refused".into()))
    }
}

#[test]
fn registry_outage_is_not_reported_as_missing_package() {
    let dir = tempfile::tempdir().unwrap();
    let storage = LocalStorage::new(dir.path());
    let blobs = InMemoryBlobStore::new();
    let registry = FallbackRegistry::new(vec![Box::new(Offline), Box::new(Offline)]);
    let loader = StorePackageLoader::new(&storage, &blobs, &registry);

    let err = loader.resolve(&pkg("greeter:1.0.0"), 1).unwrap_err();
    assert!(matches!(err, ExecutionError::Storage(ref message) if message.contains("connection refused")));
}
