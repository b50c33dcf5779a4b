//! Flujo completo: build -> registro en disco -> recarga -> reanudación,
//! y paquetes upstream servidos por el store local.

use std::collections::BTreeMap;
use std::time::Duration;

use cannonflow::adapters::{InMemoryArtifacts, SimulatedChain};
use cannonflow::build::constants::BUILD_CHAIN_ID;
use cannonflow::build::{ActionKey, ActionStatus, NullEventSink, RecordStatus};
use cannonflow::persistence::{persist_build, publish_package, InMemoryRegistry, LocalBlobStore, LocalStorage, Registry,
                              StorePackageLoader};
use cannonflow::{combine_ctx, ActionGraph, BuildEngine, BuildOptions, DeploymentState, PackageMeta, PackageRecord,
                 PackageRef};
use serde_json::json;

const CHAIN: u64 = 1337;

fn artifacts() -> InMemoryArtifacts {
    InMemoryArtifacts::new().with_contract("Token",
                                           json!([{"type": "function", "name": "mint", "inputs": [{"type": "uint256"}]}]),
                                           "0x6001")
}

fn options(name: &str) -> BuildOptions {
    BuildOptions::new(PackageMeta::new(name, "1.0.0")).poll_interval(Duration::from_millis(1))
}

fn k(raw: &str) -> ActionKey {
    ActionKey::parse(raw).unwrap()
}

fn pkg(raw: &str) -> PackageRef {
    PackageRef::parse(raw).unwrap()
}

#[test]
fn partial_record_on_disk_resumes_to_complete() {
    let dir = tempfile::tempdir().unwrap();
    let storage = LocalStorage::new(dir.path());
    let blobs = LocalBlobStore::new(dir.path());
    let app = pkg("app:1.0.0");
    let arts = artifacts();
    let chain = SimulatedChain::new(CHAIN);
    let graph = ActionGraph::from_value(&json!({
        "deploy.Token": {"artifact": "Token"},
        "invoke.mint": {"target": "Token", "func": "mint", "args": [5]}
    })).unwrap();
    let engine = BuildEngine::builder(&chain, &arts).options(options("app")).build();

    chain.revert_on("mint");
    let err = engine.build(&graph, DeploymentState::new(), &mut NullEventSink).unwrap_err();
    let partial = err.partial().unwrap();
    let record = partial.to_record(&graph, BTreeMap::new());
    assert_eq!(record.status, RecordStatus::Partial);
    persist_build(&storage, &blobs, &app, CHAIN, &record).unwrap();

    chain.clear_revert("mint");
    let reloaded = storage.read_package(&app, CHAIN).unwrap().unwrap();
    assert_eq!(reloaded.state.len(), 1);
    let outcome = engine.build(&ActionGraph::parse(&reloaded.def).unwrap(), reloaded.state, &mut NullEventSink)
                        .unwrap();
    assert_eq!(outcome.status(&k("deploy.Token")), ActionStatus::Skipped);
    assert_eq!(outcome.status(&k("invoke.mint")), ActionStatus::Done);

    let done = outcome.to_record(&graph, BTreeMap::new());
    persist_build(&storage, &blobs, &app, CHAIN, &done).unwrap();
    let final_record = storage.read_package(&app, CHAIN).unwrap().unwrap();
    assert_eq!(final_record.status, RecordStatus::Complete);
    assert_eq!(final_record.context().unwrap().contracts["Token"], outcome.ctx.contracts["Token"]);
}

#[test]
fn clone_builds_library_from_local_store() {
    let dir = tempfile::tempdir().unwrap();
    let storage = LocalStorage::new(dir.path());
    let blobs = LocalBlobStore::new(dir.path());
    let registry = InMemoryRegistry::new();

    // registro de sólo-definición del paquete upstream
    let lib_graph = ActionGraph::from_value(&json!({"deploy.Foo": {"artifact": "Token"}})).unwrap();
    let lib_record = PackageRecord::new(lib_graph.raw().clone(),
                                        DeploymentState::new(),
                                        BTreeMap::new(),
                                        PackageMeta::new("lib", "0.1.0"),
                                        BUILD_CHAIN_ID,
                                        RecordStatus::Complete);
    storage.write_package(&pkg("lib:0.1.0"), BUILD_CHAIN_ID, &lib_record).unwrap();

    let loader = StorePackageLoader::new(&storage, &blobs, &registry);
    let arts = artifacts();
    let chain = SimulatedChain::new(CHAIN);
    let graph = ActionGraph::from_value(&json!({
        "clone.lib": {"source": "lib:0.1.0", "tags": ["latest"]},
        "invoke.mint": {"target": "lib.Foo", "func": "mint", "args": [1]}
    })).unwrap();
    let outcome = BuildEngine::builder(&chain, &arts).packages(&loader)
                                                     .options(options("app"))
                                                     .build()
                                                     .build(&graph, DeploymentState::new(), &mut NullEventSink)
                                                     .unwrap();

    assert!(outcome.is_complete());
    assert!(outcome.ctx.imports["lib"].contracts.contains_key("Foo"));
    assert!(!outcome.ctx.contracts.contains_key("Foo"));

    let nested = storage.read_package(&pkg("lib:0.1.0@with-app"), CHAIN).unwrap().unwrap();
    assert_eq!(nested.state.len(), 1);
    assert!(registry.resolve(&pkg("lib:latest@with-app"), CHAIN).unwrap().is_some());
}

#[test]
fn import_reads_published_package_from_registry() {
    let dir = tempfile::tempdir().unwrap();
    let storage = LocalStorage::new(dir.path());
    let blobs = LocalBlobStore::new(dir.path());
    let registry = InMemoryRegistry::new();
    let arts = artifacts();

    let remote = SimulatedChain::new(1);
    let token_graph = ActionGraph::from_value(&json!({"deploy.Token": {"artifact": "Token"}})).unwrap();
    let token = BuildEngine::builder(&remote, &arts).options(options("token"))
                                                    .build()
                                                    .build(&token_graph, DeploymentState::new(), &mut NullEventSink)
                                                    .unwrap();
    let token_ref = pkg("token:1.0.0");
    persist_build(&storage, &blobs, &token_ref, 1, &token.to_record(&token_graph, BTreeMap::new())).unwrap();
    publish_package(&storage, &blobs, &registry, &token_ref, 1, &[]).unwrap();

    let loader = StorePackageLoader::new(&storage, &blobs, &registry);
    let chain = SimulatedChain::new(CHAIN);
    let graph = ActionGraph::from_value(&json!({"import.token": {"source": "token:1.0.0", "chainId": 1}})).unwrap();
    let outcome = BuildEngine::builder(&chain, &arts).packages(&loader)
                                                     .options(options("app"))
                                                     .build()
                                                     .build(&graph, DeploymentState::new(), &mut NullEventSink)
                                                     .unwrap();
    let imported = &outcome.ctx.imports["token"];
    assert_eq!(imported.contracts["Token"].address, token.ctx.contracts["Token"].address);
    assert_eq!(imported.url, registry.resolve(&token_ref, 1).unwrap());
}

#[test]
fn independent_branch_contexts_merge_into_one() {
    let arts = artifacts();
    let chain = SimulatedChain::new(CHAIN);
    let engine = BuildEngine::builder(&chain, &arts).options(options("app")).build();
    let left = engine.build(&ActionGraph::from_value(&json!({"deploy.Left": {"artifact": "Token"}})).unwrap(),
                            DeploymentState::new(),
                            &mut NullEventSink)
                     .unwrap();
    let right = engine.build(&ActionGraph::from_value(&json!({"deploy.Right": {"artifact": "Token"}})).unwrap(),
                             DeploymentState::new(),
                             &mut NullEventSink)
                      .unwrap();
    let latest = left.ctx.timestamp.max(right.ctx.timestamp);

    let merged = combine_ctx([left.ctx.clone(), right.ctx.clone()]).unwrap().unwrap();
    assert_eq!(merged.contracts.len(), 2);
    assert!(merged.timestamp >= latest);
    assert_eq!(merged.package, left.ctx.package);
}
