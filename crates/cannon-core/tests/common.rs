// Helpers compartidos por los tests de integración (incluido con `mod common;`).
#![allow(dead_code)]

use std::time::Duration;

use cannon_adapters::InMemoryArtifacts;
use cannon_core::{ActionGraph, ActionKey, BuildOptions, PackageMeta};
use serde_json::{json, Value};

pub const CHAIN_ID: u64 = 1337;

pub fn k(s: &str) -> ActionKey {
    ActionKey::parse(s).unwrap()
}

pub fn graph(v: Value) -> ActionGraph {
    ActionGraph::from_value(&v).unwrap()
}

pub fn token_abi() -> Value {
    json!([
        {"type": "function", "name": "mint", "inputs": [{"type": "uint256"}]},
        {"type": "function", "name": "setOwner", "inputs": [{"type": "string"}]},
        {"type": "event", "name": "Transfer", "inputs": []}
    ])
}

pub fn vault_abi() -> Value {
    json!([
        {"type": "function", "name": "deposit", "inputs": [{"type": "uint256"}]},
        {"type": "function", "name": "withdraw", "inputs": [{"type": "uint256"}]}
    ])
}

pub fn artifacts() -> InMemoryArtifacts {
    InMemoryArtifacts::new().with_contract("Token", token_abi(), "0x6001")
                            .with_contract("Vault", vault_abi(), "0x6002")
}

pub fn options() -> BuildOptions {
    BuildOptions::new(PackageMeta::new("app", "1.0.0")).poll_interval(Duration::from_millis(1))
}

/// deploy -> invoke(mint) -> invoke(setOwner, usa el hash de mint)
pub fn three_step() -> ActionGraph {
    graph(json!({
        "deploy.Token": {"artifact": "Token"},
        "invoke.mint": {"target": "Token", "func": "mint", "args": [100]},
        "invoke.setOwner": {"target": "Token", "func": "setOwner", "args": ["<%= txns.mint.hash %>"]}
    }))
}
