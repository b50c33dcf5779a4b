//! Demo de build local: despliegue, fallo forzado y reanudación sobre una
//! cadena simulada, sin tocar disco.

use std::time::Duration;

use cannonflow::adapters::{InMemoryArtifacts, SimulatedChain};
use cannonflow::build::{ActionStatus, BuildEvent, BuildEventKind};
use cannonflow::{ActionGraph, BuildEngine, BuildError, BuildOptions, DeploymentState, PackageMeta};
use serde_json::json;

fn print_event(event: BuildEvent) {
    match event.kind {
        BuildEventKind::PreStepExecute { kind, label, .. } => println!("  [{}] > {kind}.{label}", event.seq),
        BuildEventKind::PostStepExecute { kind, label, skipped, .. } => {
            println!("  [{}] {} {kind}.{label}", event.seq, if skipped { "=" } else { "+" })
        }
        BuildEventKind::SkipDeploy { key, error, .. } => println!("  [{}] ! {key}: {error}", event.seq),
    }
}

fn run_demo() -> Result<(), Box<dyn std::error::Error>> {
    let abi = json!([
        {"type": "function", "name": "mint", "inputs": [{"type": "uint256"}]},
        {"type": "function", "name": "transferOwnership", "inputs": [{"type": "address"}]}
    ]);
    let artifacts = InMemoryArtifacts::new().with_contract("Token", abi, "0x600160005260206000f3");
    let chain = SimulatedChain::new(13370);
    let graph = ActionGraph::from_value(&json!({
        "var.cfg": {"defaults": {"supply": "1000"}},
        "deploy.Token": {"artifact": "Token"},
        "invoke.mint": {"target": "Token", "func": "mint", "args": ["<%= settings.supply %>"]},
        "invoke.handover": {"target": "Token", "func": "transferOwnership", "args": ["<%= contracts.Token.address %>"],
                            "depends": ["invoke.mint"]}
    }))?;

    let options = BuildOptions::new(PackageMeta::new("demo", "0.1.0")).poll_interval(Duration::from_millis(1));
    let engine = BuildEngine::builder(&chain, &artifacts).options(options).build();
    let mut sink = print_event;

    println!("Build 1 (falla en mint):");
    chain.revert_on("mint");
    let partial = match engine.build(&graph, DeploymentState::new(), &mut sink) {
        Err(BuildError::Step { key, source, partial }) => {
            println!("  {key} falló: {source}");
            partial.state
        }
        other => other?.state,
    };

    println!("Build 2 (reanuda):");
    chain.clear_revert("mint");
    let outcome = engine.build(&graph, partial, &mut sink)?;
    println!("hechas={:?} reutilizadas={:?}",
             outcome.with_status(ActionStatus::Done),
             outcome.with_status(ActionStatus::Skipped));
    for (name, c) in &outcome.ctx.contracts {
        println!("{name} @ {}", c.address);
    }
    Ok(())
}

fn main() {
    if let Err(e) = run_demo() {
        eprintln!("demo error: {e}");
        std::process::exit(1);
    }
}
