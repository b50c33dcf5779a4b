mod common;

use std::time::Duration;

use cannon_adapters::{InMemoryArtifacts, SimulatedChain};
use cannon_core::errors::{BuildError, ExecutionError, StepError};
use cannon_core::{ActionStatus, BuildEngine, BuildEventKind, CancelFlag, DeploymentState, InMemoryEventSink,
                  NullEventSink, RecordStatus};
use common::*;
use serde_json::json;

#[test]
fn second_run_skips_every_action_and_keeps_state() {
    let chain = SimulatedChain::new(CHAIN_ID);
    let arts = artifacts();
    let engine = BuildEngine::builder(&chain, &arts).options(options()).build();
    let g = three_step();

    let mut first_events = InMemoryEventSink::new();
    let first = engine.build(&g, DeploymentState::new(), &mut first_events).unwrap();
    assert!(first.statuses.values().all(|s| *s == ActionStatus::Done));
    let sent = chain.transaction_count();
    assert_eq!(sent, 3);

    let mut second_events = InMemoryEventSink::new();
    let second = engine.build(&g, first.state.clone(), &mut second_events).unwrap();
    assert!(second.statuses.values().all(|s| *s == ActionStatus::Skipped));
    assert_eq!(second.state, first.state);
    assert_eq!(second.ctx.contracts, first.ctx.contracts);
    assert_eq!(chain.transaction_count(), sent);

    // Pre + Post por acción, con el resultado ya presente
    let kinds: Vec<&BuildEventKind> = second_events.kinds().collect();
    assert_eq!(kinds.len(), 6);
    assert!(kinds.iter().all(|k| match k {
                                 BuildEventKind::PostStepExecute { skipped, .. } => *skipped,
                                 BuildEventKind::PreStepExecute { .. } => true,
                                 BuildEventKind::SkipDeploy { .. } => false,
                             }));
}

#[test]
fn events_follow_topological_order() {
    let chain = SimulatedChain::new(CHAIN_ID);
    let arts = artifacts();
    let engine = BuildEngine::builder(&chain, &arts).options(options()).build();
    let mut sink = InMemoryEventSink::new();
    let outcome = engine.build(&three_step(), DeploymentState::new(), &mut sink).unwrap();

    let labels: Vec<String> = sink.list(outcome.build_id)
                                  .into_iter()
                                  .filter_map(|e| match e.kind {
                                      BuildEventKind::PreStepExecute { label, .. } => Some(label),
                                      _ => None,
                                  })
                                  .collect();
    assert_eq!(labels, vec!["Token", "mint", "setOwner"]);
    let seqs: Vec<u64> = sink.list(outcome.build_id).iter().map(|e| e.seq).collect();
    assert_eq!(seqs, (0..6).collect::<Vec<u64>>());
}

#[test]
fn failed_build_resumes_from_persisted_state() {
    let chain = SimulatedChain::new(CHAIN_ID);
    let arts = artifacts();
    let engine = BuildEngine::builder(&chain, &arts).options(options()).build();
    let g = three_step();

    chain.revert_on("mint");
    let err = engine.build(&g, DeploymentState::new(), &mut NullEventSink).unwrap_err();
    assert!(matches!(&err,
                     BuildError::Step { key, source: StepError::Execution(ExecutionError::Reverted { .. }), .. }
                     if key == "invoke.mint"));
    let partial = err.partial().unwrap().clone();
    assert!(partial.state.get(&k("deploy.Token")).is_some());
    assert!(partial.state.get(&k("invoke.mint")).is_none());
    assert_eq!(partial.status(&k("invoke.mint")), ActionStatus::Failed);
    assert_eq!(partial.status(&k("invoke.setOwner")), ActionStatus::Pending);
    assert_eq!(chain.transaction_count(), 1);

    chain.clear_revert("mint");
    let resumed = engine.build(&g, partial.state, &mut NullEventSink).unwrap();
    assert_eq!(resumed.status(&k("deploy.Token")), ActionStatus::Skipped);
    assert_eq!(resumed.with_status(ActionStatus::Done), vec![k("invoke.mint"), k("invoke.setOwner")]);

    let fresh_chain = SimulatedChain::new(CHAIN_ID);
    let fresh = BuildEngine::builder(&fresh_chain, &arts).options(options())
                                                         .build()
                                                         .build(&g, DeploymentState::new(), &mut NullEventSink)
                                                         .unwrap();
    assert_eq!(resumed.ctx.contracts, fresh.ctx.contracts);
    assert_eq!(resumed.ctx.txns, fresh.ctx.txns);
    assert_eq!(resumed.state, fresh.state);
}

#[test]
fn partial_deploy_continues_with_independent_branches() {
    let chain = SimulatedChain::new(CHAIN_ID);
    let arts = artifacts();
    let engine = BuildEngine::builder(&chain, &arts).options(options().allow_partial_deploy(true))
                                                    .build();
    let g = graph(json!({
        "deploy.Token": {"artifact": "Token"},
        "deploy.Vault": {"artifact": "Vault"},
        "invoke.mint": {"target": "Token", "func": "mint", "args": [1]},
        "invoke.setOwner": {"target": "Token", "func": "setOwner", "args": ["<%= txns.mint.hash %>"]}
    }));
    chain.revert_on("mint");

    let mut sink = InMemoryEventSink::new();
    let outcome = engine.build(&g, DeploymentState::new(), &mut sink).unwrap();
    assert_eq!(outcome.status(&k("invoke.mint")), ActionStatus::Failed);
    assert_eq!(outcome.status(&k("invoke.setOwner")), ActionStatus::DependencyFailed);
    assert_eq!(outcome.status(&k("deploy.Vault")), ActionStatus::Done);
    assert_eq!(outcome.skipped.len(), 2);
    assert_eq!(outcome.skipped[1].1,
               StepError::Execution(ExecutionError::DependencyFailed("invoke.mint".into())));

    let skips = sink.kinds().filter(|k| matches!(k, BuildEventKind::SkipDeploy { .. })).count();
    assert_eq!(skips, 2);
    assert_eq!(outcome.to_record(&g, Default::default()).status, RecordStatus::Partial);
}

#[test]
fn schema_errors_fail_only_their_branch_with_partial_deploy() {
    let chain = SimulatedChain::new(CHAIN_ID);
    let arts = artifacts();
    let engine = BuildEngine::builder(&chain, &arts).options(options().allow_partial_deploy(true))
                                                    .build();
    let g = graph(json!({
        "deploy.Broken": {"args": []},
        "deploy.Vault": {"artifact": "Vault"}
    }));
    let outcome = engine.build(&g, DeploymentState::new(), &mut NullEventSink).unwrap();
    assert!(matches!(outcome.skipped[0].1, StepError::Schema(_)));
    assert_eq!(outcome.status(&k("deploy.Vault")), ActionStatus::Done);
}

#[test]
fn validation_errors_abort_before_execution() {
    let chain = SimulatedChain::new(CHAIN_ID);
    let arts = artifacts();
    let engine = BuildEngine::builder(&chain, &arts).options(options()).build();
    let g = graph(json!({
        "deploy.Token": {"artifact": "Token"},
        "invoke.call": {"target": "Token", "func": "mint", "args": ["<%= contracts.DoesNotExist.address %>"]}
    }));
    let err = engine.build(&g, DeploymentState::new(), &mut NullEventSink).unwrap_err();
    match err {
        BuildError::Validation(report) => {
            assert_eq!(report.missing.len(), 1);
            assert_eq!(report.missing[0].node, k("invoke.call"));
            assert_eq!(report.missing[0].dependency, "contracts.DoesNotExist");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(chain.transaction_count(), 0);
}

#[test]
fn recompiled_bytecode_redeploys_and_reruns_dependents() {
    let chain = SimulatedChain::new(CHAIN_ID);
    let arts = artifacts();
    let g = three_step();
    let first = BuildEngine::builder(&chain, &arts).options(options())
                                                   .build()
                                                   .build(&g, DeploymentState::new(), &mut NullEventSink)
                                                   .unwrap();

    let mut recompiled = InMemoryArtifacts::new();
    recompiled.insert("Token", token_abi(), "0x6001ff");
    let second = BuildEngine::builder(&chain, &recompiled).options(options())
                                                          .build()
                                                          .build(&g, first.state.clone(), &mut NullEventSink)
                                                          .unwrap();
    assert!(second.statuses.values().all(|s| *s == ActionStatus::Done));
    assert_ne!(second.ctx.contracts["Token"].address, first.ctx.contracts["Token"].address);
}

#[test]
fn cancelled_build_returns_without_launching_actions() {
    let chain = SimulatedChain::new(CHAIN_ID);
    let arts = artifacts();
    let cancel = CancelFlag::new();
    cancel.cancel();
    let engine = BuildEngine::builder(&chain, &arts).options(options())
                                                    .cancel(cancel)
                                                    .build();
    let outcome = engine.build(&three_step(), DeploymentState::new(), &mut NullEventSink).unwrap();
    assert!(outcome.cancelled);
    assert!(outcome.state.is_empty());
    assert!(!outcome.is_complete());
    assert_eq!(chain.transaction_count(), 0);
}

#[test]
fn cancellation_during_receipt_wait_keeps_completed_entries_only() {
    let chain = SimulatedChain::new(CHAIN_ID);
    let arts = artifacts();
    let cancel = CancelFlag::new();
    let engine = BuildEngine::builder(&chain, &arts).options(options().receipt_timeout(Duration::from_secs(30)))
                                                    .cancel(cancel.clone())
                                                    .build();
    chain.withhold_receipts(true);
    let canceller = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(50));
        cancel.cancel();
    });
    let outcome = engine.build(&three_step(), DeploymentState::new(), &mut NullEventSink).unwrap();
    canceller.join().unwrap();
    assert!(outcome.cancelled);
    assert!(outcome.state.is_empty());
    assert_eq!(outcome.status(&k("deploy.Token")), ActionStatus::Pending);
}

#[test]
fn missing_receipt_times_out_as_execution_error() {
    let chain = SimulatedChain::new(CHAIN_ID);
    let arts = artifacts();
    let engine = BuildEngine::builder(&chain, &arts).options(options().receipt_timeout(Duration::from_millis(20)))
                                                    .build();
    chain.withhold_receipts(true);
    let err = engine.build(&three_step(), DeploymentState::new(), &mut NullEventSink).unwrap_err();
    assert!(matches!(err,
                     BuildError::Step { source: StepError::Execution(ExecutionError::Timeout { .. }), .. }));
}

#[test]
fn caller_settings_override_var_defaults() {
    let chain = SimulatedChain::new(CHAIN_ID);
    let arts = artifacts();
    let engine = BuildEngine::builder(&chain, &arts).options(options().setting("owner", "0xabc"))
                                                    .build();
    let g = graph(json!({
        "var.cfg": {"defaults": {"owner": "0x1", "fee": "5"}},
        "deploy.Token": {"artifact": "Token", "args": ["<%= settings.owner %>", "<%= settings.fee %>"]}
    }));
    let outcome = engine.build(&g, DeploymentState::new(), &mut NullEventSink).unwrap();
    assert_eq!(outcome.ctx.contracts["Token"].constructor_args, vec![json!("0xabc"), json!("5")]);
    assert_eq!(outcome.ctx.settings["fee"], "5");
}
