use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use cannon_adapters::{DirectoryArtifacts, SimulatedChain};
use cannon_core::{ActionGraph, BuildEngine, BuildError, BuildEvent, BuildEventKind, PackageMeta, PackageRef};
use cannon_persistence::{persist_build, InMemoryRegistry, LocalBlobStore, LocalStorage, StoreConfig, StorePackageLoader,
                         VariantLock};

const USAGE: &str = "Uso:
  cannon build <actions.json> --package <name:version> [--chain-id <N>] [--preset <P>]
               [--artifacts <DIR>] [--setting <k=v>]... [--partial]
  cannon inspect <name:version> [--chain-id <N>] [--preset <P>] [--json]
  cannon prune <name:version> [--chain-id <N>] [--preset <P>] [--dry-run]";

#[derive(Debug, Clone, PartialEq, Default)]
struct Target {
    package: Option<String>,
    chain_id: Option<u64>,
    preset: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
enum Command {
    Build { file: PathBuf, target: Target, artifacts: PathBuf, settings: BTreeMap<String, String>, partial: bool },
    Inspect { target: Target, json: bool },
    Prune { target: Target, dry_run: bool },
}

fn parse_args(args: &[String]) -> Result<Command, String> {
    let sub = args.get(1).ok_or("falta subcomando")?;
    let mut positional: Vec<String> = Vec::new();
    let mut target = Target::default();
    let mut artifacts = PathBuf::from("./artifacts");
    let mut settings = BTreeMap::new();
    let mut flags: Vec<&str> = Vec::new();
    let mut i = 2;
    while i < args.len() {
        let value = |i: usize| args.get(i + 1).cloned().ok_or(format!("{} requiere un valor", args[i]));
        match args[i].as_str() {
            "--package" => {
                target.package = Some(value(i)?);
                i += 1;
            }
            "--chain-id" => {
                target.chain_id = Some(value(i)?.parse().map_err(|e| format!("--chain-id: {e}"))?);
                i += 1;
            }
            "--preset" => {
                target.preset = Some(value(i)?);
                i += 1;
            }
            "--artifacts" => {
                artifacts = PathBuf::from(value(i)?);
                i += 1;
            }
            "--setting" => {
                let raw = value(i)?;
                let (k, v) = raw.split_once('=').ok_or(format!("--setting espera k=v, recibido `{raw}`"))?;
                settings.insert(k.to_string(), v.to_string());
                i += 1;
            }
            flag @ ("--partial" | "--json" | "--dry-run") => flags.push(flag),
            other if other.starts_with("--") => return Err(format!("opción desconocida `{other}`")),
            other => positional.push(other.to_string()),
        }
        i += 1;
    }

    match sub.as_str() {
        "build" => {
            let file = positional.first().ok_or("build requiere <actions.json>")?;
            if target.package.is_none() {
                return Err("build requiere --package".into());
            }
            Ok(Command::Build { file: PathBuf::from(file),
                                target,
                                artifacts,
                                settings,
                                partial: flags.contains(&"--partial") })
        }
        "inspect" | "prune" => {
            target.package = Some(positional.first().ok_or(format!("{sub} requiere <name:version>"))?.clone());
            if sub == "inspect" {
                Ok(Command::Inspect { target, json: flags.contains(&"--json") })
            } else {
                Ok(Command::Prune { target, dry_run: flags.contains(&"--dry-run") })
            }
        }
        other => Err(format!("subcomando desconocido `{other}`")),
    }
}

/// Referencia + chain id efectivos (flags sobre la config de entorno).
fn resolve_target(target: &Target, cfg: &StoreConfig) -> Result<(PackageRef, u64), String> {
    let raw = target.package.as_deref().ok_or("falta el paquete")?;
    let mut pkg = PackageRef::parse(raw)?;
    pkg = pkg.with_preset(target.preset.as_deref().unwrap_or(&cfg.preset));
    Ok((pkg, target.chain_id.unwrap_or(cfg.chain_id)))
}

fn print_event(event: BuildEvent) {
    let indent = "  ".repeat(event.kind.depth());
    match event.kind {
        BuildEventKind::PreStepExecute { kind, label, .. } => println!("{indent}> {kind}.{label}"),
        BuildEventKind::PostStepExecute { kind, label, skipped: true, .. } => println!("{indent}= {kind}.{label} (sin cambios)"),
        BuildEventKind::PostStepExecute { kind, label, artifacts, .. } => {
            for (name, c) in &artifacts.contracts {
                println!("{indent}  {name} @ {}", c.address);
            }
            for (name, t) in &artifacts.txns {
                println!("{indent}  tx {name}: {}", t.hash);
            }
            println!("{indent}+ {kind}.{label}");
        }
        BuildEventKind::SkipDeploy { key, error, .. } => eprintln!("{indent}! {key} omitido: {error}"),
    }
}

fn run_build(cfg: &StoreConfig,
             file: &Path,
             target: &Target,
             artifacts_dir: &Path,
             settings: BTreeMap<String, String>,
             partial: bool)
             -> Result<i32, String> {
    let text = std::fs::read_to_string(file).map_err(|e| format!("{}: {e}", file.display()))?;
    let value: serde_json::Value = serde_json::from_str(&text).map_err(|e| format!("{}: {e}", file.display()))?;
    let graph = ActionGraph::from_value(&value).map_err(|e| e.to_string())?;
    let (pkg, chain_id) = resolve_target(target, cfg)?;

    let storage = LocalStorage::new(&cfg.directory);
    let blobs = LocalBlobStore::new(&cfg.directory);
    let registry = InMemoryRegistry::new();
    let loader = StorePackageLoader::new(&storage, &blobs, &registry);

    let dir = storage.package_dir(&pkg).map_err(|e| e.to_string())?;
    let variant = pkg.variant(chain_id);
    let _lock = VariantLock::acquire(&dir, &variant).map_err(|e| e.to_string())?;
    let prior = storage.read_deployment_record(&dir, &variant)
                       .map_err(|e| e.to_string())?
                       .map(|r| r.state)
                       .unwrap_or_default();

    let chain = SimulatedChain::new(chain_id);
    let artifacts = DirectoryArtifacts::new(artifacts_dir);
    let options = cfg.build_options(PackageMeta::new(&pkg.name, &pkg.version))
                     .allow_partial_deploy(partial || cfg.allow_partial_deploy)
                     .settings(settings.clone());
    let engine = BuildEngine::builder(&chain, &artifacts).packages(&loader)
                                                         .options(options)
                                                         .build();

    println!("building {pkg} on chain {chain_id} ({} actions, {} in prior state)", graph.len(), prior.len());
    let mut sink = print_event;
    let (outcome, code) = match engine.build(&graph, prior, &mut sink) {
        Ok(outcome) => (outcome, 0),
        Err(BuildError::Step { key, source, partial: outcome }) => {
            eprintln!("[cannon build] {key} falló: {source}");
            (*outcome, 5)
        }
        Err(BuildError::Validation(report)) => {
            eprintln!("[cannon build] grafo inválido:\n{report}");
            return Ok(4);
        }
        Err(e) => return Err(e.to_string()),
    };

    let record = outcome.to_record(&graph, settings);
    let url = persist_build(&storage, &blobs, &pkg, chain_id, &record).map_err(|e| e.to_string())?;
    println!("{:?}: {} hechas, {} reutilizadas, {} omitidas -> {url}",
             record.status,
             outcome.with_status(cannon_core::ActionStatus::Done).len(),
             outcome.with_status(cannon_core::ActionStatus::Skipped).len(),
             outcome.skipped.len());
    if outcome.cancelled {
        return Ok(6);
    }
    Ok(if code == 0 && !outcome.is_complete() { 5 } else { code })
}

fn run_inspect(cfg: &StoreConfig, target: &Target, json: bool) -> Result<i32, String> {
    let (pkg, chain_id) = resolve_target(target, cfg)?;
    let storage = LocalStorage::new(&cfg.directory);
    let Some(record) = storage.read_package(&pkg, chain_id).map_err(|e| e.to_string())? else {
        eprintln!("[cannon inspect] sin registro para {pkg} en chain {chain_id}");
        return Ok(4);
    };
    if json {
        println!("{}", serde_json::to_string_pretty(&record).map_err(|e| e.to_string())?);
        return Ok(0);
    }
    let ctx = record.context().map_err(|e| e.to_string())?;
    println!("{pkg} chain={chain_id} status={:?} generator={}", record.status, record.generator);
    println!("acciones: {}", record.state.len());
    for (name, c) in &ctx.contracts {
        println!("  contract {name} @ {}", c.address);
    }
    for (name, t) in &ctx.txns {
        println!("  txn {name}: {}", t.hash);
    }
    for (label, nested) in &ctx.imports {
        println!("  import {label}: {} {} ({} contracts)",
                 nested.package.name,
                 nested.url.as_deref().unwrap_or("-"),
                 nested.contracts.len());
    }
    Ok(0)
}

fn run_prune(cfg: &StoreConfig, target: &Target, dry_run: bool) -> Result<i32, String> {
    let (pkg, chain_id) = resolve_target(target, cfg)?;
    let storage = LocalStorage::new(&cfg.directory);
    let dir = storage.package_dir(&pkg).map_err(|e| e.to_string())?;
    let variant = pkg.variant(chain_id);
    let _lock = VariantLock::acquire(&dir, &variant).map_err(|e| e.to_string())?;
    let Some(mut record) = storage.read_deployment_record(&dir, &variant).map_err(|e| e.to_string())? else {
        eprintln!("[cannon prune] sin registro para {pkg} en chain {chain_id}");
        return Ok(4);
    };
    let graph = ActionGraph::parse(&record.def).map_err(|e| e.to_string())?;
    let removed = if dry_run { record.state.orphans(&graph) } else { record.state.prune(&graph) };
    for key in &removed {
        println!("{} {key}", if dry_run { "huérfana" } else { "eliminada" });
    }
    if !dry_run && !removed.is_empty() {
        storage.write_deployment_record(&dir, &variant, &record).map_err(|e| e.to_string())?;
    }
    Ok(0)
}

fn main() {
    // Cargar .env si existe para obtener CANNON_DIRECTORY y compañía
    let _ = dotenvy::dotenv();
    let args: Vec<String> = std::env::args().collect();
    let command = match parse_args(&args) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("[cannon] {e}\n{USAGE}");
            std::process::exit(2);
        }
    };
    let cfg = StoreConfig::from_env();
    let result = match &command {
        Command::Build { file, target, artifacts, settings, partial } => {
            run_build(&cfg, file, target, artifacts, settings.clone(), *partial)
        }
        Command::Inspect { target, json } => run_inspect(&cfg, target, *json),
        Command::Prune { target, dry_run } => run_prune(&cfg, target, *dry_run),
    };
    match result {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("[cannon] error: {e}");
            std::process::exit(5);
        }
    }
}
