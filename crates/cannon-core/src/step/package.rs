//! Kinds que incorporan otro paquete bajo `imports.<label>`:
//!
//! - `clone`: ejecuta el grafo upstream como build anidado en la misma cadena.
//! - `pull`: referencia un despliegue existente en esta cadena.
//! - `import`: carga el registro de un paquete (opcionalmente de otra cadena).
//! - `provision`: como `import`, pero con varias fuentes candidatas.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::plugin::{ImportRequirement, StepPlugin, StepScope};
use super::runtime::{LoadedPackage, StepRuntime};
use crate::constants::BUILD_CHAIN_ID;
use crate::engine::BuildEngine;
use crate::errors::{ExecutionError, StepError};
use crate::graph::ActionGraph;
use crate::model::{ActionKey, BuildContext, ChainArtifacts, DeploymentState, PackageMeta, PackageRecord, PackageRef, RecordStatus};
use crate::step::BuildOptions;
use crate::template::{Output, Section};

fn parse_ref(source: &str, preset: Option<&str>) -> Result<PackageRef, ExecutionError> {
    let pkg = PackageRef::parse(source).map_err(|e| ExecutionError::PackageNotFound(format!("{source}: {e}")))?;
    Ok(match preset {
        Some(p) => pkg.with_preset(p),
        None => pkg,
    })
}

fn resolve_required(rt: &StepRuntime<'_>, pkg: &PackageRef, chain_id: u64) -> Result<LoadedPackage, ExecutionError> {
    rt.packages
      .resolve(pkg, chain_id)?
      .ok_or_else(|| ExecutionError::PackageNotFound(format!("{pkg} on chain {chain_id}")))
}

/// Contexto final de un registro cargado, con su URL de origen.
fn nested_context(pkg: &PackageRef, loaded: LoadedPackage) -> Result<BuildContext, ExecutionError> {
    let mut ctx = loaded.record
                        .context()
                        .map_err(|e| ExecutionError::Nested { package: pkg.to_string(),
                                                              message: e.to_string() })?;
    ctx.url = Some(loaded.url);
    Ok(ctx)
}

fn imports_fragment(key: &ActionKey, ctx: BuildContext) -> ChainArtifacts {
    let mut out = ChainArtifacts::default();
    out.imports.insert(key.label().to_string(), ctx);
    out
}

fn import_output(key: &ActionKey) -> Vec<Output> {
    vec![Output::new(Section::Imports, key.label())]
}

// ---------------------------------------------------------------- clone

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CloneConfig {
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_preset: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_preset: Option<String>,
    /// Settings pasados al build anidado.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub options: BTreeMap<String, String>,
    /// Versiones adicionales bajo las que se guarda el registro anidado.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CloneStep;

impl CloneStep {
    /// Registro que contiene la definición upstream: primero en la cadena
    /// actual y, si no, el registro de sólo-definición.
    fn resolve_source(&self, rt: &StepRuntime<'_>, config: &CloneConfig) -> Result<(PackageRef, LoadedPackage), ExecutionError> {
        let source = parse_ref(&config.source, config.source_preset.as_deref())?;
        if let Some(found) = rt.packages.resolve(&source, rt.chain_id())? {
            return Ok((source, found));
        }
        let found = resolve_required(rt, &source, BUILD_CHAIN_ID)?;
        Ok((source, found))
    }

    fn target_ref(&self, rt: &StepRuntime<'_>, source: &PackageRef, config: &CloneConfig) -> Result<PackageRef, ExecutionError> {
        let base = match &config.target {
            Some(t) => parse_ref(t, None)?,
            None => source.clone(),
        };
        let preset = config.target_preset
                           .clone()
                           .unwrap_or_else(|| format!("with-{}", rt.options.package.name));
        Ok(base.with_preset(&preset))
    }

    /// Estado anidado de la ejecución anterior. Si el clone no llegó a
    /// completarse, se reanuda desde el registro parcial guardado en `target`.
    fn prior_state(&self, rt: &StepRuntime<'_>, scope: &StepScope<'_>, target: &PackageRef) -> Result<DeploymentState, ExecutionError> {
        let url = scope.prior
                       .and_then(|p| p.artifacts.imports.get(scope.key.label()))
                       .and_then(|c| c.url.as_deref());
        if let Some(url) = url {
            return Ok(rt.packages.load_url(url)?.state);
        }
        match rt.packages.resolve(target, rt.chain_id())? {
            Some(found) if found.record.status == RecordStatus::Partial => {
                log::info!("resuming partial nested deployment of {target} from {}", found.url);
                Ok(found.record.state)
            }
            _ => Ok(DeploymentState::new()),
        }
    }

    fn save(&self, rt: &StepRuntime<'_>, target: &PackageRef, config: &CloneConfig, record: &PackageRecord) -> Result<String, ExecutionError> {
        let url = rt.packages.save_nested(target, rt.chain_id(), record)?;
        for tag in &config.tags {
            rt.packages.save_nested(&target.with_version(tag), rt.chain_id(), record)?;
        }
        Ok(url)
    }
}

impl StepPlugin for CloneStep {
    type Config = CloneConfig;

    fn get_state(&self,
                 rt: &StepRuntime<'_>,
                 _key: &ActionKey,
                 _ctx: &BuildContext,
                 config: &CloneConfig)
                 -> Result<Value, StepError> {
        let (_, loaded) = self.resolve_source(rt, config)?;
        Ok(json!({ "config": config, "source": loaded.url }))
    }

    fn execute(&self,
               rt: &StepRuntime<'_>,
               scope: &mut StepScope<'_>,
               _ctx: &BuildContext,
               config: &CloneConfig)
               -> Result<ChainArtifacts, StepError> {
        let (source, loaded) = self.resolve_source(rt, config)?;
        let target = self.target_ref(rt, &source, config)?;
        let nested_err = |message: String| ExecutionError::Nested { package: target.to_string(),
                                                                    message };
        if rt.depth + 1 > rt.options.max_depth {
            return Err(nested_err(format!("maximum nesting depth {} exceeded", rt.options.max_depth)).into());
        }

        let def = loaded.record.def;
        let graph = ActionGraph::parse(&def).map_err(|e| nested_err(e.to_string()))?;
        let prior = self.prior_state(rt, scope, &target)?;

        let mut meta = PackageMeta::new(&target.name, &target.version);
        meta.description = loaded.record.meta.description.clone();
        let options = BuildOptions { allow_partial_deploy: false,
                                     settings: config.options.clone(),
                                     package: meta,
                                     preset: target.preset.clone(),
                                     ..rt.options.clone() };

        log::info!("cloning {source} into {target} (depth {})", rt.depth + 1);
        let engine = BuildEngine::builder(rt.chain, rt.artifacts).packages(rt.packages)
                                                                 .options(options)
                                                                 .cancel(rt.cancel.clone())
                                                                 .build();
        let outcome = match engine.build_nested(&graph, prior, rt.depth + 1, &mut *scope.sink) {
            Ok(outcome) => outcome,
            Err(err) => {
                // lo ya desplegado queda guardado para el siguiente intento
                if let Some(partial) = err.partial() {
                    let record = partial.to_record(&graph, config.options.clone());
                    let url = self.save(rt, &target, config, &record)?;
                    log::warn!("nested build of {target} failed, partial state saved at {url}");
                }
                return Err(nested_err(err.to_string()).into());
            }
        };

        let record = outcome.to_record(&graph, config.options.clone());
        let url = self.save(rt, &target, config, &record)?;

        let mut child = outcome.ctx;
        child.url = Some(url);
        Ok(imports_fragment(scope.key, child))
    }

    fn provides(&self, key: &ActionKey, _config: &CloneConfig) -> Vec<Output> {
        import_output(key)
    }

    fn required_imports(&self, config: &CloneConfig) -> Vec<ImportRequirement> {
        vec![ImportRequirement { source: config.source.clone(),
                                 chain_id: None,
                                 preset: config.source_preset.clone() }]
    }
}

// ---------------------------------------------------------------- pull

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PullConfig {
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preset: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PullStep;

impl StepPlugin for PullStep {
    type Config = PullConfig;

    fn get_state(&self,
                 rt: &StepRuntime<'_>,
                 _key: &ActionKey,
                 _ctx: &BuildContext,
                 config: &PullConfig)
                 -> Result<Value, StepError> {
        let pkg = parse_ref(&config.source, config.preset.as_deref())?;
        let loaded = resolve_required(rt, &pkg, rt.chain_id())?;
        Ok(json!({ "config": config, "url": loaded.url }))
    }

    fn execute(&self,
               rt: &StepRuntime<'_>,
               scope: &mut StepScope<'_>,
               _ctx: &BuildContext,
               config: &PullConfig)
               -> Result<ChainArtifacts, StepError> {
        let pkg = parse_ref(&config.source, config.preset.as_deref())?;
        let loaded = resolve_required(rt, &pkg, rt.chain_id())?;
        log::info!("pulled {pkg} from {}", loaded.url);
        Ok(imports_fragment(scope.key, nested_context(&pkg, loaded)?))
    }

    fn provides(&self, key: &ActionKey, _config: &PullConfig) -> Vec<Output> {
        import_output(key)
    }

    fn required_imports(&self, config: &PullConfig) -> Vec<ImportRequirement> {
        vec![ImportRequirement { source: config.source.clone(),
                                 chain_id: None,
                                 preset: config.preset.clone() }]
    }
}

// ---------------------------------------------------------------- import

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ImportConfig {
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preset: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ImportStep;

impl ImportStep {
    fn load(&self, rt: &StepRuntime<'_>, config: &ImportConfig) -> Result<(PackageRef, LoadedPackage), ExecutionError> {
        let pkg = parse_ref(&config.source, config.preset.as_deref())?;
        let loaded = resolve_required(rt, &pkg, config.chain_id.unwrap_or_else(|| rt.chain_id()))?;
        Ok((pkg, loaded))
    }
}

impl StepPlugin for ImportStep {
    type Config = ImportConfig;

    fn get_state(&self,
                 rt: &StepRuntime<'_>,
                 _key: &ActionKey,
                 _ctx: &BuildContext,
                 config: &ImportConfig)
                 -> Result<Value, StepError> {
        let (_, loaded) = self.load(rt, config)?;
        Ok(json!({ "config": config, "url": loaded.url }))
    }

    fn execute(&self,
               rt: &StepRuntime<'_>,
               scope: &mut StepScope<'_>,
               _ctx: &BuildContext,
               config: &ImportConfig)
               -> Result<ChainArtifacts, StepError> {
        let (pkg, loaded) = self.load(rt, config)?;
        log::info!("imported {pkg} from {}", loaded.url);
        Ok(imports_fragment(scope.key, nested_context(&pkg, loaded)?))
    }

    fn provides(&self, key: &ActionKey, _config: &ImportConfig) -> Vec<Output> {
        import_output(key)
    }

    fn required_imports(&self, config: &ImportConfig) -> Vec<ImportRequirement> {
        vec![ImportRequirement { source: config.source.clone(),
                                 chain_id: config.chain_id,
                                 preset: config.preset.clone() }]
    }
}

// ---------------------------------------------------------------- provision

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ProvisionConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Candidatas en orden de prioridad, después de `source`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preset: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends: Vec<String>,
}

impl ProvisionConfig {
    pub fn candidates(&self) -> impl Iterator<Item = &String> {
        self.source.iter().chain(self.sources.iter())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ProvisionStep;

impl ProvisionStep {
    /// La primera candidata que resuelve gana.
    fn select(&self, rt: &StepRuntime<'_>, config: &ProvisionConfig) -> Result<(PackageRef, LoadedPackage), ExecutionError> {
        let chain_id = config.chain_id.unwrap_or_else(|| rt.chain_id());
        for candidate in config.candidates() {
            let pkg = parse_ref(candidate, config.preset.as_deref())?;
            if let Some(loaded) = rt.packages.resolve(&pkg, chain_id)? {
                return Ok((pkg, loaded));
            }
            log::debug!("provision candidate {pkg} not found on chain {chain_id}");
        }
        let all: Vec<&str> = config.candidates().map(String::as_str).collect();
        Err(ExecutionError::PackageNotFound(all.join(", ")))
    }
}

impl StepPlugin for ProvisionStep {
    type Config = ProvisionConfig;

    fn validate_config(&self, key: &ActionKey, raw: &Value) -> Result<ProvisionConfig, crate::errors::SchemaError> {
        let config: ProvisionConfig =
            serde_json::from_value(raw.clone()).map_err(|e| crate::errors::SchemaError::new(key.as_str(), e.to_string()))?;
        if config.candidates().next().is_none() {
            return Err(crate::errors::SchemaError::new(key.as_str(), "`source` or `sources` is required"));
        }
        Ok(config)
    }

    fn get_state(&self,
                 rt: &StepRuntime<'_>,
                 _key: &ActionKey,
                 _ctx: &BuildContext,
                 config: &ProvisionConfig)
                 -> Result<Value, StepError> {
        let (pkg, loaded) = self.select(rt, config)?;
        Ok(json!({ "config": config, "selected": pkg.to_string(), "url": loaded.url }))
    }

    fn execute(&self,
               rt: &StepRuntime<'_>,
               scope: &mut StepScope<'_>,
               _ctx: &BuildContext,
               config: &ProvisionConfig)
               -> Result<ChainArtifacts, StepError> {
        let (pkg, loaded) = self.select(rt, config)?;
        log::info!("provisioned {} from {pkg}", scope.key);
        Ok(imports_fragment(scope.key, nested_context(&pkg, loaded)?))
    }

    fn provides(&self, key: &ActionKey, _config: &ProvisionConfig) -> Vec<Output> {
        import_output(key)
    }

    fn required_imports(&self, config: &ProvisionConfig) -> Vec<ImportRequirement> {
        config.candidates()
              .map(|s| ImportRequirement { source: s.clone(),
                                           chain_id: config.chain_id,
                                           preset: config.preset.clone() })
              .collect()
    }
}
