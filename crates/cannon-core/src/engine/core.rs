//! `BuildEngine`: recorre el grafo en orden topológico, reutiliza las
//! acciones cuyo fingerprint coincide con el estado persistido y ejecuta el
//! resto.

use serde_json::Value;
use uuid::Uuid;

use super::{BuildEngineBuilder, BuildOutcome};
use crate::errors::{BuildError, ExecutionError, MergeCollisionError, StepError};
use crate::event::{BuildEventKind, Emitter, EventSink};
use crate::graph::{ActionGraph, ActionNode};
use crate::model::{ActionKey, ActionState, BuildContext, ChainArtifacts, DeploymentState};
use crate::step::{ActionStatus, ArtifactSource, BuildOptions, CancelFlag, ChainClient, PackageLoader, StepRuntime,
                  StepScope};

/// Motor de build incremental.
///
/// Un único hilo lógico recorre el orden topológico: el orden de los
/// artifacts es determinista y no hay carreras de nonce con un firmante.
pub struct BuildEngine<'a> {
    pub(super) chain: &'a dyn ChainClient,
    pub(super) artifacts: &'a dyn ArtifactSource,
    pub(super) packages: &'a dyn PackageLoader,
    pub(super) options: BuildOptions,
    pub(super) cancel: CancelFlag,
}

/// Fallo de una acción desde el punto de vista del loop.
enum ActionFailure {
    Step(StepError),
    Merge(MergeCollisionError),
}

impl From<StepError> for ActionFailure {
    fn from(e: StepError) -> Self {
        ActionFailure::Step(e)
    }
}

impl<'a> BuildEngine<'a> {
    #[inline]
    pub fn builder(chain: &'a dyn ChainClient, artifacts: &'a dyn ArtifactSource) -> BuildEngineBuilder<'a> {
        BuildEngineBuilder::new(chain, artifacts)
    }

    pub fn options(&self) -> &BuildOptions {
        &self.options
    }

    pub fn cancel_flag(&self) -> &CancelFlag {
        &self.cancel
    }

    fn runtime(&self, depth: usize) -> StepRuntime<'_> {
        StepRuntime { chain: self.chain,
                      artifacts: self.artifacts,
                      packages: self.packages,
                      options: &self.options,
                      cancel: &self.cancel,
                      depth }
    }

    /// Ejecuta un build de nivel superior partiendo de `state`.
    ///
    /// Sin partial deploy, el primer fallo devuelve `BuildError::Step` con el
    /// resultado parcial; reintentar con ese estado reanuda desde la acción
    /// fallida.
    pub fn build(&self,
                 graph: &ActionGraph,
                 state: DeploymentState,
                 sink: &mut dyn EventSink)
                 -> Result<BuildOutcome, BuildError> {
        self.build_nested(graph, state, 0, sink)
    }

    /// Igual que `build` a una profundidad dada (lo usa `clone`).
    pub fn build_nested(&self,
                        graph: &ActionGraph,
                        state: DeploymentState,
                        depth: usize,
                        sink: &mut dyn EventSink)
                        -> Result<BuildOutcome, BuildError> {
        let report = graph.validate();
        if !report.is_empty() {
            return Err(BuildError::Validation(report));
        }
        let order = graph.topological_order().map_err(BuildError::Validation)?;

        let build_id = Uuid::new_v4();
        let mut emitter = Emitter::new(build_id);
        let rt = self.runtime(depth);

        let mut ctx = BuildContext::new(self.options.package.clone(), self.chain.chain_id());
        ctx.settings = self.options.settings.clone();
        let mut outcome = BuildOutcome { build_id,
                                         state,
                                         ctx,
                                         statuses: order.iter().map(|k| (k.clone(), ActionStatus::Pending)).collect(),
                                         skipped: Vec::new(),
                                         cancelled: false };
        log::info!("build {build_id}: {} actions for {} on chain {} (depth {depth})",
                   order.len(),
                   self.options.package.name,
                   outcome.ctx.chain_id);

        for key in &order {
            if self.cancel.is_cancelled() {
                log::warn!("build {build_id} cancelled before {key}");
                outcome.cancelled = true;
                break;
            }
            let Some(node) = graph.node(key) else {
                continue;
            };

            if let Some(dep) = node.depends_on().into_iter().find(|d| outcome.status(d).is_failure()) {
                outcome.statuses.insert(key.clone(), ActionStatus::DependencyFailed);
                let error = ExecutionError::DependencyFailed(dep.to_string()).into();
                self.record_skip(&mut outcome, &mut emitter, sink, key, error, depth);
                continue;
            }

            match self.run_action(&rt, node, &mut outcome, &mut emitter, sink) {
                Ok(()) => {}
                Err(ActionFailure::Merge(e)) => {
                    log::error!("{key}: {e}");
                    return Err(e.into());
                }
                Err(ActionFailure::Step(StepError::Execution(ExecutionError::Cancelled))) => {
                    log::warn!("build {build_id} cancelled during {key}");
                    outcome.statuses.insert(key.clone(), ActionStatus::Pending);
                    outcome.cancelled = true;
                    break;
                }
                Err(ActionFailure::Step(error)) => {
                    outcome.statuses.insert(key.clone(), ActionStatus::Failed);
                    if !self.options.allow_partial_deploy {
                        log::error!("{key} failed: {error}");
                        return Err(BuildError::Step { key: key.to_string(),
                                                      source: error,
                                                      partial: Box::new(outcome) });
                    }
                    log::warn!("{key} failed, continuing with independent actions: {error}");
                    self.record_skip(&mut outcome, &mut emitter, sink, key, error, depth);
                }
            }
        }

        log::info!("build {build_id} finished: {} executed, {} skipped failures",
                   outcome.with_status(ActionStatus::Done).len(),
                   outcome.skipped.len());
        Ok(outcome)
    }

    fn record_skip(&self,
                   outcome: &mut BuildOutcome,
                   emitter: &mut Emitter,
                   sink: &mut dyn EventSink,
                   key: &ActionKey,
                   error: StepError,
                   depth: usize) {
        emitter.emit(sink,
                     BuildEventKind::SkipDeploy { key: key.clone(),
                                                  error: error.clone(),
                                                  depth });
        outcome.skipped.push((key.clone(), error));
    }

    fn post_event(key: &ActionKey,
                  config: Value,
                  ctx: &BuildContext,
                  artifacts: ChainArtifacts,
                  depth: usize,
                  skipped: bool)
                  -> BuildEventKind {
        BuildEventKind::PostStepExecute { kind: key.kind(),
                                          label: key.label().to_string(),
                                          config,
                                          ctx: Box::new(ctx.clone()),
                                          artifacts,
                                          depth,
                                          skipped }
    }

    /// validate -> inject -> fingerprint -> (reutilizar | ejecutar) -> merge.
    /// La entrada de estado sólo se escribe cuando el merge tuvo éxito.
    fn run_action(&self,
                  rt: &StepRuntime<'_>,
                  node: &ActionNode,
                  outcome: &mut BuildOutcome,
                  emitter: &mut Emitter,
                  sink: &mut dyn EventSink)
                  -> Result<(), ActionFailure> {
        let key = &node.key;
        let config = node.config.clone().map_err(StepError::from)?;
        let rendered = config.config_inject(key, &outcome.ctx)?;
        let fingerprint = rendered.derive_state(rt, key, &outcome.ctx)?;
        let config_value = rendered.to_value();

        emitter.emit(sink,
                     BuildEventKind::PreStepExecute { kind: key.kind(),
                                                      label: key.label().to_string(),
                                                      config: config_value.clone(),
                                                      depth: rt.depth });

        let reusable = outcome.state
                              .get(key)
                              .filter(|prior| prior.fingerprint == fingerprint)
                              .map(|prior| prior.artifacts.clone());
        if let Some(artifacts) = reusable {
            log::debug!("{key}: fingerprint {fingerprint} unchanged, skipping");
            outcome.ctx.merge_artifacts(&artifacts).map_err(ActionFailure::Merge)?;
            outcome.statuses.insert(key.clone(), ActionStatus::Skipped);
            let ev = Self::post_event(key, config_value, &outcome.ctx, artifacts, rt.depth, true);
            emitter.emit(sink, ev);
            return Ok(());
        }

        log::debug!("{key}: fingerprint {fingerprint} differs from persisted state, executing");
        outcome.statuses.insert(key.clone(), ActionStatus::Executing);
        let artifacts = {
            let mut scope = StepScope { key,
                                        prior: outcome.state.get(key),
                                        sink: &mut *sink };
            rendered.execute(rt, &mut scope, &outcome.ctx)?
        };

        outcome.ctx.merge_artifacts(&artifacts).map_err(ActionFailure::Merge)?;
        outcome.state.insert(key.clone(),
                             ActionState { fingerprint,
                                           artifacts: artifacts.clone() });
        outcome.statuses.insert(key.clone(), ActionStatus::Done);
        log::info!("{key}: done");
        let ev = Self::post_event(key, config_value, &outcome.ctx, artifacts, rt.depth, false);
        emitter.emit(sink, ev);
        Ok(())
    }
}
