//! cannon-core: motor de build incremental para despliegues declarativos.
//!
//! Grafo de acciones -> orden topológico -> por acción: validar, renderizar,
//! calcular fingerprint, reutilizar o ejecutar -> contexto y estado.
pub mod constants;
pub mod engine;
pub mod errors;
pub mod event;
pub mod graph;
pub mod hashing;
pub mod injection;
pub mod model;
pub mod step;
pub mod template;

pub use engine::{BuildEngine, BuildEngineBuilder, BuildOutcome};
pub use errors::{BuildError, DefinitionError, ExecutionError, MergeCollisionError, SchemaError, StepError, TemplateError};
pub use event::{BuildEvent, BuildEventKind, EventSink, InMemoryEventSink, NullEventSink};
pub use graph::{ActionGraph, ActionNode, GraphReport};
pub use injection::combine_ctx;
pub use model::{ActionKey, ActionKind, ActionState, BuildContext, ChainArtifacts, ContractArtifact, DeploymentState,
                PackageMeta, PackageRecord, PackageRef, RawActionMap, RecordStatus, TxnArtifact, Variant};
pub use step::{ActionStatus, ArtifactSource, BuildOptions, CancelFlag, ChainClient, ContractBuildArtifact, LoadedPackage,
               PackageLoader, StepConfig};
