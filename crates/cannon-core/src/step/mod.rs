//! Registro cerrado de kinds de acción.
//!
//! Cada kind es un unit struct que implementa `StepPlugin`; `StepConfig` es
//! la unión etiquetada de sus configs validadas y despacha con `match`.
//! Añadir un kind = nueva variante en `ActionKind` + rama aquí.

pub mod deploy;
pub mod invoke;
pub mod keeper;
pub mod options;
pub mod package;
pub mod plugin;
pub mod router;
pub mod runtime;
pub mod status;
pub mod tx;
pub mod var;

use serde_json::Value;

use crate::constants::ENGINE_VERSION;
use crate::errors::{SchemaError, StepError};
use crate::hashing::hash_value;
use crate::model::{ActionKey, ActionKind, BuildContext, ChainArtifacts};
use crate::template::Output;

pub use deploy::{DeployConfig, DeployStep};
pub use invoke::{ExtraConfig, FactoryConfig, InvokeConfig, InvokeStep};
pub use keeper::{KeeperConfig, KeeperStep};
pub use options::BuildOptions;
pub use package::{CloneConfig, CloneStep, ImportConfig, ImportStep, ProvisionConfig, ProvisionStep, PullConfig, PullStep};
pub use plugin::{ImportRequirement, StepPlugin, StepScope};
pub use router::{RouterConfig, RouterStep};
pub use runtime::{ArtifactSource, CancelFlag, ChainClient, ContractBuildArtifact, LoadedPackage, NoPackages, PackageLoader,
                  RawLog, StepRuntime, TxInput, TxReceipt, TxRequest};
pub use status::ActionStatus;
pub use var::{VarConfig, VarStep};

/// Config validada de una acción, etiquetada por kind.
#[derive(Debug, Clone, PartialEq)]
pub enum StepConfig {
    Deploy(DeployConfig),
    Contract(DeployConfig),
    Invoke(InvokeConfig),
    Router(RouterConfig),
    Clone(CloneConfig),
    Pull(PullConfig),
    Import(ImportConfig),
    Provision(ProvisionConfig),
    Keeper(KeeperConfig),
    Var(VarConfig),
}

/// Evalúa `$body` con `$plugin` y `$cfg` ligados al kind concreto.
macro_rules! dispatch {
    ($self:expr, |$plugin:ident, $cfg:ident| $body:expr) => {
        match $self {
            StepConfig::Deploy($cfg) | StepConfig::Contract($cfg) => {
                let $plugin = DeployStep;
                $body
            }
            StepConfig::Invoke($cfg) => {
                let $plugin = InvokeStep;
                $body
            }
            StepConfig::Router($cfg) => {
                let $plugin = RouterStep;
                $body
            }
            StepConfig::Clone($cfg) => {
                let $plugin = CloneStep;
                $body
            }
            StepConfig::Pull($cfg) => {
                let $plugin = PullStep;
                $body
            }
            StepConfig::Import($cfg) => {
                let $plugin = ImportStep;
                $body
            }
            StepConfig::Provision($cfg) => {
                let $plugin = ProvisionStep;
                $body
            }
            StepConfig::Keeper($cfg) => {
                let $plugin = KeeperStep;
                $body
            }
            StepConfig::Var($cfg) => {
                let $plugin = VarStep;
                $body
            }
        }
    };
}

impl StepConfig {
    /// `validate_config` del kind indicado por la clave.
    pub fn validate(key: &ActionKey, raw: &Value) -> Result<Self, SchemaError> {
        Ok(match key.kind() {
            ActionKind::Deploy => StepConfig::Deploy(DeployStep.validate_config(key, raw)?),
            ActionKind::Contract => StepConfig::Contract(DeployStep.validate_config(key, raw)?),
            ActionKind::Invoke => StepConfig::Invoke(InvokeStep.validate_config(key, raw)?),
            ActionKind::Router => StepConfig::Router(RouterStep.validate_config(key, raw)?),
            ActionKind::Clone => StepConfig::Clone(CloneStep.validate_config(key, raw)?),
            ActionKind::Pull => StepConfig::Pull(PullStep.validate_config(key, raw)?),
            ActionKind::Import => StepConfig::Import(ImportStep.validate_config(key, raw)?),
            ActionKind::Provision => StepConfig::Provision(ProvisionStep.validate_config(key, raw)?),
            ActionKind::Keeper => StepConfig::Keeper(KeeperStep.validate_config(key, raw)?),
            ActionKind::Var => StepConfig::Var(VarStep.validate_config(key, raw)?),
        })
    }

    pub fn kind(&self) -> ActionKind {
        match self {
            StepConfig::Deploy(_) => ActionKind::Deploy,
            StepConfig::Contract(_) => ActionKind::Contract,
            StepConfig::Invoke(_) => ActionKind::Invoke,
            StepConfig::Router(_) => ActionKind::Router,
            StepConfig::Clone(_) => ActionKind::Clone,
            StepConfig::Pull(_) => ActionKind::Pull,
            StepConfig::Import(_) => ActionKind::Import,
            StepConfig::Provision(_) => ActionKind::Provision,
            StepConfig::Keeper(_) => ActionKind::Keeper,
            StepConfig::Var(_) => ActionKind::Var,
        }
    }

    pub fn config_inject(&self, key: &ActionKey, ctx: &BuildContext) -> Result<StepConfig, StepError> {
        Ok(match self {
            StepConfig::Deploy(c) => StepConfig::Deploy(DeployStep.config_inject(key, ctx, c)?),
            StepConfig::Contract(c) => StepConfig::Contract(DeployStep.config_inject(key, ctx, c)?),
            StepConfig::Invoke(c) => StepConfig::Invoke(InvokeStep.config_inject(key, ctx, c)?),
            StepConfig::Router(c) => StepConfig::Router(RouterStep.config_inject(key, ctx, c)?),
            StepConfig::Clone(c) => StepConfig::Clone(CloneStep.config_inject(key, ctx, c)?),
            StepConfig::Pull(c) => StepConfig::Pull(PullStep.config_inject(key, ctx, c)?),
            StepConfig::Import(c) => StepConfig::Import(ImportStep.config_inject(key, ctx, c)?),
            StepConfig::Provision(c) => StepConfig::Provision(ProvisionStep.config_inject(key, ctx, c)?),
            StepConfig::Keeper(c) => StepConfig::Keeper(KeeperStep.config_inject(key, ctx, c)?),
            StepConfig::Var(c) => StepConfig::Var(VarStep.config_inject(key, ctx, c)?),
        })
    }

    /// Fingerprint canónico del estado derivado. Incluye `ENGINE_VERSION` y
    /// el kind.
    pub fn derive_state(&self, rt: &StepRuntime<'_>, key: &ActionKey, ctx: &BuildContext) -> Result<String, StepError> {
        let state = dispatch!(self, |plugin, cfg| plugin.get_state(rt, key, ctx, cfg))?;
        Ok(hash_value(&serde_json::json!({
            "engine_version": ENGINE_VERSION,
            "kind": self.kind().as_str(),
            "state": state,
        })))
    }

    pub fn execute(&self,
                   rt: &StepRuntime<'_>,
                   scope: &mut StepScope<'_>,
                   ctx: &BuildContext)
                   -> Result<ChainArtifacts, StepError> {
        dispatch!(self, |plugin, cfg| plugin.execute(rt, scope, ctx, cfg))
    }

    pub fn references(&self) -> Vec<Output> {
        dispatch!(self, |plugin, cfg| plugin.references(cfg))
    }

    pub fn provides(&self, key: &ActionKey) -> Vec<Output> {
        dispatch!(self, |plugin, cfg| plugin.provides(key, cfg))
    }

    pub fn required_imports(&self) -> Vec<ImportRequirement> {
        dispatch!(self, |plugin, cfg| plugin.required_imports(cfg))
    }

    /// Vista JSON de la config (la que viaja en los eventos).
    pub fn to_value(&self) -> Value {
        dispatch!(self, |_plugin, cfg| serde_json::to_value(cfg).unwrap_or(Value::Null))
    }
}

/// Outputs que provee una acción aunque su config no valide.
pub fn default_provides(key: &ActionKey) -> Vec<Output> {
    use crate::template::Section;
    match key.kind() {
        ActionKind::Deploy | ActionKind::Contract | ActionKind::Router => vec![Output::new(Section::Contracts, key.label())],
        ActionKind::Invoke => vec![Output::new(Section::Txns, key.label())],
        ActionKind::Clone | ActionKind::Pull | ActionKind::Import | ActionKind::Provision => {
            vec![Output::new(Section::Imports, key.label())]
        }
        ActionKind::Keeper | ActionKind::Var => Vec::new(),
    }
}
