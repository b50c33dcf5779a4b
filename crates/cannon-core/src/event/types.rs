//! Eventos de ciclo de vida del build.
//!
//! - `PreStepExecute` antes de ejecutar (o re-aplicar) una acción.
//! - `PostStepExecute` con la config renderizada, el contexto resultante y
//!   los artifacts; `skipped = true` si se reutilizó el estado persistido.
//! - `SkipDeploy` cuando una acción falla en modo partial deploy.
//!
//! No existe un evento de "build terminado": el caller lo detecta al
//! agotarse la secuencia.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::errors::StepError;
use crate::model::{ActionKey, ActionKind, BuildContext, ChainArtifacts};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BuildEventKind {
    PreStepExecute {
        kind: ActionKind,
        label: String,
        config: Value,
        depth: usize,
    },
    PostStepExecute {
        kind: ActionKind,
        label: String,
        config: Value,
        ctx: Box<BuildContext>,
        artifacts: ChainArtifacts,
        depth: usize,
        skipped: bool,
    },
    SkipDeploy {
        key: ActionKey,
        error: StepError,
        depth: usize,
    },
}

impl BuildEventKind {
    pub fn depth(&self) -> usize {
        match self {
            BuildEventKind::PreStepExecute { depth, .. }
            | BuildEventKind::PostStepExecute { depth, .. }
            | BuildEventKind::SkipDeploy { depth, .. } => *depth,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildEvent {
    /// Orden de emisión dentro de `build_id`.
    pub seq: u64,
    pub build_id: Uuid,
    pub kind: BuildEventKind,
    pub ts: DateTime<Utc>,
}
