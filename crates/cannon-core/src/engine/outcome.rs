//! Resultado de una invocación de build.

use std::collections::BTreeMap;

use uuid::Uuid;

use crate::errors::StepError;
use crate::graph::ActionGraph;
use crate::model::{ActionKey, BuildContext, DeploymentState, PackageRecord, RecordStatus};
use crate::step::ActionStatus;

#[derive(Debug, Clone, PartialEq)]
pub struct BuildOutcome {
    pub build_id: Uuid,
    /// Estado de despliegue tras el build (entrada + acciones ejecutadas).
    pub state: DeploymentState,
    /// Contexto de nivel superior acumulado.
    pub ctx: BuildContext,
    pub statuses: BTreeMap<ActionKey, ActionStatus>,
    /// Fallos registrados con partial deploy, en orden de ocurrencia.
    pub skipped: Vec<(ActionKey, StepError)>,
    /// El build se detuvo por cancelación.
    pub cancelled: bool,
}

impl BuildOutcome {
    pub fn status(&self, key: &ActionKey) -> ActionStatus {
        self.statuses.get(key).copied().unwrap_or(ActionStatus::Pending)
    }

    /// Claves con el estado indicado, en orden de clave.
    pub fn with_status(&self, status: ActionStatus) -> Vec<ActionKey> {
        self.statuses.iter().filter(|(_, s)| **s == status).map(|(k, _)| k.clone()).collect()
    }

    /// Todas las acciones completaron (ejecutadas o reutilizadas).
    pub fn is_complete(&self) -> bool {
        !self.cancelled && self.statuses.values().all(ActionStatus::is_complete)
    }

    /// Registro persistible del build.
    pub fn to_record(&self, graph: &ActionGraph, options: BTreeMap<String, String>) -> PackageRecord {
        let status = if self.is_complete() { RecordStatus::Complete } else { RecordStatus::Partial };
        PackageRecord::new(graph.raw().clone(),
                           self.state.clone(),
                           options,
                           self.ctx.package.clone(),
                           self.ctx.chain_id,
                           status)
    }
}
