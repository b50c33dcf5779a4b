use serde::{Deserialize, Serialize};

/// Estado de una acción dentro de una invocación de build.
///
/// Transiciones válidas:
/// - `Pending` -> `Skipped` (fingerprint coincide con el estado persistido)
/// - `Pending` -> `Executing` -> `Done` | `Failed`
/// - `Pending` -> `DependencyFailed` (alguna dependencia no completó)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    Pending,
    Skipped,
    Executing,
    Done,
    Failed,
    DependencyFailed,
}

impl ActionStatus {
    /// La acción terminó y sus artifacts están en el contexto.
    pub fn is_complete(&self) -> bool {
        matches!(self, ActionStatus::Skipped | ActionStatus::Done)
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, ActionStatus::Failed | ActionStatus::DependencyFailed)
    }
}
