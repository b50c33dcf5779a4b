//! Estado persistido de un despliegue por variante.
//!
//! Una entrada por acción ejecutada: el fingerprint de la config efectiva y
//! los artifacts que produjo. Las entradas huérfanas (acciones que ya no
//! existen en el grafo) sólo se eliminan con `prune`.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::{ActionKey, BuildContext, ChainArtifacts, PackageMeta, RawActionMap};
use crate::errors::MergeCollisionError;
use crate::graph::ActionGraph;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionState {
    pub fingerprint: String,
    #[serde(default)]
    pub artifacts: ChainArtifacts,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeploymentState {
    entries: BTreeMap<ActionKey, ActionState>,
}

impl DeploymentState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &ActionKey) -> Option<&ActionState> {
        self.entries.get(key)
    }

    /// Crea o sobrescribe la entrada de una acción recién ejecutada.
    pub fn insert(&mut self, key: ActionKey, entry: ActionState) {
        self.entries.insert(key, entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ActionKey, &ActionState)> {
        self.entries.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &ActionKey> {
        self.entries.keys()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = (&ActionKey, &mut ActionState)> {
        self.entries.iter_mut()
    }

    /// Claves presentes en el estado que el grafo actual ya no define.
    pub fn orphans(&self, graph: &ActionGraph) -> Vec<ActionKey> {
        self.entries
            .keys()
            .filter(|k| !graph.contains(k))
            .cloned()
            .collect()
    }

    /// Operación de mantenimiento explícita: elimina las entradas huérfanas y
    /// devuelve las claves eliminadas.
    pub fn prune(&mut self, graph: &ActionGraph) -> Vec<ActionKey> {
        let orphans = self.orphans(graph);
        for key in &orphans {
            log::warn!("pruning orphaned state entry {key}");
            self.entries.remove(key);
        }
        orphans
    }

    /// Reconstruye el contexto del despliegue juntando los artifacts de las
    /// entradas que `def` todavía define. Las huérfanas no se exponen.
    pub fn to_context(&self, def: &RawActionMap, package: PackageMeta, chain_id: u64) -> Result<BuildContext, MergeCollisionError> {
        let defined: BTreeSet<ActionKey> = def.keys().filter_map(|k| ActionKey::parse(k).ok()).collect();
        let mut ctx = BuildContext::new(package, chain_id);
        for (key, entry) in &self.entries {
            if !defined.contains(key) {
                log::debug!("orphaned state entry {key} left out of the context");
                continue;
            }
            ctx.merge_artifacts(&entry.artifacts)?;
        }
        Ok(ctx)
    }
}
