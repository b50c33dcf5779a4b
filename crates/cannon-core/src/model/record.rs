//! Registro persistido de un build (`PackageRecord`).

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{BuildContext, ContractArtifact, DeploymentState, PackageMeta};
use crate::constants::GENERATOR;
use crate::errors::MergeCollisionError;

/// Mapa crudo de acciones tal como lo escribe el autor; conserva el orden de
/// declaración.
pub type RawActionMap = IndexMap<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    Complete,
    Partial,
}

/// Artifacts grandes que viajan fuera del registro principal. Las claves son
/// `<acción>/<ruta del contrato>`, con las importaciones anidadas como
/// prefijo (`clone.lib/lib.Foo`).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MiscBundle {
    pub abis: BTreeMap<String, Value>,
}

impl MiscBundle {
    pub fn is_empty(&self) -> bool {
        self.abis.is_empty()
    }
}

fn visit_abis(prefix: &str,
              contracts: &mut BTreeMap<String, ContractArtifact>,
              imports: &mut BTreeMap<String, BuildContext>,
              f: &mut dyn FnMut(String, &mut Value)) {
    for (name, contract) in contracts.iter_mut() {
        f(format!("{prefix}{name}"), &mut contract.abi);
    }
    for (label, nested) in imports.iter_mut() {
        visit_abis(&format!("{prefix}{label}."), &mut nested.contracts, &mut nested.imports, f);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageRecord {
    pub generator: String,
    pub timestamp: DateTime<Utc>,
    pub chain_id: u64,
    pub def: RawActionMap,
    pub state: DeploymentState,
    #[serde(default)]
    pub options: BTreeMap<String, String>,
    pub meta: PackageMeta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub misc_url: Option<String>,
    pub status: RecordStatus,
}

impl PackageRecord {
    pub fn new(def: RawActionMap,
               state: DeploymentState,
               options: BTreeMap<String, String>,
               meta: PackageMeta,
               chain_id: u64,
               status: RecordStatus)
               -> Self {
        Self { generator: GENERATOR.to_string(),
               timestamp: Utc::now(),
               chain_id,
               def,
               state,
               options,
               meta,
               misc_url: None,
               status }
    }

    /// Separa los ABIs del registro. Devuelve el registro ligero (ABIs a
    /// `null`) y el bundle que va al blob de `misc_url`.
    pub fn split_misc(&self) -> (PackageRecord, MiscBundle) {
        let mut slim = self.clone();
        let mut misc = MiscBundle::default();
        for (key, entry) in slim.state.iter_mut() {
            let artifacts = &mut entry.artifacts;
            visit_abis(&format!("{key}/"), &mut artifacts.contracts, &mut artifacts.imports, &mut |path: String, abi: &mut Value| {
                if !abi.is_null() {
                    misc.abis.insert(path, abi.take());
                }
            });
        }
        (slim, misc)
    }

    /// Inverso de `split_misc`.
    pub fn hydrate_misc(&mut self, misc: &MiscBundle) {
        for (key, entry) in self.state.iter_mut() {
            let artifacts = &mut entry.artifacts;
            visit_abis(&format!("{key}/"), &mut artifacts.contracts, &mut artifacts.imports, &mut |path: String, abi: &mut Value| {
                if let Some(full) = misc.abis.get(&path) {
                    *abi = full.clone();
                }
            });
        }
    }

    /// Contexto final del despliegue registrado.
    pub fn context(&self) -> Result<BuildContext, MergeCollisionError> {
        let mut ctx = self.state.to_context(&self.def, self.meta.clone(), self.chain_id)?;
        for (k, v) in &self.options {
            ctx.settings.entry(k.clone()).or_insert_with(|| v.clone());
        }
        Ok(ctx)
    }
}
