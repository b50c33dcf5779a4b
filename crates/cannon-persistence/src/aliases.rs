//! Tabla de aliases de versión (`latest`, tags de clone, ...) en
//! `<root>/<name>/aliases.json`. Los alias son de un solo nivel: un tag
//! apunta siempre a una versión canónica.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::PersistenceError;
use crate::storage::to_pretty_json;

#[derive(Debug, Clone, PartialEq)]
pub struct AliasTable {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl AliasTable {
    pub fn load(root: &Path, name: &str) -> Result<Self, PersistenceError> {
        let path = root.join(name).join("aliases.json");
        let entries = match fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self { path, entries })
    }

    /// Versión canónica de `version` (ella misma si no es un alias).
    pub fn resolve(&self, version: &str) -> String {
        self.entries.get(version).cloned().unwrap_or_else(|| version.to_string())
    }

    /// Apunta `tag` a la versión canónica de `version`.
    pub fn set(&mut self, tag: &str, version: &str) -> Result<(), PersistenceError> {
        let canonical = self.resolve(version);
        if tag == canonical {
            return Err(PersistenceError::InvalidRef(format!("alias `{tag}` would point to itself")));
        }
        // un tag que hoy es canónico para otros alias no puede pasar a ser alias
        if self.entries.values().any(|v| v == tag) {
            return Err(PersistenceError::InvalidRef(format!("`{tag}` is the target of other aliases")));
        }
        self.entries.insert(tag.to_string(), canonical);
        Ok(())
    }

    pub fn remove(&mut self, tag: &str) -> Option<String> {
        self.entries.remove(tag)
    }

    pub fn entries(&self) -> &BTreeMap<String, String> {
        &self.entries
    }

    pub fn save(&self) -> Result<(), PersistenceError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, to_pretty_json(&self.entries)?)?;
        Ok(())
    }
}
