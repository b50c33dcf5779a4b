//! Registros de despliegue en disco.
//!
//! Layout: `<root>/<name>/<version>/<chainId>-<preset>.json`, JSON con
//! indentación de 4 espacios. Las versiones se resuelven a través de la
//! tabla de aliases del paquete antes de tocar disco.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use cannon_core::model::{PackageRecord, PackageRef, Variant};
use serde::Serialize;
use serde_json::ser::PrettyFormatter;

use crate::aliases::AliasTable;
use crate::error::PersistenceError;

pub(crate) fn to_pretty_json<T: Serialize>(value: &T) -> Result<Vec<u8>, PersistenceError> {
    let mut buf = Vec::new();
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
    value.serialize(&mut ser)?;
    buf.push(b'\n');
    Ok(buf)
}

#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn aliases(&self, name: &str) -> Result<AliasTable, PersistenceError> {
        AliasTable::load(&self.root, name)
    }

    /// Directorio del paquete con la versión canónica (alias resuelto).
    pub fn package_dir(&self, package: &PackageRef) -> Result<PathBuf, PersistenceError> {
        package.validate()
               .map_err(|what| PersistenceError::InvalidRef(format!("{what} of `{package}`")))?;
        let version = self.aliases(&package.name)?.resolve(&package.version);
        let canonical = package.with_version(&version);
        canonical.validate()
                 .map_err(|what| PersistenceError::InvalidRef(format!("{what} of `{canonical}`")))?;
        Ok(self.root.join(&canonical.name).join(&canonical.version))
    }

    fn record_path(dir: &Path, variant: &Variant) -> PathBuf {
        dir.join(format!("{variant}.json"))
    }

    pub fn read_deployment_record(&self, dir: &Path, variant: &Variant) -> Result<Option<PackageRecord>, PersistenceError> {
        match fs::read(Self::record_path(dir, variant)) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn write_deployment_record(&self, dir: &Path, variant: &Variant, record: &PackageRecord) -> Result<PathBuf, PersistenceError> {
        fs::create_dir_all(dir)?;
        let path = Self::record_path(dir, variant);
        // escribe a un temporal y renombra para no dejar registros a medias
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, to_pretty_json(record)?)?;
        fs::rename(&tmp, &path)?;
        log::debug!("wrote deployment record {}", path.display());
        Ok(path)
    }

    /// Variantes con registro en `dir`, ordenadas.
    pub fn list_variants(&self, dir: &Path) -> Result<Vec<Variant>, PersistenceError> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut out = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(variant) = path.file_stem().and_then(|s| s.to_str()).and_then(|s| Variant::parse(s).ok()) {
                out.push(variant);
            }
        }
        out.sort();
        Ok(out)
    }

    pub fn read_package(&self, package: &PackageRef, chain_id: u64) -> Result<Option<PackageRecord>, PersistenceError> {
        let dir = self.package_dir(package)?;
        self.read_deployment_record(&dir, &package.variant(chain_id))
    }

    pub fn write_package(&self, package: &PackageRef, chain_id: u64, record: &PackageRecord) -> Result<PathBuf, PersistenceError> {
        let dir = self.package_dir(package)?;
        self.write_deployment_record(&dir, &package.variant(chain_id), record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cannon_core::model::{DeploymentState, PackageMeta, RawActionMap, RecordStatus};
    use std::collections::BTreeMap;

    fn record() -> PackageRecord {
        PackageRecord::new(RawActionMap::new(),
                           DeploymentState::new(),
                           BTreeMap::new(),
                           PackageMeta::new("greeter", "1.0.0"),
                           1,
                           RecordStatus::Complete)
    }

    #[test]
    fn missing_record_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());
        assert!(storage.read_deployment_record(dir.path(), &Variant::new(1, "main")).unwrap().is_none());
    }

    #[test]
    fn writes_four_space_json_per_variant() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());
        let pkg = PackageRef::parse("greeter:1.0.0").unwrap();
        let written = record();
        let path = storage.write_package(&pkg, 1, &written).unwrap();
        assert!(path.ends_with("greeter/1.0.0/1-main.json"));

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("\n    \"generator\""));
        assert_eq!(storage.read_package(&pkg, 1).unwrap(), Some(written));
        assert_eq!(storage.list_variants(&storage.package_dir(&pkg).unwrap()).unwrap(), vec![Variant::new(1, "main")]);
    }

    #[test]
    fn refs_built_without_parsing_cannot_leave_the_root() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());
        let escaping = PackageRef::new("greeter", "..", "main");
        assert!(matches!(storage.package_dir(&escaping), Err(PersistenceError::InvalidRef(_))));
        assert!(matches!(storage.write_package(&escaping, 1, &record()), Err(PersistenceError::InvalidRef(_))));
    }
}
