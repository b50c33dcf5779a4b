//! Lock advisory de escritura por variante: `<dir>/<variant>.lock`, creado
//! de forma exclusiva y eliminado al soltarse.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use cannon_core::model::Variant;

use crate::error::PersistenceError;

#[derive(Debug)]
pub struct VariantLock {
    path: PathBuf,
}

impl VariantLock {
    pub fn acquire(dir: &Path, variant: &Variant) -> Result<Self, PersistenceError> {
        fs::create_dir_all(dir)?;
        let path = dir.join(format!("{variant}.lock"));
        let mut file = OpenOptions::new().write(true)
                                         .create_new(true)
                                         .open(&path)
                                         .map_err(|e| match e.kind() {
                                             ErrorKind::AlreadyExists => PersistenceError::Locked(variant.to_string()),
                                             _ => e.into(),
                                         })?;
        writeln!(file, "{} {}", std::process::id(), chrono::Utc::now().to_rfc3339())?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for VariantLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            log::warn!("could not release lock {}: {e}", self.path.display());
        }
    }
}
