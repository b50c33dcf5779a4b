//! Blobs direccionados por contenido. La URL es `scheme://<sha256 hex>`.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::PersistenceError;

pub(crate) fn sha256_hex(bytes: &[u8]) -> String {
    Sha256::digest(bytes).iter().map(|b| format!("{b:02x}")).collect()
}

pub fn content_url(scheme: &str, bytes: &[u8]) -> String {
    format!("{scheme}://{}", sha256_hex(bytes))
}

/// Separa `scheme://hash` validando el esquema esperado.
fn digest_of<'u>(scheme: &str, url: &'u str) -> Result<&'u str, PersistenceError> {
    let (found, digest) = url.split_once("://")
                             .ok_or_else(|| PersistenceError::InvalidUrl(url.to_string()))?;
    if found != scheme {
        return Err(PersistenceError::UnsupportedScheme(url.to_string()));
    }
    if digest.len() != 64 || !digest.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(PersistenceError::InvalidUrl(url.to_string()));
    }
    Ok(digest)
}

pub trait BlobStore: Send + Sync {
    fn scheme(&self) -> &'static str;
    fn read_blob(&self, url: &str) -> Result<Vec<u8>, PersistenceError>;
    fn write_blob(&self, bytes: &[u8]) -> Result<String, PersistenceError>;

    fn handles(&self, url: &str) -> bool {
        url.starts_with(&format!("{}://", self.scheme()))
    }
}

pub fn write_json<T: Serialize>(store: &dyn BlobStore, value: &T) -> Result<String, PersistenceError> {
    let bytes = serde_json::to_vec(value)?;
    store.write_blob(&bytes)
}

pub fn read_json<T: DeserializeOwned>(store: &dyn BlobStore, url: &str) -> Result<T, PersistenceError> {
    let bytes = store.read_blob(url)?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Blobs en `<root>/blobs/<hash>`.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub const SCHEME: &'static str = "local";

    pub fn new(root: impl AsRef<Path>) -> Self {
        Self { root: root.as_ref().join("blobs") }
    }
}

impl BlobStore for LocalBlobStore {
    fn scheme(&self) -> &'static str {
        Self::SCHEME
    }

    fn read_blob(&self, url: &str) -> Result<Vec<u8>, PersistenceError> {
        let digest = digest_of(Self::SCHEME, url)?;
        fs::read(self.root.join(digest)).map_err(|e| match e.kind() {
                                             ErrorKind::NotFound => PersistenceError::NotFound(url.to_string()),
                                             _ => e.into(),
                                         })
    }

    fn write_blob(&self, bytes: &[u8]) -> Result<String, PersistenceError> {
        let url = content_url(Self::SCHEME, bytes);
        let path = self.root.join(digest_of(Self::SCHEME, &url)?);
        if !path.exists() {
            fs::create_dir_all(&self.root)?;
            fs::write(&path, bytes)?;
        }
        Ok(url)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryBlobStore {
    blobs: DashMap<String, Vec<u8>>,
}

impl InMemoryBlobStore {
    pub const SCHEME: &'static str = "mem";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }
}

impl BlobStore for InMemoryBlobStore {
    fn scheme(&self) -> &'static str {
        Self::SCHEME
    }

    fn read_blob(&self, url: &str) -> Result<Vec<u8>, PersistenceError> {
        digest_of(Self::SCHEME, url)?;
        self.blobs
            .get(url)
            .map(|b| b.value().clone())
            .ok_or_else(|| PersistenceError::NotFound(url.to_string()))
    }

    fn write_blob(&self, bytes: &[u8]) -> Result<String, PersistenceError> {
        let url = content_url(Self::SCHEME, bytes);
        self.blobs.entry(url.clone()).or_insert_with(|| bytes.to_vec());
        Ok(url)
    }
}
