//! Fachada de registry: `name:version@preset` + chain id -> URL del registro.

use cannon_core::model::PackageRef;
use dashmap::DashMap;

use crate::blob::sha256_hex;
use crate::error::PersistenceError;

pub trait Registry: Send + Sync {
    fn name(&self) -> &str;

    fn resolve(&self, package: &PackageRef, chain_id: u64) -> Result<Option<String>, PersistenceError>;

    fn resolve_meta(&self, package: &PackageRef, chain_id: u64) -> Result<Option<String>, PersistenceError>;

    /// Publica `url` bajo cada referencia de `packages`. Devuelve un hash de
    /// transacción por referencia.
    fn publish(&self,
               packages: &[PackageRef],
               chain_id: u64,
               url: &str,
               meta_url: Option<&str>)
               -> Result<Vec<String>, PersistenceError>;
}

#[derive(Debug, Clone, PartialEq)]
struct Entry {
    url: String,
    meta_url: Option<String>,
}

/// Registry en memoria para dry runs y tests.
#[derive(Debug, Default)]
pub struct InMemoryRegistry {
    entries: DashMap<(String, u64), Entry>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Registry for InMemoryRegistry {
    fn name(&self) -> &str {
        "memory"
    }

    fn resolve(&self, package: &PackageRef, chain_id: u64) -> Result<Option<String>, PersistenceError> {
        Ok(self.entries.get(&(package.to_string(), chain_id)).map(|e| e.url.clone()))
    }

    fn resolve_meta(&self, package: &PackageRef, chain_id: u64) -> Result<Option<String>, PersistenceError> {
        Ok(self.entries
               .get(&(package.to_string(), chain_id))
               .and_then(|e| e.meta_url.clone()))
    }

    fn publish(&self,
               packages: &[PackageRef],
               chain_id: u64,
               url: &str,
               meta_url: Option<&str>)
               -> Result<Vec<String>, PersistenceError> {
        let mut hashes = Vec::with_capacity(packages.len());
        for package in packages {
            let id = package.to_string();
            let seed = format!("{id}|{chain_id}|{url}");
            hashes.push(format!("0x{}", sha256_hex(seed.as_bytes())));
            self.entries.insert((id, chain_id),
                                Entry { url: url.to_string(),
                                        meta_url: meta_url.map(str::to_string) });
        }
        Ok(hashes)
    }
}

/// Consulta registries en orden de prioridad. La primera respuesta no vacía
/// gana; un registry que falla se salta. Si fallan todos, se devuelve el
/// último error en vez de `None`.
pub struct FallbackRegistry {
    registries: Vec<Box<dyn Registry>>,
}

impl FallbackRegistry {
    pub fn new(registries: Vec<Box<dyn Registry>>) -> Self {
        Self { registries }
    }

    fn first_found(&self,
                   package: &PackageRef,
                   query: impl Fn(&dyn Registry) -> Result<Option<String>, PersistenceError>)
                   -> Result<Option<String>, PersistenceError> {
        let mut answered = false;
        let mut last_err = None;
        for registry in &self.registries {
            match query(registry.as_ref()) {
                Ok(Some(url)) => {
                    log::debug!("{package} resolved by registry {}", registry.name());
                    return Ok(Some(url));
                }
                Ok(None) => answered = true,
                Err(e) => {
                    log::warn!("registry {} failed for {package}: {e}", registry.name());
                    last_err = Some(e);
                }
            }
        }
        // "no encontrado" sólo si algún registry respondió
        match last_err {
            Some(e) if !answered => Err(e),
            _ => Ok(None),
        }
    }
}

impl Registry for FallbackRegistry {
    fn name(&self) -> &str {
        "fallback"
    }

    fn resolve(&self, package: &PackageRef, chain_id: u64) -> Result<Option<String>, PersistenceError> {
        self.first_found(package, |r| r.resolve(package, chain_id))
    }

    fn resolve_meta(&self, package: &PackageRef, chain_id: u64) -> Result<Option<String>, PersistenceError> {
        self.first_found(package, |r| r.resolve_meta(package, chain_id))
    }

    /// Publica en el primer registry que acepte la escritura.
    fn publish(&self,
               packages: &[PackageRef],
               chain_id: u64,
               url: &str,
               meta_url: Option<&str>)
               -> Result<Vec<String>, PersistenceError> {
        let mut last_err = PersistenceError::Registry("no registries configured".into());
        for registry in &self.registries {
            match registry.publish(packages, chain_id, url, meta_url) {
                Ok(hashes) => return Ok(hashes),
                Err(e) => {
                    log::warn!("publish to registry {} failed: {e}", registry.name());
                    last_err = e;
                }
            }
        }
        Err(last_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Broken;

    impl Registry for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        fn resolve(&self, _package: &PackageRef, _chain_id: u64) -> Result<Option<String>, PersistenceError> {
            Err(PersistenceError::Registry("rpc down".into()))
        }

        fn resolve_meta(&self, package: &PackageRef, chain_id: u64) -> Result<Option<String>, PersistenceError> {
            self.resolve(package, chain_id)
        }

        fn publish(&self,
                   _packages: &[PackageRef],
                   _chain_id: u64,
                   _url: &str,
                   _meta_url: Option<&str>)
                   -> Result<Vec<String>, PersistenceError> {
            Err(PersistenceError::Registry("rpc down".into()))
        }
    }

    fn pkg(raw: &str) -> PackageRef {
        PackageRef::parse(raw).unwrap()
    }

    #[test]
    fn memory_registry_publishes_every_ref() {
        let registry = InMemoryRegistry::new();
        let hashes = registry.publish(&[pkg("greeter:1.0.0"), pkg("greeter:latest")], 1, "mem://a", Some("mem://m"))
                             .unwrap();
        assert_eq!(hashes.len(), 2);
        assert_ne!(hashes[0], hashes[1]);
        assert_eq!(registry.resolve(&pkg("greeter:latest"), 1).unwrap().as_deref(), Some("mem://a"));
        assert_eq!(registry.resolve_meta(&pkg("greeter:1.0.0"), 1).unwrap().as_deref(), Some("mem://m"));
        assert_eq!(registry.resolve(&pkg("greeter:1.0.0"), 2).unwrap(), None);
    }

    #[test]
    fn fallback_skips_failing_registries() {
        let secondary = InMemoryRegistry::new();
        secondary.publish(&[pkg("greeter:1.0.0")], 1, "mem://b", None).unwrap();
        let fallback = FallbackRegistry::new(vec![Box::new(Broken), Box::new(secondary)]);
        assert_eq!(fallback.resolve(&pkg("greeter:1.0.0"), 1).unwrap().as_deref(), Some("mem://b"));
        assert_eq!(fallback.resolve(&pkg("other:1.0.0"), 1).unwrap(), None);

        let hashes = fallback.publish(&[pkg("other:1.0.0")], 1, "mem://c", None).unwrap();
        assert_eq!(hashes.len(), 1);
        assert_eq!(fallback.resolve(&pkg("other:1.0.0"), 1).unwrap().as_deref(), Some("mem://c"));
    }

    #[test]
    fn all_failing_registries_report_error() {
        let fallback = FallbackRegistry::new(vec![Box::new(Broken), Box::new(Broken)]);
        assert!(matches!(fallback.resolve(&pkg("greeter:1.0.0"), 1), Err(PersistenceError::Registry(_))));
        assert!(fallback.resolve_meta(&pkg("greeter:1.0.0"), 1).is_err());
        assert!(fallback.publish(&[pkg("greeter:1.0.0")], 1, "mem://a", None).is_err());
    }

    #[test]
    fn single_failing_registry_reports_error() {
        let fallback = FallbackRegistry::new(vec![Box::new(Broken)]);
        assert!(fallback.resolve(&pkg("greeter:1.0.0"), 1).is_err());
        assert!(fallback.publish(&[pkg("greeter:1.0.0")], 1, "mem://a", None).is_err());
    }
}
