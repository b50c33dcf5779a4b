//! Carga de configuración desde variables de entorno.
//! Usa `CANNON_DIRECTORY` como raíz del store y parámetros opcionales de build.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use cannon_core::constants::{BUILD_CHAIN_ID, DEFAULT_PRESET, RECEIPT_TIMEOUT_SECS};
use cannon_core::{BuildOptions, PackageMeta};
use dotenvy::dotenv;
use once_cell::sync::Lazy;

// Carga perezosa del archivo .env una sola vez.
static DOTENV_LOADED: Lazy<()> = Lazy::new(|| {
    let _ = dotenv(); // ignora error si no existe .env
});

#[derive(Debug, Clone, PartialEq)]
pub struct StoreConfig {
    pub directory: PathBuf,
    pub allow_partial_deploy: bool,
    pub receipt_timeout: Duration,
    pub preset: String,
    pub chain_id: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { directory: PathBuf::from("./.cannon"),
               allow_partial_deploy: false,
               receipt_timeout: Duration::from_secs(RECEIPT_TIMEOUT_SECS),
               preset: DEFAULT_PRESET.to_string(),
               chain_id: BUILD_CHAIN_ID }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Some(true),
        "0" | "false" | "no" => Some(false),
        _ => None,
    }
}

impl StoreConfig {
    pub fn from_env() -> Self {
        // asegura que .env se haya cargado
        Lazy::force(&DOTENV_LOADED);
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Igual que `from_env` con una fuente de variables arbitraria. Valores
    /// que no parsean caen al default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let directory = lookup("CANNON_DIRECTORY").map(PathBuf::from).unwrap_or(defaults.directory);
        let allow_partial_deploy = lookup("CANNON_ALLOW_PARTIAL_DEPLOY").and_then(|v| parse_bool(&v))
                                                                        .unwrap_or(defaults.allow_partial_deploy);
        let receipt_timeout = lookup("CANNON_RECEIPT_TIMEOUT_SECS").and_then(|v| v.parse().ok())
                                                                   .map(Duration::from_secs)
                                                                   .unwrap_or(defaults.receipt_timeout);
        let preset = lookup("CANNON_PRESET").filter(|p| !p.is_empty()).unwrap_or(defaults.preset);
        let chain_id = lookup("CANNON_CHAIN_ID").and_then(|v| v.parse().ok()).unwrap_or(defaults.chain_id);
        Self { directory,
               allow_partial_deploy,
               receipt_timeout,
               preset,
               chain_id }
    }

    /// Opciones de build para `package` con los valores de esta config.
    pub fn build_options(&self, package: PackageMeta) -> BuildOptions {
        BuildOptions::new(package).allow_partial_deploy(self.allow_partial_deploy)
                                  .receipt_timeout(self.receipt_timeout)
                                  .preset(&self.preset)
    }
}

/// Forzar carga temprana de .env desde aplicaciones externas si se desea.
pub fn init_dotenv() {
    Lazy::force(&DOTENV_LOADED);
}
