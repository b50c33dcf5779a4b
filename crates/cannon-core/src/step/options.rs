//! Configuración en proceso de una invocación de build.

use std::collections::BTreeMap;
use std::time::Duration;

use crate::constants::{DEFAULT_MAX_DEPTH, DEFAULT_PRESET, RECEIPT_POLL_MS, RECEIPT_TIMEOUT_SECS};
use crate::model::PackageMeta;

#[derive(Debug, Clone, PartialEq)]
pub struct BuildOptions {
    /// Continuar con ramas independientes cuando una acción falla.
    pub allow_partial_deploy: bool,
    /// Settings del caller; tienen prioridad sobre los defaults de `var`.
    pub settings: BTreeMap<String, String>,
    pub package: PackageMeta,
    pub preset: String,
    pub receipt_timeout: Duration,
    pub poll_interval: Duration,
    pub default_from: Option<String>,
    pub max_depth: usize,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self { allow_partial_deploy: false,
               settings: BTreeMap::new(),
               package: PackageMeta::new("unnamed", "0.0.0"),
               preset: DEFAULT_PRESET.to_string(),
               receipt_timeout: Duration::from_secs(RECEIPT_TIMEOUT_SECS),
               poll_interval: Duration::from_millis(RECEIPT_POLL_MS),
               default_from: None,
               max_depth: DEFAULT_MAX_DEPTH }
    }
}

impl BuildOptions {
    pub fn new(package: PackageMeta) -> Self {
        Self { package,
               ..Self::default() }
    }

    pub fn allow_partial_deploy(mut self, allow: bool) -> Self {
        self.allow_partial_deploy = allow;
        self
    }

    pub fn setting(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.settings.insert(key.into(), value.into());
        self
    }

    pub fn settings(mut self, settings: BTreeMap<String, String>) -> Self {
        self.settings = settings;
        self
    }

    pub fn preset(mut self, preset: impl Into<String>) -> Self {
        self.preset = preset.into();
        self
    }

    pub fn receipt_timeout(mut self, timeout: Duration) -> Self {
        self.receipt_timeout = timeout;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn default_from(mut self, from: impl Into<String>) -> Self {
        self.default_from = Some(from.into());
        self
    }

    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }
}
