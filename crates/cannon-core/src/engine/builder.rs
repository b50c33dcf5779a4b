//! Builder para `BuildEngine`.
//!
//! Cadena y fuente de artifacts son obligatorias; el resto tiene defaults:
//! sin loader de paquetes (`NoPackages`), `BuildOptions::default()` y un
//! `CancelFlag` nuevo.
//!
//! ```ignore
//! let engine = BuildEngine::builder(&chain, &artifacts).packages(&loader)
//!                                                      .options(opts)
//!                                                      .build();
//! ```

use super::BuildEngine;
use crate::step::{ArtifactSource, BuildOptions, CancelFlag, ChainClient, NoPackages, PackageLoader};

pub struct BuildEngineBuilder<'a> {
    chain: &'a dyn ChainClient,
    artifacts: &'a dyn ArtifactSource,
    packages: Option<&'a dyn PackageLoader>,
    options: BuildOptions,
    cancel: CancelFlag,
}

impl<'a> BuildEngineBuilder<'a> {
    pub(crate) fn new(chain: &'a dyn ChainClient, artifacts: &'a dyn ArtifactSource) -> Self {
        Self { chain,
               artifacts,
               packages: None,
               options: BuildOptions::default(),
               cancel: CancelFlag::new() }
    }

    pub fn packages(mut self, packages: &'a dyn PackageLoader) -> Self {
        self.packages = Some(packages);
        self
    }

    pub fn options(mut self, options: BuildOptions) -> Self {
        self.options = options;
        self
    }

    /// Comparte la señal de cancelación con el caller.
    pub fn cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn build(self) -> BuildEngine<'a> {
        BuildEngine { chain: self.chain,
                      artifacts: self.artifacts,
                      packages: self.packages.unwrap_or(&NoPackages),
                      options: self.options,
                      cancel: self.cancel }
    }
}
