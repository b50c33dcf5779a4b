//! cannonflow
//!
//! Librería paraguas del workspace:
//! - `build`: grafo de acciones, steps, motor de build incremental y merge de contextos.
//! - `persistence`: registros de despliegue, blobs, registry y aliases.
//! - `adapters`: cadena simulada y fuentes de artifacts para builds locales.
//!
//! Puede usarse desde `main.rs` o por otros crates/clientes.

pub use cannon_adapters as adapters;
pub use cannon_core as build;
pub use cannon_persistence as persistence;

pub use cannon_core::{combine_ctx, ActionGraph, BuildContext, BuildEngine, BuildError, BuildOptions, BuildOutcome,
                      DeploymentState, PackageMeta, PackageRecord, PackageRef};
