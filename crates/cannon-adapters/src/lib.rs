//! cannon-adapters: colaboradores concretos para el core.
//!
//! - `SimulatedChain`: cadena determinista en memoria (nonces, receipts,
//!   direcciones de contrato, reverts y logs configurables).
//! - `InMemoryArtifacts` / `DirectoryArtifacts`: fuentes de ABI + bytecode.
//! - `InMemoryPackages`: loader de paquetes para builds locales y tests.
//!
//! Nada de esto implementa semántica EVM: las transacciones se registran y
//! los hashes/direcciones se derivan del contenido.

pub mod artifacts;
pub mod chain;
pub mod packages;

pub use artifacts::{DirectoryArtifacts, InMemoryArtifacts};
pub use chain::SimulatedChain;
pub use packages::InMemoryPackages;
