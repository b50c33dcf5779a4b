//! Constantes del motor core.
//!
//! Valores estáticos que participan en el cálculo de fingerprints y en la
//! compatibilidad entre versiones del motor. Cambios en `ENGINE_VERSION`
//! invalidan todos los fingerprints persistidos.

/// Versión lógica del motor. Forma parte de cada fingerprint de acción para
/// que un cambio incompatible fuerce la re-ejecución aunque la config no cambie.
pub const ENGINE_VERSION: &str = "B1.0";

/// Identificador escrito en `PackageRecord::generator`.
pub const GENERATOR: &str = concat!("cannonflow ", env!("CARGO_PKG_VERSION"));

/// Version/preset por defecto de una referencia de paquete.
pub const DEFAULT_VERSION: &str = "latest";
pub const DEFAULT_PRESET: &str = "main";

/// Presupuesto total para esperar un receipt.
pub const RECEIPT_TIMEOUT_SECS: u64 = 45;
/// Intervalo de polling de receipts (ms).
pub const RECEIPT_POLL_MS: u64 = 250;

/// Chain id de los registros que sólo contienen la definición de un paquete
/// (fuente de `clone` cuando el paquete no está desplegado en la cadena actual).
pub const BUILD_CHAIN_ID: u64 = 13370;

/// Profundidad máxima de builds anidados (`clone` dentro de `clone`).
pub const DEFAULT_MAX_DEPTH: usize = 8;
