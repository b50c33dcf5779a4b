//! cannon-persistence
//!
//! Fachadas de almacenamiento para registros de despliegue y paquetes.
//!
//! Módulos:
//! - `storage`: registros de despliegue por variante en un directorio local.
//! - `blob`: blobs direccionados por contenido (`local://`, `mem://`).
//! - `registry`: resolución `name:version@preset` + chain id -> URL.
//! - `aliases`: tabla explícita `tag -> versión canónica`.
//! - `lock`: lock advisory por variante.
//! - `loader`: `PackageLoader` del core sobre storage + blobs + registry.
//! - `publish`: publicación de un registro local en el registry.
//! - `config`: configuración desde `.env`.

pub mod aliases;
pub mod blob;
pub mod config;
pub mod error;
pub mod loader;
pub mod lock;
pub mod publish;
pub mod registry;
pub mod storage;

pub use aliases::AliasTable;
pub use blob::{content_url, BlobStore, InMemoryBlobStore, LocalBlobStore};
pub use config::{init_dotenv, StoreConfig};
pub use error::PersistenceError;
pub use loader::StorePackageLoader;
pub use lock::VariantLock;
pub use publish::{load_record, persist_build, publish_package, store_record, PublishReceipt};
pub use registry::{FallbackRegistry, InMemoryRegistry, Registry};
pub use storage::LocalStorage;
