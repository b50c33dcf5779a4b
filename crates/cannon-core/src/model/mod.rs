//! Modelos neutrales del build: claves de acción, referencias de paquete,
//! contexto, estado persistido y registro de paquete.

pub mod abi;
pub mod context;
pub mod key;
pub mod package;
pub mod record;
pub mod state;

pub use context::{BuildContext, ChainArtifacts, ContractArtifact, DecodedEvent, PackageMeta, TxnArtifact};
pub use key::{ActionKey, ActionKind};
pub use package::{PackageRef, Variant};
pub use record::{MiscBundle, PackageRecord, RawActionMap, RecordStatus};
pub use state::{ActionState, DeploymentState};
