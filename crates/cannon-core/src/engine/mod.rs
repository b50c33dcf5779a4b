//! Motor de build incremental.
pub mod builder;
pub mod core;
pub mod outcome;

pub use builder::BuildEngineBuilder;
pub use self::core::BuildEngine;
pub use outcome::BuildOutcome;
