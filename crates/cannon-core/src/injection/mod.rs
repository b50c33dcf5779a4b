//! Inyección de contexto en la config de las acciones y fusión de
//! contextos.
//!
//! - `merge`: unión de fragmentos de artifacts (`union_into`) y combinación
//!   de contextos de ramas independientes (`combine_ctx`).
//! - `render`: renderizado de templates de una config contra el contexto.

pub mod merge;
pub mod render;

pub use merge::{combine_ctx, union_into};
pub use render::{render_config, render_value};
