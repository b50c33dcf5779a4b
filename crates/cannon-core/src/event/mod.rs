//! Eventos del build y sus destinos.
pub mod sink;
pub mod types;

pub use sink::{Emitter, EventSink, InMemoryEventSink, NullEventSink};
pub use types::{BuildEvent, BuildEventKind};
