use std::collections::HashMap;

use chrono::Utc;
use uuid::Uuid;

use super::{BuildEvent, BuildEventKind};

/// Destino de los eventos del engine. Se pasa explícitamente a cada build.
pub trait EventSink {
    fn emit(&mut self, event: BuildEvent);
}

impl<F> EventSink for F where F: FnMut(BuildEvent)
{
    fn emit(&mut self, event: BuildEvent) {
        self(event)
    }
}

/// Descarta todos los eventos.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn emit(&mut self, _event: BuildEvent) {}
}

/// Acumula eventos agrupados por build (los anidados tienen su propio id).
#[derive(Debug, Default)]
pub struct InMemoryEventSink {
    pub inner: HashMap<Uuid, Vec<BuildEvent>>,
    order: Vec<BuildEvent>,
}

impl InMemoryEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn list(&self, build_id: Uuid) -> Vec<BuildEvent> {
        self.inner.get(&build_id).cloned().unwrap_or_default()
    }

    /// Todos los eventos en orden de emisión.
    pub fn all(&self) -> &[BuildEvent] {
        &self.order
    }

    pub fn kinds(&self) -> impl Iterator<Item = &BuildEventKind> {
        self.order.iter().map(|e| &e.kind)
    }
}

impl EventSink for InMemoryEventSink {
    fn emit(&mut self, event: BuildEvent) {
        self.inner.entry(event.build_id).or_default().push(event.clone());
        self.order.push(event);
    }
}

/// Asigna `seq` y timestamp a los eventos de un build.
#[derive(Debug)]
pub struct Emitter {
    build_id: Uuid,
    seq: u64,
}

impl Emitter {
    pub fn new(build_id: Uuid) -> Self {
        Self { build_id, seq: 0 }
    }

    pub fn emit(&mut self, sink: &mut dyn EventSink, kind: BuildEventKind) {
        let ev = BuildEvent { seq: self.seq,
                              build_id: self.build_id,
                              kind,
                              ts: Utc::now() };
        self.seq += 1;
        sink.emit(ev);
    }
}
