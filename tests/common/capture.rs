//! An in-memory `tracing` subscriber layer for asserting on emitted log events
//! without scraping stdout. Grounded on the pack's own custom `Layer<S>` +
//! `Visit`-based field capture (`tracing-support`'s `SimpleEventLayer`), cut
//! down to what this crate's scenario tests need: level, target, and a
//! formatted field dump per event.

use std::fmt::Write as _;
use std::sync::{Arc, Mutex};

use tracing::field::{Field, Visit};
use tracing_subscriber::layer::Context;
use tracing_subscriber::prelude::*;
use tracing_subscriber::Layer;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CapturedEvent {
    pub level: String,
    pub target: String,
    pub fields: String,
}

#[derive(Clone, Default)]
pub struct CapturingLayer {
    events: Arc<Mutex<Vec<CapturedEvent>>>,
}

impl CapturingLayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<CapturedEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl<S: tracing::Subscriber> Layer<S> for CapturingLayer {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let mut fields = String::new();
        event.record(&mut FieldVisitor(&mut fields));
        self.events.lock().unwrap().push(CapturedEvent {
            level: event.metadata().level().to_string(),
            target: event.metadata().target().to_string(),
            fields,
        });
    }
}

struct FieldVisitor<'a>(&'a mut String);

impl Visit for FieldVisitor<'_> {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        let _ = write!(self.0, "{}={:?} ", field.name(), value);
    }
}

/// Installs the layer as this thread's default subscriber for the lifetime of
/// the returned guard, so capture is scoped to one test body even when other
/// tests in the same binary run their own handshakes concurrently.
pub fn install() -> (CapturingLayer, tracing::subscriber::DefaultGuard) {
    let layer = CapturingLayer::new();
    let subscriber = tracing_subscriber::registry().with(layer.clone());
    let guard = tracing::subscriber::set_default(subscriber);
    (layer, guard)
}
