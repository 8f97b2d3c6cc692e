//! Engine events and the sinks that receive them.
//!
//! Sinks are injected into the engine; the default discards everything.

mod event;
mod sink;

pub use event::EngineEvent;
pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
