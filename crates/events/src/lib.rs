//! Domain events: the `Event` trait and the stream envelope.

pub mod envelope;
pub mod event;

pub use envelope::EventEnvelope;
pub use event::Event;
