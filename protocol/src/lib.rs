//! Wire protocol for a single streamed chat/run event: type + payload + envelope.
//!
//! This crate defines the wire shape of one stream event and envelope
//! injection. It does not depend on `core`; `server` bridges internal
//! conversation state into [`ChatEvent`] and calls [`to_json`].

pub mod envelope;
pub mod event;

pub use envelope::{to_json, Envelope, EnvelopeState};
pub use event::ChatEvent;
