//! Envelope (run_id, event_id) applied to each streamed chat event.
//!
//! [`EnvelopeState`] tracks the per-run sequence counter and injects envelope
//! fields into each outgoing event without clobbering fields already present.

use crate::event::ChatEvent;
use serde_json::Value;

/// Envelope fields attached to every streamed event.
#[derive(Clone, Debug, Default)]
pub struct Envelope {
    /// Run (or conversation) id; constant within a stream.
    pub run_id: Option<String>,
    /// Per-event sequence number; monotonically increasing within a stream.
    pub event_id: Option<u64>,
}

impl Envelope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_run_id(mut self, id: impl Into<String>) -> Self {
        self.run_id = Some(id.into());
        self
    }

    pub fn with_event_id(mut self, id: u64) -> Self {
        self.event_id = Some(id);
        self
    }

    /// Merges envelope fields into the given JSON object (top-level only).
    /// Does not overwrite existing keys.
    pub fn inject_into(&self, obj: &mut Value) {
        let Some(obj) = obj.as_object_mut() else {
            return;
        };
        if let Some(ref id) = self.run_id {
            obj.entry("run_id")
                .or_insert_with(|| Value::String(id.clone()));
        }
        if let Some(id) = self.event_id {
            obj.entry("event_id")
                .or_insert_with(|| Value::Number(serde_json::Number::from(id)));
        }
    }
}

/// Envelope state for one run: run_id plus next event_id to assign.
pub struct EnvelopeState {
    pub run_id: String,
    pub next_event_id: u64,
}

impl EnvelopeState {
    pub fn new(run_id: String) -> Self {
        Self {
            run_id,
            next_event_id: 1,
        }
    }

    /// Injects envelope into the event value and advances the sequence counter.
    pub fn inject_into(&mut self, value: &mut Value) {
        let env = Envelope::new()
            .with_run_id(&self.run_id)
            .with_event_id(self.next_event_id);
        self.next_event_id += 1;
        env.inject_into(value);
    }
}

/// Converts a chat event to JSON and injects the envelope using the given state.
/// Returns the final value (type + payload + run_id, event_id).
pub fn to_json(event: &ChatEvent, state: &mut EnvelopeState) -> Result<Value, serde_json::Error> {
    let mut value = event.to_value()?;
    state.inject_into(&mut value);
    Ok(value)
}
