//! Representation of decoded SSE records.

use core::time::Duration;

use super::constants::DEFAULT_EVENT_TYPE;

/// A complete SSE event, built once a record is terminated by a blank line.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Event {
    /// The event type field (defaults to `"message"` when unspecified).
    pub event_type: String,
    /// The data payload; multiple `data` lines are joined with `\n`.
    pub data: String,
    /// The `id` field of the record, if one was sent.
    pub id: Option<String>,
}

impl Event {
    /// Create a `message` event with the given payload and no id.
    pub fn message(data: impl Into<String>) -> Self {
        Self {
            event_type: DEFAULT_EVENT_TYPE.to_string(),
            data: data.into(),
            id: None,
        }
    }

    /// Set the event type.
    #[must_use]
    pub fn with_event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = event_type.into();
        self
    }

    /// Set the event id.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Returns `true` when the event type is the default `"message"`.
    pub fn is_default_type(&self) -> bool {
        self.event_type == DEFAULT_EVENT_TYPE
    }
}

/// Output of the frame parser for a single line.
///
/// Most lines only mutate the pending record; a blank line may complete an
/// [`Event`] and a valid `retry` field produces a [`Frame::Retry`] directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A complete event.
    Event(Event),
    /// Server-advertised reconnection delay.
    Retry(Duration),
}

impl Frame {
    /// Returns the event if this frame carries one.
    pub fn into_event(self) -> Option<Event> {
        match self {
            Self::Event(event) => Some(event),
            Self::Retry(_) => None,
        }
    }
}
