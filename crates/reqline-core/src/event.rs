//! Instrumentation events
//!
//! An [`Event`] is an immutable record of something that happened while a
//! request was handled: a name, a start/end pair, and an ordered payload.
//! While the measured work is still running it is an [`ActiveEvent`] whose
//! payload can be mutated; [`ActiveEvent::finish`] freezes it.

use serde_json::{Map, Value};
use std::any::Any;
use std::time::{Duration, Instant};

/// Ordered event payload, keyed by field name
pub type Payload = Map<String, Value>;

/// Ordered set of fields extracted for one log line
pub type Fields = Map<String, Value>;

/// Well-known event names
pub mod names {
    /// Primary event: the controller action finished processing
    pub const PROCESS_ACTION: &str = "process_action.controller";
    /// Secondary event: the action issued a redirect
    pub const REDIRECT_TO: &str = "redirect_to.controller";
    /// Secondary event: request parameters were rejected
    pub const UNPERMITTED_PARAMETERS: &str = "unpermitted_parameters.controller";
    /// Outer event wrapping the whole request lifecycle
    pub const REQUEST: &str = "request.reqline";
}

/// Payload key holding the `[type, message]` exception pair
pub const EXCEPTION_KEY: &str = "exception";

/// A completed instrumentation event
#[derive(Clone, Debug)]
pub struct Event {
    name: String,
    started_at: Instant,
    finished_at: Instant,
    payload: Payload,
}

impl Event {
    /// Create an event from its parts
    pub fn new(
        name: impl Into<String>,
        started_at: Instant,
        finished_at: Instant,
        payload: Payload,
    ) -> Self {
        Self {
            name: name.into(),
            started_at,
            finished_at,
            payload,
        }
    }

    /// Create an event that finished now and lasted `duration`
    pub fn with_duration(name: impl Into<String>, duration: Duration, payload: Payload) -> Self {
        let finished_at = Instant::now();
        let started_at = finished_at.checked_sub(duration).unwrap_or(finished_at);
        Self::new(name, started_at, finished_at, payload)
    }

    /// Create a zero-length event
    pub fn instant(name: impl Into<String>, payload: Payload) -> Self {
        let now = Instant::now();
        Self::new(name, now, now, payload)
    }

    /// Event name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Event payload
    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Consume the event and return its payload
    pub fn into_payload(self) -> Payload {
        self.payload
    }

    /// When the measured work started
    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    /// When the measured work finished
    pub fn finished_at(&self) -> Instant {
        self.finished_at
    }

    /// Wall-clock duration
    pub fn duration(&self) -> Duration {
        self.finished_at.saturating_duration_since(self.started_at)
    }

    /// Wall-clock duration in milliseconds
    pub fn duration_ms(&self) -> f64 {
        self.duration().as_secs_f64() * 1000.0
    }

    /// The `(type, message)` exception pair, if one was recorded
    pub fn exception(&self) -> Option<(String, String)> {
        exception_of(&self.payload)
    }
}

/// An event whose measured work is still running
#[derive(Debug)]
pub struct ActiveEvent {
    name: String,
    started_at: Instant,
    payload: Payload,
}

impl ActiveEvent {
    /// Start measuring now
    pub fn start(name: impl Into<String>, payload: Payload) -> Self {
        Self {
            name: name.into(),
            started_at: Instant::now(),
            payload,
        }
    }

    /// Event name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current payload
    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Mutable payload, for fields only known once the work is done
    pub fn payload_mut(&mut self) -> &mut Payload {
        &mut self.payload
    }

    /// Record an exception as the `[type, message]` pair
    pub fn record_exception(&mut self, kind: impl Into<String>, message: impl Into<String>) {
        self.payload.insert(
            EXCEPTION_KEY.to_string(),
            Value::Array(vec![
                Value::String(kind.into()),
                Value::String(message.into()),
            ]),
        );
    }

    /// Stop measuring and freeze the event
    pub fn finish(self) -> Event {
        Event::new(self.name, self.started_at, Instant::now(), self.payload)
    }
}

/// Read the exception pair out of a payload.
///
/// Absent, null or empty values mean no exception.
pub fn exception_of(payload: &Payload) -> Option<(String, String)> {
    let pair = payload.get(EXCEPTION_KEY)?.as_array()?;
    let kind = pair.first().filter(|v| !v.is_null())?;
    let message = pair.get(1).map(display_value).unwrap_or_default();
    Some((display_value(kind), message))
}

/// Render a value the way it reads in a log line: strings bare, null empty.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Build a float value, mapping non-finite numbers to null
pub fn float_value(value: f64) -> Value {
    serde_json::Number::from_f64(value)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

/// Extract the message carried by a panic payload
pub fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "Box<dyn Any>".to_string()
    }
}
