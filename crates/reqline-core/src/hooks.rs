//! Host-supplied hooks that shape the extracted fields

use crate::event::{Event, Fields, Payload};
use std::fmt;
use std::sync::Arc;

/// Function computing extra fields for an event
pub type CustomOptionsFn = Arc<dyn Fn(&Event) -> Option<Fields> + Send + Sync>;

/// Transform applied to the extracted fields just before formatting.
///
/// Returning `None` keeps the fields it was given.
pub type BeforeFormat = Arc<dyn Fn(&Fields, &Payload) -> Option<Fields> + Send + Sync>;

/// Source of additional fields merged into every log line
#[derive(Clone)]
pub enum CustomOptions {
    /// The same fields for every request
    Static(Fields),
    /// Fields computed from the request event; `None` adds nothing
    Dynamic(CustomOptionsFn),
}

impl CustomOptions {
    /// Compute fields with a function of the event
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&Event) -> Option<Fields> + Send + Sync + 'static,
    {
        Self::Dynamic(Arc::new(f))
    }

    /// Fields for `event`
    pub fn resolve(&self, event: &Event) -> Option<Fields> {
        match self {
            Self::Static(fields) => Some(fields.clone()),
            Self::Dynamic(f) => f(event),
        }
    }
}

impl From<Fields> for CustomOptions {
    fn from(fields: Fields) -> Self {
        Self::Static(fields)
    }
}

impl fmt::Debug for CustomOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(fields) => f.debug_tuple("Static").field(fields).finish(),
            Self::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}
