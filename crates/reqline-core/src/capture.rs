//! Secondary event capture
//!
//! Stashes the fragments of redirect and rejected-parameter events, and the
//! primary event itself, into the request's store until the request log
//! line is built.

use crate::event::{names, Event};
use crate::notifications::{Notifier, Subscriber};
use crate::store::RequestContext;
use serde_json::Value;
use std::sync::Arc;

/// Subscriber writing secondary events into the request store
#[derive(Clone, Debug, Default)]
pub struct EventCapture;

impl EventCapture {
    /// Create the capture subscriber
    pub fn new() -> Self {
        Self
    }

    /// Subscribe to the primary and secondary events on `notifier`
    pub fn attach(self, notifier: &mut Notifier) {
        let capture: Arc<dyn Subscriber> = Arc::new(self);
        notifier
            .subscribe(names::PROCESS_ACTION, capture.clone())
            .subscribe(names::REDIRECT_TO, capture.clone())
            .subscribe(names::UNPERMITTED_PARAMETERS, capture);
    }

    /// Remember the primary event so the interceptor can merge it
    pub fn process_action(&self, event: &Event, ctx: &RequestContext) {
        ctx.set_primary_event(event.clone());
    }

    /// Keep only the most recent redirect target
    pub fn redirect_to(&self, event: &Event, ctx: &RequestContext) {
        let location = event
            .payload()
            .get("location")
            .and_then(Value::as_str)
            .map(String::from);
        tracing::debug!(location = ?location, "captured redirect");
        ctx.set_location(location);
    }

    /// Accumulate rejected parameter names across events
    pub fn unpermitted_parameters(&self, event: &Event, ctx: &RequestContext) {
        let keys: Vec<String> = event
            .payload()
            .get("keys")
            .and_then(Value::as_array)
            .map(|keys| {
                keys.iter()
                    .filter_map(Value::as_str)
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();
        tracing::debug!(keys = ?keys, "captured unpermitted parameters");
        ctx.append_unpermitted_params(keys);
    }
}

impl Subscriber for EventCapture {
    fn call(&self, event: &Event, ctx: &RequestContext) {
        match event.name() {
            names::PROCESS_ACTION => self.process_action(event, ctx),
            names::REDIRECT_TO => self.redirect_to(event, ctx),
            names::UNPERMITTED_PARAMETERS => self.unpermitted_parameters(event, ctx),
            _ => {}
        }
    }
}
