//! In-process notification bus
//!
//! The host framework reports what happens during a request by publishing
//! named events. Subscribers registered for a name receive each event
//! together with the [`RequestContext`] of the request that produced it.

use crate::event::{names, panic_message, ActiveEvent, Event, Payload};
use crate::store::RequestContext;
use serde_json::Value;
use std::fmt;
use std::panic::{catch_unwind, resume_unwind, AssertUnwindSafe};
use std::sync::Arc;

/// Receiver of published events
pub trait Subscriber: Send + Sync + 'static {
    /// Handle one event fired during the request owning `ctx`
    fn call(&self, event: &Event, ctx: &RequestContext);
}

impl<F> Subscriber for F
where
    F: Fn(&Event, &RequestContext) + Send + Sync + 'static,
{
    fn call(&self, event: &Event, ctx: &RequestContext) {
        self(event, ctx)
    }
}

/// Dispatches events to the subscribers registered for their name
#[derive(Clone, Default)]
pub struct Notifier {
    subscriptions: Vec<(String, Arc<dyn Subscriber>)>,
}

impl Notifier {
    /// Create a bus with no subscribers
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `subscriber` for events named `name`
    ///
    /// Subscribers run in registration order.
    pub fn subscribe(
        &mut self,
        name: impl Into<String>,
        subscriber: Arc<dyn Subscriber>,
    ) -> &mut Self {
        self.subscriptions.push((name.into(), subscriber));
        self
    }

    /// Whether anything listens for `name`
    pub fn is_subscribed(&self, name: &str) -> bool {
        self.subscriptions.iter().any(|(n, _)| n == name)
    }

    /// Number of registered subscriptions
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    /// Whether no subscriptions are registered
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Deliver a finished event
    pub fn publish(&self, event: &Event, ctx: &RequestContext) {
        for (name, subscriber) in &self.subscriptions {
            if name == event.name() {
                subscriber.call(event, ctx);
            }
        }
    }

    /// Open an instrumentation scope
    pub fn start(&self, name: impl Into<String>, payload: Payload) -> ActiveEvent {
        ActiveEvent::start(name, payload)
    }

    /// Close an instrumentation scope and publish the resulting event
    pub fn finish(&self, active: ActiveEvent, ctx: &RequestContext) -> Event {
        let event = active.finish();
        self.publish(&event, ctx);
        event
    }

    /// Measure `f` as an event named `name`.
    ///
    /// A panic inside `f` is recorded as the event's exception, the event is
    /// published, and the panic then continues unwinding.
    pub fn instrument<R>(
        &self,
        name: impl Into<String>,
        payload: Payload,
        ctx: &RequestContext,
        f: impl FnOnce(&mut Payload) -> R,
    ) -> R {
        let mut active = self.start(name, payload);
        let outcome = catch_unwind(AssertUnwindSafe(|| f(active.payload_mut())));
        match outcome {
            Ok(value) => {
                self.finish(active, ctx);
                value
            }
            Err(panic) => {
                active.record_exception("panic", panic_message(&*panic));
                self.finish(active, ctx);
                resume_unwind(panic)
            }
        }
    }
}

impl fmt::Debug for Notifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self
            .subscriptions
            .iter()
            .map(|(name, _)| name.as_str())
            .collect();
        f.debug_struct("Notifier")
            .field("subscriptions", &names)
            .finish()
    }
}

/// Event entry point handed to code running inside one request.
///
/// The interceptor stores one of these in the request extensions; handlers
/// use it to report redirects and rejected parameters for their own request.
#[derive(Clone, Debug)]
pub struct RequestEvents {
    notifier: Arc<Notifier>,
    ctx: RequestContext,
}

impl RequestEvents {
    /// Bind a bus to the context of one request
    pub fn new(notifier: Arc<Notifier>, ctx: RequestContext) -> Self {
        Self { notifier, ctx }
    }

    /// The shared bus
    pub fn notifier(&self) -> &Arc<Notifier> {
        &self.notifier
    }

    /// The request's context
    pub fn context(&self) -> &RequestContext {
        &self.ctx
    }

    /// Publish an already finished event for this request
    pub fn publish(&self, event: &Event) {
        self.notifier.publish(event, &self.ctx);
    }

    /// Close a scope opened with [`Notifier::start`] for this request
    pub fn finish(&self, active: ActiveEvent) -> Event {
        self.notifier.finish(active, &self.ctx)
    }

    /// Measure `f` as an event of this request
    pub fn instrument<R>(
        &self,
        name: impl Into<String>,
        payload: Payload,
        f: impl FnOnce(&mut Payload) -> R,
    ) -> R {
        self.notifier.instrument(name, payload, &self.ctx, f)
    }

    /// Report a redirect to `location`
    pub fn redirect_to(&self, location: impl Into<String>) {
        let mut payload = Payload::new();
        payload.insert("location".to_string(), Value::String(location.into()));
        self.publish(&Event::instant(names::REDIRECT_TO, payload));
    }

    /// Report rejected parameter names
    pub fn unpermitted_parameters<I, S>(&self, keys: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let keys = keys
            .into_iter()
            .map(|k| Value::String(k.into()))
            .collect::<Vec<_>>();
        let mut payload = Payload::new();
        payload.insert("keys".to_string(), Value::Array(keys));
        self.publish(&Event::instant(names::UNPERMITTED_PARAMETERS, payload));
    }
}
