//! Request log interceptor
//!
//! [`RequestLogLayer`] wraps every request in an outer `request.reqline`
//! event. When the downstream chain is done it merges the primary event's
//! payload into the outer one and settles the final status, so middleware
//! that rewrites the status after the action finished is reflected in the
//! log line.

use crate::middleware::{BoxFuture, BoxedNext, MiddlewareLayer};
use crate::request::Request;
use futures_util::FutureExt;
use reqline_core::event::panic_message;
use reqline_core::{
    names, ActiveEvent, Notifier, Payload, RequestContext, RequestEvents, RequestLogConfig,
    RequestLogSubscriber,
};
use serde_json::Value;
use std::panic::{resume_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::Instrument;

/// Middleware layer producing the outer request event
///
/// # Example
///
/// ```rust,ignore
/// use reqline_http::{LayerStack, RequestLogLayer};
/// use reqline_core::RequestLogConfig;
///
/// let mut stack = LayerStack::new();
/// stack.push(RequestLogLayer::new(RequestLogConfig::default()));
/// ```
#[derive(Clone, Debug)]
pub struct RequestLogLayer {
    notifier: Arc<Notifier>,
}

impl RequestLogLayer {
    /// Create a layer logging through `config`
    pub fn new(config: RequestLogConfig) -> Self {
        let mut notifier = Notifier::new();
        RequestLogSubscriber::install(config, &mut notifier);
        Self::with_notifier(Arc::new(notifier))
    }

    /// Create a layer publishing on an existing bus
    pub fn with_notifier(notifier: Arc<Notifier>) -> Self {
        Self { notifier }
    }

    /// The bus events are published on
    pub fn notifier(&self) -> &Arc<Notifier> {
        &self.notifier
    }
}

impl MiddlewareLayer for RequestLogLayer {
    fn call(&self, mut req: Request, next: BoxedNext) -> BoxFuture {
        let events = RequestEvents::new(self.notifier.clone(), RequestContext::new());
        req.extensions_mut().insert(events.clone());

        let mut payload = Payload::new();
        payload.insert("method".to_string(), Value::String(req.method().to_string()));
        payload.insert("path".to_string(), Value::String(req.path().to_string()));

        let span = tracing::debug_span!(
            "request",
            method = %req.method(),
            path = %req.path(),
        );

        Box::pin(
            async move {
                let mut scope = RequestScope::start(events, payload);
                let outcome = AssertUnwindSafe(next(req)).catch_unwind().await;

                match outcome {
                    Ok(response) => {
                        scope.complete(Some(response.status().as_u16()), None);
                        response
                    }
                    Err(panic) => {
                        scope.complete(None, Some(panic_message(&*panic)));
                        resume_unwind(panic)
                    }
                }
            }
            .instrument(span),
        )
    }

    fn clone_box(&self) -> Box<dyn MiddlewareLayer> {
        Box::new(self.clone())
    }
}

/// Outer event of one request, published exactly once
///
/// Dropping an incomplete scope (the request future was cancelled) still
/// merges and publishes, so nothing stays behind in the request store.
struct RequestScope {
    events: RequestEvents,
    active: Option<ActiveEvent>,
}

impl RequestScope {
    fn start(events: RequestEvents, payload: Payload) -> Self {
        let active = events.notifier().start(names::REQUEST, payload);
        Self {
            events,
            active: Some(active),
        }
    }

    /// Settle the status and publish; `observed` is the status the
    /// response actually carries, `panic` the message of a downstream panic.
    fn complete(&mut self, observed: Option<u16>, panic: Option<String>) {
        let Some(mut active) = self.active.take() else {
            return;
        };

        let payload = active.payload_mut();
        let preserved = payload.get("status").filter(|v| !v.is_null()).cloned();

        if let Some(primary) = self.events.context().take_primary_event() {
            payload.extend(primary.into_payload());
        }
        if let Some(status) = preserved {
            payload.insert("status".to_string(), status);
        }
        if let Some(status) = observed {
            payload.insert("status".to_string(), Value::from(status));
        }
        if let Some(message) = panic {
            active.record_exception("panic", message);
        }

        self.events.finish(active);
    }
}

impl Drop for RequestScope {
    fn drop(&mut self) {
        if self.active.is_some() {
            tracing::debug!("request cancelled before completion");
            self.complete(None, None);
        }
    }
}
