//! Instrumented controller actions
//!
//! An [`Action`] runs a handler as `Controller#action` and reports it as the
//! primary `process_action.controller` event: the request line, the
//! response status and format, any redirect, and a panic as the event's
//! exception.

use crate::middleware::{BoxFuture, BoxedNext};
use crate::request::Request;
use crate::response::{redirect_location, response_format, IntoResponse};
use futures_util::FutureExt;
use reqline_core::event::panic_message;
use reqline_core::{names, Fields, Payload};
use serde_json::Value;
use std::future::Future;
use std::panic::{resume_unwind, AssertUnwindSafe};
use std::sync::Arc;

/// Computes fields embedded in the primary event as `custom_payload`
pub type CustomPayload = Arc<dyn Fn(&Request) -> Fields + Send + Sync>;

type Handler = Arc<dyn Fn(Request) -> BoxFuture + Send + Sync>;

/// A handler bound to a controller and action name
#[derive(Clone)]
pub struct Action {
    controller: String,
    action: String,
    handler: Handler,
    custom_payload: Option<CustomPayload>,
}

impl Action {
    /// Bind `handler` as `controller#action`
    pub fn new<F, Fut, R>(
        controller: impl Into<String>,
        action: impl Into<String>,
        handler: F,
    ) -> Self
    where
        F: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoResponse + 'static,
    {
        let handler: Handler = Arc::new(move |req: Request| {
            let fut = handler(req);
            Box::pin(async move { fut.await.into_response() }) as BoxFuture
        });
        Self {
            controller: controller.into(),
            action: action.into(),
            handler,
            custom_payload: None,
        }
    }

    /// Add request-derived fields to every log line of this action
    pub fn custom_payload<F>(mut self, f: F) -> Self
    where
        F: Fn(&Request) -> Fields + Send + Sync + 'static,
    {
        self.custom_payload = Some(Arc::new(f));
        self
    }

    /// The `Controller#action` name
    pub fn name(&self) -> String {
        format!("{}#{}", self.controller, self.action)
    }

    /// Run the action for `req`
    pub fn call(&self, req: Request) -> BoxFuture {
        let handler = self.handler.clone();
        let Some(events) = req.events().cloned() else {
            // Not behind the interceptor: nothing to report to
            return handler(req);
        };

        let mut payload = Payload::new();
        payload.insert(
            "controller".to_string(),
            Value::String(self.controller.clone()),
        );
        payload.insert("action".to_string(), Value::String(self.action.clone()));
        payload.insert(
            "method".to_string(),
            Value::String(req.method().to_string()),
        );
        payload.insert(
            "path".to_string(),
            Value::String(req.full_path().to_string()),
        );
        if let Some(custom_payload) = &self.custom_payload {
            payload.insert(
                "custom_payload".to_string(),
                Value::Object(custom_payload(&req)),
            );
        }

        Box::pin(async move {
            let mut active = events.notifier().start(names::PROCESS_ACTION, payload);
            match AssertUnwindSafe(handler(req)).catch_unwind().await {
                Ok(response) => {
                    if let Some(location) = redirect_location(&response) {
                        events.redirect_to(location);
                    }
                    let payload = active.payload_mut();
                    if let Some(format) = response_format(&response) {
                        payload.insert("format".to_string(), Value::String(format));
                    }
                    payload.insert(
                        "status".to_string(),
                        Value::from(response.status().as_u16()),
                    );
                    events.finish(active);
                    response
                }
                Err(panic) => {
                    active.record_exception("panic", panic_message(&*panic));
                    events.finish(active);
                    resume_unwind(panic)
                }
            }
        })
    }

    /// Use the action as the innermost link of a middleware chain
    pub fn into_next(self) -> BoxedNext {
        Arc::new(move |req: Request| self.call(req))
    }
}

impl std::fmt::Debug for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Action")
            .field("controller", &self.controller)
            .field("action", &self.action)
            .field("custom_payload", &self.custom_payload.is_some())
            .finish_non_exhaustive()
    }
}
