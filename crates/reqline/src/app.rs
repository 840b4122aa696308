//! Request logging around a middleware chain

use reqline_core::{Notifier, RequestLogConfig};
use reqline_http::{Action, BoxFuture, LayerStack, MiddlewareLayer, Request, RequestLogLayer};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// A middleware chain with the request log interceptor outermost
///
/// # Example
///
/// ```rust,ignore
/// use reqline::prelude::*;
///
/// let app = RequestLog::new(RequestLogConfig::default());
/// let show = Action::new("UsersController", "show", |_req| async { "ok" });
/// let response = app.handle(request, &show).await;
/// ```
#[derive(Clone, Debug)]
pub struct RequestLog {
    interceptor: RequestLogLayer,
    layers: LayerStack,
}

impl RequestLog {
    /// Log requests as configured by `config`
    pub fn new(config: RequestLogConfig) -> Self {
        Self::with_interceptor(RequestLogLayer::new(config))
    }

    /// Log requests through an existing interceptor
    pub fn with_interceptor(interceptor: RequestLogLayer) -> Self {
        let mut layers = LayerStack::new();
        layers.push(interceptor.clone());
        Self {
            interceptor,
            layers,
        }
    }

    /// Add a middleware layer inside the interceptor
    pub fn layer(mut self, layer: impl MiddlewareLayer) -> Self {
        self.layers.push(layer);
        self
    }

    /// The bus requests publish on
    pub fn notifier(&self) -> &Arc<Notifier> {
        self.interceptor.notifier()
    }

    /// Run `action` for `req` through every layer
    pub fn handle(&self, req: Request, action: &Action) -> BoxFuture {
        self.layers.execute(req, action.clone().into_next())
    }
}

/// Install a `fmt` subscriber filtered by `RUST_LOG`.
///
/// Does nothing if a global subscriber is already set.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,reqline=info"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
