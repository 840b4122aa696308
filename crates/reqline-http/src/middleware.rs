//! Middleware chain
//!
//! Layers wrap the action the way outer framework middleware does: each one
//! sees the request first and the response last, and may rewrite either.

use crate::request::Request;
use crate::response::Response;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Future returned by middleware and handlers
pub type BoxFuture = Pin<Box<dyn Future<Output = Response> + Send + 'static>>;

/// A boxed next function for middleware chains
pub type BoxedNext = Arc<dyn Fn(Request) -> BoxFuture + Send + Sync>;

/// Trait for middleware wrapping the request pipeline
pub trait MiddlewareLayer: Send + Sync + 'static {
    /// Apply this middleware to a request, calling `next` to continue the chain
    fn call(&self, req: Request, next: BoxedNext) -> BoxFuture;

    /// Clone this middleware into a boxed trait object
    fn clone_box(&self) -> Box<dyn MiddlewareLayer>;
}

impl Clone for Box<dyn MiddlewareLayer> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// A stack of middleware layers
#[derive(Clone, Default)]
pub struct LayerStack {
    layers: Vec<Box<dyn MiddlewareLayer>>,
}

impl LayerStack {
    /// Create a new empty layer stack
    pub fn new() -> Self {
        Self { layers: Vec::new() }
    }

    /// Add a middleware layer to the stack
    ///
    /// Layers are executed in the order they are added (outermost first).
    pub fn push(&mut self, layer: impl MiddlewareLayer) -> &mut Self {
        self.layers.push(Box::new(layer));
        self
    }

    /// Add a middleware layer to the beginning of the stack
    ///
    /// This layer will be executed first (outermost).
    pub fn prepend(&mut self, layer: impl MiddlewareLayer) -> &mut Self {
        self.layers.insert(0, Box::new(layer));
        self
    }

    /// Check if the stack is empty
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Get the number of layers
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Fold the stack around `handler` into a single entry point
    pub fn wrap(&self, handler: BoxedNext) -> BoxedNext {
        // Build the chain from inside out so the first layer ends up outermost
        let mut next = handler;

        for layer in self.layers.iter().rev() {
            let layer: Arc<dyn MiddlewareLayer> = Arc::from(layer.clone_box());
            let current_next = next;
            next = Arc::new(move |req: Request| layer.call(req, current_next.clone()));
        }

        next
    }

    /// Execute the middleware stack with a final handler
    pub fn execute(&self, req: Request, handler: BoxedNext) -> BoxFuture {
        self.wrap(handler)(req)
    }
}

impl std::fmt::Debug for LayerStack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayerStack")
            .field("layers", &self.layers.len())
            .finish()
    }
}
