//! # Reqline HTTP
//!
//! The host side of reqline: request and response types, a small middleware
//! chain, the [`RequestLogLayer`] interceptor that wraps each request in an
//! outer event, and [`Action`], which runs a handler as a controller action
//! and reports it as the primary event.
//!
//! This crate is not meant to be used directly. Use `reqline` instead.

#![warn(missing_docs)]

mod action;
mod interceptor;
mod middleware;
mod request;
mod response;

pub use action::{Action, CustomPayload};
pub use interceptor::RequestLogLayer;
pub use middleware::{BoxFuture, BoxedNext, LayerStack, MiddlewareLayer};
pub use request::Request;
pub use response::{format_of, Html, IntoResponse, Json, Redirect, Response};
