//! # Reqline Core
//!
//! Correlation and extraction engine for reqline.
//!
//! A request handled by the host framework produces many small
//! instrumentation events: the action completes, a redirect is issued,
//! rejected parameters are reported, outer middleware rewrites the status.
//! This crate collects those events for one request and renders them as a
//! single structured log line.
//!
//! This crate is not meant to be used directly. Use `reqline` instead.

#![warn(missing_docs)]

mod capture;
mod config;
mod error;
pub mod event;
pub mod formatters;
mod hooks;
mod ignore;
mod notifications;
mod sink;
mod store;
mod subscriber;

// Public API
pub use capture::EventCapture;
pub use config::{FormatField, RequestLogConfig, RequestLogConfigBuilder, Settings};
pub use error::{ReqlineError, Result};
pub use event::{names, ActiveEvent, Event, Fields, Payload};
pub use formatters::{FormatterKind, Json, KeyValue, L2met, LogFormatter, Ltsv, Raw};
pub use hooks::{BeforeFormat, CustomOptions, CustomOptionsFn};
pub use ignore::{controller_action, IgnorePredicate, IgnoreRules};
pub use notifications::{Notifier, RequestEvents, Subscriber};
pub use sink::{LogSink, MemorySink, TracingSink};
pub use store::{RequestContext, RequestStore};
pub use subscriber::{strip_query_string, RequestLogSubscriber};
