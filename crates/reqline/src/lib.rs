//! # Reqline
//!
//! One structured log line per HTTP request.
//!
//! A framework handling a request reports many small events: the action
//! finished, a redirect was issued, parameters were rejected, an outer
//! middleware changed the status. Reqline correlates those events for each
//! request and renders them as a single line:
//!
//! ```text
//! method=GET path=/users/1 format=json controller=UsersController action=show status=200 duration=12.41 view=0.00 db=1.20
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use reqline::prelude::*;
//!
//! let app = RequestLog::new(
//!     RequestLogConfig::builder()
//!         .ignore_actions(["HealthController#show"])
//!         .build(),
//! );
//! let show = Action::new("UsersController", "show", |_req| async { Json(user) });
//! let response = app.handle(request, &show).await;
//! ```
//!
//! ## Optional Features
//!
//! - `config` - Read settings from `REQLINE_*` environment variables and `.env` files

mod app;

#[cfg(feature = "config")]
pub mod config;

pub use app::{init_tracing, RequestLog};

// Re-export the engine
pub use reqline_core::{event, formatters};
pub use reqline_core::{
    controller_action, names, strip_query_string, ActiveEvent, BeforeFormat, CustomOptions,
    CustomOptionsFn, Event, EventCapture, Fields, FormatField, FormatterKind, IgnorePredicate,
    IgnoreRules, KeyValue, L2met, LogFormatter, LogSink, Ltsv, MemorySink, Notifier, Payload, Raw,
    ReqlineError, RequestContext, RequestEvents, RequestLogConfig, RequestLogConfigBuilder,
    RequestLogSubscriber, RequestStore, Result, Settings, Subscriber, TracingSink,
};

// Re-export the HTTP boundary
pub use reqline_http::{
    format_of, Action, BoxFuture, BoxedNext, CustomPayload, Html, IntoResponse, Json, LayerStack,
    MiddlewareLayer, Redirect, Request, RequestLogLayer, Response,
};

// Re-export dependencies hosts interact with
pub use serde_json;
pub use tracing;

/// Prelude module - import everything you need with `use reqline::prelude::*`
pub mod prelude {
    pub use crate::app::{init_tracing, RequestLog};

    pub use reqline_core::{
        names, CustomOptions, Event, Fields, FormatField, FormatterKind, IgnoreRules, KeyValue,
        L2met, LogFormatter, LogSink, Ltsv, MemorySink, Payload, Raw, RequestEvents,
        RequestLogConfig, TracingSink,
    };
    pub use reqline_http::{
        Action, Html, IntoResponse, Json, LayerStack, MiddlewareLayer, Redirect, Request,
        RequestLogLayer, Response,
    };

    #[cfg(feature = "config")]
    pub use crate::config::{config_from_env, load_dotenv};
}
