//! Extraction and formatting pipeline
//!
//! [`RequestLogSubscriber`] turns the request event into one log line. Fields
//! are pulled from the event payload and the request store in a fixed order,
//! filtered by the ignore rules, extended with custom fields, passed through
//! the `before_format` hook and finally rendered by the formatter.

use crate::capture::EventCapture;
use crate::config::RequestLogConfig;
use crate::event::{display_value, exception_of, float_value, names, Event, Fields, Payload};
use crate::notifications::{Notifier, Subscriber};
use crate::sink::LogSink;
use crate::store::RequestContext;
use serde_json::Value;
use std::sync::Arc;

/// Subscriber building and emitting the request log line
#[derive(Clone)]
pub struct RequestLogSubscriber {
    config: RequestLogConfig,
    sink: Arc<dyn LogSink>,
}

impl RequestLogSubscriber {
    /// Create a subscriber for `config`
    pub fn new(config: RequestLogConfig) -> Self {
        let sink = config.sink();
        Self { config, sink }
    }

    /// Install capture and logging on `notifier`.
    ///
    /// Nothing is subscribed when the configuration is disabled.
    pub fn install(config: RequestLogConfig, notifier: &mut Notifier) {
        if !config.enabled() {
            tracing::debug!("request logging disabled");
            return;
        }
        EventCapture::new().attach(notifier);
        Self::new(config).attach(notifier);
    }

    /// Subscribe to the interceptor's request event
    pub fn attach(self, notifier: &mut Notifier) {
        self.attach_to(notifier, names::REQUEST);
    }

    /// Subscribe to events named `name`
    pub fn attach_to(self, notifier: &mut Notifier, name: &str) {
        notifier.subscribe(name, Arc::new(self));
    }

    /// The configuration in use
    pub fn config(&self) -> &RequestLogConfig {
        &self.config
    }

    /// Build the log line for `event`, or `None` if the request is ignored.
    ///
    /// Pending values in `ctx` are drained either way.
    pub fn process(&self, event: &Event, ctx: &RequestContext) -> Option<String> {
        if self.config.ignore.matches(event) {
            ctx.take_location();
            ctx.take_unpermitted_params();
            tracing::trace!(event = event.name(), "request ignored");
            return None;
        }

        let fields = self.extract(event, ctx);
        let fields = match &self.config.before_format {
            Some(hook) => hook(&fields, event.payload()).unwrap_or(fields),
            None => fields,
        };
        Some(self.config.formatter.format(&fields))
    }

    /// Extract the field set for `event`, draining `ctx`
    pub fn extract(&self, event: &Event, ctx: &RequestContext) -> Fields {
        let payload = event.payload();
        let mut fields = Fields::new();

        if let Some(method) = present(payload, "method") {
            fields.insert("method".to_string(), method.clone());
        }
        if let Some(path) = present(payload, "path") {
            fields.insert("path".to_string(), strip_value(path));
        }

        if let Some((kind, message)) = exception_of(payload) {
            fields.insert(
                "error".to_string(),
                Value::String(format!("{}: {}", kind, message)),
            );
        }

        if let Some(format) = self.config.format_field.extract(payload) {
            fields.insert("format".to_string(), format);
        }

        if let Some(location) = ctx.take_location() {
            fields.insert(
                "location".to_string(),
                Value::String(strip_query_string(&location).to_string()),
            );
        }

        if payload.contains_key("controller") || payload.contains_key("action") {
            for key in ["controller", "action"] {
                let value = payload.get(key).cloned().unwrap_or(Value::Null);
                fields.insert(key.to_string(), value);
            }
        }

        let duration = round2(event.duration_ms());
        fields.insert("duration".to_string(), float_value(duration));
        for (key, runtime) in [("view", "view_runtime"), ("db", "db_runtime")] {
            if let Some(value) = payload.get(runtime) {
                fields.insert(key.to_string(), float_value(round2(to_f(value))));
            }
        }

        fields.insert("status".to_string(), Value::from(status_of(payload)));

        if let Some(params) = ctx.take_unpermitted_params().filter(|p| !p.is_empty()) {
            let params = params.into_iter().map(Value::String).collect();
            fields.insert("unpermitted_params".to_string(), Value::Array(params));
        }

        fields.extend(self.custom_fields(event));
        fields
    }

    /// Configured custom options merged with the payload's `custom_payload`
    fn custom_fields(&self, event: &Event) -> Fields {
        let mut custom = self
            .config
            .custom_options
            .as_ref()
            .and_then(|options| options.resolve(event))
            .unwrap_or_default();

        if let Some(Value::Object(embedded)) = event.payload().get("custom_payload") {
            custom.extend(embedded.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        custom
    }
}

impl Subscriber for RequestLogSubscriber {
    fn call(&self, event: &Event, ctx: &RequestContext) {
        if let Some(line) = self.process(event, ctx) {
            self.sink.log(self.config.level, &line);
        }
    }
}

impl std::fmt::Debug for RequestLogSubscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestLogSubscriber")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Everything before the first `?`
pub fn strip_query_string(path: &str) -> &str {
    path.split_once('?').map_or(path, |(path, _)| path)
}

fn strip_value(value: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(strip_query_string(s).to_string()),
        other => Value::String(strip_query_string(&display_value(other)).to_string()),
    }
}

fn present<'a>(payload: &'a Payload, key: &str) -> Option<&'a Value> {
    payload.get(key).filter(|v| !v.is_null())
}

/// HTTP status for the line: explicit, 500 on exception, otherwise 0
fn status_of(payload: &Payload) -> i64 {
    match present(payload, "status") {
        Some(status) => to_i(status),
        None if exception_of(payload).is_some() => 500,
        None => 0,
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn to_f(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or_default(),
        Value::String(s) => s.trim().parse().unwrap_or_default(),
        _ => 0.0,
    }
}

fn to_i(value: &Value) -> i64 {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or_default(),
        Value::String(s) => s.trim().parse().unwrap_or_default(),
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FormatField, RequestLogConfigBuilder};
    use crate::formatters::Json;
    use crate::notifications::RequestEvents;
    use crate::sink::MemorySink;
    use proptest::prelude::*;
    use serde_json::json;
    use std::time::Duration;

    fn payload(value: Value) -> Payload {
        let Value::Object(map) = value else {
            unreachable!()
        };
        map
    }

    fn home_payload() -> Payload {
        payload(json!({
            "status": 200,
            "controller": "HomeController",
            "action": "index",
            "method": "GET",
            "path": "/home?foo=bar",
            "db_runtime": 0.02,
            "view_runtime": 0.01,
        }))
    }

    fn request(payload: Payload) -> Event {
        Event::with_duration(names::REQUEST, Duration::from_millis(5), payload)
    }

    fn setup(
        configure: impl FnOnce(RequestLogConfigBuilder) -> RequestLogConfigBuilder,
    ) -> (Arc<Notifier>, MemorySink) {
        let sink = MemorySink::new();
        let config = configure(RequestLogConfig::builder().sink(sink.clone())).build();
        let mut notifier = Notifier::new();
        RequestLogSubscriber::install(config, &mut notifier);
        (Arc::new(notifier), sink)
    }

    #[test]
    fn test_basic_request_line() {
        let (notifier, sink) = setup(|b| b);
        let events = RequestEvents::new(notifier, RequestContext::new());
        events.publish(&request(home_payload()));

        let line = sink.last().unwrap();
        assert!(line.starts_with("method=GET"));
        assert!(line.contains("path=/home "));
        assert!(line.contains("status=200"));
        assert!(line.contains("controller=HomeController action=index"));
        assert!(line.contains("db=0.02"));
        assert!(line.contains("view=0.01"));
        assert!(!line.contains("?foo=bar"));
    }

    #[test]
    fn test_exception_with_explicit_status() {
        let (notifier, sink) = setup(|b| b);
        let mut payload = home_payload();
        payload.insert("status".into(), json!(404));
        payload.insert(
            "exception".into(),
            json!(["ActiveRecord::RecordNotFound", "Record not found"]),
        );
        let events = RequestEvents::new(notifier, RequestContext::new());
        events.publish(&request(payload));

        let line = sink.last().unwrap();
        assert!(line.contains("status=404"));
        assert!(line.contains("error='ActiveRecord::RecordNotFound: Record not found'"));
    }

    #[test]
    fn test_status_defaults() {
        let subscriber = RequestLogSubscriber::new(RequestLogConfig::default());
        let ctx = RequestContext::new();

        let fields = subscriber.extract(&request(payload(json!({"method": "GET"}))), &ctx);
        assert_eq!(fields["status"], json!(0));

        let fields = subscriber.extract(
            &request(payload(json!({"exception": ["panic", "boom"]}))),
            &ctx,
        );
        assert_eq!(fields["status"], json!(500));

        let fields = subscriber.extract(&request(payload(json!({"status": "302"}))), &ctx);
        assert_eq!(fields["status"], json!(302));
    }

    #[test]
    fn test_field_order() {
        let subscriber = RequestLogSubscriber::new(RequestLogConfig::default());
        let mut payload = home_payload();
        payload.insert("format".into(), json!("html"));
        let ctx = RequestContext::new();
        ctx.set_location(Some("http://example.com/next?x=1".to_string()));
        ctx.append_unpermitted_params(["a"]);

        let fields = subscriber.extract(&request(payload), &ctx);
        let keys: Vec<&str> = fields.keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            [
                "method",
                "path",
                "format",
                "location",
                "controller",
                "action",
                "duration",
                "view",
                "db",
                "status",
                "unpermitted_params",
            ]
        );
        assert_eq!(fields["location"], json!("http://example.com/next"));
    }

    #[test]
    fn test_missing_fields_are_omitted() {
        let subscriber = RequestLogSubscriber::new(RequestLogConfig::default());
        let fields = subscriber.extract(&request(Payload::new()), &RequestContext::new());
        assert!(!fields.contains_key("method"));
        assert!(!fields.contains_key("controller"));
        assert!(!fields.contains_key("view"));
        assert!(!fields.contains_key("error"));
        assert!(fields.contains_key("duration"));
    }

    #[test]
    fn test_controller_without_action_is_null() {
        let subscriber = RequestLogSubscriber::new(RequestLogConfig::default());
        let fields = subscriber.extract(
            &request(payload(json!({"controller": "HomeController"}))),
            &RequestContext::new(),
        );
        assert_eq!(fields["action"], Value::Null);
    }

    #[test]
    fn test_formats_strategy() {
        let subscriber = RequestLogSubscriber::new(
            RequestLogConfig::builder()
                .format_field(FormatField::Formats)
                .build(),
        );
        let fields = subscriber.extract(
            &request(payload(json!({"formats": ["json"], "format": "html"}))),
            &RequestContext::new(),
        );
        assert_eq!(fields["format"], json!("json"));
    }

    #[test]
    fn test_location_is_drained() {
        let (notifier, sink) = setup(|b| b);
        let ctx = RequestContext::new();
        let events = RequestEvents::new(notifier.clone(), ctx.clone());
        events.redirect_to("http://www.example.com?key=value");
        events.publish(&request(home_payload()));
        assert!(sink.last().unwrap().contains("location=http://www.example.com"));
        assert!(!sink.last().unwrap().contains("key=value"));

        events.publish(&request(home_payload()));
        assert!(!sink.last().unwrap().contains("location="));

        let other = RequestEvents::new(notifier, RequestContext::new());
        other.publish(&request(home_payload()));
        assert!(!sink.last().unwrap().contains("location="));
    }

    #[test]
    fn test_unpermitted_params_accumulate() {
        let (notifier, sink) = setup(|b| b);
        let events = RequestEvents::new(notifier, RequestContext::new());
        events.unpermitted_parameters(["a"]);
        events.unpermitted_parameters(["b"]);
        events.publish(&request(home_payload()));

        assert!(sink.last().unwrap().contains(r#"unpermitted_params=["a", "b"]"#));

        events.publish(&request(home_payload()));
        assert!(!sink.last().unwrap().contains("unpermitted_params"));
    }

    #[test]
    fn test_ignored_request_drains_store() {
        let (notifier, sink) = setup(|b| b.ignore_actions(["HomeController#index"]));
        let ctx = RequestContext::new();
        let events = RequestEvents::new(notifier, ctx.clone());
        events.redirect_to("/next");
        events.unpermitted_parameters(["a"]);
        events.publish(&request(home_payload()));

        assert!(sink.is_empty());
        assert!(ctx.with(|store| store.is_empty()));
    }

    #[test]
    fn test_custom_options_and_custom_payload() {
        let (notifier, sink) = setup(|b| {
            b.custom_options_fn(|_| {
                let mut fields = Fields::new();
                fields.insert("data".into(), json!("option"));
                fields.insert("shared".into(), json!("option"));
                Some(fields)
            })
        });
        let mut payload = home_payload();
        payload.insert(
            "custom_payload".into(),
            json!({"user_id": 7, "shared": "payload"}),
        );
        let events = RequestEvents::new(notifier, RequestContext::new());
        events.publish(&request(payload));

        let line = sink.last().unwrap();
        assert!(line.contains("data=option"));
        assert!(line.contains("user_id=7"));
        assert!(line.contains("shared=payload"));
    }

    #[test]
    fn test_nil_custom_options_keep_custom_payload() {
        let (notifier, sink) = setup(|b| b.custom_options_fn(|_| None));
        let mut payload = home_payload();
        payload.insert("custom_payload".into(), json!({"user_id": 7}));
        let events = RequestEvents::new(notifier, RequestContext::new());
        events.publish(&request(payload));

        assert!(sink.last().unwrap().ends_with("user_id=7"));
    }

    #[test]
    fn test_static_custom_fields() {
        let mut extra = Fields::new();
        extra.insert("app".into(), json!("billing"));
        let (notifier, sink) = setup(|b| b.custom_fields(extra));
        let events = RequestEvents::new(notifier, RequestContext::new());
        events.publish(&request(home_payload()));

        assert!(sink.last().unwrap().ends_with("status=200 app=billing"));
    }

    #[test]
    fn test_before_format_replaces_fields() {
        let (notifier, sink) = setup(|b| {
            b.before_format(|fields, payload| {
                let mut out = Fields::new();
                out.insert("status".into(), fields["status"].clone());
                out.insert("controller".into(), payload["controller"].clone());
                Some(out)
            })
        });
        let events = RequestEvents::new(notifier, RequestContext::new());
        events.publish(&request(home_payload()));
        assert_eq!(sink.last().unwrap(), "status=200 controller=HomeController");
    }

    #[test]
    fn test_before_format_none_keeps_fields() {
        let (notifier, sink) = setup(|b| b.before_format(|_, _| None));
        let events = RequestEvents::new(notifier, RequestContext::new());
        events.publish(&request(home_payload()));
        assert!(sink.last().unwrap().starts_with("method=GET path=/home"));
    }

    #[test]
    fn test_level_and_formatter() {
        let (notifier, sink) = setup(|b| b.level(tracing::Level::WARN).formatter(Json));
        let events = RequestEvents::new(notifier, RequestContext::new());
        events.publish(&request(home_payload()));

        let (level, line) = sink.entries().pop().unwrap();
        assert_eq!(level, tracing::Level::WARN);
        let parsed: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed["path"], json!("/home"));
        assert_eq!(parsed["view"], json!(0.01));
    }

    #[test]
    fn test_disabled_installs_nothing() {
        let mut notifier = Notifier::new();
        RequestLogSubscriber::install(
            RequestLogConfig::builder().enabled(false).build(),
            &mut notifier,
        );
        assert!(notifier.is_empty());
    }

    #[test]
    fn test_attach_to_primary_event() {
        let sink = MemorySink::new();
        let mut notifier = Notifier::new();
        let config = RequestLogConfig::builder().sink(sink.clone()).build();
        let subscriber = RequestLogSubscriber::new(config);
        subscriber.attach_to(&mut notifier, names::PROCESS_ACTION);

        let event = Event::instant(names::PROCESS_ACTION, home_payload());
        notifier.publish(&event, &RequestContext::new());
        assert!(sink.last().unwrap().contains("status=200"));
    }

    #[test]
    fn test_round2_and_conversions() {
        assert_eq!(round2(1.23456), 1.23);
        assert_eq!(to_f(&json!("0.5")), 0.5);
        assert_eq!(to_f(&Value::Null), 0.0);
        assert_eq!(to_i(&json!(201.9)), 201);
        assert_eq!(to_i(&json!("abc")), 0);
    }

    proptest! {
        #[test]
        fn prop_query_string_never_emitted(
            path in "/[a-z/]{0,20}",
            query in "[a-z=&?]{0,20}",
        ) {
            let subscriber = RequestLogSubscriber::new(RequestLogConfig::default());
            let ctx = RequestContext::new();
            let full = format!("{}?{}", path, query);
            ctx.set_location(Some(format!("http://example.com{}", full)));

            let fields = subscriber.extract(&request(payload(json!({"path": full}))), &ctx);
            prop_assert_eq!(fields["path"].as_str(), Some(path.as_str()));
            prop_assert!(!fields["location"].as_str().unwrap_or_default().contains('?'));
        }

        #[test]
        fn prop_strip_is_idempotent(s in ".{0,40}") {
            let once = strip_query_string(&s);
            prop_assert_eq!(strip_query_string(once), once);
            prop_assert!(!once.contains('?'));
        }
    }
}
