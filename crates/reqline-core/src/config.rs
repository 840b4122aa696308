//! Request log configuration

use crate::error::{ReqlineError, Result};
use crate::event::{Event, Fields, Payload};
use crate::formatters::{FormatterKind, KeyValue, LogFormatter};
use crate::hooks::{BeforeFormat, CustomOptions};
use crate::ignore::IgnoreRules;
use crate::sink::{LogSink, TracingSink};
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::Level;

/// Where the response format is read from in the event payload.
///
/// Older hosts report a list of candidate formats under `formats`; newer
/// ones report a single `format`. The strategy is picked once at
/// configuration time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FormatField {
    /// Read the `format` key
    #[default]
    Format,
    /// Read the first element of the `formats` list
    Formats,
}

impl FormatField {
    /// The format value carried by `payload`, if any
    pub fn extract(self, payload: &Payload) -> Option<Value> {
        let value = match self {
            Self::Format => payload.get("format"),
            Self::Formats => payload.get("formats").and_then(|v| v.as_array()?.first()),
        };
        value.filter(|v| !v.is_null()).cloned()
    }
}

impl FromStr for FormatField {
    type Err = ReqlineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "format" => Ok(Self::Format),
            "formats" => Ok(Self::Formats),
            _ => Err(ReqlineError::InvalidFormatField(s.to_string())),
        }
    }
}

/// Request log configuration
#[derive(Clone)]
pub struct RequestLogConfig {
    pub(crate) enabled: bool,
    pub(crate) formatter: Arc<dyn LogFormatter>,
    pub(crate) ignore: IgnoreRules,
    pub(crate) custom_options: Option<CustomOptions>,
    pub(crate) before_format: Option<BeforeFormat>,
    pub(crate) level: Level,
    pub(crate) sink: Option<Arc<dyn LogSink>>,
    pub(crate) format_field: FormatField,
}

impl Default for RequestLogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            formatter: Arc::new(KeyValue::new()),
            ignore: IgnoreRules::new(),
            custom_options: None,
            before_format: None,
            level: Level::INFO,
            sink: None,
            format_field: FormatField::default(),
        }
    }
}

impl RequestLogConfig {
    /// Create a new builder for RequestLogConfig
    pub fn builder() -> RequestLogConfigBuilder {
        RequestLogConfigBuilder::default()
    }

    /// Build a configuration from loaded settings
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let mut builder = Self::builder()
            .enabled(settings.enabled)
            .ignore_actions(settings.ignore_actions.iter().cloned());

        if let Some(level) = &settings.level {
            builder = builder.level(parse_level(level)?);
        }
        if let Some(formatter) = &settings.formatter {
            builder = builder.formatter_kind(formatter.parse()?);
        }
        if let Some(format_field) = &settings.format_field {
            builder = builder.format_field(format_field.parse()?);
        }

        Ok(builder.build())
    }

    /// Whether request logging is switched on
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Severity of emitted lines
    pub fn level(&self) -> Level {
        self.level
    }

    /// The configured formatter
    pub fn formatter(&self) -> &Arc<dyn LogFormatter> {
        &self.formatter
    }

    /// The ignore rules
    pub fn ignore_rules(&self) -> &IgnoreRules {
        &self.ignore
    }

    /// Format field strategy
    pub fn format_field(&self) -> FormatField {
        self.format_field
    }

    /// The configured sink, falling back to `tracing`
    pub fn sink(&self) -> Arc<dyn LogSink> {
        self.sink.clone().unwrap_or_else(|| Arc::new(TracingSink))
    }
}

impl fmt::Debug for RequestLogConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestLogConfig")
            .field("enabled", &self.enabled)
            .field("ignore", &self.ignore)
            .field("custom_options", &self.custom_options)
            .field("before_format", &self.before_format.is_some())
            .field("level", &self.level)
            .field("sink", &self.sink.is_some())
            .field("format_field", &self.format_field)
            .finish_non_exhaustive()
    }
}

/// Builder for RequestLogConfig
#[derive(Default)]
pub struct RequestLogConfigBuilder {
    config: RequestLogConfig,
}

impl RequestLogConfigBuilder {
    /// Switch request logging on or off
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.config.enabled = enabled;
        self
    }

    /// Set the formatter
    pub fn formatter(mut self, formatter: impl LogFormatter + 'static) -> Self {
        self.config.formatter = Arc::new(formatter);
        self
    }

    /// Use a built-in formatter
    pub fn formatter_kind(mut self, kind: FormatterKind) -> Self {
        self.config.formatter = kind.build();
        self
    }

    /// Add an ignore predicate
    pub fn ignore<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Event) -> bool + Send + Sync + 'static,
    {
        self.config.ignore.ignore(predicate);
        self
    }

    /// Ignore the given `Controller#action` pairs
    pub fn ignore_actions<I, S>(mut self, actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.ignore.ignore_actions(actions);
        self
    }

    /// Replace the ignore rules
    pub fn ignore_rules(mut self, rules: IgnoreRules) -> Self {
        self.config.ignore = rules;
        self
    }

    /// Set the custom options provider
    pub fn custom_options(mut self, options: CustomOptions) -> Self {
        self.config.custom_options = Some(options);
        self
    }

    /// Compute custom fields from the request event
    pub fn custom_options_fn<F>(self, f: F) -> Self
    where
        F: Fn(&Event) -> Option<Fields> + Send + Sync + 'static,
    {
        self.custom_options(CustomOptions::from_fn(f))
    }

    /// Add the same fields to every line
    pub fn custom_fields(self, fields: Fields) -> Self {
        self.custom_options(CustomOptions::Static(fields))
    }

    /// Set the hook run just before formatting
    pub fn before_format<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Fields, &Payload) -> Option<Fields> + Send + Sync + 'static,
    {
        self.config.before_format = Some(Arc::new(hook));
        self
    }

    /// Set the severity of emitted lines
    pub fn level(mut self, level: Level) -> Self {
        self.config.level = level;
        self
    }

    /// Send lines to `sink` instead of `tracing`
    pub fn sink(mut self, sink: impl LogSink + 'static) -> Self {
        self.config.sink = Some(Arc::new(sink));
        self
    }

    /// Choose where the response format is read from
    pub fn format_field(mut self, format_field: FormatField) -> Self {
        self.config.format_field = format_field;
        self
    }

    /// Build the configuration
    pub fn build(self) -> RequestLogConfig {
        self.config
    }
}

/// Plain-value settings as read from the environment or a file
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Settings {
    /// Whether request logging is switched on
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Severity name (`info`, `warn`, ...)
    #[serde(default)]
    pub level: Option<String>,
    /// Built-in formatter name (`key_value`, `json`, `l2met`, `ltsv`, `raw`)
    #[serde(default)]
    pub formatter: Option<String>,
    /// `Controller#action` pairs that are never logged
    #[serde(default)]
    pub ignore_actions: Vec<String>,
    /// `format` or `formats`
    #[serde(default)]
    pub format_field: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            level: None,
            formatter: None,
            ignore_actions: Vec::new(),
            format_field: None,
        }
    }
}

fn default_enabled() -> bool {
    true
}

/// Parse a severity name; `fatal` and `unknown` map to `ERROR`
pub(crate) fn parse_level(name: &str) -> Result<Level> {
    match name.trim().to_ascii_lowercase().as_str() {
        "fatal" | "unknown" => Ok(Level::ERROR),
        "warning" => Ok(Level::WARN),
        other => other
            .parse::<Level>()
            .map_err(|_| ReqlineError::InvalidLevel(name.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formatters::Json;
    use serde_json::json;

    #[test]
    fn test_default_config() {
        let config = RequestLogConfig::default();
        assert!(config.enabled());
        assert_eq!(config.level(), Level::INFO);
        assert_eq!(config.format_field(), FormatField::Format);
        assert!(config.ignore_rules().is_empty());
    }

    #[test]
    fn test_builder() {
        let config = RequestLogConfig::builder()
            .formatter(Json)
            .level(Level::WARN)
            .ignore_actions(["HealthController#show"])
            .ignore(|_| false)
            .format_field(FormatField::Formats)
            .build();

        assert_eq!(config.level(), Level::WARN);
        assert_eq!(config.ignore_rules().len(), 2);
        assert_eq!(config.format_field(), FormatField::Formats);
        assert_eq!(config.formatter().format(&Fields::new()), "{}");
    }

    #[test]
    fn test_from_settings() {
        let settings = Settings {
            level: Some("debug".to_string()),
            formatter: Some("json".to_string()),
            ignore_actions: vec!["HomeController#index".to_string()],
            format_field: Some("formats".to_string()),
            ..Default::default()
        };

        let config = RequestLogConfig::from_settings(&settings).unwrap();
        assert_eq!(config.level(), Level::DEBUG);
        assert_eq!(config.ignore_rules().len(), 1);
        assert_eq!(config.format_field(), FormatField::Formats);
    }

    #[test]
    fn test_from_settings_rejects_unknown_values() {
        let settings = Settings {
            formatter: Some("xml".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            RequestLogConfig::from_settings(&settings),
            Err(ReqlineError::UnknownFormatter(_))
        ));

        let settings = Settings {
            level: Some("loud".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            RequestLogConfig::from_settings(&settings),
            Err(ReqlineError::InvalidLevel(_))
        ));
    }

    #[test]
    fn test_parse_level_aliases() {
        assert_eq!(parse_level("FATAL").unwrap(), Level::ERROR);
        assert_eq!(parse_level("warning").unwrap(), Level::WARN);
        assert_eq!(parse_level("Info").unwrap(), Level::INFO);
    }

    #[test]
    fn test_format_field_strategies() {
        let Value::Object(payload) = json!({"format": "html", "formats": ["json", "xml"]}) else {
            unreachable!()
        };
        assert_eq!(FormatField::Format.extract(&payload), Some(json!("html")));
        assert_eq!(FormatField::Formats.extract(&payload), Some(json!("json")));
        assert_eq!(FormatField::Format.extract(&Payload::new()), None);
    }

    #[test]
    fn test_settings_deserialize_defaults() {
        let settings: Settings = serde_json::from_value(json!({})).unwrap();
        assert_eq!(settings, Settings::default());
        assert!(settings.enabled);
    }
}
