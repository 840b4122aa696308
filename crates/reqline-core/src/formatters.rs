//! Formatters rendering extracted fields as one log line

use crate::error::ReqlineError;
use crate::event::{display_value, Fields};
use serde_json::Value;
use std::str::FromStr;
use std::sync::Arc;

/// Trait for log line formatters
pub trait LogFormatter: Send + Sync {
    /// Render the fields of one request
    fn format(&self, fields: &Fields) -> String;
}

impl<F> LogFormatter for F
where
    F: Fn(&Fields) -> String + Send + Sync,
{
    fn format(&self, fields: &Fields) -> String {
        self(fields)
    }
}

/// Fields always printed first by the key-value formatter
const LEADING_FIELDS: [&str; 2] = ["method", "path"];

/// `key=value` pairs separated by spaces (the default)
///
/// Values are not escaped: an `error` message containing `'` makes the
/// quoted `error='...'` pair ambiguous to parse.
///
/// ```text
/// method=GET path=/home format=html controller=HomeController action=index status=200 duration=1.20 view=0.01 db=0.02
/// ```
#[derive(Clone, Debug, Default)]
pub struct KeyValue;

impl KeyValue {
    /// Create a key-value formatter
    pub fn new() -> Self {
        Self
    }

    fn format_pair(key: &str, value: &Value) -> String {
        format!("{}={}", key, Self::format_value(key, value))
    }

    fn format_value(key: &str, value: &Value) -> String {
        if key == "error" {
            return format!("'{}'", display_value(value));
        }
        match value {
            Value::Number(n) if n.is_f64() => format!("{:.2}", n.as_f64().unwrap_or_default()),
            Value::String(s) if s.contains(' ') => format!("'{}'", s),
            Value::Array(items) => format_list(items),
            other => display_value(other),
        }
    }
}

impl LogFormatter for KeyValue {
    fn format(&self, fields: &Fields) -> String {
        let leading = LEADING_FIELDS
            .iter()
            .filter_map(|key| fields.get(*key).map(|value| (*key, value)));
        let rest = fields
            .iter()
            .map(|(key, value)| (key.as_str(), value))
            .filter(|(key, _)| !LEADING_FIELDS.contains(key));

        leading
            .chain(rest)
            .map(|(key, value)| Self::format_pair(key, value))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Render a list as `["a", "b"]`
fn format_list(items: &[Value]) -> String {
    let items: Vec<String> = items
        .iter()
        .map(|item| match item {
            Value::String(s) => format!("{:?}", s),
            other => other.to_string(),
        })
        .collect();
    format!("[{}]", items.join(", "))
}

/// Compact JSON object in field order
#[derive(Clone, Debug, Default)]
pub struct Json;

impl LogFormatter for Json {
    fn format(&self, fields: &Fields) -> String {
        serde_json::to_string(fields).unwrap_or_default()
    }
}

/// Heroku l2met style key-value output
///
/// Controller and action collapse into `source`, and float fields become
/// `measure#page.<key>` measurements.
#[derive(Clone, Debug, Default)]
pub struct L2met;

impl L2met {
    const FIELDS: [&'static str; 10] = [
        "method", "path", "format", "source", "status", "error", "duration", "view", "db",
        "location",
    ];
    const UNWANTED: [&'static str; 2] = ["controller", "action"];

    /// Create an l2met formatter
    pub fn new() -> Self {
        Self
    }

    fn source(fields: &Fields) -> Option<String> {
        let controller = fields.get("controller").filter(|v| !v.is_null())?;
        let action = fields.get("action").filter(|v| !v.is_null())?;
        Some(format!(
            "{}:{}",
            display_value(controller).replace('/', "-"),
            display_value(action)
        ))
    }
}

impl LogFormatter for L2met {
    fn format(&self, fields: &Fields) -> String {
        let mut fields = fields.clone();
        if let Some(source) = Self::source(&fields) {
            fields.insert("source".to_string(), Value::String(source));
        }

        let known = Self::FIELDS
            .iter()
            .filter_map(|key| fields.get(*key).map(|value| (*key, value)));
        let additional = fields
            .iter()
            .map(|(key, value)| (key.as_str(), value))
            .filter(|(key, _)| !Self::FIELDS.contains(key) && !Self::UNWANTED.contains(key));

        known
            .chain(additional)
            .map(|(key, value)| match value {
                Value::Number(n) if n.is_f64() => {
                    KeyValue::format_pair(&format!("measure#page.{}", key), value)
                }
                _ => KeyValue::format_pair(key, value),
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Labeled tab-separated values (`key:value` joined by tabs)
#[derive(Clone, Debug, Default)]
pub struct Ltsv;

impl Ltsv {
    /// Create an LTSV formatter
    pub fn new() -> Self {
        Self
    }

    fn format_value(key: &str, value: &Value) -> String {
        match value {
            _ if key == "error" => format!("'{}'", escape_ltsv(&display_value(value))),
            Value::Number(n) if n.is_f64() => format!("{:.2}", n.as_f64().unwrap_or_default()),
            Value::Array(items) => escape_ltsv(&format_list(items)),
            other => escape_ltsv(&display_value(other)),
        }
    }
}

impl LogFormatter for Ltsv {
    fn format(&self, fields: &Fields) -> String {
        fields
            .iter()
            .map(|(key, value)| format!("{}:{}", key, Self::format_value(key, value)))
            .collect::<Vec<_>>()
            .join("\t")
    }
}

/// Escape separators for LTSV
fn escape_ltsv(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
        .replace('\t', "\\t")
}

/// Debug rendering of the field map
#[derive(Clone, Debug, Default)]
pub struct Raw;

impl LogFormatter for Raw {
    fn format(&self, fields: &Fields) -> String {
        format!("{:?}", fields)
    }
}

/// Built-in formatter selected by name
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FormatterKind {
    /// [`KeyValue`]
    #[default]
    KeyValue,
    /// [`Json`]
    Json,
    /// [`L2met`]
    L2met,
    /// [`Ltsv`]
    Ltsv,
    /// [`Raw`]
    Raw,
}

impl FormatterKind {
    /// Instantiate the formatter
    pub fn build(self) -> Arc<dyn LogFormatter> {
        match self {
            Self::KeyValue => Arc::new(KeyValue::new()),
            Self::Json => Arc::new(Json),
            Self::L2met => Arc::new(L2met::new()),
            Self::Ltsv => Arc::new(Ltsv::new()),
            Self::Raw => Arc::new(Raw),
        }
    }
}

impl FromStr for FormatterKind {
    type Err = ReqlineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "key_value" | "keyvalue" | "kv" => Ok(Self::KeyValue),
            "json" => Ok(Self::Json),
            "l2met" => Ok(Self::L2met),
            "ltsv" => Ok(Self::Ltsv),
            "raw" => Ok(Self::Raw),
            _ => Err(ReqlineError::UnknownFormatter(s.to_string())),
        }
    }
}
