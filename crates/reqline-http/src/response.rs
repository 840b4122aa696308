//! Response types for reqline
//!
//! Handlers wrapped by the action adapter return anything implementing
//! [`IntoResponse`]. The content type of the response becomes the `format`
//! of the request log line, and a redirect's `Location` is reported to the
//! request log automatically.

use bytes::Bytes;
use http::{header, HeaderMap, HeaderValue, StatusCode};
use http_body_util::Full;
use serde::Serialize;

/// HTTP Response type
pub type Response = http::Response<Full<Bytes>>;

/// Trait for types that can be converted into an HTTP response
pub trait IntoResponse {
    /// Convert self into a Response
    fn into_response(self) -> Response;
}

fn with_body(status: StatusCode, content_type: Option<&'static str>, body: Bytes) -> Response {
    let mut response = http::Response::new(Full::new(body));
    *response.status_mut() = status;
    if let Some(content_type) = content_type {
        response
            .headers_mut()
            .insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    }
    response
}

impl IntoResponse for Response {
    fn into_response(self) -> Response {
        self
    }
}

impl IntoResponse for () {
    fn into_response(self) -> Response {
        with_body(StatusCode::OK, None, Bytes::new())
    }
}

impl IntoResponse for &'static str {
    fn into_response(self) -> Response {
        with_body(
            StatusCode::OK,
            Some("text/plain; charset=utf-8"),
            Bytes::from(self),
        )
    }
}

impl IntoResponse for String {
    fn into_response(self) -> Response {
        with_body(
            StatusCode::OK,
            Some("text/plain; charset=utf-8"),
            Bytes::from(self),
        )
    }
}

impl IntoResponse for StatusCode {
    fn into_response(self) -> Response {
        with_body(self, None, Bytes::new())
    }
}

impl<R: IntoResponse> IntoResponse for (StatusCode, R) {
    fn into_response(self) -> Response {
        let mut response = self.1.into_response();
        *response.status_mut() = self.0;
        response
    }
}

impl<R: IntoResponse> IntoResponse for (StatusCode, HeaderMap, R) {
    fn into_response(self) -> Response {
        let mut response = self.2.into_response();
        *response.status_mut() = self.0;
        response.headers_mut().extend(self.1);
        response
    }
}

impl<T: IntoResponse, E: IntoResponse> IntoResponse for Result<T, E> {
    fn into_response(self) -> Response {
        match self {
            Ok(v) => v.into_response(),
            Err(e) => e.into_response(),
        }
    }
}

/// JSON response
#[derive(Debug, Clone)]
pub struct Json<T>(pub T);

impl<T: Serialize> IntoResponse for Json<T> {
    fn into_response(self) -> Response {
        match serde_json::to_vec(&self.0) {
            Ok(body) => with_body(
                StatusCode::OK,
                Some("application/json"),
                Bytes::from(body),
            ),
            Err(err) => {
                tracing::error!("Failed to serialize response: {}", err);
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}

/// HTML response
#[derive(Debug, Clone)]
pub struct Html<T>(pub T);

impl<T: Into<String>> IntoResponse for Html<T> {
    fn into_response(self) -> Response {
        with_body(
            StatusCode::OK,
            Some("text/html; charset=utf-8"),
            Bytes::from(self.0.into()),
        )
    }
}

/// Redirect response
#[derive(Debug, Clone)]
pub struct Redirect {
    status: StatusCode,
    location: String,
}

impl Redirect {
    /// Create a 302 Found redirect
    pub fn to(uri: impl Into<String>) -> Self {
        Self {
            status: StatusCode::FOUND,
            location: uri.into(),
        }
    }

    /// Create a 301 Permanent redirect
    pub fn permanent(uri: impl Into<String>) -> Self {
        Self {
            status: StatusCode::MOVED_PERMANENTLY,
            location: uri.into(),
        }
    }
}

impl IntoResponse for Redirect {
    fn into_response(self) -> Response {
        let mut response = with_body(self.status, None, Bytes::new());
        match HeaderValue::from_str(&self.location) {
            Ok(location) => {
                response.headers_mut().insert(header::LOCATION, location);
            }
            Err(_) => {
                tracing::warn!(location = %self.location, "invalid redirect location");
            }
        }
        response
    }
}

/// Short format name for a content type (`application/json` → `json`)
pub fn format_of(content_type: &str) -> Option<String> {
    let mime = content_type.split(';').next()?.trim();
    let (_, subtype) = mime.split_once('/')?;
    let format = match subtype {
        "plain" => "text",
        "javascript" | "x-javascript" => "js",
        other => other.strip_prefix("x-").unwrap_or(other),
    };
    (!format.is_empty() && format != "*").then(|| format.to_string())
}

/// Format of a response, from its `Content-Type`
pub(crate) fn response_format(response: &Response) -> Option<String> {
    response
        .headers()
        .get(header::CONTENT_TYPE)?
        .to_str()
        .ok()
        .and_then(format_of)
}

/// Redirect target of a 3xx response
pub(crate) fn redirect_location(response: &Response) -> Option<&str> {
    if !response.status().is_redirection() {
        return None;
    }
    response.headers().get(header::LOCATION)?.to_str().ok()
}
