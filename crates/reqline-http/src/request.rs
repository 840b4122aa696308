//! Request types for reqline

use bytes::Bytes;
use http::{request::Parts, Extensions, HeaderMap, Method, Uri, Version};
use http_body_util::BodyExt;
use reqline_core::RequestEvents;

/// HTTP Request wrapper
///
/// Provides access to all parts of an incoming HTTP request.
pub struct Request {
    pub(crate) parts: Parts,
    pub(crate) body: Option<Bytes>,
}

impl Request {
    /// Create a new request from parts
    pub fn new(parts: Parts, body: Bytes) -> Self {
        Self {
            parts,
            body: Some(body),
        }
    }

    /// Buffer the body of an `http` request
    pub async fn from_http<B>(req: http::Request<B>) -> Result<Self, B::Error>
    where
        B: BodyExt,
    {
        let (parts, body) = req.into_parts();
        let body = body.collect().await?.to_bytes();
        Ok(Self::new(parts, body))
    }

    /// Get the HTTP method
    pub fn method(&self) -> &Method {
        &self.parts.method
    }

    /// Get the URI
    pub fn uri(&self) -> &Uri {
        &self.parts.uri
    }

    /// Get the HTTP version
    pub fn version(&self) -> Version {
        self.parts.version
    }

    /// Get the headers
    pub fn headers(&self) -> &HeaderMap {
        &self.parts.headers
    }

    /// Get request extensions
    pub fn extensions(&self) -> &Extensions {
        &self.parts.extensions
    }

    /// Get mutable extensions
    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.parts.extensions
    }

    /// Get the request path
    pub fn path(&self) -> &str {
        self.parts.uri.path()
    }

    /// Path followed by the query string, as sent on the request line
    pub fn full_path(&self) -> &str {
        self.parts
            .uri
            .path_and_query()
            .map_or_else(|| self.path(), |pq| pq.as_str())
    }

    /// Get the query string
    pub fn query_string(&self) -> Option<&str> {
        self.parts.uri.query()
    }

    /// Take the body bytes (can only be called once)
    pub fn take_body(&mut self) -> Option<Bytes> {
        self.body.take()
    }

    /// Event handle of the request, set by the request log interceptor
    pub fn events(&self) -> Option<&RequestEvents> {
        self.parts.extensions.get::<RequestEvents>()
    }
}

impl From<http::Request<Bytes>> for Request {
    fn from(req: http::Request<Bytes>) -> Self {
        let (parts, body) = req.into_parts();
        Self::new(parts, body)
    }
}

impl std::fmt::Debug for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Request")
            .field("method", &self.parts.method)
            .field("uri", &self.parts.uri)
            .field("version", &self.parts.version)
            .finish()
    }
}
