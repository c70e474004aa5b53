//! HTTP request descriptors and the client seam.
//!
//! Requests are immutable descriptors (method, URL, headers, buffered body)
//! built once before the first send. Replaying one is a cheap clone; there
//! is no body stream to rewind. The actual HTTP library sits behind the
//! [`HttpClient`] trait so tests can route requests to an in-process server.

use crate::config::ClientConfig;
use crate::error::{SyncError, SyncResult};
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

pub use reqwest::Method;

const AUTHORIZATION: &str = "authorization";
const CONTENT_TYPE: &str = "content-type";

/// An outbound HTTP request.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    method: Method,
    url: String,
    /// Lower-cased header names with their values.
    headers: Vec<(String, String)>,
    body: Option<Bytes>,
}

impl HttpRequest {
    /// Creates a request with no headers and no body.
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// Creates a GET request.
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    /// Creates a POST request.
    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    /// Creates a PUT request.
    pub fn put(url: impl Into<String>) -> Self {
        Self::new(Method::PUT, url)
    }

    /// Creates a DELETE request.
    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(Method::DELETE, url)
    }

    /// Sets a header, replacing any previous value.
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        let name = name.to_ascii_lowercase();
        self.headers.retain(|(n, _)| *n != name);
        self.headers.push((name, value.into()));
        self
    }

    /// Attaches a bearer credential.
    pub fn with_bearer(self, token: &str) -> Self {
        self.with_header(AUTHORIZATION, format!("Bearer {token}"))
    }

    /// Serialises `value` as the JSON body.
    pub fn with_json<T: Serialize>(mut self, value: &T) -> SyncResult<Self> {
        let body = notesync_protocol::encode(value)?;
        self.body = Some(Bytes::from(body));
        Ok(self.with_header(CONTENT_TYPE, "application/json"))
    }

    /// Returns the method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the absolute URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns the URL path, without scheme, authority or query.
    pub fn path(&self) -> &str {
        let rest = self
            .url
            .split_once("://")
            .map(|(_, rest)| rest)
            .unwrap_or(&self.url);
        let path = rest.find('/').map(|i| &rest[i..]).unwrap_or("/");
        path.split('?').next().unwrap_or(path)
    }

    /// Returns all headers.
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Looks up a header (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        let name = name.to_ascii_lowercase();
        self.headers
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Returns the bearer credential carried by this request, if any.
    pub fn bearer(&self) -> Option<&str> {
        self.header(AUTHORIZATION)
            .and_then(|v| v.strip_prefix("Bearer "))
    }

    /// Returns the buffered body.
    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }
}

/// A fully read HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    status: u16,
    body: Bytes,
}

impl HttpResponse {
    /// Creates a response.
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Creates a response without a body.
    pub fn empty(status: u16) -> Self {
        Self::new(status, Bytes::new())
    }

    /// Creates a response with a JSON body.
    pub fn json<T: Serialize>(status: u16, value: &T) -> SyncResult<Self> {
        Ok(Self::new(status, notesync_protocol::encode(value)?))
    }

    /// Returns the status code.
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Returns true for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Returns the body.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Decodes the JSON body.
    pub fn decode<T: DeserializeOwned>(&self) -> SyncResult<T> {
        Ok(notesync_protocol::decode(&self.body)?)
    }
}

/// HTTP client abstraction.
///
/// Implementations send the request as described and return whatever the
/// server answered. Non-2xx statuses are responses, not errors; only faults
/// that produced no response at all (connection refused, timeout) are
/// reported as [`SyncError::Transport`].
pub trait HttpClient: Send + Sync {
    /// Sends a request and reads the full response.
    fn execute(&self, request: &HttpRequest) -> SyncResult<HttpResponse>;
}

impl<C: HttpClient + ?Sized> HttpClient for Arc<C> {
    fn execute(&self, request: &HttpRequest) -> SyncResult<HttpResponse> {
        (**self).execute(request)
    }
}

/// [`HttpClient`] backed by a blocking `reqwest` client.
pub struct ReqwestClient {
    client: reqwest::blocking::Client,
}

impl ReqwestClient {
    /// Builds a client honouring the configured timeout and user agent.
    pub fn new(config: &ClientConfig) -> SyncResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| SyncError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

impl HttpClient for ReqwestClient {
    fn execute(&self, request: &HttpRequest) -> SyncResult<HttpResponse> {
        let mut builder = self
            .client
            .request(request.method().clone(), request.url());
        for (name, value) in request.headers() {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body() {
            builder = builder.body(body.to_vec());
        }

        let response = builder.send().map_err(transport_error)?;
        let status = response.status().as_u16();
        let body = response.bytes().map_err(transport_error)?;
        Ok(HttpResponse::new(status, body))
    }
}

fn transport_error(err: reqwest::Error) -> SyncError {
    if err.is_builder() {
        SyncError::transport_fatal(err.to_string())
    } else {
        SyncError::transport_retryable(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notesync_protocol::NoteCreate;

    #[test]
    fn headers_are_case_insensitive_and_replaced() {
        let request = HttpRequest::get("http://h/api/notes")
            .with_header("X-Trace", "1")
            .with_header("x-trace", "2");

        assert_eq!(request.headers().len(), 1);
        assert_eq!(request.header("X-TRACE"), Some("2"));
    }

    #[test]
    fn bearer_replaces_previous_token() {
        let request = HttpRequest::get("http://h/")
            .with_bearer("old")
            .with_bearer("new");
        assert_eq!(request.bearer(), Some("new"));
    }

    #[test]
    fn json_body_is_buffered_and_shared_by_clones() {
        let request = HttpRequest::post("http://h/api/notes")
            .with_json(&NoteCreate::new("t", "c"))
            .unwrap();
        let replay = request.clone().with_bearer("fresh");

        assert_eq!(request.header("content-type"), Some("application/json"));
        assert_eq!(request.body(), replay.body());
        assert_eq!(replay.method(), &Method::POST);
        assert_eq!(replay.url(), request.url());
    }

    #[test]
    fn path_strips_origin_and_query() {
        let request = HttpRequest::get("https://notes.example.com:8443/api/notes?x=1");
        assert_eq!(request.path(), "/api/notes");
        assert_eq!(HttpRequest::get("http://host").path(), "/");
    }

    #[test]
    fn response_status_classes() {
        assert!(HttpResponse::empty(204).is_success());
        assert!(!HttpResponse::empty(401).is_success());
        assert!(HttpResponse::empty(500).decode::<serde_json::Value>().is_err());
    }
}
