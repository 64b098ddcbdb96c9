//! Request and response types shared by the client and its transports.

use std::time::Duration;

use bytes::Bytes;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

use crate::errors::FetchError;

/// How a successful response body should be decoded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResponseType {
    #[default]
    Json,
    Text,
    Blob,
    ArrayBuffer,
}

impl std::str::FromStr for ResponseType {
    type Err = FetchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(ResponseType::Json),
            "text" => Ok(ResponseType::Text),
            "blob" => Ok(ResponseType::Blob),
            "arraybuffer" | "array_buffer" | "bytes" => Ok(ResponseType::ArrayBuffer),
            other => Err(FetchError::validation(
                "type",
                format!("unknown response type `{other}`"),
            )),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    Json(Value),
    Text(String),
    Bytes(Bytes),
}

impl RequestBody {
    pub(crate) fn into_bytes(self) -> Option<Bytes> {
        match self {
            RequestBody::Empty => None,
            RequestBody::Json(value) => Some(Bytes::from(value.to_string())),
            RequestBody::Text(text) => Some(Bytes::from(text)),
            RequestBody::Bytes(bytes) => Some(bytes),
        }
    }

    fn default_content_type(&self) -> Option<&'static str> {
        match self {
            RequestBody::Json(_) => Some("application/json"),
            RequestBody::Text(_) => Some("text/plain; charset=utf-8"),
            RequestBody::Empty | RequestBody::Bytes(_) => None,
        }
    }
}

/// Per-request options. The verb helpers on the client fill in `method`.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub method: Option<Method>,
    pub headers: HeaderMap,
    pub query: Vec<(String, String)>,
    pub body: RequestBody,
    pub response_type: ResponseType,
    /// Opt in to automatic retries for transient failures.
    pub retry: bool,
    /// Overrides the client-wide timeout for this request only.
    pub timeout: Option<Duration>,
    rejected_headers: Vec<String>,
}

impl RequestOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    /// Adds a header. Invalid names or values are reported when the request is sent.
    #[must_use]
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                self.headers.insert(name, value);
            }
            _ => self.rejected_headers.push(name.to_string()),
        }
        self
    }

    #[must_use]
    pub fn bearer_auth(self, token: &str) -> Self {
        self.with_header(AUTHORIZATION.as_str(), &format!("Bearer {token}"))
    }

    #[must_use]
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    #[must_use]
    pub fn json(mut self, body: Value) -> Self {
        self.body = RequestBody::Json(body);
        self
    }

    #[must_use]
    pub fn text(mut self, body: impl Into<String>) -> Self {
        self.body = RequestBody::Text(body.into());
        self
    }

    #[must_use]
    pub fn bytes(mut self, body: impl Into<Bytes>) -> Self {
        self.body = RequestBody::Bytes(body.into());
        self
    }

    #[must_use]
    pub fn response_type(mut self, response_type: ResponseType) -> Self {
        self.response_type = response_type;
        self
    }

    #[must_use]
    pub fn retry(mut self, retry: bool) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Splits out header names rejected by [`RequestOptions::with_header`].
    pub(crate) fn take_invalid_headers(&mut self) -> Vec<String> {
        std::mem::take(&mut self.rejected_headers)
    }

    /// Sets the body's content type unless the caller already chose one.
    pub(crate) fn apply_body_content_type(&mut self) {
        if self.headers.contains_key(CONTENT_TYPE) {
            return;
        }
        if let Some(content_type) = self.body.default_content_type() {
            self.headers
                .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
        }
    }
}

/// A fully buffered HTTP response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub url: Url,
    pub body: Bytes,
}

impl HttpResponse {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
    }

    #[must_use]
    pub fn text_lossy(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

/// A decoded response body, shaped by the requested [`ResponseType`].
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Json(Value),
    Text(String),
    Blob(Blob),
    ArrayBuffer(Bytes),
}

impl ResponseBody {
    pub(crate) fn decode(
        response: HttpResponse,
        response_type: ResponseType,
    ) -> Result<Self, FetchError> {
        match response_type {
            ResponseType::Json => {
                if response.body.iter().all(u8::is_ascii_whitespace) {
                    return Ok(ResponseBody::Json(Value::Null));
                }
                Ok(ResponseBody::Json(serde_json::from_slice(&response.body)?))
            }
            ResponseType::Text => Ok(ResponseBody::Text(response.text_lossy())),
            ResponseType::Blob => Ok(ResponseBody::Blob(Blob {
                content_type: response.content_type().map(str::to_string),
                bytes: response.body,
            })),
            ResponseType::ArrayBuffer => Ok(ResponseBody::ArrayBuffer(response.body)),
        }
    }

    #[must_use]
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            ResponseBody::Json(value) => Some(value),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ResponseBody::Text(text) => Some(text),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            ResponseBody::Json(_) => &[],
            ResponseBody::Text(text) => text.as_bytes(),
            ResponseBody::Blob(blob) => &blob.bytes,
            ResponseBody::ArrayBuffer(bytes) => bytes,
        }
    }

    /// Deserializes a JSON body into `T`.
    ///
    /// # Errors
    ///
    /// Returns `Parse` when the value does not match `T`, and `Config` when
    /// the body was not requested as JSON.
    pub fn into_json<T: DeserializeOwned>(self) -> Result<T, FetchError> {
        match self {
            ResponseBody::Json(value) => Ok(serde_json::from_value(value)?),
            other => Err(FetchError::Config(format!(
                "expected a JSON response body, got {}",
                other.variant_name()
            ))),
        }
    }

    fn variant_name(&self) -> &'static str {
        match self {
            ResponseBody::Json(_) => "json",
            ResponseBody::Text(_) => "text",
            ResponseBody::Blob(_) => "blob",
            ResponseBody::ArrayBuffer(_) => "arraybuffer",
        }
    }
}
