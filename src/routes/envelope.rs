//! Request and response envelopes exchanged with route handlers.

use std::fmt;

use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::IntoResponse;
use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};

use crate::error::ClientError;

/// Body field that switches a request into deferred callback mode.
pub const CALLBACK_URL_FIELD: &str = "callbackUrl";

/// One inbound call.
///
/// The body stays opaque bytes until a handler asks for it as JSON.
#[derive(Debug, Clone)]
pub struct Request {
    /// HTTP method.
    pub method: Method,
    /// Full request path, including the API namespace, still percent-encoded.
    pub path: String,
    /// Raw query string without the leading `?`.
    pub query: Option<String>,
    /// Request headers (case-insensitive keys).
    pub headers: HeaderMap,
    /// Raw body.
    pub body: Bytes,
}

impl Request {
    /// Creates a request with no query, headers or body.
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: None,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// Replaces the body with serialised JSON and sets the content type.
    #[must_use]
    pub fn with_json(mut self, body: &Value) -> Self {
        self.body = Bytes::from(body.to_string());
        self.headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        self
    }

    /// Sets the raw query string.
    #[must_use]
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    /// Parses the body as JSON. An empty body yields `None`.
    ///
    /// # Errors
    ///
    /// Returns the JSON error when the body is not valid JSON.
    pub fn json(&self) -> Result<Option<Value>, serde_json::Error> {
        if self.body.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        serde_json::from_slice(&self.body).map(Some)
    }

    /// Deserialises the body into a typed payload. An empty body yields `None`.
    ///
    /// # Errors
    ///
    /// Returns the JSON error when the body is malformed or has the wrong
    /// shape for `T`.
    pub fn json_as<T: DeserializeOwned>(&self) -> Result<Option<T>, serde_json::Error> {
        if self.body.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        serde_json::from_slice(&self.body).map(Some)
    }

    /// The `callbackUrl` field of a JSON object body, if present.
    #[must_use]
    pub fn callback_url(&self) -> Option<String> {
        let body = self.json().ok().flatten()?;
        body.get(CALLBACK_URL_FIELD)
            .and_then(Value::as_str)
            .filter(|url| !url.trim().is_empty())
            .map(str::to_string)
    }

    /// First value of a query string parameter, form-decoded.
    #[must_use]
    pub fn query_param(&self, key: &str) -> Option<String> {
        let query = self.query.as_deref()?;
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
    }

    /// A header value as text.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// Payload of a [`Response`]. Exactly one kind is ever set.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    /// JSON-serialisable data.
    Json(Value),
    /// Binary image data.
    Binary {
        /// MIME type, e.g. `image/png`.
        content_type: String,
        /// Raw bytes.
        bytes: Bytes,
    },
    /// No body (deferred acknowledgement).
    Empty,
}

/// Result of a handler.
#[derive(Debug, Clone)]
pub struct Response {
    /// HTTP status; `200 OK` unless overridden.
    pub status: StatusCode,
    /// Payload.
    pub body: ResponseBody,
    /// Extra headers.
    pub headers: HeaderMap,
}

impl Response {
    /// A `200 OK` JSON response.
    #[must_use]
    pub fn json(data: Value) -> Self {
        Self {
            status: StatusCode::OK,
            body: ResponseBody::Json(data),
            headers: HeaderMap::new(),
        }
    }

    /// A `200 OK` image response.
    #[must_use]
    pub fn image(content_type: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            status: StatusCode::OK,
            body: ResponseBody::Binary {
                content_type: content_type.into(),
                bytes: bytes.into(),
            },
            headers: HeaderMap::new(),
        }
    }

    /// The deferred-mode acknowledgement: `204 No Content`, empty body.
    #[must_use]
    pub fn accepted() -> Self {
        Self {
            status: StatusCode::NO_CONTENT,
            body: ResponseBody::Empty,
            headers: HeaderMap::new(),
        }
    }

    /// Overrides the status.
    #[must_use]
    pub const fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    /// Renders a client error as an exception envelope.
    #[must_use]
    pub fn client_error(error: &ClientError) -> Self {
        Self::json(exception_body("routes", &error.to_string())).with_status(error.status())
    }

    /// The JSON document a callback receives for this response.
    ///
    /// Binary bodies use the `{"image_data", "content_type"}` convention so the
    /// callback payload is always JSON.
    #[must_use]
    pub fn envelope(&self) -> Value {
        match &self.body {
            ResponseBody::Json(data) => data.clone(),
            ResponseBody::Binary {
                content_type,
                bytes,
            } => json!({
                "image_data": BASE64_STANDARD.encode(bytes),
                "content_type": content_type,
            }),
            ResponseBody::Empty => Value::Null,
        }
    }
}

impl IntoResponse for Response {
    fn into_response(self) -> axum::response::Response {
        let mut response = match self.body {
            ResponseBody::Json(data) => (self.status, axum::Json(data)).into_response(),
            ResponseBody::Binary {
                content_type,
                bytes,
            } => {
                let mut response = (self.status, bytes).into_response();
                if let Ok(value) = HeaderValue::from_str(&content_type) {
                    response.headers_mut().insert(header::CONTENT_TYPE, value);
                }
                response
            }
            ResponseBody::Empty => self.status.into_response(),
        };
        response.headers_mut().extend(self.headers);
        response
    }
}

/// A handler-raised error.
///
/// Rendered as `{"exception": {"source": .., "message": ..}}` with status 500
/// unless the handler picks another non-2xx status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Fault {
    /// Where the error originated (usually the handler name).
    pub source: String,
    /// Human-readable description.
    pub message: String,
    /// Optional backtrace or location.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    #[serde(skip)]
    status: StatusCode,
}

impl Fault {
    /// Creates a fault with status 500.
    #[must_use]
    pub fn new(source: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            message: message.into(),
            stack: None,
            status: StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Attaches stack context.
    #[must_use]
    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    /// Uses a different status. Success statuses are ignored.
    #[must_use]
    pub fn with_status(mut self, status: StatusCode) -> Self {
        if !status.is_success() {
            self.status = status;
        }
        self
    }

    /// Status the fault is rendered with.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Converts the fault into its response envelope.
    #[must_use]
    pub fn into_response(self) -> Response {
        let status = self.status;
        Response::json(json!({ "exception": self })).with_status(status)
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.source, self.message)
    }
}

impl std::error::Error for Fault {}

fn exception_body(source: &str, message: &str) -> Value {
    json!({ "exception": { "source": source, "message": message } })
}
