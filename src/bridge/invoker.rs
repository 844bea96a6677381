//! Outbound HTTP calls to the host's routes.
//!
//! Every call is a single attempt with an explicit timeout. Results are
//! normalised into a [`Payload`] or an [`InvokeError`]; nothing is retried.

use std::time::Duration;

use axum::http::Method;
use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};
use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde_json::Value;

use crate::error::InvokeError;

/// Percent-encodes `value` for use as a single path segment.
#[must_use]
pub fn path_segment(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

/// What the caller expects back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Expect {
    /// A JSON document.
    #[default]
    Json,
    /// An image, either as raw `image/*` bytes or the
    /// `{"image_data": <base64>, "content_type": ..}` JSON convention.
    Image,
}

/// One outbound call relative to the invoker's base URL.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    /// HTTP method.
    pub method: Method,
    /// Route path, e.g. `/status/`. Dynamic segments must already be encoded
    /// with [`path_segment`].
    pub path: String,
    /// Query parameters.
    pub query: Vec<(String, String)>,
    /// JSON body for `POST`.
    pub body: Option<Value>,
    /// Expected payload kind.
    pub expect: Expect,
    /// Overrides the invoker's default timeout.
    pub timeout: Option<Duration>,
}

impl Call {
    /// A `GET` expecting JSON.
    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            path: path.into(),
            query: Vec::new(),
            body: None,
            expect: Expect::Json,
            timeout: None,
        }
    }

    /// A `POST` with a JSON body, expecting JSON.
    #[must_use]
    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::POST,
            body: Some(body),
            ..Self::get(path)
        }
    }

    /// A `GET` expecting an image.
    #[must_use]
    pub fn image(path: impl Into<String>) -> Self {
        Self {
            expect: Expect::Image,
            ..Self::get(path)
        }
    }

    /// Adds a query parameter.
    #[must_use]
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Sets a per-call timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// A successful result.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Parsed JSON (`null` for an empty body).
    Json(Value),
    /// Image bytes with their MIME type.
    Image {
        /// MIME type, e.g. `image/png`.
        content_type: String,
        /// Raw bytes.
        bytes: Bytes,
    },
}

/// Client for one host API, e.g. `http://localhost:48884/revit_mcp`.
#[derive(Debug, Clone)]
pub struct Invoker {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl Invoker {
    /// Creates an invoker with a default per-call timeout.
    ///
    /// # Errors
    ///
    /// Fails if the base URL does not parse or the HTTP client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, InvokeError> {
        url::Url::parse(base_url).map_err(|_| InvokeError::InvalidUrl {
            url: base_url.to_string(),
        })?;
        let client = Client::builder()
            .build()
            .map_err(InvokeError::Transport)?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    /// Base URL without a trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Issues a `GET` and returns the JSON body.
    ///
    /// # Errors
    ///
    /// See [`Invoker::invoke`].
    pub async fn get(&self, path: &str) -> Result<Value, InvokeError> {
        expect_json(self.invoke(&Call::get(path)).await?)
    }

    /// Issues a `POST` with a JSON body and returns the JSON body.
    ///
    /// # Errors
    ///
    /// See [`Invoker::invoke`].
    pub async fn post(&self, path: &str, body: &Value) -> Result<Value, InvokeError> {
        expect_json(self.invoke(&Call::post(path, body.clone())).await?)
    }

    /// Performs one call.
    ///
    /// # Errors
    ///
    /// - [`InvokeError::Remote`] for non-2xx statuses
    /// - [`InvokeError::Timeout`] when the bound elapses
    /// - [`InvokeError::Decode`] when the body is not the expected kind
    /// - [`InvokeError::Transport`] when the request cannot be sent
    pub async fn invoke(&self, call: &Call) -> Result<Payload, InvokeError> {
        let url = format!("{}{}", self.base_url, normalise_path(&call.path));
        let timeout = call.timeout.unwrap_or(self.timeout);

        let mut request = self
            .client
            .request(call.method.clone(), &url)
            .timeout(timeout);
        if !call.query.is_empty() {
            request = request.query(&call.query);
        }
        if let Some(body) = &call.body {
            request = request.json(body);
        }

        tracing::debug!(method = %call.method, url = %url, timeout_ms = timeout.as_millis(), "Invoking host route");

        let response = request
            .send()
            .await
            .map_err(|e| classify(e, timeout))?;
        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await.map_err(|e| classify(e, timeout))?;

        if !status.is_success() {
            return Err(InvokeError::Remote {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        match call.expect {
            Expect::Json => parse_json(&body).map(Payload::Json),
            Expect::Image => decode_image(content_type.as_deref(), &body),
        }
    }
}

/// Posts a result envelope to a callback URL. One attempt only.
///
/// # Errors
///
/// Same classification as [`Invoker::invoke`]; a non-2xx answer from the
/// callback receiver is [`InvokeError::Remote`].
pub async fn deliver(
    client: &Client,
    url: &str,
    envelope: &Value,
    timeout: Duration,
) -> Result<(), InvokeError> {
    let response = client
        .post(url)
        .timeout(timeout)
        .json(envelope)
        .send()
        .await
        .map_err(|e| classify(e, timeout))?;
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let body = response.text().await.unwrap_or_default();
    Err(InvokeError::Remote {
        status: status.as_u16(),
        body,
    })
}

fn normalise_path(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}

fn classify(err: reqwest::Error, timeout: Duration) -> InvokeError {
    if err.is_timeout() {
        InvokeError::Timeout { after: timeout }
    } else if err.is_decode() {
        InvokeError::Decode {
            message: err.to_string(),
        }
    } else if err.is_builder() {
        InvokeError::InvalidUrl {
            url: err.url().map(ToString::to_string).unwrap_or_default(),
        }
    } else {
        InvokeError::Transport(err)
    }
}

fn parse_json(body: &[u8]) -> Result<Value, InvokeError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    serde_json::from_slice(body).map_err(|e| InvokeError::Decode {
        message: format!("invalid JSON: {e}"),
    })
}

fn expect_json(payload: Payload) -> Result<Value, InvokeError> {
    match payload {
        Payload::Json(value) => Ok(value),
        Payload::Image { content_type, .. } => Err(InvokeError::Decode {
            message: format!("expected JSON, got {content_type}"),
        }),
    }
}

fn decode_image(content_type: Option<&str>, body: &Bytes) -> Result<Payload, InvokeError> {
    if let Some(ct) = content_type.filter(|ct| ct.starts_with("image/")) {
        let mime = ct.split(';').next().unwrap_or(ct).trim().to_string();
        return Ok(Payload::Image {
            content_type: mime,
            bytes: body.clone(),
        });
    }

    let value = parse_json(body)?;
    let encoded = value
        .get("image_data")
        .and_then(Value::as_str)
        .ok_or_else(|| InvokeError::Decode {
            message: format!(
                "expected an image, got {}",
                content_type.unwrap_or("a response without content type")
            ),
        })?;
    let bytes = BASE64_STANDARD
        .decode(encoded)
        .map_err(|e| InvokeError::Decode {
            message: format!("invalid base64 image data: {e}"),
        })?;
    let mime = value
        .get("content_type")
        .and_then(Value::as_str)
        .filter(|ct| ct.starts_with("image/"))
        .unwrap_or("image/png")
        .to_string();
    Ok(Payload::Image {
        content_type: mime,
        bytes: Bytes::from(bytes),
    })
}
