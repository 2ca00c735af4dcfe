//! Outbound calls to the operations API.
//!
//! [`UpstreamClient::call`] never returns an error. Timeouts, connection
//! failures, non-2xx statuses and undecodable bodies are all reported inside the
//! returned [`UpstreamResult`], and callers turn that into an [`UpstreamError`]
//! only when they decide how to respond.

use crate::metrics_defs::UPSTREAM_REQUEST_DURATION;
use reqwest::header::{ACCEPT, CACHE_CONTROL, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use serde_json::Value;
use shared::histogram;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use url::Url;

/// Diagnostics never carry more than this many characters of an upstream body.
pub const DETAILS_SNIPPET_CHARS: usize = 2000;

/// Decoded upstream response body.
#[derive(Clone, Debug, PartialEq)]
pub enum UpstreamBody {
    Empty,
    Json(Value),
    Text(String),
    /// Advertised as JSON but failed to parse. Holds the raw text.
    Malformed(String),
}

impl UpstreamBody {
    pub fn decode(content_type: Option<&str>, bytes: &[u8]) -> Self {
        if bytes.is_empty() {
            return UpstreamBody::Empty;
        }

        let is_json = content_type.is_some_and(|ct| ct.to_ascii_lowercase().contains("json"));
        if is_json {
            match serde_json::from_slice(bytes) {
                Ok(value) => UpstreamBody::Json(value),
                Err(_) => UpstreamBody::Malformed(String::from_utf8_lossy(bytes).into_owned()),
            }
        } else {
            UpstreamBody::Text(String::from_utf8_lossy(bytes).into_owned())
        }
    }

    /// Body rendered for an error envelope's `details` field.
    pub fn details(&self) -> Value {
        match self {
            UpstreamBody::Empty => Value::Null,
            UpstreamBody::Json(value) => value.clone(),
            UpstreamBody::Text(text) | UpstreamBody::Malformed(text) => {
                Value::String(snippet(text))
            }
        }
    }
}

pub fn snippet(text: &str) -> String {
    text.chars().take(DETAILS_SNIPPET_CHARS).collect()
}

#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    Status(StatusCode),
    TimedOut,
    Unreachable(String),
}

impl Outcome {
    fn label(&self) -> &'static str {
        match self {
            Outcome::Status(status) if status.is_success() => "success",
            Outcome::Status(_) => "rejected",
            Outcome::TimedOut => "timeout",
            Outcome::Unreachable(_) => "unreachable",
        }
    }
}

/// The outcome of one outbound call.
#[derive(Clone, Debug, PartialEq)]
pub struct UpstreamResult {
    pub outcome: Outcome,
    pub body: UpstreamBody,
}

impl UpstreamResult {
    pub fn timed_out() -> Self {
        UpstreamResult {
            outcome: Outcome::TimedOut,
            body: UpstreamBody::Empty,
        }
    }

    pub fn unreachable(reason: impl Into<String>) -> Self {
        UpstreamResult {
            outcome: Outcome::Unreachable(reason.into()),
            body: UpstreamBody::Empty,
        }
    }

    pub fn ok(&self) -> bool {
        matches!(self.outcome, Outcome::Status(status) if status.is_success())
    }

    fn into_success_body(self) -> Result<UpstreamBody, UpstreamError> {
        match self.outcome {
            Outcome::Status(status) if status.is_success() => Ok(self.body),
            Outcome::Status(status) => Err(UpstreamError::Rejected {
                status,
                body: self.body,
            }),
            Outcome::TimedOut => Err(UpstreamError::Timeout),
            Outcome::Unreachable(reason) => Err(UpstreamError::Unavailable(reason)),
        }
    }

    /// The body as JSON. Text bodies are parsed regardless of content type.
    pub fn into_json(self) -> Result<Value, UpstreamError> {
        match self.into_success_body()? {
            UpstreamBody::Empty => Ok(Value::Null),
            UpstreamBody::Json(value) => Ok(value),
            UpstreamBody::Text(raw) | UpstreamBody::Malformed(raw) => {
                serde_json::from_str(&raw).map_err(|_| UpstreamError::Malformed { raw })
            }
        }
    }

    /// The body as-is: JSON stays JSON, text becomes a JSON string.
    pub fn into_payload(self) -> Result<Value, UpstreamError> {
        match self.into_success_body()? {
            UpstreamBody::Empty => Ok(Value::Null),
            UpstreamBody::Json(value) => Ok(value),
            UpstreamBody::Text(text) => Ok(Value::String(text)),
            UpstreamBody::Malformed(raw) => Err(UpstreamError::Malformed { raw }),
        }
    }
}

#[derive(thiserror::Error, Clone, Debug, PartialEq)]
pub enum UpstreamError {
    #[error("Upstream request timed out")]
    Timeout,
    #[error("{0}")]
    Unavailable(String),
    #[error("Upstream responded with {status}")]
    Rejected { status: StatusCode, body: UpstreamBody },
    #[error("Upstream returned a malformed payload")]
    Malformed { raw: String },
}

impl UpstreamError {
    /// Short label for the `error` field of an error envelope.
    pub fn summary(&self) -> &'static str {
        match self {
            UpstreamError::Timeout | UpstreamError::Unavailable(_) => "Failed to reach upstream",
            UpstreamError::Rejected { .. } => "Upstream error",
            UpstreamError::Malformed { .. } => "Malformed upstream payload",
        }
    }

    pub fn details(&self) -> Value {
        match self {
            UpstreamError::Rejected { body, .. } => body.details(),
            UpstreamError::Malformed { raw } => Value::String(snippet(raw)),
            other => Value::String(other.to_string()),
        }
    }

    pub fn upstream_status(&self) -> Option<StatusCode> {
        match self {
            UpstreamError::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// The upstream's own status for rejections, 504 for timeouts, 502 otherwise.
    pub fn mirror_status(&self) -> StatusCode {
        match self {
            UpstreamError::Rejected { status, .. } => *status,
            UpstreamError::Timeout => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::BAD_GATEWAY,
        }
    }
}

/// A single outbound request. Defaults to the client's timeout.
#[derive(Clone, Debug)]
pub struct UpstreamRequest {
    method: Method,
    url: Url,
    body: Option<Value>,
    query: Vec<(String, String)>,
    headers: HeaderMap,
    timeout: Option<Duration>,
}

impl UpstreamRequest {
    pub fn new(method: Method, url: Url) -> Self {
        UpstreamRequest {
            method,
            url,
            body: None,
            query: Vec::new(),
            headers: HeaderMap::new(),
            timeout: None,
        }
    }

    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: Url) -> Self {
        Self::new(Method::POST, url)
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Extra header for this request only. Overrides the client defaults.
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[derive(Clone)]
pub struct UpstreamClient {
    client: reqwest::Client,
    base_url: Url,
    token: Option<String>,
    timeout: Duration,
}

impl UpstreamClient {
    pub fn new(base_url: Url, token: Option<String>, timeout: Duration) -> Self {
        UpstreamClient {
            client: reqwest::Client::new(),
            base_url,
            token,
            timeout,
        }
    }

    /// A client for another base URL that shares this client's connection pool.
    pub fn rebased(&self, base_url: Url) -> Self {
        UpstreamClient {
            base_url,
            ..self.clone()
        }
    }

    /// `path` appended to the configured base, keeping the base's own path.
    pub fn endpoint(&self, path: &str) -> Url {
        join_path(&self.base_url, path)
    }

    pub async fn call(&self, request: UpstreamRequest) -> UpstreamResult {
        let UpstreamRequest {
            method,
            url,
            body,
            query,
            headers,
            timeout: request_timeout,
        } = request;
        let limit = request_timeout.unwrap_or(self.timeout);
        let path = url.path().to_string();
        let started = Instant::now();

        let mut builder = self
            .client
            .request(method.clone(), url)
            .header(ACCEPT, "application/json")
            .header(CACHE_CONTROL, "no-store")
            .headers(headers);
        if !query.is_empty() {
            builder = builder.query(&query);
        }
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &body {
            builder = builder.json(body);
        }

        // The timeout covers headers and the complete body. Dropping the
        // future on expiry cancels the request and releases the connection.
        let exchange = async {
            let response = builder.send().await?;
            let status = response.status();
            let content_type = response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|ct| ct.to_str().ok())
                .map(str::to_owned);
            let bytes = response.bytes().await?;
            Ok::<_, reqwest::Error>((status, content_type, bytes))
        };

        let result = match timeout(limit, exchange).await {
            Err(_) => UpstreamResult::timed_out(),
            Ok(Err(e)) => UpstreamResult::unreachable(error_chain(&e)),
            Ok(Ok((status, content_type, bytes))) => UpstreamResult {
                outcome: Outcome::Status(status),
                body: UpstreamBody::decode(content_type.as_deref(), &bytes),
            },
        };

        let outcome = result.outcome.label();
        histogram!(UPSTREAM_REQUEST_DURATION, "path" => path.clone(), "outcome" => outcome)
            .record(started.elapsed().as_secs_f64());

        match &result.outcome {
            Outcome::Status(status) if status.is_success() => {
                tracing::debug!(%method, path = %path, %status, "upstream call succeeded");
            }
            Outcome::Status(status) => {
                tracing::warn!(%method, path = %path, %status, "upstream rejected request");
            }
            Outcome::TimedOut => {
                tracing::warn!(%method, path = %path, timeout_ms = limit.as_millis() as u64, "upstream call timed out");
            }
            Outcome::Unreachable(reason) => {
                tracing::warn!(%method, path = %path, error = %reason, "upstream unreachable");
            }
        }

        result
    }
}

pub fn join_path(base: &Url, path: &str) -> Url {
    let mut url = base.clone();
    let joined = format!(
        "{}/{}",
        base.path().trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    url.set_path(&joined);
    url
}

fn error_chain(error: &reqwest::Error) -> String {
    let mut message = error.to_string();
    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
