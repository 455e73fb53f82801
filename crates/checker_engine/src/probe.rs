use std::time::Duration;

use bytes::{Bytes, BytesMut};
use checker_core::{duration_ms, ProbeOutcome};
use futures_util::StreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Placeholder replaced by the percent-encoded key in the endpoint template.
pub const KEY_PLACEHOLDER: &str = "{key}";

#[async_trait::async_trait]
pub trait Probe: Send + Sync {
    /// Looks up one key. Every network or protocol condition is folded into
    /// the returned outcome.
    async fn check(&self, key: &str) -> ProbeOutcome;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeSettings {
    /// Lookup URL containing [`KEY_PLACEHOLDER`].
    pub endpoint: String,
    /// Fixed request headers sent with every lookup.
    pub headers: Vec<(String, String)>,
    #[serde(with = "duration_ms")]
    pub connect_timeout: Duration,
    #[serde(with = "duration_ms")]
    pub request_timeout: Duration,
    pub max_body_bytes: u64,
    /// Dotted path of the record object inside a success body.
    pub record_path: String,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            headers: vec![(
                "User-Agent".to_string(),
                concat!("handle-checker/", env!("CARGO_PKG_VERSION")).to_string(),
            )],
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(20),
            max_body_bytes: 2 * 1024 * 1024,
            record_path: "data.user".to_string(),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ProbeError {
    #[error("no lookup endpoint configured")]
    MissingEndpoint,
    #[error("endpoint {0:?} has no {{key}} placeholder")]
    MissingPlaceholder(String),
    #[error("invalid endpoint url: {0}")]
    InvalidEndpoint(String),
    #[error("invalid header {name:?}: {message}")]
    InvalidHeader { name: String, message: String },
    #[error("failed to build http client: {0}")]
    Client(String),
}

#[derive(Debug, Clone)]
pub struct HttpProbe {
    settings: ProbeSettings,
    client: reqwest::Client,
}

impl HttpProbe {
    pub fn new(settings: ProbeSettings) -> Result<Self, ProbeError> {
        if settings.endpoint.trim().is_empty() {
            return Err(ProbeError::MissingEndpoint);
        }
        if !settings.endpoint.contains(KEY_PLACEHOLDER) {
            return Err(ProbeError::MissingPlaceholder(settings.endpoint.clone()));
        }
        url::Url::parse(&settings.endpoint.replace(KEY_PLACEHOLDER, "probe"))
            .map_err(|err| ProbeError::InvalidEndpoint(err.to_string()))?;

        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .default_headers(header_map(&settings.headers)?)
            .build()
            .map_err(|err| ProbeError::Client(err.to_string()))?;

        Ok(Self { settings, client })
    }

    pub fn settings(&self) -> &ProbeSettings {
        &self.settings
    }

    fn url_for(&self, key: &str) -> Result<url::Url, url::ParseError> {
        url::Url::parse(&self.settings.endpoint.replace(KEY_PLACEHOLDER, &encode_key(key)))
    }

    async fn read_body(&self, response: reqwest::Response) -> Result<Bytes, ProbeOutcome> {
        let max_bytes = self.settings.max_body_bytes;
        if response.content_length().is_some_and(|len| len > max_bytes) {
            return Err(ProbeOutcome::Malformed(format!(
                "response larger than {max_bytes} bytes"
            )));
        }

        let mut body = BytesMut::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(map_reqwest_error)?;
            if body.len() as u64 + chunk.len() as u64 > max_bytes {
                return Err(ProbeOutcome::Malformed(format!(
                    "response larger than {max_bytes} bytes"
                )));
            }
            body.extend_from_slice(&chunk);
        }
        Ok(body.freeze())
    }
}

#[async_trait::async_trait]
impl Probe for HttpProbe {
    async fn check(&self, key: &str) -> ProbeOutcome {
        let url = match self.url_for(key) {
            Ok(url) => url,
            Err(err) => return ProbeOutcome::FatalFailure(format!("invalid lookup url: {err}")),
        };

        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(err) => return map_reqwest_error(err),
        };

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return ProbeOutcome::NotFound;
        }
        if status == StatusCode::TOO_MANY_REQUESTS {
            return ProbeOutcome::RateLimited;
        }
        if !status.is_success() {
            return ProbeOutcome::TransientFailure(format!("http status {}", status.as_u16()));
        }

        match self.read_body(response).await {
            Ok(body) => classify_body(&body, &self.settings.record_path),
            Err(outcome) => outcome,
        }
    }
}

/// Classifies a success body: a JSON object at `record_path` means the
/// account exists, a missing or null value means it does not.
pub fn classify_body(body: &[u8], record_path: &str) -> ProbeOutcome {
    let value: Value = match serde_json::from_slice(body) {
        Ok(value) => value,
        Err(err) => return ProbeOutcome::Malformed(err.to_string()),
    };
    let record = record_path
        .split('.')
        .filter(|segment| !segment.is_empty())
        .try_fold(&value, |node, segment| node.get(segment));
    match record {
        Some(Value::Object(_)) => ProbeOutcome::Found,
        _ => ProbeOutcome::NotFound,
    }
}

/// Percent-encodes `key` so it is safe both as a path segment and as a query
/// value. Spaces become `%20`, never `+`.
fn encode_key(key: &str) -> String {
    // byte_serialize escapes a literal '+' as %2B, so every '+' left is a space.
    url::form_urlencoded::byte_serialize(key.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

fn header_map(headers: &[(String, String)]) -> Result<HeaderMap, ProbeError> {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        let invalid = |message: String| ProbeError::InvalidHeader {
            name: name.clone(),
            message,
        };
        let header_name =
            HeaderName::from_bytes(name.trim().as_bytes()).map_err(|e| invalid(e.to_string()))?;
        let header_value =
            HeaderValue::from_str(value.trim()).map_err(|e| invalid(e.to_string()))?;
        map.insert(header_name, header_value);
    }
    Ok(map)
}

fn map_reqwest_error(err: reqwest::Error) -> ProbeOutcome {
    if err.is_timeout() {
        return ProbeOutcome::TransientFailure("timed out".to_string());
    }
    if err.is_builder() {
        return ProbeOutcome::FatalFailure(err.to_string());
    }
    if err.is_connect() {
        return ProbeOutcome::TransientFailure(format!("connection failed: {err}"));
    }
    ProbeOutcome::TransientFailure(err.to_string())
}
