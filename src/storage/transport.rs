// ABOUTME: HTTP transport for the storage REST API of one project
// ABOUTME: Builds authenticated requests relative to <project>/storage/v1 with reqwest

use crate::config::StorageEndpoint;
use crate::error::{MigrateError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Url;
use std::time::Duration;

pub use reqwest::{Method, StatusCode};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Body of a storage request
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    Json(serde_json::Value),
    Bytes(Bytes),
}

/// One request against the storage API, relative to `/storage/v1`
#[derive(Debug, Clone)]
pub struct StorageRequest {
    pub method: Method,
    /// Unencoded path segments, e.g. `["object", "avatars", "team", "a.png"]`
    pub segments: Vec<String>,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: RequestBody,
    pub timeout: Duration,
}

impl StorageRequest {
    pub fn new<I, S>(method: Method, segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            method,
            segments: segments.into_iter().map(Into::into).collect(),
            query: Vec::new(),
            headers: Vec::new(),
            body: RequestBody::Empty,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn query(mut self, name: &str, value: impl ToString) -> Self {
        self.query.push((name.to_string(), value.to_string()));
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn json(mut self, value: serde_json::Value) -> Self {
        self.body = RequestBody::Json(value);
        self
    }

    pub fn bytes(mut self, content: Bytes) -> Self {
        self.body = RequestBody::Bytes(content);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Segments joined with `/`, for logging and matching
    pub fn path(&self) -> String {
        self.segments.join("/")
    }

    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn query_value(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Status and body of a storage response
#[derive(Debug, Clone)]
pub struct StorageResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

impl StorageResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status: StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// Sends storage requests; retries and connection reuse are the
/// implementation's business
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: StorageRequest) -> Result<StorageResponse>;
}

/// Transport backed by a shared `reqwest::Client`
///
/// Every request carries the service key both as bearer token and as
/// `apikey` header.
pub struct ReqwestTransport {
    client: reqwest::Client,
    base: Url,
    service_key: String,
}

impl ReqwestTransport {
    pub fn new(endpoint: &StorageEndpoint) -> Result<Self> {
        Self::with_client(reqwest::Client::new(), endpoint)
    }

    pub fn with_client(client: reqwest::Client, endpoint: &StorageEndpoint) -> Result<Self> {
        let mut base = Url::parse(endpoint.url.trim())
            .map_err(|e| MigrateError::InvalidUrl(format!("{}: {}", endpoint.url, e)))?;
        base.path_segments_mut()
            .map_err(|_| MigrateError::InvalidUrl(endpoint.url.clone()))?
            .pop_if_empty()
            .extend(["storage", "v1"]);

        Ok(Self {
            client,
            base,
            service_key: endpoint.service_key.clone(),
        })
    }

    /// Absolute URL for a request's path segments
    pub fn url_for(&self, segments: &[String]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| MigrateError::InvalidUrl(self.base.to_string()))?
            .extend(segments);
        Ok(url)
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: StorageRequest) -> Result<StorageResponse> {
        let url = self.url_for(&request.segments)?;
        tracing::debug!("{} {}", request.method, url);

        let mut builder = self
            .client
            .request(request.method, url)
            .bearer_auth(&self.service_key)
            .header("apikey", &self.service_key)
            .timeout(request.timeout);

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(&value),
            RequestBody::Bytes(content) => builder.body(content),
        };

        let response = builder.send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        Ok(StorageResponse { status, body })
    }
}
