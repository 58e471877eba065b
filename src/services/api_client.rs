//! HTTP transport to the fraud-detection API.
//!
//! This module provides the client every other service talks through:
//! - Base URL joining for endpoint paths
//! - Default JSON content type merged with caller headers
//! - Optional bearer authorization and a per-request `X-Request-ID`
//! - Exponential backoff with jitter for idempotent (GET) requests
//! - Structured logging and optional Prometheus metrics

use crate::models::ErrorBody;
use crate::utils::redact::{redact_sensitive_data, truncate_for_log};
use prometheus::{CounterVec, HistogramVec, Opts, Registry};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tokio_retry::{Retry, strategy::ExponentialBackoff};
use tracing::{debug, error, info, warn};
use url::Url;
use uuid::Uuid;

/// Header carrying the per-request correlation id
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Configuration for the API transport
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiClientConfig {
    /// Whole-request timeout (in seconds)
    pub timeout_seconds: u64,

    /// Connection timeout (in seconds)
    pub connect_timeout_seconds: u64,

    /// Retry configuration for idempotent requests
    pub retry: RetryConfig,

    /// Log every request and response status
    pub enable_detailed_logging: bool,
}

/// Retry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retries after the first attempt
    pub max_attempts: usize,

    /// Initial retry delay in milliseconds
    pub initial_delay_ms: u64,

    /// Maximum retry delay in milliseconds
    pub max_delay_ms: u64,

    /// Retry on these HTTP status codes
    pub retry_on_status: Vec<u16>,
}

impl Default for ApiClientConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            connect_timeout_seconds: 5,
            retry: RetryConfig::default(),
            enable_detailed_logging: true,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            initial_delay_ms: 100,
            max_delay_ms: 2000,
            retry_on_status: vec![408, 429, 500, 502, 503, 504],
        }
    }
}

/// Metrics for API transport operations
#[derive(Clone)]
pub struct ApiClientMetrics {
    /// Requests by endpoint, method, and outcome
    pub requests_total: CounterVec,

    /// Request duration by endpoint and method
    pub request_duration_seconds: HistogramVec,

    /// Retries by endpoint
    pub retries_total: CounterVec,
}

impl ApiClientMetrics {
    /// Create and register the metrics collectors
    pub fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let requests_total = CounterVec::new(
            Opts::new(
                "jobcheck_client_requests_total",
                "Total API requests by endpoint, method, and outcome",
            ),
            &["endpoint", "method", "outcome"],
        )?;

        let request_duration_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "jobcheck_client_request_duration_seconds",
                "Duration of API requests",
            )
            .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
            &["endpoint", "method"],
        )?;

        let retries_total = CounterVec::new(
            Opts::new("jobcheck_client_retries_total", "Total retried API requests by endpoint"),
            &["endpoint"],
        )?;

        registry.register(Box::new(requests_total.clone()))?;
        registry.register(Box::new(request_duration_seconds.clone()))?;
        registry.register(Box::new(retries_total.clone()))?;

        Ok(Self {
            requests_total,
            request_duration_seconds,
            retries_total,
        })
    }
}

/// Per-call request options: method, extra headers and JSON body.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Option<serde_json::Value>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            method: Method::GET,
            headers: HeaderMap::new(),
            body: None,
        }
    }
}

impl RequestOptions {
    pub fn get() -> Self {
        Self::default()
    }

    /// POST with a JSON body
    pub fn post<T: Serialize>(body: &T) -> Result<Self, RequestFailure> {
        let body = serde_json::to_value(body)
            .map_err(|e| RequestFailure::Serialization(e.to_string()))?;
        Ok(Self {
            method: Method::POST,
            headers: HeaderMap::new(),
            body: Some(body),
        })
    }

    /// POST without a body
    pub fn post_empty() -> Self {
        Self {
            method: Method::POST,
            ..Self::default()
        }
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }
}

/// Build the outgoing header set.
///
/// Caller headers override the JSON content-type default; the bearer token,
/// when present, overrides any caller-supplied `Authorization`.
pub fn merge_headers(
    caller: &HeaderMap,
    bearer: Option<&str>,
    request_id: &str,
) -> Result<HeaderMap, RequestFailure> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    for (name, value) in caller {
        headers.insert(name.clone(), value.clone());
    }

    if let Some(token) = bearer {
        let value = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|_| RequestFailure::InvalidHeader(AUTHORIZATION.to_string()))?;
        headers.insert(AUTHORIZATION, value);
    }

    let id = HeaderValue::from_str(request_id)
        .map_err(|_| RequestFailure::InvalidHeader(REQUEST_ID_HEADER.to_string()))?;
    headers.insert(HeaderName::from_static(REQUEST_ID_HEADER), id);

    Ok(headers)
}

/// Transport client bound to one API base URL
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: Url,
    config: ApiClientConfig,
    metrics: Option<ApiClientMetrics>,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(
        base_url: Url,
        config: ApiClientConfig,
        metrics: Option<ApiClientMetrics>,
    ) -> Result<Self, RequestFailure> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .connect_timeout(Duration::from_secs(config.connect_timeout_seconds))
            .build()
            .map_err(RequestFailure::Network)?;

        Ok(Self {
            client,
            base_url,
            config,
            metrics,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolve an endpoint path against the base URL.
    ///
    /// Only relative paths are accepted; a base URL path prefix is kept.
    pub fn endpoint_url(&self, path: &str) -> Result<Url, RequestFailure> {
        if Url::parse(path).is_ok() {
            return Err(RequestFailure::InvalidPath(path.to_string()));
        }

        let base = self.base_url.as_str().trim_end_matches('/');
        let path = path.trim_start_matches('/');
        Url::parse(&format!("{base}/{path}")).map_err(|_| RequestFailure::InvalidPath(path.to_string()))
    }

    /// Send a request and hand back the raw response.
    ///
    /// Only transport problems are errors here; a non-success status is
    /// returned as a response so callers decide what it means.
    pub async fn send(
        &self,
        path: &str,
        options: RequestOptions,
        bearer: Option<&str>,
    ) -> Result<Response, RequestFailure> {
        let url = self.endpoint_url(path)?;
        let request_id = Uuid::new_v4().to_string();
        let headers = merge_headers(&options.headers, bearer, &request_id)?;
        let endpoint = url.path().to_string();
        let method = options.method.clone();
        let retries = if method == Method::GET {
            self.config.retry.max_attempts
        } else {
            0
        };

        let retry_strategy = ExponentialBackoff::from_millis(self.config.retry.initial_delay_ms)
            .max_delay(Duration::from_millis(self.config.retry.max_delay_ms))
            .map(tokio_retry::strategy::jitter)
            .take(retries);

        let start = Instant::now();
        let mut attempt = 0usize;

        let result = Retry::spawn(retry_strategy, || {
            attempt += 1;
            if attempt > 1 {
                self.record_retry(&endpoint);
                debug!(request_id = %request_id, endpoint = %endpoint, attempt, "Retrying request");
            }

            let mut builder = self
                .client
                .request(method.clone(), url.clone())
                .headers(headers.clone());
            if let Some(body) = &options.body {
                builder = builder.json(body);
            }
            let retry_on_status = &self.config.retry.retry_on_status;

            async move {
                match builder.send().await {
                    Ok(response) if retry_on_status.contains(&response.status().as_u16()) => {
                        Err(Attempt::RetryableStatus(response))
                    }
                    Ok(response) => Ok(response),
                    Err(e) if e.is_timeout() => Err(Attempt::Failed(RequestFailure::Timeout)),
                    Err(e) => Err(Attempt::Failed(RequestFailure::Network(e))),
                }
            }
        })
        .await;

        let duration = start.elapsed();
        match result {
            Ok(response) | Err(Attempt::RetryableStatus(response)) => {
                let status = response.status();
                let outcome = if status.is_success() { "success" } else { "http_error" };
                self.record_request(&endpoint, method.as_str(), outcome, duration);
                if self.config.enable_detailed_logging {
                    if status.is_success() {
                        info!(
                            request_id = %request_id,
                            method = %method,
                            endpoint = %endpoint,
                            status = status.as_u16(),
                            duration_ms = duration.as_millis(),
                            "Request completed"
                        );
                    } else {
                        warn!(
                            request_id = %request_id,
                            method = %method,
                            endpoint = %endpoint,
                            status = status.as_u16(),
                            duration_ms = duration.as_millis(),
                            "Request returned error status"
                        );
                    }
                }
                Ok(response)
            }
            Err(Attempt::Failed(failure)) => {
                let outcome = match failure {
                    RequestFailure::Timeout => "timeout",
                    _ => "network_error",
                };
                self.record_request(&endpoint, method.as_str(), outcome, duration);
                if self.config.enable_detailed_logging {
                    error!(
                        request_id = %request_id,
                        method = %method,
                        endpoint = %endpoint,
                        error = %failure,
                        duration_ms = duration.as_millis(),
                        "Request failed"
                    );
                }
                Err(failure)
            }
        }
    }

    /// Decode a success body, or turn an error status into a failure
    pub async fn json<T: DeserializeOwned>(response: Response) -> Result<T, RequestFailure> {
        if !response.status().is_success() {
            return Err(Self::failure(response).await);
        }

        let body = response.text().await.map_err(RequestFailure::Network)?;
        serde_json::from_str(&body).map_err(|e| {
            debug!(body = %redact_sensitive_data(&truncate_for_log(&body, 500)), "Undecodable response body");
            RequestFailure::Decode(e.to_string())
        })
    }

    /// Build a [`RequestFailure::Status`] from a non-success response,
    /// taking the message from the server's `detail` field when present.
    pub async fn failure(response: Response) -> RequestFailure {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .ok()
            .and_then(|b| b.message());

        if message.is_none() && !body.is_empty() {
            debug!(
                status = status.as_u16(),
                body = %redact_sensitive_data(&truncate_for_log(&body, 500)),
                "Error response without detail"
            );
        }

        RequestFailure::Status {
            status: status.as_u16(),
            message,
        }
    }

    fn record_request(&self, endpoint: &str, method: &str, outcome: &str, duration: Duration) {
        if let Some(metrics) = &self.metrics {
            metrics
                .requests_total
                .with_label_values(&[endpoint, method, outcome])
                .inc();
            metrics
                .request_duration_seconds
                .with_label_values(&[endpoint, method])
                .observe(duration.as_secs_f64());
        }
    }

    fn record_retry(&self, endpoint: &str) {
        if let Some(metrics) = &self.metrics {
            metrics.retries_total.with_label_values(&[endpoint]).inc();
        }
    }
}

/// Outcome of one attempt inside the retry loop
enum Attempt {
    RetryableStatus(Response),
    Failed(RequestFailure),
}

/// Errors from talking to the API
#[derive(Debug, thiserror::Error)]
pub enum RequestFailure {
    #[error("Network error: {0}")]
    Network(#[source] reqwest::Error),

    #[error("Request timed out")]
    Timeout,

    #[error("Server returned status {status}{}", .message.as_deref().map(|m| format!(": {m}")).unwrap_or_default())]
    Status { status: u16, message: Option<String> },

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Invalid endpoint path: {0}")]
    InvalidPath(String),

    #[error("Invalid header value for {0}")]
    InvalidHeader(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl RequestFailure {
    /// HTTP status of the failure, if the server answered
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            RequestFailure::Status { status, .. } => StatusCode::from_u16(*status).ok(),
            _ => None,
        }
    }

    /// Get a user-friendly error message for notifications
    pub fn user_message(&self) -> String {
        match self {
            RequestFailure::Network(_) => "Could not reach the analysis service, check your connection".to_string(),
            RequestFailure::Timeout => "The analysis service took too long to respond".to_string(),
            RequestFailure::Status { message: Some(msg), .. } => msg.clone(),
            RequestFailure::Status { status, message: None } => {
                format!("The analysis service returned error status {status}")
            }
            RequestFailure::Decode(_) => "The analysis service sent an unexpected response".to_string(),
            RequestFailure::InvalidPath(_) | RequestFailure::InvalidHeader(_) | RequestFailure::Serialization(_) => {
                "Invalid request data".to_string()
            }
        }
    }
}
