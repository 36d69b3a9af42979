use std::time::Duration;

use fieldvisit_domain::{FieldVisitError, Result as DomainResult};
use reqwest::{Client as ReqwestClient, Method, RequestBuilder, Response, StatusCode};
use tracing::{debug, warn};
use url::Url;

use crate::errors::InfraError;

/// Bounded exponential backoff between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, the initial try included.
    pub max_attempts: usize,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (1-based).
    pub fn delay_for(&self, retry: usize) -> Duration {
        let shift = retry.saturating_sub(1).min(8) as u32;
        self.base_backoff.saturating_mul(1u32 << shift).min(self.max_backoff)
    }
}

/// HTTP client bound to one service root, with retry and timeout support.
#[derive(Clone)]
pub struct HttpClient {
    client: ReqwestClient,
    base_url: Url,
    retry: RetryPolicy,
}

impl HttpClient {
    pub fn builder(base_url: impl Into<String>) -> HttpClientBuilder {
        HttpClientBuilder::new(base_url)
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Append `segments` to the service root, percent-encoding each one.
    pub fn endpoint(&self, segments: &[&str]) -> DomainResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| {
                FieldVisitError::Config(format!("remote base url {} takes no path", self.base_url))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    pub fn request(&self, method: Method, segments: &[&str]) -> DomainResult<RequestBuilder> {
        Ok(self.client.request(method, self.endpoint(segments)?))
    }

    /// Execute the request, retrying transient failures.
    ///
    /// Server errors, `408` and `429` responses are retried while attempts
    /// remain; the last response is returned as-is so the caller can map its
    /// status. Transport failures that outlive the budget become
    /// `RemoteUnavailable`.
    pub async fn send(&self, builder: RequestBuilder) -> DomainResult<Response> {
        let attempts = self.retry.max_attempts.max(1);

        for attempt in 1..=attempts {
            let request = builder
                .try_clone()
                .ok_or_else(|| {
                    FieldVisitError::Internal("request body must be buffered to be retried".into())
                })?
                .build()
                .map_err(|err| FieldVisitError::from(InfraError::from(err)))?;

            let method = request.method().clone();
            let url = request.url().clone();
            debug!(attempt, %method, %url, "sending HTTP request");

            let last_attempt = attempt == attempts;
            match self.client.execute(request).await {
                Ok(response) => {
                    let status = response.status();
                    debug!(attempt, %method, %url, %status, "received HTTP response");

                    if !last_attempt && is_transient_status(status) {
                        self.backoff(attempt).await;
                        continue;
                    }
                    return Ok(response);
                }
                Err(err) => {
                    if !last_attempt && is_transient_error(&err) {
                        debug!(attempt, %method, %url, error = %err, "HTTP request failed");
                        self.backoff(attempt).await;
                        continue;
                    }

                    warn!(attempt, %method, %url, error = %err, "HTTP request failed");
                    return Err(InfraError::from(err).into());
                }
            }
        }

        Err(FieldVisitError::Internal("http client exhausted retries without a result".into()))
    }

    async fn backoff(&self, retry: usize) {
        let delay = self.retry.delay_for(retry);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

/// Builder for [`HttpClient`].
#[derive(Debug)]
pub struct HttpClientBuilder {
    base_url: String,
    timeout: Duration,
    retry: RetryPolicy,
    user_agent: Option<String>,
}

impl HttpClientBuilder {
    fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
            user_agent: None,
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn max_attempts(mut self, attempts: usize) -> Self {
        self.retry.max_attempts = attempts.max(1);
        self
    }

    pub fn base_backoff(mut self, backoff: Duration) -> Self {
        self.retry.base_backoff = backoff;
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    pub fn build(self) -> DomainResult<HttpClient> {
        // Stored with a trailing slash; `endpoint` drops the empty last segment.
        let mut root = self.base_url.trim().to_string();
        if !root.ends_with('/') {
            root.push('/');
        }
        let base_url = Url::parse(&root)
            .map_err(|e| FieldVisitError::Config(format!("invalid remote base url {root}: {e}")))?;

        let mut builder = ReqwestClient::builder().timeout(self.timeout).no_proxy();
        if let Some(agent) = self.user_agent {
            builder = builder.user_agent(agent);
        }
        let client = builder.build().map_err(|err| FieldVisitError::from(InfraError::from(err)))?;

        Ok(HttpClient { client, base_url, retry: self.retry })
    }
}

fn is_transient_status(status: StatusCode) -> bool {
    status.is_server_error()
        || status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
}

fn is_transient_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}
