//! HTTP adapter for the remote visit service
//!
//! JSON over HTTPS. Every write carries the record's device id in
//! `X-Idempotency-Key`, so a retried delivery resolves to the remote entity
//! created by the first one.

use std::time::Duration;

use async_trait::async_trait;
use fieldvisit_core::RemoteVisitService;
use fieldvisit_domain::{
    AnchorPayload, BulkVisitAck, CustomerPayload, FieldVisitError, RemoteConfig, RemoteCustomer,
    RemoteVisit, Result as DomainResult, ScheduleEntry, VisitPayload,
};
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, instrument};

use super::client::HttpClient;
use crate::errors::{map_status, InfraError};

pub const IDEMPOTENCY_HEADER: &str = "X-Idempotency-Key";

pub struct HttpRemoteService {
    http: HttpClient,
}

impl HttpRemoteService {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    pub fn from_config(config: &RemoteConfig, request_timeout: Duration) -> DomainResult<Self> {
        let http = HttpClient::builder(&config.base_url)
            .timeout(request_timeout)
            .max_attempts(config.max_attempts as usize)
            .user_agent(concat!("fieldvisit/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self::new(http))
    }

    fn write<B: Serialize + ?Sized>(
        &self,
        method: Method,
        segments: &[&str],
        dedupe_key: &str,
        body: &B,
    ) -> DomainResult<RequestBuilder> {
        let request = self.http.request(method, segments)?;
        Ok(request.header(IDEMPOTENCY_HEADER, dedupe_key).json(body))
    }

    /// Send and fail on any non-success status.
    async fn execute(&self, request: RequestBuilder) -> DomainResult<Response> {
        let response = self.http.send(request).await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        debug!(%status, body = %body, "remote refused request");
        Err(map_status(status, &body))
    }

    /// Decode a success body. An unreadable one leaves the write's outcome
    /// unknown, so it is reported as retryable.
    async fn execute_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> DomainResult<T> {
        let response = self.execute(request).await?;
        response.json::<T>().await.map_err(|err| FieldVisitError::from(InfraError::from(err)))
    }
}

#[async_trait]
impl RemoteVisitService for HttpRemoteService {
    #[instrument(skip(self))]
    async fn fetch_schedule(&self, sales_rep_id: &str) -> DomainResult<Vec<ScheduleEntry>> {
        let request =
            self.http.request(Method::GET, &["sales-reps", sales_rep_id, "schedule"])?;
        self.execute_json(request).await
    }

    #[instrument(skip(self, payload), fields(dedupe_key = %payload.dedupe_key))]
    async fn create_visit(&self, payload: &VisitPayload) -> DomainResult<RemoteVisit> {
        let request = self.write(Method::POST, &["visits"], &payload.dedupe_key, payload)?;
        self.execute_json(request).await
    }

    #[instrument(skip(self, payload), fields(dedupe_key = %payload.dedupe_key))]
    async fn update_visit(&self, remote_id: &str, payload: &VisitPayload) -> DomainResult<()> {
        let request =
            self.write(Method::PUT, &["visits", remote_id], &payload.dedupe_key, payload)?;
        self.execute(request).await.map(drop)
    }

    #[instrument(skip(self, payloads), fields(batch = payloads.len()))]
    async fn bulk_sync_visits(
        &self,
        payloads: &[VisitPayload],
    ) -> DomainResult<Vec<BulkVisitAck>> {
        // Each payload carries its own dedupe key.
        let request = self.http.request(Method::POST, &["visits", "bulk"])?.json(payloads);
        self.execute_json(request).await
    }

    #[instrument(skip(self, payload), fields(customer = %payload.customer_key))]
    async fn upsert_geofence_anchor(&self, payload: &AnchorPayload) -> DomainResult<()> {
        let request = self.write(
            Method::PUT,
            &["customers", payload.customer_key.as_str(), "geofence-anchor"],
            &payload.dedupe_key,
            payload,
        )?;
        self.execute(request).await.map(drop)
    }

    #[instrument(skip(self, payload), fields(dedupe_key = %payload.dedupe_key))]
    async fn create_customer(&self, payload: &CustomerPayload) -> DomainResult<RemoteCustomer> {
        let request = self.write(Method::POST, &["customers"], &payload.dedupe_key, payload)?;
        self.execute_json(request).await
    }
}
