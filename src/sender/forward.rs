use super::client::TransportClient;
use super::retry::RetryPolicy;
use crate::domain::TelemetryRecord;
use futures::future::join_all;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::Serialize;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::time::sleep;
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

/// Final result for one record's forward, after retries.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForwardOutcome {
    pub index: usize,
    pub container_id: String,
    pub success: bool,
    pub http_status: Option<u16>,
    pub already_exists: bool,
    pub attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Aggregate over one fan-out call. `succeeded` includes idempotent
/// duplicates, so `succeeded + failed == total` always holds.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForwardReport {
    pub total: usize,
    pub succeeded: usize,
    pub already_exists: usize,
    pub failed: usize,
    pub results: Vec<ForwardOutcome>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FanOutClassification {
    Complete,
    Partial,
    Failed,
}

impl ForwardReport {
    fn from_outcomes(results: Vec<ForwardOutcome>) -> Self {
        let total = results.len();
        let succeeded = results.iter().filter(|r| r.success).count();
        let already_exists = results.iter().filter(|r| r.already_exists).count();
        Self {
            total,
            succeeded,
            already_exists,
            failed: total - succeeded,
            results,
        }
    }

    pub fn classification(&self) -> FanOutClassification {
        if self.failed == 0 {
            FanOutClassification::Complete
        } else if self.succeeded == 0 {
            FanOutClassification::Failed
        } else {
            FanOutClassification::Partial
        }
    }
}

#[derive(Debug, Clone)]
pub struct ForwarderConfig {
    pub destination_url: Url,
    pub origin: String,
    pub retry: RetryPolicy,
    pub concurrency: usize,
}

/// Dispatches decoded records to the destination individually, in bounded
/// parallel, each with its own retry budget. One record exhausting its
/// retries never aborts its siblings.
pub struct Forwarder {
    client: TransportClient,
    config: ForwarderConfig,
}

impl Forwarder {
    pub fn new(client: TransportClient, config: ForwarderConfig) -> Self {
        Self { client, config }
    }

    /// Forwards every record of a batch concurrently and waits for all of
    /// them. Results keep the input order for correlation.
    pub async fn fan_out(&self, records: &[TelemetryRecord]) -> ForwardReport {
        if records.is_empty() {
            return ForwardReport::from_outcomes(Vec::new());
        }

        let start = Instant::now();
        let semaphore = Semaphore::new(self.config.concurrency.max(1));

        let dispatches = records.iter().enumerate().map(|(index, record)| {
            let semaphore = &semaphore;
            async move {
                let _permit = semaphore
                    .acquire()
                    .await
                    .expect("forward semaphore should not be closed");
                self.forward_indexed(index, record).await
            }
        });

        let results = join_all(dispatches).await;
        let report = ForwardReport::from_outcomes(results);

        info!(
            total = report.total,
            succeeded = report.succeeded,
            conflicts = report.already_exists,
            failed = report.failed,
            duration_ms = start.elapsed().as_millis() as u64,
            "fan-out complete"
        );
        report
    }

    /// Forwards a single record with the configured retry budget.
    pub async fn forward_one(&self, record: &TelemetryRecord) -> ForwardOutcome {
        self.forward_indexed(0, record).await
    }

    async fn forward_indexed(&self, index: usize, record: &TelemetryRecord) -> ForwardOutcome {
        let container_id = record.container_id().to_string();
        let max_attempts = self.config.retry.max_attempts.max(1);
        let mut attempts = 0;
        let mut last_error;
        let mut last_status;

        loop {
            attempts += 1;
            match self.dispatch(record).await {
                Ok(response) => {
                    let status = response.status();
                    last_status = Some(status.as_u16());

                    if status.is_success() {
                        self.client.counters().record_forward(true, false);
                        return ForwardOutcome {
                            index,
                            container_id,
                            success: true,
                            http_status: last_status,
                            already_exists: false,
                            attempts,
                            error: None,
                        };
                    }
                    if status == StatusCode::CONFLICT {
                        // Destination already holds this record; duplicate
                        // delivery is a success, not an error.
                        debug!(container_id = %container_id, "destination reported duplicate");
                        self.client.counters().record_forward(true, true);
                        return ForwardOutcome {
                            index,
                            container_id,
                            success: true,
                            http_status: last_status,
                            already_exists: true,
                            attempts,
                            error: None,
                        };
                    }
                    if status.is_server_error() {
                        last_error = Some(format!("HTTP {status}"));
                    } else {
                        // Remaining 4xx responses are terminal: the request
                        // itself is unacceptable and retrying cannot fix it.
                        warn!(container_id = %container_id, status = status.as_u16(), "forward rejected");
                        self.client.counters().record_forward(false, false);
                        return ForwardOutcome {
                            index,
                            container_id,
                            success: false,
                            http_status: last_status,
                            already_exists: false,
                            attempts,
                            error: Some(format!("HTTP {status}")),
                        };
                    }
                }
                Err(err) => {
                    last_status = err.status().map(|s| s.as_u16());
                    last_error = Some(err.to_string());
                }
            }

            if attempts >= max_attempts {
                warn!(
                    container_id = %container_id,
                    attempts,
                    error = last_error.as_deref().unwrap_or("unknown"),
                    "forward retries exhausted"
                );
                self.client.counters().record_forward(false, false);
                return ForwardOutcome {
                    index,
                    container_id,
                    success: false,
                    http_status: last_status,
                    already_exists: false,
                    attempts,
                    error: last_error,
                };
            }

            let delay = self.config.retry.delay_for(attempts - 1);
            debug!(
                container_id = %container_id,
                attempt = attempts,
                delay_ms = delay.as_millis() as u64,
                "retrying forward"
            );
            sleep(delay).await;
        }
    }

    async fn dispatch(&self, record: &TelemetryRecord) -> Result<reqwest::Response, reqwest::Error> {
        let request_id = format!("req-{}", Uuid::new_v4());
        let body = serde_json::json!({ "m2m:cin": { "con": record } });

        self.client
            .http()
            .post(self.config.destination_url.clone())
            .header(CONTENT_TYPE, "application/json;ty=4")
            .header(ACCEPT, "application/json")
            .header("X-M2M-RI", request_id)
            .header("X-M2M-Origin", &self.config.origin)
            .json(&body)
            .send()
            .await
    }
}
