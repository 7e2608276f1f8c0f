use super::client::{TransportClient, TransportError, endpoint_url};
use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{info, warn};
use url::Url;

/// One compressed backlog ready to ship. Constructed fresh for every
/// transmission and dropped as soon as the cycle finishes.
#[derive(Debug, Clone)]
pub struct BulkPayload {
    pub bytes: Vec<u8>,
    pub original_size: u64,
    pub record_count: usize,
    pub produced_at: DateTime<Utc>,
}

impl BulkPayload {
    pub fn new(bytes: Vec<u8>, original_size: u64, record_count: usize) -> Self {
        Self {
            bytes,
            original_size,
            record_count,
            produced_at: Utc::now(),
        }
    }

    pub fn compressed_size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Original-to-compressed size factor, rounded to two decimals.
    /// An empty payload reports `1.0` (no compression took place).
    pub fn compression_ratio(&self) -> f64 {
        let compressed = self.compressed_size();
        if compressed == 0 {
            return 1.0;
        }
        let factor = self.original_size as f64 / compressed as f64;
        (factor * 100.0).round() / 100.0
    }

    pub fn to_envelope(&self, source_node: &str) -> BulkEnvelope {
        BulkEnvelope {
            compressed_data: STANDARD.encode(&self.bytes),
            metadata: BulkMetadata {
                timestamp: self
                    .produced_at
                    .to_rfc3339_opts(SecondsFormat::Millis, true),
                source_node: source_node.to_string(),
                original_size: self.original_size,
                compressed_size: self.compressed_size(),
                compression_ratio: self.compression_ratio(),
                container_count: self.record_count,
            },
        }
    }
}

/// JSON body of a bulk replication POST.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkEnvelope {
    pub compressed_data: String,
    pub metadata: BulkMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkMetadata {
    pub timestamp: String,
    pub source_node: String,
    pub original_size: u64,
    pub compressed_size: u64,
    pub compression_ratio: f64,
    pub container_count: usize,
}

#[derive(Debug, Clone)]
pub struct BulkSendResult {
    pub success: bool,
    pub status: u16,
    pub sent_bytes: usize,
    pub latency: Duration,
}

/// Outbound seam for the replication cycle. The scheduler only ever sees
/// this trait, so tests can substitute deterministic outcomes.
#[async_trait]
pub trait BulkTransport: Send + Sync {
    async fn send_bulk(&self, payload: &BulkPayload) -> Result<BulkSendResult, TransportError>;
}

/// Ships the whole compressed backlog to the peer in one request. No retry
/// at this level: a failed cycle keeps its rows and retries on the next
/// tick.
pub struct BulkSender {
    client: TransportClient,
    peer_url: Url,
    source_node: String,
}

impl BulkSender {
    pub fn new(client: TransportClient, peer_url: Url, source_node: impl Into<String>) -> Self {
        Self {
            client,
            peer_url,
            source_node: source_node.into(),
        }
    }
}

#[async_trait]
impl BulkTransport for BulkSender {
    async fn send_bulk(&self, payload: &BulkPayload) -> Result<BulkSendResult, TransportError> {
        let url = endpoint_url(&self.peer_url, "api/receive-compressed");
        let envelope = payload.to_envelope(&self.source_node);
        let sent_bytes = payload.bytes.len();

        let start = Instant::now();
        let response = match self.client.http().post(url).json(&envelope).send().await {
            Ok(response) => response,
            Err(err) => {
                self.client.counters().record_bulk(false, 0);
                return Err(TransportError::NetworkError(err));
            }
        };
        let latency = start.elapsed();

        let status = response.status().as_u16();
        let success = response.status().is_success();
        self.client.counters().record_bulk(success, sent_bytes as u64);

        if success {
            info!(
                records = payload.record_count,
                bytes = sent_bytes,
                ratio = payload.compression_ratio(),
                latency_ms = latency.as_millis() as u64,
                "bulk payload delivered"
            );
        } else {
            warn!(
                records = payload.record_count,
                status, "bulk payload rejected by peer"
            );
        }

        Ok(BulkSendResult {
            success,
            status,
            sent_bytes,
            latency,
        })
    }
}
