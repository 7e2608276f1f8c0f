//! Inbound boundary of the relay node.
//!
//! The route layer hands a parsed [`BulkEnvelope`] to [`Receiver::handle_bulk`];
//! everything after that (base64, decompression, fan-out) happens here. A
//! payload that cannot be decoded is rejected as a whole, since nothing in
//! it is salvageable; once decoded, delivery failures are per record and
//! reported, never raised.

use crate::codec::{CodecError, TelemetryCodec};
use crate::sender::{BulkEnvelope, ForwardReport, Forwarder};
use base64::{Engine, engine::general_purpose::STANDARD};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Compressed data is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("Bulk payload decode error: {0}")]
    Codec(#[from] CodecError),
}

/// What the relay did with one inbound batch, returned to the route layer
/// for the HTTP response body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkReceipt {
    pub source_node: String,
    pub compressed_bytes: usize,
    pub decoded_records: usize,
    pub forward: ForwardReport,
}

/// Decodes inbound bulk payloads and fans the records out downstream.
pub struct Receiver {
    codec: TelemetryCodec,
    forwarder: Forwarder,
}

impl Receiver {
    pub fn new(codec: TelemetryCodec, forwarder: Forwarder) -> Self {
        Self { codec, forwarder }
    }

    /// Processes one inbound compressed batch end to end. Returns the
    /// per-record delivery report; decode failures reject the whole batch
    /// so the sender keeps its backlog and retries.
    pub async fn handle_bulk(&self, envelope: BulkEnvelope) -> Result<BulkReceipt, RelayError> {
        let compressed = STANDARD.decode(&envelope.compressed_data)?;
        let records = self.codec.decode_many(&compressed)?;

        if records.len() != envelope.metadata.container_count {
            warn!(
                declared = envelope.metadata.container_count,
                decoded = records.len(),
                source = %envelope.metadata.source_node,
                "bulk metadata count does not match decoded records"
            );
        }

        info!(
            source = %envelope.metadata.source_node,
            compressed_bytes = compressed.len(),
            records = records.len(),
            "received bulk payload, forwarding"
        );

        let forward = self.forwarder.fan_out(&records).await;

        Ok(BulkReceipt {
            source_node: envelope.metadata.source_node,
            compressed_bytes: compressed.len(),
            decoded_records: records.len(),
            forward,
        })
    }
}
