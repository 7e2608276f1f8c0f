//! Network boundary: bulk replication, per-record fan-out, health probes.

pub mod bulk;
pub mod client;
pub mod forward;
pub mod retry;
pub mod stats;

pub use bulk::{BulkEnvelope, BulkMetadata, BulkPayload, BulkSendResult, BulkSender, BulkTransport};
pub use client::{TransportClient, TransportConfig, TransportError};
pub use forward::{FanOutClassification, ForwardOutcome, ForwardReport, Forwarder, ForwarderConfig};
pub use retry::RetryPolicy;
pub use stats::{TransportStats, TransportStatsSnapshot};
