//! Domain layer for cargolink.
//!
//! Contains the canonical types shared across all modules:
//! - `TelemetryRecord`: the pipeline's core data type
//! - `QueueItem`: a record staged for batch persistence

pub mod record;

pub use record::{MissingContainerId, QueueItem, TelemetryRecord};
