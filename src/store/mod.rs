//! Durable, transactional persistence for compressed telemetry rows.

pub mod repository;

pub use repository::{BacklogStats, PersistedRow, Repository, StoreError};
