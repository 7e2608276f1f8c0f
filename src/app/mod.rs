//! Process bootstrap: configuration, logging, and per-role wiring.
//!
//! A node runs as exactly one of two roles. The collector owns the whole
//! master pipeline (queue, store, drain worker, replication daemon); the
//! relay owns the receive-and-fan-out stack, exposing [`crate::relay::Receiver`]
//! for the route layer to call.

pub mod config;
pub mod tracing;

pub use config::{Config, ConfigError, LogLevel, Role};

use crate::buffer::{DrainWorker, IngestionQueue};
use crate::codec::TelemetryCodec;
use crate::relay::Receiver;
use crate::scheduler::{ReplicationScheduler, SchedulerDaemon};
use crate::sender::{BulkSender, Forwarder, ForwarderConfig, TransportClient, TransportConfig};
use crate::store::Repository;
use ::tracing::{info, warn};
use anyhow::Context;
use std::sync::Arc;

/// Running collector pipeline. The route layer enqueues through `queue`
/// and reads stats from `scheduler` and `repository`; the background
/// workers run until the process exits.
pub struct CollectorNode {
    pub queue: Arc<IngestionQueue>,
    pub repository: Repository,
    pub scheduler: Arc<ReplicationScheduler>,
    pub client: TransportClient,
}

/// Running relay stack. The route layer hands inbound bulk envelopes to
/// `receiver`.
pub struct RelayNode {
    pub receiver: Receiver,
    pub client: TransportClient,
}

fn build_client(config: &Config) -> Result<TransportClient, anyhow::Error> {
    let transport = TransportConfig {
        timeout: config.request_timeout,
        ..TransportConfig::default()
    };
    TransportClient::new(transport).context("failed to build HTTP client")
}

pub async fn start_collector(config: &Config) -> anyhow::Result<CollectorNode> {
    let codec = TelemetryCodec::new();
    let repository = Repository::connect(&config.db_path, codec)
        .await
        .with_context(|| format!("failed to open store at {}", config.db_path.display()))?;

    let queue = Arc::new(
        IngestionQueue::new(config.queue_max_size, config.drain_interval)
            .context("failed to build ingestion queue")?,
    );
    DrainWorker::new(
        queue.clone(),
        repository.clone(),
        config.drain_interval,
        config.batch_max_size,
    )
    .spawn();

    let client = build_client(config)?;
    let peer_url = config.peer_url()?;
    if let Err(err) = client.check_health(&peer_url).await {
        warn!(peer = %peer_url, error = %err, "peer health probe failed, continuing anyway");
    } else {
        info!(peer = %peer_url, "peer is reachable");
    }

    let sender = BulkSender::new(client.clone(), peer_url, config.node_name.clone());
    let scheduler = Arc::new(ReplicationScheduler::new(
        repository.clone(),
        codec,
        Arc::new(sender),
    ));
    SchedulerDaemon::new(scheduler.clone(), config.replication_interval).spawn();

    info!(
        db = %config.db_path.display(),
        queue_capacity = config.queue_max_size,
        replication_interval_hours = config.replication_interval_hours,
        "collector node started"
    );

    Ok(CollectorNode {
        queue,
        repository,
        scheduler,
        client,
    })
}

pub async fn start_relay(config: &Config) -> anyhow::Result<RelayNode> {
    let client = build_client(config)?;
    let destination_url = config.destination_url()?;
    if let Err(err) = client.check_health(&destination_url).await {
        warn!(
            destination = %destination_url,
            error = %err,
            "destination health probe failed, continuing anyway"
        );
    } else {
        info!(destination = %destination_url, "destination is reachable");
    }

    let forwarder = Forwarder::new(
        client.clone(),
        ForwarderConfig {
            destination_url: destination_url.clone(),
            origin: config.forward_origin.clone(),
            retry: config.retry.clone(),
            concurrency: config.forward_concurrency,
        },
    );
    let receiver = Receiver::new(TelemetryCodec::new(), forwarder);

    info!(
        destination = %destination_url,
        concurrency = config.forward_concurrency,
        max_retries = config.retry.max_attempts,
        "relay node started"
    );

    Ok(RelayNode { receiver, client })
}

async fn wait_for_shutdown() -> anyhow::Result<()> {
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("shutdown signal received");
    Ok(())
}

/// Entry point called by the binary.
pub async fn main() -> anyhow::Result<()> {
    let config = Config::from_args(std::env::args()).context("failed to load configuration")?;
    tracing::init_tracing(config.log_level, config.log_json);

    let role = config.node_role()?;
    info!(version = crate::VERSION, role = ?role, "cargolink starting");

    match role {
        Role::Collector => {
            let _node = start_collector(&config).await?;
            wait_for_shutdown().await?;
        }
        Role::Relay => {
            let _node = start_relay(&config).await?;
            wait_for_shutdown().await?;
        }
    }

    info!("cargolink stopped");
    Ok(())
}
