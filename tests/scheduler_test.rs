use async_trait::async_trait;
use cargolink::buffer::{DrainWorker, IngestionQueue};
use cargolink::codec::TelemetryCodec;
use cargolink::domain::TelemetryRecord;
use cargolink::scheduler::{CycleOutcome, ReplicationScheduler};
use cargolink::sender::{BulkPayload, BulkSendResult, BulkTransport, TransportError};
use cargolink::store::Repository;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Notify;

/// Transport stub with a switchable outcome.
struct StubTransport {
    succeed: AtomicBool,
    calls: AtomicUsize,
    last_record_count: AtomicUsize,
}

impl StubTransport {
    fn new(succeed: bool) -> Arc<Self> {
        Arc::new(Self {
            succeed: AtomicBool::new(succeed),
            calls: AtomicUsize::new(0),
            last_record_count: AtomicUsize::new(0),
        })
    }

    fn set_succeed(&self, succeed: bool) {
        self.succeed.store(succeed, Ordering::SeqCst);
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BulkTransport for StubTransport {
    async fn send_bulk(&self, payload: &BulkPayload) -> Result<BulkSendResult, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.last_record_count
            .store(payload.record_count, Ordering::SeqCst);

        if self.succeed.load(Ordering::SeqCst) {
            Ok(BulkSendResult {
                success: true,
                status: 200,
                sent_bytes: payload.bytes.len(),
                latency: Duration::from_millis(1),
            })
        } else {
            Err(TransportError::HttpError {
                status: 502,
                message: "stub refusal".to_string(),
            })
        }
    }
}

/// Transport that parks inside send_bulk until released, to hold a cycle
/// in its Running state.
struct GatedTransport {
    entered: Notify,
    release: Notify,
}

#[async_trait]
impl BulkTransport for GatedTransport {
    async fn send_bulk(&self, payload: &BulkPayload) -> Result<BulkSendResult, TransportError> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok(BulkSendResult {
            success: true,
            status: 200,
            sent_bytes: payload.bytes.len(),
            latency: Duration::from_millis(1),
        })
    }
}

async fn pipeline(transport: Arc<dyn BulkTransport>) -> (Arc<IngestionQueue>, DrainWorker, Repository, ReplicationScheduler) {
    let codec = TelemetryCodec::new();
    let repository = Repository::in_memory(codec).await.unwrap();
    let queue = Arc::new(IngestionQueue::new(100, Duration::from_secs(5)).unwrap());
    let worker = DrainWorker::new(
        queue.clone(),
        repository.clone(),
        Duration::from_secs(5),
        1000,
    );
    let scheduler = ReplicationScheduler::new(repository.clone(), codec, transport);
    (queue, worker, repository, scheduler)
}

fn enqueue_n(queue: &IngestionQueue, start: usize, count: usize) {
    for i in start..start + count {
        queue
            .enqueue(TelemetryRecord::with_container_id(format!("LMCU{i:07}")))
            .unwrap();
    }
}

#[tokio::test]
async fn successful_cycle_ships_and_clears_the_backlog() {
    let transport = StubTransport::new(true);
    let (queue, worker, repository, scheduler) = pipeline(transport.clone()).await;

    enqueue_n(&queue, 0, 3);
    worker.drain_once().await;
    assert_eq!(repository.row_count().await.unwrap(), 3);

    let report = scheduler.run_cycle().await;

    assert_eq!(report.outcome, CycleOutcome::Completed);
    assert_eq!(report.rows_seen, 3);
    assert_eq!(report.records_sent, 3);
    assert_eq!(report.deleted_rows, 3);
    assert_eq!(repository.row_count().await.unwrap(), 0);
    assert_eq!(transport.last_record_count.load(Ordering::SeqCst), 3);

    let stats = scheduler.stats();
    assert_eq!(stats.total_runs, 1);
    assert_eq!(stats.successful_runs, 1);
    assert_eq!(stats.failed_runs, 0);
    assert_eq!(stats.total_containers_processed, 3);
    assert_eq!(stats.total_data_cleaned, 3);
    assert_eq!(stats.cleanup_operations, 1);
    assert!(stats.last_run.is_some());
}

#[tokio::test]
async fn failed_transmission_retains_every_row() {
    let transport = StubTransport::new(false);
    let (queue, worker, repository, scheduler) = pipeline(transport.clone()).await;

    enqueue_n(&queue, 0, 3);
    worker.drain_once().await;

    let report = scheduler.run_cycle().await;

    assert_eq!(report.outcome, CycleOutcome::TransmissionFailed);
    assert_eq!(transport.calls(), 1);
    assert_eq!(repository.row_count().await.unwrap(), 3);

    let stats = scheduler.stats();
    assert_eq!(stats.total_runs, 1);
    assert_eq!(stats.failed_runs, 1);
    assert_eq!(stats.successful_runs, 0);
    assert_eq!(stats.cleanup_operations, 0);
    assert_eq!(stats.total_containers_processed, 0);
}

#[tokio::test]
async fn next_cycle_ships_the_union_of_old_and_new_backlog() {
    let transport = StubTransport::new(false);
    let (queue, worker, repository, scheduler) = pipeline(transport.clone()).await;

    enqueue_n(&queue, 0, 3);
    worker.drain_once().await;
    scheduler.run_cycle().await;
    assert_eq!(repository.row_count().await.unwrap(), 3);

    // Two more arrive while the peer is down.
    enqueue_n(&queue, 3, 2);
    worker.drain_once().await;
    assert_eq!(repository.row_count().await.unwrap(), 5);

    transport.set_succeed(true);
    let report = scheduler.run_cycle().await;

    assert_eq!(report.outcome, CycleOutcome::Completed);
    assert_eq!(report.records_sent, 5);
    assert_eq!(report.deleted_rows, 5);
    assert_eq!(transport.last_record_count.load(Ordering::SeqCst), 5);
    assert_eq!(repository.row_count().await.unwrap(), 0);

    let stats = scheduler.stats();
    assert_eq!(stats.total_runs, 2);
    assert_eq!(stats.successful_runs, 1);
    assert_eq!(stats.failed_runs, 1);
    assert_eq!(stats.total_data_cleaned, 5);
}

#[tokio::test]
async fn empty_backlog_is_a_successful_noop() {
    let transport = StubTransport::new(true);
    let (_queue, _worker, _repository, scheduler) = pipeline(transport.clone()).await;

    let report = scheduler.run_cycle().await;

    assert_eq!(report.outcome, CycleOutcome::EmptyBacklog);
    assert_eq!(transport.calls(), 0);

    let stats = scheduler.stats();
    assert_eq!(stats.total_runs, 1);
    assert_eq!(stats.successful_runs, 1);
    assert_eq!(stats.total_containers_processed, 0);
}

#[tokio::test]
async fn overlapping_invocation_is_skipped_not_queued() {
    let gated = Arc::new(GatedTransport {
        entered: Notify::new(),
        release: Notify::new(),
    });
    let codec = TelemetryCodec::new();
    let repository = Repository::in_memory(codec).await.unwrap();
    let queue = IngestionQueue::new(10, Duration::from_secs(5)).unwrap();
    enqueue_n(&queue, 0, 1);
    repository.batch_insert(&queue.take_all()).await.unwrap();

    let scheduler = Arc::new(ReplicationScheduler::new(
        repository.clone(),
        codec,
        gated.clone(),
    ));

    let background = {
        let scheduler = scheduler.clone();
        tokio::spawn(async move { scheduler.run_cycle().await })
    };

    // Wait until the first cycle is parked inside the transport.
    gated.entered.notified().await;
    let second = scheduler.run_cycle().await;
    assert_eq!(second.outcome, CycleOutcome::Skipped);

    gated.release.notify_one();
    let first = background.await.unwrap();
    assert_eq!(first.outcome, CycleOutcome::Completed);

    // The skip is not counted as a run.
    let stats = scheduler.stats();
    assert_eq!(stats.total_runs, 1);
    assert_eq!(stats.successful_runs, 1);
}
