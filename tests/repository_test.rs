use cargolink::codec::TelemetryCodec;
use cargolink::domain::{QueueItem, TelemetryRecord};
use cargolink::store::Repository;
use tempfile::TempDir;

fn item(id: &str) -> QueueItem {
    QueueItem::new(TelemetryRecord::with_container_id(id))
}

fn item_at(id: &str, enqueued_at_ms: i64) -> QueueItem {
    QueueItem {
        record: TelemetryRecord::with_container_id(id),
        enqueued_at_ms,
    }
}

#[tokio::test]
async fn batch_insert_persists_all_rows() {
    let repository = Repository::in_memory(TelemetryCodec::new()).await.unwrap();

    let inserted = repository
        .batch_insert(&[item("LMCU0000001"), item("LMCU0000002"), item("LMCU0000003")])
        .await
        .unwrap();

    assert_eq!(inserted, 3);
    assert_eq!(repository.row_count().await.unwrap(), 3);

    let rows = repository.read_all().await.unwrap();
    assert_eq!(rows.len(), 3);
    assert!(rows.iter().all(|r| r.payload_size > 0));
}

#[tokio::test]
async fn failed_batch_commits_nothing() {
    let repository = Repository::in_memory(TelemetryCodec::new()).await.unwrap();
    repository.batch_insert(&[item("LMCU0000001")]).await.unwrap();

    // The store refuses empty container ids; the middle item poisons the
    // whole transaction.
    let batch = [item("LMCU0000002"), item(""), item("LMCU0000003")];
    let result = repository.batch_insert(&batch).await;

    assert!(result.is_err());
    assert_eq!(repository.row_count().await.unwrap(), 1);

    let rows = repository.read_all().await.unwrap();
    assert_eq!(rows[0].container_id, "LMCU0000001");
}

#[tokio::test]
async fn delete_all_reports_count_and_empties_the_store() {
    let repository = Repository::in_memory(TelemetryCodec::new()).await.unwrap();
    repository
        .batch_insert(&[item("LMCU0000001"), item("LMCU0000002")])
        .await
        .unwrap();

    assert_eq!(repository.delete_all().await.unwrap(), 2);
    assert_eq!(repository.row_count().await.unwrap(), 0);
    assert!(repository.read_all().await.unwrap().is_empty());

    // Deleting an already-empty store is harmless.
    assert_eq!(repository.delete_all().await.unwrap(), 0);
}

#[tokio::test]
async fn read_all_returns_newest_first() {
    let repository = Repository::in_memory(TelemetryCodec::new()).await.unwrap();
    repository
        .batch_insert(&[
            item_at("LMCU0000001", 1_000),
            item_at("LMCU0000002", 3_000),
            item_at("LMCU0000003", 2_000),
        ])
        .await
        .unwrap();

    let rows = repository.read_all().await.unwrap();
    let ids: Vec<&str> = rows.iter().map(|r| r.container_id.as_str()).collect();
    assert_eq!(ids, ["LMCU0000002", "LMCU0000003", "LMCU0000001"]);
}

#[tokio::test]
async fn read_container_filters_by_identity() {
    let repository = Repository::in_memory(TelemetryCodec::new()).await.unwrap();
    repository
        .batch_insert(&[
            item("LMCU0000001"),
            item("LMCU0000002"),
            item("LMCU0000001"),
        ])
        .await
        .unwrap();

    let rows = repository.read_container("LMCU0000001").await.unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r.container_id == "LMCU0000001"));

    assert!(repository.read_container("NONE").await.unwrap().is_empty());
}

#[tokio::test]
async fn rows_survive_reopening_a_file_backed_store() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("telemetry.db");
    let codec = TelemetryCodec::new();

    {
        let repository = Repository::connect(&db_path, codec).await.unwrap();
        repository
            .batch_insert(&[item("LMCU0000001"), item("LMCU0000002")])
            .await
            .unwrap();
    }

    let reopened = Repository::connect(&db_path, codec).await.unwrap();
    assert_eq!(reopened.row_count().await.unwrap(), 2);

    // Payloads written before the restart still decode.
    let rows = reopened.read_all().await.unwrap();
    let record = codec.decode_one(&rows[0].payload).unwrap();
    assert!(record.container_id().starts_with("LMCU"));
}

#[tokio::test]
async fn backlog_stats_track_rows_and_bytes() {
    let repository = Repository::in_memory(TelemetryCodec::new()).await.unwrap();

    let empty = repository.backlog_stats().await.unwrap();
    assert_eq!(empty.row_count, 0);
    assert_eq!(empty.payload_bytes, 0);

    repository
        .batch_insert(&[item("LMCU0000001"), item("LMCU0000002")])
        .await
        .unwrap();

    let stats = repository.backlog_stats().await.unwrap();
    assert_eq!(stats.row_count, 2);
    assert!(stats.payload_bytes > 0);
}
