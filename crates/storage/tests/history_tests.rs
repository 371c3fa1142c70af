//! History store behavior against an in-memory object store.

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate, Utc};

use agri_common::{HealthLabel, IndexStatistics, ProcessingSummary, ResultRecord, SpectralIndex};
use storage::{HistoryStore, LogEntry, ObjectStorage, DEFAULT_LOG_CAPACITY};

fn record(scene_id: &str, date: NaiveDate, ndvi_mean: f64) -> ResultRecord {
    let mut statistics = BTreeMap::new();
    statistics.insert(
        SpectralIndex::Ndvi,
        IndexStatistics {
            mean: ndvi_mean,
            std: 0.05,
            min: ndvi_mean - 0.1,
            max: ndvi_mean + 0.1,
            count: 100,
            vegetation_pixels: Some(60),
        },
    );
    ResultRecord {
        scene_id: scene_id.to_string(),
        scene_date: date,
        cloud_cover: 2.5,
        statistics,
        summary: ProcessingSummary {
            vegetation_health: if ndvi_mean >= 0.3 {
                HealthLabel::Good
            } else {
                HealthLabel::Poor
            },
            vegetation_coverage: 60.0,
            processing_timestamp: Utc::now(),
            data_size: "Small AOI (1km²)".to_string(),
        },
    }
}

fn base_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
}

#[tokio::test]
async fn test_full_log_drops_oldest_and_appends_newest() {
    let store = HistoryStore::new(ObjectStorage::in_memory());

    for i in 0..DEFAULT_LOG_CAPACITY {
        let date = base_date() + Duration::days(i as i64 * 5);
        store
            .persist(&record(&format!("scene-{:02}", i), date, 0.4))
            .await
            .unwrap();
    }
    let before = store.read_log().await.unwrap();
    assert_eq!(before.len(), DEFAULT_LOG_CAPACITY);

    let newest = record("scene-new", base_date() + Duration::days(200), 0.25);
    store.persist(&newest).await.unwrap();

    let after = store.read_log().await.unwrap();
    assert_eq!(after.len(), DEFAULT_LOG_CAPACITY);
    assert_eq!(after.scenes[0].scene_id, "scene-01");
    assert_eq!(after.latest().unwrap(), &LogEntry::from(&newest));
    assert_eq!(after.latest().unwrap().vegetation_health, HealthLabel::Poor);
}

#[tokio::test]
async fn test_log_keeps_append_order_not_date_order() {
    let store = HistoryStore::new(ObjectStorage::in_memory());

    store
        .persist(&record("later", base_date() + Duration::days(30), 0.4))
        .await
        .unwrap();
    store
        .persist(&record("earlier", base_date(), 0.4))
        .await
        .unwrap();

    let log = store.read_log().await.unwrap();
    let ids: Vec<_> = log.scenes.iter().map(|e| e.scene_id.as_str()).collect();
    assert_eq!(ids, vec!["later", "earlier"]);
}

#[tokio::test]
async fn test_custom_capacity() {
    let store = HistoryStore::with_capacity(ObjectStorage::in_memory(), 3);
    for i in 0..5 {
        store
            .persist(&record(&format!("s{}", i), base_date(), 0.5))
            .await
            .unwrap();
    }
    let log = store.read_log().await.unwrap();
    let ids: Vec<_> = log.scenes.iter().map(|e| e.scene_id.as_str()).collect();
    assert_eq!(ids, vec!["s2", "s3", "s4"]);
}

/// Two invocations interleave their read-modify-write of the shared log.
/// The log has no version token, so the second write clobbers the first.
#[tokio::test]
async fn test_interleaved_updates_lose_one_entry() {
    let storage = ObjectStorage::in_memory();
    let first = HistoryStore::new(storage.clone());
    let second = HistoryStore::new(storage);

    first
        .persist(&record("existing", base_date(), 0.4))
        .await
        .unwrap();

    let record_a = record("invocation-a", base_date() + Duration::days(1), 0.41);
    let record_b = record("invocation-b", base_date() + Duration::days(2), 0.42);

    // Both read before either writes.
    let mut log_a = first.read_log().await.unwrap();
    let mut log_b = second.read_log().await.unwrap();

    first.write_record(&record_a).await.unwrap();
    second.write_record(&record_b).await.unwrap();

    log_a.append(LogEntry::from(&record_a), first.capacity());
    first.write_log(&log_a).await.unwrap();

    log_b.append(LogEntry::from(&record_b), second.capacity());
    second.write_log(&log_b).await.unwrap();

    let log = first.read_log().await.unwrap();
    let ids: Vec<_> = log.scenes.iter().map(|e| e.scene_id.as_str()).collect();
    assert_eq!(ids, vec!["existing", "invocation-b"]);

    // Both records are durable even though the log lost one entry.
    assert!(first
        .storage()
        .exists("results/2024-01-02/invocation-a.json")
        .await
        .unwrap());
    assert!(first
        .storage()
        .exists("results/2024-01-03/invocation-b.json")
        .await
        .unwrap());
}
