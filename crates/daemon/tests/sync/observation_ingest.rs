use crate::helpers::{reading, station, test_logger, MemoryStore, ScriptedSource};
use airkorea_daemon::{stream_id, ObservationIngest, Pollutant, StationSync};
use serde_json::json;
use std::sync::Arc;
use time::macros::datetime;

async fn synced_store(source: &Arc<ScriptedSource>) -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    let report = StationSync::new(test_logger(), store.clone(), source.clone())
        .refresh()
        .await;
    assert!(report.tally.is_clean());
    store
}

fn ingest(store: &Arc<MemoryStore>, source: &Arc<ScriptedSource>) -> ObservationIngest {
    ObservationIngest::new(test_logger(), store.clone(), source.clone())
}

#[tokio::test]
async fn same_hour_is_written_once_per_datastream() {
    let source = Arc::new(ScriptedSource::with_stations(vec![station(
        "서울역", "127.0", "37.5",
    )]));
    source
        .set_reading("서울역", reading("2024-03-01 10:00", "45"))
        .await;
    let store = synced_store(&source).await;
    let ingest = ingest(&store, &source);

    let first = ingest.ingest_latest().await;
    assert_eq!(first.created, 6);

    source
        .set_reading("서울역", reading("2024-03-01 10:00", "120"))
        .await;
    let second = ingest.ingest_latest().await;
    assert_eq!(second.created, 0);
    assert_eq!(second.updated, 6);

    let pm10 = store.observations_of(stream_id(1, Pollutant::Pm10)).await;
    assert_eq!(pm10.len(), 1);
    assert_eq!(pm10[0].result, json!({"value": "120", "grade": "3"}));
    assert_eq!(pm10[0].result_time, Some(datetime!(2024-03-01 10:00 +9)));
}

#[tokio::test]
async fn next_hour_appends_observation() {
    let source = Arc::new(ScriptedSource::with_stations(vec![station(
        "서울역", "127.0", "37.5",
    )]));
    source
        .set_reading("서울역", reading("2024-03-01 10:00", "45"))
        .await;
    let store = synced_store(&source).await;
    let ingest = ingest(&store, &source);
    ingest.ingest_latest().await;

    source
        .set_reading("서울역", reading("2024-03-01 11:00", "50"))
        .await;
    let tally = ingest.ingest_latest().await;

    assert_eq!(tally.created, 6);
    let no2 = store.observations_of(stream_id(1, Pollutant::No2)).await;
    assert_eq!(no2.len(), 2);
    assert!(no2
        .iter()
        .all(|o| o.feature_of_interest.map(|f| f.id) == Some(1)));
}

#[tokio::test]
async fn station_without_thing_is_skipped() {
    let source = Arc::new(ScriptedSource::with_stations(vec![station(
        "서울역", "127.0", "37.5",
    )]));
    let store = synced_store(&source).await;

    source
        .set_stations(vec![
            station("서울역", "127.0", "37.5"),
            station("미등록", "127.1", "37.6"),
        ])
        .await;
    source
        .set_reading("미등록", reading("2024-03-01 10:00", "45"))
        .await;

    let tally = ingest(&store, &source).ingest_latest().await;
    assert!(tally.is_clean());
    assert_eq!(tally.created, 0);
    assert_eq!(store.counts().await[6], 0);
}

#[tokio::test]
async fn backfill_covers_previous_day_then_latest_follows() {
    let source = Arc::new(ScriptedSource::with_stations(vec![station(
        "서울역", "127.0", "37.5",
    )]));
    source
        .set_reading("서울역", reading("2024-03-01 10:00", "45"))
        .await;
    let store = synced_store(&source).await;
    let ingest = ingest(&store, &source);

    let backfill = ingest.backfill_day().await;
    assert!(backfill.is_clean());
    assert_eq!(backfill.created, 24 * 6);
    assert_eq!(source.reading_fetches().await, 24);

    let pm25 = store.observations_of(stream_id(1, Pollutant::Pm25)).await;
    assert_eq!(pm25.len(), 24);
    assert_eq!(pm25[0].result_time, Some(datetime!(2024-02-29 10:00 +9)));
    assert_eq!(pm25[23].result_time, Some(datetime!(2024-03-01 09:00 +9)));

    let latest = ingest.ingest_latest().await;
    assert_eq!(latest.created, 6);
    assert_eq!(
        store.observations_of(stream_id(1, Pollutant::Pm25)).await.len(),
        25
    );
}

#[tokio::test]
async fn missing_reading_writes_nothing() {
    let source = Arc::new(ScriptedSource::with_stations(vec![station(
        "서울역", "127.0", "37.5",
    )]));
    let store = synced_store(&source).await;

    let tally = ingest(&store, &source).ingest_latest().await;
    assert!(tally.is_clean());
    assert_eq!(store.counts().await[6], 0);
}
