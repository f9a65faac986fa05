use crate::helpers::{station, test_logger, MemoryStore, ScriptedSource};
use airkorea_daemon::{
    stream_id, EntityRef, Error, GeoPoint, ObservedPropertyState, Pollutant, Station, StationSync,
    SyncPhase, THING_DESCRIPTION,
};
use std::sync::Arc;

fn station_sync(store: &Arc<MemoryStore>, source: &Arc<ScriptedSource>) -> StationSync {
    StationSync::new(test_logger(), store.clone(), source.clone())
}

#[tokio::test]
async fn fresh_store_gets_full_graph_for_one_station() {
    let store = Arc::new(MemoryStore::new());
    let source = Arc::new(ScriptedSource::with_stations(vec![station(
        "서울역", "127.0", "37.5",
    )]));

    let report = station_sync(&store, &source).refresh().await;
    assert_eq!(report.phase, SyncPhase::Done);
    assert!(report.tally.is_clean());

    // ObservedProperties are posted without an id, the store assigns one
    let mut expected = vec![String::from("create ObservedProperties(new)"); 6];
    expected.push(String::from("create Locations(1)"));
    expected.push(String::from("create Things(1)"));
    for id in 1..=6 {
        expected.push(format!("create Sensors({})", id));
        expected.push(format!("create Datastreams({})", id));
    }
    expected.push(String::from("create FeaturesOfInterest(1)"));
    assert_eq!(store.writes().await, expected);

    let thing = store.thing_named("서울역").await.unwrap();
    assert_eq!(thing.id, Some(1));
    assert_eq!(thing.description, THING_DESCRIPTION);
    assert!(thing.properties.available);
    assert_eq!(thing.datastreams.len(), 6);

    let location = store.location(1).await.unwrap();
    assert_eq!(
        location.location.and_then(|f| f.point()),
        Some(GeoPoint::new(37.5, 127.0))
    );
    assert_eq!(store.feature(1).await.unwrap().name, "서울역 측정소");
}

#[tokio::test]
async fn refresh_twice_is_idempotent() {
    let store = Arc::new(MemoryStore::new());
    let source = Arc::new(ScriptedSource::with_stations(vec![
        station("가", "127.0", "37.5"),
        station("나", "127.1", "37.6"),
    ]));
    let mut sync = station_sync(&store, &source);

    let first = sync.refresh().await;
    let counts = store.counts().await;
    let second = sync.refresh().await;

    assert_eq!(store.counts().await, counts);
    assert_eq!(counts, [2, 2, 12, 6, 12, 2, 0]);
    assert_eq!(first.tally.created, 6 + 2 * 15);
    assert_eq!(second.tally.created, 0);
    assert_eq!(second.tally.updated, 2 * 15);
    assert_eq!(second.invalidated, 2);
    assert_eq!(store.thing_named("나").await.unwrap().id, Some(2));
    assert!(matches!(
        sync.observed_property_state(),
        ObservedPropertyState::Bootstrapped(_)
    ));
}

#[tokio::test]
async fn delisted_station_stays_unavailable() {
    let store = Arc::new(MemoryStore::new());
    let source = Arc::new(ScriptedSource::with_stations(vec![
        station("가", "127.0", "37.5"),
        station("나", "127.1", "37.6"),
    ]));
    let mut sync = station_sync(&store, &source);
    sync.refresh().await;

    source.set_stations(vec![station("가", "127.0", "37.5")]).await;
    let report = sync.refresh().await;

    assert!(report.tally.is_clean());
    assert!(store.thing_named("가").await.unwrap().properties.available);
    let delisted = store.thing_named("나").await.unwrap();
    assert!(!delisted.properties.available);
    assert_eq!(delisted.datastreams.len(), 6);
}

#[tokio::test]
async fn station_without_coordinates_has_no_location_or_feature() {
    let store = Arc::new(MemoryStore::new());
    let source = Arc::new(ScriptedSource::with_stations(vec![station("백령도", "", "")]));

    let report = station_sync(&store, &source).refresh().await;

    assert!(report.tally.is_clean());
    assert_eq!(store.counts().await, [1, 0, 6, 6, 6, 0, 0]);
    let thing = store.thing_named("백령도").await.unwrap();
    assert!(thing.locations.is_empty());
    assert_eq!(thing.datastreams.len(), 6);
}

#[tokio::test]
async fn new_station_continues_after_highest_thing_id() {
    let store = Arc::new(MemoryStore::new());
    let source = Arc::new(ScriptedSource::with_stations(vec![
        station("가", "127.0", "37.5"),
        station("나", "127.1", "37.6"),
    ]));
    let mut sync = station_sync(&store, &source);
    sync.refresh().await;

    source
        .set_stations(vec![
            station("가", "127.0", "37.5"),
            station("나", "127.1", "37.6"),
            station("다", "127.2", "37.7"),
        ])
        .await;
    store.clear_writes().await;
    let report = sync.refresh().await;

    assert_eq!(report.tally.created, 15);
    let thing = store.thing_named("다").await.unwrap();
    assert_eq!(thing.id, Some(3));
    let datastream_ids: Vec<Option<i64>> = thing.datastreams.iter().map(|ds| ds.id).collect();
    let expected: Vec<Option<i64>> = Pollutant::ALL
        .into_iter()
        .map(|p| Some(stream_id(3, p)))
        .collect();
    assert_eq!(datastream_ids, expected);
    assert!(!store
        .writes()
        .await
        .iter()
        .any(|w| w.starts_with("create ObservedProperties")));
}

#[tokio::test]
async fn initial_load_skips_when_counts_match() {
    let store = Arc::new(MemoryStore::new());
    let source = Arc::new(ScriptedSource::with_stations(vec![
        station("가", "127.0", "37.5"),
        station("나", "127.1", "37.6"),
    ]));

    let first = station_sync(&store, &source).initial_load().await;
    assert!(!first.short_circuited);
    assert_eq!(first.phase, SyncPhase::Done);
    assert_eq!(store.counts().await[0], 2);

    store.clear_writes().await;
    let second = station_sync(&store, &source).initial_load().await;
    assert!(second.short_circuited);
    assert!(store.writes().await.is_empty());
}

#[tokio::test]
async fn initial_load_only_compares_counts() {
    let store = Arc::new(MemoryStore::new());
    let source = Arc::new(ScriptedSource::with_stations(vec![station("가", "127.0", "37.5")]));
    station_sync(&store, &source).initial_load().await;

    // same number of stations, different membership
    source.set_stations(vec![station("나", "127.1", "37.6")]).await;
    let report = station_sync(&store, &source).initial_load().await;

    assert!(report.short_circuited);
    assert!(store.thing_named("나").await.is_none());
}

#[tokio::test]
async fn upstream_outage_leaves_things_available() {
    let store = Arc::new(MemoryStore::new());
    let source = Arc::new(ScriptedSource::with_stations(vec![
        station("가", "127.0", "37.5"),
        station("나", "127.1", "37.6"),
    ]));
    let mut sync = station_sync(&store, &source);
    sync.refresh().await;

    source
        .fail_listing(Error::UpstreamFetch(String::from("resultCode 30")))
        .await;
    store.clear_writes().await;
    let report = sync.refresh().await;

    assert_eq!(report.phase, SyncPhase::Uninitialized);
    assert_eq!(report.invalidated, 0);
    assert!(store.writes().await.is_empty());
    assert!(store.thing_named("가").await.unwrap().properties.available);
    assert!(store.thing_named("나").await.unwrap().properties.available);
}

#[tokio::test]
async fn invalidation_pages_past_the_first_hundred_things() {
    let store = Arc::new(MemoryStore::new());
    let stations: Vec<Station> = (0..130)
        .map(|i| station(&format!("측정소{:03}", i), "127.0", "37.5"))
        .collect();
    let source = Arc::new(ScriptedSource::with_stations(stations));
    let mut sync = station_sync(&store, &source);
    assert!(sync.refresh().await.tally.is_clean());

    source
        .set_stations(vec![station("측정소000", "127.0", "37.5")])
        .await;
    store.clear_invalidation_skips().await;
    let report = sync.refresh().await;

    assert_eq!(report.invalidated, 130);
    assert_eq!(store.invalidation_skips().await, vec![Some(0), Some(100)]);
    assert!(store.thing_named("측정소000").await.unwrap().properties.available);
    for i in 1..130 {
        let thing = store.thing_named(&format!("측정소{:03}", i)).await.unwrap();
        assert!(!thing.properties.available, "{} still available", thing.name);
    }
}

#[tokio::test]
async fn server_assigned_ids_flow_into_links() {
    let store = Arc::new(MemoryStore::with_server_ids(1001));
    let source = Arc::new(ScriptedSource::with_stations(vec![station(
        "서울역", "127.0", "37.5",
    )]));
    let mut sync = station_sync(&store, &source);

    let report = sync.refresh().await;
    assert_eq!(report.phase, SyncPhase::Done);

    // ObservedProperties took 1001..=1006, the Location 1007
    let thing = store.thing_named("서울역").await.unwrap();
    assert_eq!(thing.id, Some(1008));
    assert_eq!(thing.locations, vec![EntityRef::new(1007)]);
    assert!(store.location(1007).await.is_some());
    assert_eq!(thing.datastreams.len(), 6);
    for datastream in &thing.datastreams {
        let pollutant = Pollutant::from_datastream_name(&datastream.name).unwrap();
        let sensor_id = datastream.sensor.unwrap().id;
        let sensor = store.sensor(sensor_id).await.unwrap();
        assert_eq!(sensor.name, format!("서울역:{}", pollutant.label()));
    }

    let counts = store.counts().await;
    store.clear_writes().await;
    let second = sync.refresh().await;

    assert_eq!(store.counts().await, counts);
    let writes = store.writes().await;
    for datastream in &thing.datastreams {
        let id = datastream.id.unwrap();
        assert!(writes.contains(&format!("update Datastreams({})", id)));
    }
    // the FeatureOfInterest is still addressed by the Thing ID, which this store never issued
    assert_eq!(second.tally.updated, 14);
    assert_eq!(second.tally.failures.len(), 1);
}
