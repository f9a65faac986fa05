use std::sync::Arc;

use slog::{debug, info, warn, Logger};

use crate::{
    count_things, find_location, find_observed_property, find_thing, max_thing_id,
    AirQualitySource, Entity, EntityGraph, Error, Filter, GeoPoint, GraphIds, ObservedProperty,
    ObservedPropertyIds, OrderBy, Pollutant, Query, SensorThingsStore, Station, Tally, Thing,
    ThingIdCounter, WrittenIds, THING_DESCRIPTION,
};

const INVALIDATION_PAGE: u32 = 100;

/// How far a station pass got. Phases only move forward.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum SyncPhase {
    #[default]
    Uninitialized,
    PropertiesBootstrapped,
    ThingsInvalidated,
    /// Every station was attempted but some writes failed
    PerStationUpserted,
    /// Every station was attempted and nothing failed
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObservedPropertyState {
    Uninitialized,
    Bootstrapped(ObservedPropertyIds),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StationSyncReport {
    pub phase: SyncPhase,
    pub stations: usize,
    pub invalidated: usize,
    /// Initial load found the store already holding every station
    pub short_circuited: bool,
    pub tally: Tally,
}

impl std::fmt::Display for StationSyncReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:?} after {} stations, {} invalidated, {}",
            self.phase, self.stations, self.invalidated, self.tally
        )?;
        if self.short_circuited {
            write!(f, " (store already complete)")?;
        }
        Ok(())
    }
}

#[derive(Clone, Copy)]
enum WriteMode {
    Create,
    Update,
}

pub struct StationSync {
    logger: Logger,
    store: Arc<dyn SensorThingsStore>,
    source: Arc<dyn AirQualitySource>,
    observed_properties: ObservedPropertyState,
}

impl StationSync {
    pub fn new(
        logger: Logger,
        store: Arc<dyn SensorThingsStore>,
        source: Arc<dyn AirQualitySource>,
    ) -> Self {
        Self {
            logger,
            store,
            source,
            observed_properties: ObservedPropertyState::Uninitialized,
        }
    }

    pub fn observed_property_state(&self) -> ObservedPropertyState {
        self.observed_properties
    }

    /// Mark every known station unavailable, then upsert the current upstream
    /// list so only listed stations end up available again.
    pub async fn refresh(&mut self) -> StationSyncReport {
        let mut report = StationSyncReport::default();
        let Some(stations) = self.stations(&mut report).await else {
            return report;
        };
        let Some(observed) = self.bootstrap_observed_properties(&mut report.tally).await else {
            return report;
        };
        report.phase = SyncPhase::PropertiesBootstrapped;

        self.invalidate_things(&mut report).await;
        report.phase = SyncPhase::ThingsInvalidated;

        self.upsert_stations(&stations, &observed, &mut report).await;
        info!(self.logger, "station refresh finished: {}", report);
        report
    }

    /// First-run load. Skipped when the store already holds as many station
    /// Things as upstream lists; only the count is compared.
    pub async fn initial_load(&mut self) -> StationSyncReport {
        let mut report = StationSyncReport::default();
        let Some(stations) = self.stations(&mut report).await else {
            return report;
        };

        match count_things(self.store.as_ref(), THING_DESCRIPTION).await {
            Ok(count) if count == stations.len() as u64 => {
                info!(
                    self.logger,
                    "store already holds {} stations, skipping initial load", count
                );
                report.short_circuited = true;
                report.phase = SyncPhase::Done;
                return report;
            }
            Ok(count) => info!(
                self.logger,
                "store holds {} of {} stations, loading",
                count,
                stations.len()
            ),
            Err(err) => report
                .tally
                .record_failure(&self.logger, "counting station Things", err),
        }

        let Some(observed) = self.bootstrap_observed_properties(&mut report.tally).await else {
            return report;
        };
        report.phase = SyncPhase::PropertiesBootstrapped;

        self.upsert_stations(&stations, &observed, &mut report).await;
        info!(self.logger, "initial station load finished: {}", report);
        report
    }

    async fn stations(&self, report: &mut StationSyncReport) -> Option<Vec<Station>> {
        match self.source.list_stations().await {
            Ok(stations) => {
                info!(self.logger, "upstream lists {} stations", stations.len());
                report.stations = stations.len();
                Some(stations)
            }
            Err(err) => {
                report
                    .tally
                    .record_failure(&self.logger, "listing stations", err);
                None
            }
        }
    }

    /// Resolves the six ObservedProperties once per process. The state only
    /// flips when every one of them resolved.
    async fn bootstrap_observed_properties(
        &mut self,
        tally: &mut Tally,
    ) -> Option<ObservedPropertyIds> {
        if let ObservedPropertyState::Bootstrapped(ids) = self.observed_properties {
            debug!(self.logger, "observed properties already bootstrapped");
            return Some(ids);
        }

        let mut ids = [0; 6];
        let mut complete = true;
        for (slot, pollutant) in ids.iter_mut().zip(Pollutant::ALL) {
            match self.resolve_observed_property(pollutant, tally).await {
                Ok(id) => *slot = id,
                Err(err) => {
                    complete = false;
                    tally.record_failure(
                        &self.logger,
                        format!("ObservedProperty {}", pollutant.observed_property_name()),
                        err,
                    );
                }
            }
        }
        if !complete {
            warn!(self.logger, "observed properties incomplete, skipping station pass");
            return None;
        }

        let ids = ObservedPropertyIds::new(ids);
        self.observed_properties = ObservedPropertyState::Bootstrapped(ids);
        Some(ids)
    }

    async fn resolve_observed_property(
        &self,
        pollutant: Pollutant,
        tally: &mut Tally,
    ) -> Result<i64, Error> {
        let name = pollutant.observed_property_name();
        if let Some(id) = find_observed_property(self.store.as_ref(), name)
            .await?
            .and_then(|existing| existing.id)
        {
            return Ok(id);
        }

        let id = self
            .store
            .create(&Entity::ObservedProperty(ObservedProperty {
                id: None,
                name: name.to_string(),
                description: pollutant.observed_property_description().to_string(),
                definition: pollutant.definition().to_string(),
            }))
            .await?;
        tally.created += 1;
        info!(self.logger, "created ObservedProperty {} as {}", name, id);
        Ok(id)
    }

    async fn invalidate_things(&self, report: &mut StationSyncReport) {
        let filter = Filter::ObservedPropertyNameIn(
            Pollutant::ALL
                .iter()
                .map(|p| p.observed_property_name().to_string())
                .collect(),
        );

        let mut skip = 0;
        loop {
            let query = Query::new()
                .filter(filter.clone())
                .order_by(OrderBy::IdAsc)
                .top(INVALIDATION_PAGE)
                .skip(skip);
            let page = match self.store.things(&query).await {
                Ok(page) => page,
                Err(err) => {
                    report.tally.record_failure(
                        &self.logger,
                        format!("listing Things from {}", skip),
                        err,
                    );
                    break;
                }
            };

            for mut thing in page.items {
                thing.properties.available = false;
                thing.datastreams.clear();
                let entity = Entity::Thing(thing);
                match self.store.update(&entity).await {
                    Ok(()) => report.invalidated += 1,
                    Err(err) => report.tally.record_failure(
                        &self.logger,
                        format!("invalidating {}", entity),
                        err,
                    ),
                }
            }

            if page.next_link.is_none() {
                break;
            }
            skip += INVALIDATION_PAGE;
        }
        info!(self.logger, "marked {} Things unavailable", report.invalidated);
    }

    /// Leaves the phase untouched when the highest Thing ID cannot be read.
    async fn upsert_stations(
        &self,
        stations: &[Station],
        observed: &ObservedPropertyIds,
        report: &mut StationSyncReport,
    ) {
        let tally = &mut report.tally;
        let mut counter = match max_thing_id(self.store.as_ref()).await {
            Ok(max) => ThingIdCounter::starting_after(max),
            Err(err) => {
                tally.record_failure(&self.logger, "reading highest Thing id", err);
                return;
            }
        };

        for station in stations {
            let name = station.station_name.clone().unwrap_or_default();
            if let Err(err) = self.upsert_station(station, observed, &mut counter, tally).await {
                tally.record_failure(&self.logger, format!("station {:?}", name), err);
            }
        }

        report.phase = if report.tally.is_clean() {
            SyncPhase::Done
        } else {
            SyncPhase::PerStationUpserted
        };
    }

    async fn upsert_station(
        &self,
        station: &Station,
        observed: &ObservedPropertyIds,
        counter: &mut ThingIdCounter,
        tally: &mut Tally,
    ) -> Result<(), Error> {
        let name = station.name()?;
        let existing_thing = find_thing(self.store.as_ref(), name).await?;
        let existing_location = match station.address() {
            "" => None,
            address => find_location(self.store.as_ref(), address)
                .await?
                .and_then(|location| location.id),
        };

        let point = station.point().unwrap_or_else(|err| {
            warn!(self.logger, "{}, placing {} at the sentinel point", err, name);
            Some(GeoPoint::SENTINEL)
        });

        let (thing_id, mode, known_streams) = match existing_thing {
            Some(Thing {
                id: Some(id),
                datastreams,
                ..
            }) => (id, WriteMode::Update, datastreams),
            _ => (counter.allocate(), WriteMode::Create, vec![]),
        };
        let ids = GraphIds {
            thing: thing_id,
            location: existing_location.unwrap_or(thing_id),
        };
        debug!(self.logger, "upserting {} as Thing {}", name, thing_id);

        let mut graph = EntityGraph::build(station, point, ids, observed)?;
        graph.adopt_streams(&known_streams);

        let mut written_ids = WrittenIds::default();
        for mut entity in graph.into_entities() {
            written_ids.relink(&mut entity);
            let written = match mode {
                WriteMode::Create => self.store.create(&entity).await.map(Some),
                WriteMode::Update => self.store.update(&entity).await.map(|()| None),
            };
            match written {
                Ok(id) => {
                    match mode {
                        WriteMode::Create => tally.created += 1,
                        WriteMode::Update => tally.updated += 1,
                    }
                    written_ids.record(&entity, id.or(entity.id()));
                }
                Err(err) => {
                    written_ids.record(&entity, entity.id());
                    tally.record_failure(&self.logger, format!("station {} {}", name, entity), err);
                }
            }
        }
        Ok(())
    }
}
