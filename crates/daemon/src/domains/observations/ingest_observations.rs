use std::sync::Arc;

use serde_json::json;
use slog::{debug, info, Logger};
use time::{format_description::well_known::Rfc3339, Duration, OffsetDateTime};

use crate::{
    AirQualitySource, Entity, EntityRef, Error, Expand, Filter, Observation, Pollutant, Query,
    Reading, SensorThingsStore, Station, Tally, CIVIL_OFFSET,
};

/// Hours a backfill walks through, starting one day before the latest reading
const BACKFILL_HOURS: i64 = 24;

/// Which hours of a station's reading get written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IngestPlan {
    Latest,
    PreviousDay,
}

impl IngestPlan {
    fn offsets(self) -> Vec<Duration> {
        match self {
            IngestPlan::Latest => vec![Duration::ZERO],
            IngestPlan::PreviousDay => (0..BACKFILL_HOURS)
                .map(|hour| Duration::hours(hour) - Duration::days(1))
                .collect(),
        }
    }
}

/// Observation result body: the raw value next to its grade
pub fn observation_result(reading: &Reading, pollutant: Pollutant) -> serde_json::Value {
    let measurement = reading.measurement(pollutant);
    json!({
        "value": measurement.value,
        "grade": measurement.grade,
    })
}

pub struct ObservationIngest {
    logger: Logger,
    store: Arc<dyn SensorThingsStore>,
    source: Arc<dyn AirQualitySource>,
}

impl ObservationIngest {
    pub fn new(
        logger: Logger,
        store: Arc<dyn SensorThingsStore>,
        source: Arc<dyn AirQualitySource>,
    ) -> Self {
        Self {
            logger,
            store,
            source,
        }
    }

    /// Writes the newest reading of every station, one Observation per
    /// pollutant. A reading for an hour the store already holds overwrites it.
    pub async fn ingest_latest(&self) -> Tally {
        let tally = self.run(IngestPlan::Latest).await;
        info!(self.logger, "observation ingest finished: {}", tally);
        tally
    }

    /// Walks the 24 hours before each station's latest reading. AirKorea only
    /// serves the newest values, so every hour is written with them.
    pub async fn backfill_day(&self) -> Tally {
        let tally = self.run(IngestPlan::PreviousDay).await;
        info!(self.logger, "observation backfill finished: {}", tally);
        tally
    }

    async fn run(&self, plan: IngestPlan) -> Tally {
        let mut tally = Tally::default();
        let stations = match self.source.list_stations().await {
            Ok(stations) => stations,
            Err(err) => {
                tally.record_failure(&self.logger, "listing stations", err);
                return tally;
            }
        };

        for station in &stations {
            for offset in plan.offsets() {
                if let Err(err) = self.ingest_station(station, offset, &mut tally).await {
                    let name = station.station_name.clone().unwrap_or_default();
                    tally.record_failure(&self.logger, format!("readings of {:?}", name), err);
                    break;
                }
            }
        }
        tally
    }

    async fn ingest_station(
        &self,
        station: &Station,
        offset: Duration,
        tally: &mut Tally,
    ) -> Result<(), Error> {
        let name = station.name()?;
        let Some(reading) = self.source.fetch_reading(name).await? else {
            debug!(self.logger, "no reading for {}", name);
            return Ok(());
        };
        let hour = reading.observed_hour()? + offset;

        let query = Query::new()
            .filter(Filter::NameEq(name.to_string()))
            .expand(Expand::DatastreamsWithLatestObservation)
            .top(1);
        let Some(thing) = self.store.things(&query).await?.items.into_iter().next() else {
            debug!(self.logger, "no Thing for {}, skipping reading", name);
            return Ok(());
        };
        let thing_id = thing
            .id
            .ok_or_else(|| Error::MalformedRecord(format!("Thing {} without id", name)))?;

        let now = OffsetDateTime::now_utc()
            .to_offset(CIVIL_OFFSET)
            .format(&Rfc3339)
            .map_err(|e| Error::MalformedRecord(format!("formatting phenomenonTime: {}", e)))?;

        for datastream in &thing.datastreams {
            let Some(pollutant) = Pollutant::from_datastream_name(&datastream.name) else {
                debug!(self.logger, "ignoring Datastream {} of {}", datastream.name, name);
                continue;
            };
            let Some(datastream_id) = datastream.id else {
                continue;
            };

            let same_hour = datastream
                .observations
                .first()
                .filter(|latest| latest.result_time == Some(hour))
                .and_then(|latest| latest.id);

            let entity = Entity::Observation(Observation {
                id: same_hour,
                phenomenon_time: Some(now.clone()),
                result_time: Some(hour),
                result: observation_result(&reading, pollutant),
                datastream: Some(EntityRef::new(datastream_id)),
                feature_of_interest: Some(EntityRef::new(thing_id)),
            });

            let written = match same_hour {
                Some(_) => self.store.update(&entity).await.map(|_| tally.updated += 1),
                None => self.store.create(&entity).await.map(|_| tally.created += 1),
            };
            if let Err(err) = written {
                tally.record_failure(
                    &self.logger,
                    format!("{} of {} at {}", entity, name, hour),
                    err,
                );
            }
        }
        Ok(())
    }
}
