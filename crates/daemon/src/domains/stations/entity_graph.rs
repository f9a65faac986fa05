use crate::{
    Datastream, Entity, EntityRef, Error, FeatureOfInterest, GeoPoint, Location, Pollutant,
    Sensor, Station, Thing, ThingProperties, ENCODING_GEOJSON, ENCODING_SENSORML, OM_OBSERVATION,
};

/// Description every station Thing carries; the initial load counts by it.
pub const THING_DESCRIPTION: &str = "한국환경공단 측정소";
const LOCATION_DESCRIPTION: &str = "대기질 측정소 위치";
const SENSOR_DESCRIPTION: &str = "미세먼지 측정소";
const FEATURE_DESCRIPTION: &str = "한국환경공단 대기질 측정소";

/// Sensor and Datastream ID of `pollutant` on Thing `thing_id`.
///
/// Each Thing owns the block `6 * (thing_id - 1) + 1 ..= 6 * thing_id`, one
/// slot per pollutant in [`Pollutant::ALL`] order. Nothing else derives these IDs.
pub fn stream_id(thing_id: i64, pollutant: Pollutant) -> i64 {
    6 * (thing_id - 1) + pollutant.index()
}

/// Store IDs of the six global ObservedProperties
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObservedPropertyIds([i64; 6]);

impl ObservedPropertyIds {
    pub fn new(ids: [i64; 6]) -> Self {
        Self(ids)
    }

    pub fn get(&self, pollutant: Pollutant) -> i64 {
        self.0[(pollutant.index() - 1) as usize]
    }
}

/// Running Thing ID for stations seen for the first time
#[derive(Debug, Clone)]
pub struct ThingIdCounter {
    last: i64,
}

impl ThingIdCounter {
    pub fn starting_after(max_existing: Option<i64>) -> Self {
        Self {
            last: max_existing.unwrap_or(0),
        }
    }

    pub fn allocate(&mut self) -> i64 {
        self.last += 1;
        self.last
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphIds {
    pub thing: i64,
    pub location: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StreamPair {
    pub sensor: Sensor,
    pub datastream: Datastream,
}

/// Everything written to the store for one station
#[derive(Debug, Clone, PartialEq)]
pub struct EntityGraph {
    pub location: Option<Location>,
    pub thing: Thing,
    pub streams: Vec<StreamPair>,
    pub feature_of_interest: Option<FeatureOfInterest>,
}

fn thing_properties(station: &Station, name: &str) -> ThingProperties {
    ThingProperties {
        station_name: Some(name.to_string()),
        year: station.year.clone(),
        oper: station.oper.clone(),
        photo: station.photo.clone(),
        vrml: station.vrml.clone(),
        map: station.map.clone(),
        mang_name: station.mang_name.clone(),
        item: station.item.clone(),
        available: true,
    }
}

impl EntityGraph {
    /// Without a `point` the Location and FeatureOfInterest are left out,
    /// the Thing still gets all six Sensors and Datastreams.
    pub fn build(
        station: &Station,
        point: Option<GeoPoint>,
        ids: GraphIds,
        observed_properties: &ObservedPropertyIds,
    ) -> Result<Self, Error> {
        let name = station.name()?;
        let operator = station.mang_name.clone().unwrap_or_default();

        let location = point.map(|point| Location {
            id: Some(ids.location),
            name: station.address().to_string(),
            description: LOCATION_DESCRIPTION.to_string(),
            encoding_type: ENCODING_GEOJSON.to_string(),
            location: Some(point.into()),
        });

        let thing = Thing {
            id: Some(ids.thing),
            name: name.to_string(),
            description: THING_DESCRIPTION.to_string(),
            properties: thing_properties(station, name),
            locations: location
                .iter()
                .map(|_| EntityRef::new(ids.location))
                .collect(),
            datastreams: vec![],
        };

        let streams = Pollutant::ALL
            .into_iter()
            .map(|pollutant| {
                let id = stream_id(ids.thing, pollutant);
                StreamPair {
                    sensor: Sensor {
                        id: Some(id),
                        name: format!("{}:{}", name, pollutant.label()),
                        description: SENSOR_DESCRIPTION.to_string(),
                        encoding_type: ENCODING_SENSORML.to_string(),
                        metadata: operator.clone(),
                    },
                    datastream: Datastream {
                        id: Some(id),
                        name: pollutant.datastream_name().to_string(),
                        description: pollutant.datastream_name().to_string(),
                        observation_type: OM_OBSERVATION.to_string(),
                        unit_of_measurement: pollutant.unit(),
                        sensor: Some(EntityRef::new(id)),
                        observed_property: Some(EntityRef::new(observed_properties.get(pollutant))),
                        thing: Some(EntityRef::new(ids.thing)),
                        observations: vec![],
                    },
                }
            })
            .collect();

        let feature_of_interest = point.map(|point| FeatureOfInterest {
            id: Some(ids.thing),
            name: format!("{} 측정소", name),
            description: FEATURE_DESCRIPTION.to_string(),
            encoding_type: ENCODING_GEOJSON.to_string(),
            feature: Some(point.into()),
        });

        Ok(Self {
            location,
            thing,
            streams,
            feature_of_interest,
        })
    }

    /// Reuses the Sensor and Datastream IDs a known Thing already has, matched
    /// by Datastream name. Pollutants without a stream keep their derived IDs.
    pub fn adopt_streams(&mut self, existing: &[Datastream]) {
        for pair in &mut self.streams {
            let Some(current) = existing
                .iter()
                .find(|ds| ds.name == pair.datastream.name && ds.id.is_some())
            else {
                continue;
            };
            pair.datastream.id = current.id;
            if let Some(sensor) = current.sensor {
                pair.sensor.id = Some(sensor.id);
                pair.datastream.sensor = Some(sensor);
            }
        }
    }

    /// Write order: Location, Thing, each Sensor followed by its Datastream,
    /// FeatureOfInterest last.
    pub fn into_entities(self) -> Vec<Entity> {
        let mut entities = Vec::with_capacity(2 + self.streams.len() * 2 + 1);
        entities.extend(self.location.map(Entity::Location));
        entities.push(Entity::Thing(self.thing));
        for pair in self.streams {
            entities.push(Entity::Sensor(pair.sensor));
            entities.push(Entity::Datastream(pair.datastream));
        }
        entities.extend(self.feature_of_interest.map(Entity::FeatureOfInterest));
        entities
    }
}

/// IDs the store reported for entities written earlier in the same graph.
///
/// A server that assigns its own IDs ignores the requested ones, so links in
/// later entities are rewritten to whatever the store answered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WrittenIds {
    location: Option<i64>,
    thing: Option<i64>,
    sensor: Option<i64>,
}

impl WrittenIds {
    /// `id` is the stored ID, or the requested one when the write failed.
    pub fn record(&mut self, entity: &Entity, id: Option<i64>) {
        match entity {
            Entity::Location(_) => self.location = id,
            Entity::Thing(_) => self.thing = id,
            Entity::Sensor(_) => self.sensor = id,
            _ => {}
        }
    }

    pub fn relink(&self, entity: &mut Entity) {
        match entity {
            Entity::Thing(thing) => {
                match self.location {
                    Some(location) if !thing.locations.is_empty() => {
                        thing.locations = vec![EntityRef::new(location)];
                    }
                    _ => {}
                }
            }
            Entity::Datastream(datastream) => {
                if let Some(thing) = self.thing {
                    datastream.thing = Some(EntityRef::new(thing));
                }
                if let Some(sensor) = self.sensor {
                    datastream.sensor = Some(EntityRef::new(sensor));
                }
            }
            Entity::FeatureOfInterest(feature) => {
                if let Some(thing) = self.thing {
                    feature.id = Some(thing);
                }
            }
            _ => {}
        }
    }
}
