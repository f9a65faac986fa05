use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

use crate::lenient_string;

pub const ENCODING_GEOJSON: &str = "application/vnd.geo+json";
pub const ENCODING_SENSORML: &str = "http://www.opengis.net/doc/IS/SensorML/2.0";
pub const OM_OBSERVATION: &str =
    "http://www.opengis.net/def/observationType/OGC-OM/2.0/OM_Observation";

/// Navigation link to an entity that already exists in the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRef {
    #[serde(rename = "@iot.id")]
    pub id: i64,
}

impl EntityRef {
    pub fn new(id: i64) -> Self {
        Self { id }
    }
}

/// Point in GeoJSON axis order
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub x: f64,
    pub y: f64,
}

impl GeoPoint {
    /// Placeholder for stations whose coordinates cannot be parsed
    pub const SENTINEL: GeoPoint = GeoPoint { x: 1.0, y: 1.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Geometry {
    Point {
        coordinates: [f64; 2],
    },
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum GeoFeature {
    Feature { geometry: Geometry },
}

impl From<GeoPoint> for GeoFeature {
    fn from(point: GeoPoint) -> Self {
        GeoFeature::Feature {
            geometry: Geometry::Point {
                coordinates: [point.x, point.y],
            },
        }
    }
}

impl GeoFeature {
    pub fn point(&self) -> Option<GeoPoint> {
        match self {
            GeoFeature::Feature {
                geometry: Geometry::Point { coordinates },
            } => Some(GeoPoint::new(coordinates[0], coordinates[1])),
            _ => None,
        }
    }
}

/// Other clients of the store may hold geometries we do not model.
fn lenient_feature<'de, D>(deserializer: D) -> Result<Option<GeoFeature>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<Value> = Option::deserialize(deserializer)?;
    Ok(value.and_then(|v| serde_json::from_value(v).ok()))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnitOfMeasurement {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub definition: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    #[serde(rename = "@iot.id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "encodingType", default)]
    pub encoding_type: String,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_feature"
    )]
    pub location: Option<GeoFeature>,
}

/// Station metadata kept on a Thing. `available` is cleared for every
/// station before a refresh and set again for each station still listed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThingProperties {
    #[serde(default, deserialize_with = "lenient_string")]
    pub station_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub year: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub oper: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub photo: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub vrml: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub map: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub mang_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub item: Option<String>,
    #[serde(default)]
    pub available: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thing {
    #[serde(rename = "@iot.id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub properties: ThingProperties,
    #[serde(rename = "Locations", default, skip_serializing_if = "Vec::is_empty")]
    pub locations: Vec<EntityRef>,
    /// Only populated when queried with a Datastreams expansion
    #[serde(rename = "Datastreams", default, skip_serializing_if = "Vec::is_empty")]
    pub datastreams: Vec<Datastream>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sensor {
    #[serde(rename = "@iot.id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "encodingType", default)]
    pub encoding_type: String,
    #[serde(default)]
    pub metadata: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservedProperty {
    #[serde(rename = "@iot.id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub definition: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Datastream {
    #[serde(rename = "@iot.id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "observationType", default)]
    pub observation_type: String,
    #[serde(rename = "unitOfMeasurement", default)]
    pub unit_of_measurement: UnitOfMeasurement,
    #[serde(rename = "Sensor", default, skip_serializing_if = "Option::is_none")]
    pub sensor: Option<EntityRef>,
    #[serde(rename = "ObservedProperty", default, skip_serializing_if = "Option::is_none")]
    pub observed_property: Option<EntityRef>,
    #[serde(rename = "Thing", default, skip_serializing_if = "Option::is_none")]
    pub thing: Option<EntityRef>,
    /// Newest first when expanded for ingestion
    #[serde(rename = "Observations", default, skip_serializing_if = "Vec::is_empty")]
    pub observations: Vec<Observation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureOfInterest {
    #[serde(rename = "@iot.id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "encodingType", default)]
    pub encoding_type: String,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_feature"
    )]
    pub feature: Option<GeoFeature>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    #[serde(rename = "@iot.id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(rename = "phenomenonTime", default, skip_serializing_if = "Option::is_none")]
    pub phenomenon_time: Option<String>,
    #[serde(
        rename = "resultTime",
        default,
        skip_serializing_if = "Option::is_none",
        with = "time::serde::rfc3339::option"
    )]
    pub result_time: Option<OffsetDateTime>,
    #[serde(default)]
    pub result: Value,
    #[serde(rename = "Datastream", default, skip_serializing_if = "Option::is_none")]
    pub datastream: Option<EntityRef>,
    #[serde(rename = "FeatureOfInterest", default, skip_serializing_if = "Option::is_none")]
    pub feature_of_interest: Option<EntityRef>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Location,
    Thing,
    Sensor,
    ObservedProperty,
    Datastream,
    FeatureOfInterest,
    Observation,
}

impl EntityKind {
    /// Collection segment of the resource path
    pub fn collection(self) -> &'static str {
        match self {
            EntityKind::Location => "Locations",
            EntityKind::Thing => "Things",
            EntityKind::Sensor => "Sensors",
            EntityKind::ObservedProperty => "ObservedProperties",
            EntityKind::Datastream => "Datastreams",
            EntityKind::FeatureOfInterest => "FeaturesOfInterest",
            EntityKind::Observation => "Observations",
        }
    }
}

/// Anything the sync writes to the store
#[derive(Debug, Clone, PartialEq)]
pub enum Entity {
    Location(Location),
    Thing(Thing),
    Sensor(Sensor),
    ObservedProperty(ObservedProperty),
    Datastream(Datastream),
    FeatureOfInterest(FeatureOfInterest),
    Observation(Observation),
}

impl Entity {
    pub fn kind(&self) -> EntityKind {
        match self {
            Entity::Location(_) => EntityKind::Location,
            Entity::Thing(_) => EntityKind::Thing,
            Entity::Sensor(_) => EntityKind::Sensor,
            Entity::ObservedProperty(_) => EntityKind::ObservedProperty,
            Entity::Datastream(_) => EntityKind::Datastream,
            Entity::FeatureOfInterest(_) => EntityKind::FeatureOfInterest,
            Entity::Observation(_) => EntityKind::Observation,
        }
    }

    pub fn id(&self) -> Option<i64> {
        match self {
            Entity::Location(e) => e.id,
            Entity::Thing(e) => e.id,
            Entity::Sensor(e) => e.id,
            Entity::ObservedProperty(e) => e.id,
            Entity::Datastream(e) => e.id,
            Entity::FeatureOfInterest(e) => e.id,
            Entity::Observation(e) => e.id,
        }
    }

    pub fn to_json(&self) -> Result<Value, serde_json::Error> {
        match self {
            Entity::Location(e) => serde_json::to_value(e),
            Entity::Thing(e) => serde_json::to_value(e),
            Entity::Sensor(e) => serde_json::to_value(e),
            Entity::ObservedProperty(e) => serde_json::to_value(e),
            Entity::Datastream(e) => serde_json::to_value(e),
            Entity::FeatureOfInterest(e) => serde_json::to_value(e),
            Entity::Observation(e) => serde_json::to_value(e),
        }
    }
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.id() {
            Some(id) => write!(f, "{}({})", self.kind().collection(), id),
            None => write!(f, "{}(new)", self.kind().collection()),
        }
    }
}

/// One page of a collection query
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EntityPage<T> {
    #[serde(rename = "value", default = "Vec::new")]
    pub items: Vec<T>,
    #[serde(rename = "@iot.nextLink", default)]
    pub next_link: Option<String>,
    #[serde(rename = "@iot.count", default)]
    pub count: Option<u64>,
}

impl<T> Default for EntityPage<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            next_link: None,
            count: None,
        }
    }
}
