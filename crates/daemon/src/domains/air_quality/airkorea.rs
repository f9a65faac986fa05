use std::path::PathBuf;

use async_trait::async_trait;
use rand::Rng;
use reqwest::Url;
use serde::Deserialize;
use slog::{debug, info, Logger};
use time::{macros::format_description, Duration, OffsetDateTime, PrimitiveDateTime, Time};

use crate::{grade_str, lenient_string, Error, GeoPoint, JsonFetcher, Pollutant, CIVIL_OFFSET};

const BUNDLED_STATIONS: &str = include_str!("../../../fixtures/air_quality_stations.json");
const PAGE_SIZE: &str = "10000";

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Measuring station as listed by `MsrstnInfoInqireSvc/getMsrstnList`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Station {
    #[serde(default, deserialize_with = "lenient_string")]
    pub station_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub addr: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub dm_x: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub dm_y: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub mang_name: Option<String>,
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
    pub item: Option<String>,
}

impl Station {
    pub fn name(&self) -> Result<&str, Error> {
        non_blank(&self.station_name)
            .ok_or_else(|| Error::MalformedRecord(String::from("station without stationName")))
    }

    pub fn address(&self) -> &str {
        non_blank(&self.addr).unwrap_or_default()
    }

    /// Station position as a GeoJSON point `[dmY, dmX]`. Blank coordinates
    /// yield `None`; coordinates that are present but not numeric are an error.
    pub fn point(&self) -> Result<Option<GeoPoint>, Error> {
        let (Some(dm_x), Some(dm_y)) = (non_blank(&self.dm_x), non_blank(&self.dm_y)) else {
            return Ok(None);
        };
        let parse = |raw: &str| {
            raw.parse::<f64>().map_err(|e| {
                Error::MalformedRecord(format!(
                    "coordinate {:?} of {:?}: {}",
                    raw, self.station_name, e
                ))
            })
        };
        Ok(Some(GeoPoint::new(parse(dm_y)?, parse(dm_x)?)))
    }
}

/// `list` is required: AirKorea error envelopes carry only a `response` header.
#[derive(Debug, Deserialize)]
struct StationList {
    list: Vec<Station>,
}

/// Real-time measurement of one station (`getMsrstnAcctoRltmMesureDnsty`)
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reading {
    #[serde(default, deserialize_with = "lenient_string")]
    pub data_time: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub pm10_value: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub pm10_grade: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub pm25_value: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub pm25_grade: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub so2_value: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub so2_grade: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub co_value: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub co_grade: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub o3_value: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub o3_grade: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub no2_value: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub no2_grade: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReadingList {
    list: Vec<Reading>,
}

/// `(value, grade)` pair stored as an Observation result
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    pub value: Option<String>,
    pub grade: String,
}

impl Reading {
    fn fields(&self, pollutant: Pollutant) -> (&Option<String>, &Option<String>) {
        match pollutant {
            Pollutant::Pm10 => (&self.pm10_value, &self.pm10_grade),
            Pollutant::Pm25 => (&self.pm25_value, &self.pm25_grade),
            Pollutant::So2 => (&self.so2_value, &self.so2_grade),
            Pollutant::Co => (&self.co_value, &self.co_grade),
            Pollutant::O3 => (&self.o3_value, &self.o3_grade),
            Pollutant::No2 => (&self.no2_value, &self.no2_grade),
        }
    }

    fn fields_mut(&mut self, pollutant: Pollutant) -> (&mut Option<String>, &mut Option<String>) {
        match pollutant {
            Pollutant::Pm10 => (&mut self.pm10_value, &mut self.pm10_grade),
            Pollutant::Pm25 => (&mut self.pm25_value, &mut self.pm25_grade),
            Pollutant::So2 => (&mut self.so2_value, &mut self.so2_grade),
            Pollutant::Co => (&mut self.co_value, &mut self.co_grade),
            Pollutant::O3 => (&mut self.o3_value, &mut self.o3_grade),
            Pollutant::No2 => (&mut self.no2_value, &mut self.no2_grade),
        }
    }

    /// Upstream grade when present, otherwise classified from the value.
    pub fn measurement(&self, pollutant: Pollutant) -> Measurement {
        let (value, grade) = self.fields(pollutant);
        let value = non_blank(value).map(str::to_string);
        let grade = match non_blank(grade) {
            Some(upstream) => upstream.to_string(),
            None => grade_str(pollutant, value.as_deref().unwrap_or_default())
                .as_str()
                .to_string(),
        };
        Measurement { value, grade }
    }

    pub fn set_measurement(&mut self, pollutant: Pollutant, value: String, grade: String) {
        let (value_slot, grade_slot) = self.fields_mut(pollutant);
        *value_slot = Some(value);
        *grade_slot = Some(grade);
    }

    /// `dataTime` truncated to the top of the hour in the civil zone.
    /// AirKorea reports midnight as `24:00` of the previous day.
    pub fn observed_hour(&self) -> Result<OffsetDateTime, Error> {
        let raw = non_blank(&self.data_time)
            .ok_or_else(|| Error::MalformedRecord(String::from("reading without dataTime")))?;
        let (raw, carry) = match raw.strip_suffix("24:00") {
            Some(day) => (format!("{}00:00", day), Duration::days(1)),
            None => (raw.to_string(), Duration::ZERO),
        };
        let format = format_description!("[year]-[month]-[day] [hour]:[minute]");
        let parsed = PrimitiveDateTime::parse(&raw, format)
            .map_err(|e| Error::MalformedRecord(format!("dataTime {:?}: {}", raw, e)))?;
        let hour = Time::from_hms(parsed.hour(), 0, 0)
            .map_err(|e| Error::MalformedRecord(format!("dataTime {:?}: {}", raw, e)))?;
        Ok(PrimitiveDateTime::new(parsed.date(), hour).assume_offset(CIVIL_OFFSET) + carry)
    }
}

/// Random in-band reading for every pollutant, graded consistently.
pub fn mock_reading(now: OffsetDateTime) -> Reading {
    let mut rng = rand::thread_rng();
    let mut reading = Reading {
        data_time: now
            .to_offset(CIVIL_OFFSET)
            .format(format_description!("[year]-[month]-[day] [hour]:00"))
            .ok(),
        ..Default::default()
    };
    for pollutant in Pollutant::ALL {
        let value = match pollutant {
            Pollutant::Pm10 => rng.gen_range(0..=600).to_string(),
            Pollutant::Pm25 => rng.gen_range(0..=500).to_string(),
            Pollutant::So2 => rng.gen::<f32>().to_string(),
            Pollutant::Co => (rng.gen::<f32>() * 50.0).to_string(),
            Pollutant::O3 => (rng.gen::<f32>() * 0.6).to_string(),
            Pollutant::No2 => (rng.gen::<f32>() * 2.0).to_string(),
        };
        let grade = grade_str(pollutant, &value).as_str().to_string();
        reading.set_measurement(pollutant, value, grade);
    }
    reading
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AirQualitySource: Send + Sync {
    async fn list_stations(&self) -> Result<Vec<Station>, Error>;
    /// Latest reading of a station, `None` when upstream has no record.
    async fn fetch_reading(&self, station_name: &str) -> Result<Option<Reading>, Error>;
}

enum SourceMode {
    Live {
        fetcher: JsonFetcher,
        base_url: String,
        service_key: String,
    },
    Mock {
        fixture: Option<PathBuf>,
    },
}

pub struct AirKoreaClient {
    logger: Logger,
    mode: SourceMode,
}

impl AirKoreaClient {
    pub fn live(
        logger: Logger,
        fetcher: JsonFetcher,
        base_url: String,
        service_key: String,
    ) -> Self {
        Self {
            logger,
            mode: SourceMode::Live {
                fetcher,
                base_url,
                service_key,
            },
        }
    }

    /// Reads stations from `fixture`, or the bundled list when `None`.
    pub fn mock(logger: Logger, fixture: Option<PathBuf>) -> Self {
        Self {
            logger,
            mode: SourceMode::Mock { fixture },
        }
    }
}

/// The service key is issued already percent-encoded, so it is spliced into
/// the URL text as-is; only the remaining pairs go through the encoder.
fn signed_url(
    base_url: &str,
    operation: &str,
    service_key: &str,
    params: &[(&str, &str)],
) -> Result<Url, Error> {
    let raw = format!(
        "{}/{}?ServiceKey={}",
        base_url.trim_end_matches('/'),
        operation,
        service_key
    );
    let mut url =
        Url::parse(&raw).map_err(|e| Error::UpstreamFetch(format!("invalid url {}: {}", raw, e)))?;
    url.query_pairs_mut().extend_pairs(params);
    Ok(url)
}

pub fn station_list_url(base_url: &str, service_key: &str) -> Result<Url, Error> {
    signed_url(
        base_url,
        "MsrstnInfoInqireSvc/getMsrstnList",
        service_key,
        &[("numOfRows", PAGE_SIZE), ("pageNo", "1"), ("_returnType", "json")],
    )
}

pub fn reading_url(base_url: &str, service_key: &str, station_name: &str) -> Result<Url, Error> {
    signed_url(
        base_url,
        "ArpltnInforInqireSvc/getMsrstnAcctoRltmMesureDnsty",
        service_key,
        &[
            ("numOfRows", PAGE_SIZE),
            ("pageNo", "1"),
            ("stationName", station_name),
            ("dataTerm", "DAILY"),
            ("ver", "1.3"),
            ("_returnType", "json"),
        ],
    )
}

pub fn parse_station_list(body: &str) -> Result<Vec<Station>, Error> {
    serde_json::from_str::<StationList>(body)
        .map(|parsed| parsed.list)
        .map_err(|e| Error::UpstreamFetch(format!("error parsing station list: {}", e)))
}

pub fn parse_latest_reading(body: &str) -> Result<Option<Reading>, Error> {
    serde_json::from_str::<ReadingList>(body)
        .map(|parsed| parsed.list.into_iter().next())
        .map_err(|e| Error::UpstreamFetch(format!("error parsing measurements: {}", e)))
}

#[async_trait]
impl AirQualitySource for AirKoreaClient {
    async fn list_stations(&self) -> Result<Vec<Station>, Error> {
        match &self.mode {
            SourceMode::Live {
                fetcher,
                base_url,
                service_key,
            } => {
                info!(self.logger, "fetching station list from AirKorea");
                let body = fetcher.fetch_text(station_list_url(base_url, service_key)?).await?;
                parse_station_list(&body)
            }
            SourceMode::Mock { fixture: Some(path) } => {
                info!(self.logger, "reading mock station list from {}", path.display());
                let body = tokio::fs::read_to_string(path).await.map_err(|e| {
                    Error::UpstreamFetch(format!("error reading fixture {}: {}", path.display(), e))
                })?;
                parse_station_list(&body)
            }
            SourceMode::Mock { fixture: None } => {
                info!(self.logger, "using bundled mock station list");
                parse_station_list(BUNDLED_STATIONS)
            }
        }
    }

    async fn fetch_reading(&self, station_name: &str) -> Result<Option<Reading>, Error> {
        match &self.mode {
            SourceMode::Live {
                fetcher,
                base_url,
                service_key,
            } => {
                let body = fetcher
                    .fetch_text(reading_url(base_url, service_key, station_name)?)
                    .await?;
                parse_latest_reading(&body)
            }
            SourceMode::Mock { .. } => {
                debug!(self.logger, "generating mock reading for {}", station_name);
                Ok(Some(mock_reading(OffsetDateTime::now_utc())))
            }
        }
    }
}
