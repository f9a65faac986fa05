use std::fmt;

use crate::UnitOfMeasurement;

/// The six pollutants AirKorea reports per station, in datastream order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pollutant {
    Pm10,
    Pm25,
    So2,
    Co,
    O3,
    No2,
}

/// Severity grade: 1 = good .. 4 = hazardous
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Grade {
    Good,
    Moderate,
    Unhealthy,
    Hazardous,
}

/// Inclusive (lower, upper) bounds for grades 1..=4
type Bands = [(f64, f64); 4];

const SO2_BANDS: Bands = [(0.0, 0.02), (0.021, 0.05), (0.051, 0.15), (0.151, 1.0)];
const CO_BANDS: Bands = [(0.0, 2.0), (2.01, 9.0), (9.01, 15.0), (15.01, 50.0)];
const O3_BANDS: Bands = [(0.0, 0.03), (0.031, 0.09), (0.091, 0.15), (0.151, 0.6)];
const NO2_BANDS: Bands = [(0.0, 0.03), (0.031, 0.06), (0.061, 0.2), (0.201, 2.0)];
const PM10_BANDS: Bands = [(0.0, 30.0), (31.0, 80.0), (81.0, 150.0), (151.0, 600.0)];
const PM25_BANDS: Bands = [(0.0, 15.0), (16.0, 35.0), (36.0, 75.0), (76.0, 500.0)];

const MICROGRAM_PER_CUBIC_METER: (&str, &str, &str) = (
    "microgram per cubic meter",
    "㎍/m³",
    "https://www.eea.europa.eu/themes/air/air-quality/resources/glossary/g-m3",
);
const PARTS_PER_MILLION: (&str, &str, &str) = (
    "parts per million",
    "ppm",
    "https://en.wikipedia.org/wiki/Parts-per_notation",
);

impl Pollutant {
    pub const ALL: [Pollutant; 6] = [
        Pollutant::Pm10,
        Pollutant::Pm25,
        Pollutant::So2,
        Pollutant::Co,
        Pollutant::O3,
        Pollutant::No2,
    ];

    /// 1-based position in the datastream order, used for ID allocation
    pub fn index(self) -> i64 {
        match self {
            Pollutant::Pm10 => 1,
            Pollutant::Pm25 => 2,
            Pollutant::So2 => 3,
            Pollutant::Co => 4,
            Pollutant::O3 => 5,
            Pollutant::No2 => 6,
        }
    }

    /// Name of the global ObservedProperty, also the AirKorea value field
    pub fn observed_property_name(self) -> &'static str {
        match self {
            Pollutant::Pm10 => "pm10Value",
            Pollutant::Pm25 => "pm25Value",
            Pollutant::So2 => "so2Value",
            Pollutant::Co => "coValue",
            Pollutant::O3 => "o3Value",
            Pollutant::No2 => "no2Value",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Pollutant::Pm10 => "미세먼지(PM10)",
            Pollutant::Pm25 => "미세먼지(PM2.5)",
            Pollutant::So2 => "아황산가스 농도",
            Pollutant::Co => "일산화탄소 농도",
            Pollutant::O3 => "오존 농도",
            Pollutant::No2 => "이산화질소 농도",
        }
    }

    /// Datastreams are named after the pollutant label; ingestion maps them back.
    pub fn datastream_name(self) -> &'static str {
        self.label()
    }

    pub fn from_datastream_name(name: &str) -> Option<Pollutant> {
        Pollutant::ALL
            .into_iter()
            .find(|p| p.datastream_name() == name)
    }

    pub fn observed_property_description(self) -> &'static str {
        match self {
            Pollutant::Pm10 => "미세먼지(PM10) Particulates",
            Pollutant::Pm25 => "미세먼지(PM2.5) Particulates",
            Pollutant::So2 => "아황산가스 농도 Sulfur_dioxide",
            Pollutant::Co => "일산화탄소 농도 Carbon_monoxide",
            Pollutant::O3 => "오존 농도 Ozone",
            Pollutant::No2 => "이산화질소 Nitrogen_dioxide",
        }
    }

    pub fn definition(self) -> &'static str {
        match self {
            Pollutant::Pm10 | Pollutant::Pm25 => "https://en.wikipedia.org/wiki/Particulates",
            Pollutant::So2 => "https://en.wikipedia.org/wiki/Sulfur_dioxide",
            Pollutant::Co => "https://en.wikipedia.org/wiki/Carbon_monoxide",
            Pollutant::O3 => "https://en.wikipedia.org/wiki/Ozone",
            Pollutant::No2 => "https://en.wikipedia.org/wiki/Nitrogen_dioxide",
        }
    }

    pub fn unit(self) -> UnitOfMeasurement {
        let (name, symbol, definition) = match self {
            Pollutant::Pm10 | Pollutant::Pm25 => MICROGRAM_PER_CUBIC_METER,
            _ => PARTS_PER_MILLION,
        };
        UnitOfMeasurement {
            name: name.to_string(),
            symbol: symbol.to_string(),
            definition: definition.to_string(),
        }
    }

    fn bands(self) -> &'static Bands {
        match self {
            Pollutant::Pm10 => &PM10_BANDS,
            Pollutant::Pm25 => &PM25_BANDS,
            Pollutant::So2 => &SO2_BANDS,
            Pollutant::Co => &CO_BANDS,
            Pollutant::O3 => &O3_BANDS,
            Pollutant::No2 => &NO2_BANDS,
        }
    }
}

impl fmt::Display for Pollutant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl Grade {
    fn from_band(band: usize) -> Grade {
        match band {
            0 => Grade::Good,
            1 => Grade::Moderate,
            2 => Grade::Unhealthy,
            _ => Grade::Hazardous,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Grade::Good => "1",
            Grade::Moderate => "2",
            Grade::Unhealthy => "3",
            Grade::Hazardous => "4",
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a reading against the AirKorea bands. Values outside every band,
/// including the gaps between bands, negatives and NaN, grade as `Good`.
pub fn grade(pollutant: Pollutant, value: f64) -> Grade {
    pollutant
        .bands()
        .iter()
        .position(|&(low, high)| value >= low && value <= high)
        .map(Grade::from_band)
        .unwrap_or(Grade::Good)
}

/// Same as [`grade`] for raw upstream strings such as `"45"` or `"-"`.
pub fn grade_str(pollutant: Pollutant, raw: &str) -> Grade {
    raw.trim()
        .parse::<f64>()
        .map(|value| grade(pollutant, value))
        .unwrap_or(Grade::Good)
}
