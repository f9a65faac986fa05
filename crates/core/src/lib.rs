//! AirKorea SensorThings Core Library
//!
//! Shared pieces for the sync daemon:
//! - Configuration discovery and TOML loading (XDG-compliant)
//! - Application-wide defaults

mod config;

pub use config::{find_config_file, load_config, ConfigSource};

/// Application name used for XDG paths
pub const APP_NAME: &str = "airkorea-sta";

/// Default SensorThings API root (FROST-Server layout)
pub const DEFAULT_STA_URL: &str = "http://localhost:8888/FROST-Server/v1.0";

/// Default AirKorea open API root
pub const DEFAULT_AIRKOREA_URL: &str = "http://openapi.airkorea.or.kr/openapi/services/rest";

/// Station graph refresh interval (1 day)
pub const DEFAULT_STATION_INTERVAL: u64 = 86_400;

/// Observation ingest interval (1 hour, AirKorea publishes hourly)
pub const DEFAULT_OBSERVATION_INTERVAL: u64 = 3_600;
