use airkorea_sta_core::{
    find_config_file, load_config, ConfigSource, DEFAULT_AIRKOREA_URL,
    DEFAULT_OBSERVATION_INTERVAL, DEFAULT_STATION_INTERVAL, DEFAULT_STA_URL,
};
use clap::{Parser, ValueEnum};
use reqwest::{header::CONTENT_TYPE, Client, Url};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use slog::{debug, o, Drain, Level, Logger};
use std::env;

use crate::Error;

/// Which station pass the daily tick runs
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StationSyncMode {
    /// Invalidate every station, then upsert the current list
    #[default]
    Refresh,
    /// Load stations only when the store count differs from upstream
    Initial,
}

#[derive(Parser, Clone, Debug, Deserialize, Default)]
#[command(
    author,
    version,
    about = "AirKorea daemon - Syncs air-quality stations and readings into a SensorThings server"
)]
pub struct Cli {
    /// Path to config file (TOML format)
    /// Searched in order: this flag, $AIRKOREA_DAEMON_CONFIG, ./daemon.toml,
    /// $XDG_CONFIG_HOME/airkorea-sta/daemon.toml, /etc/airkorea-sta/daemon.toml
    #[arg(short, long)]
    #[serde(skip)]
    pub config: Option<String>,

    /// Log level: trace, debug, info, warn, error
    #[arg(short, long, env = "AIRKOREA_DAEMON_LEVEL")]
    pub level: Option<String>,

    /// SensorThings API root, e.g. http://localhost:8888/FROST-Server/v1.0
    #[arg(long, env = "AIRKOREA_DAEMON_STA_URL")]
    pub sta_url: Option<String>,

    /// AirKorea open API root
    #[arg(long, env = "AIRKOREA_DAEMON_AIRKOREA_URL")]
    pub airkorea_url: Option<String>,

    /// AirKorea service key, already percent-encoded as issued
    #[arg(long, env = "AIRKOREA_DAEMON_SERVICE_KEY")]
    pub service_key: Option<String>,

    /// Serve stations from a fixture and generate random readings
    #[arg(long, env = "AIRKOREA_DAEMON_MOCK_ENABLE")]
    pub mock_enable: Option<bool>,

    /// Station list used in mock mode instead of the bundled one
    #[arg(long, env = "AIRKOREA_DAEMON_STATION_FIXTURE")]
    pub station_fixture: Option<String>,

    /// Seconds between station syncs
    #[arg(long, env = "AIRKOREA_DAEMON_STATION_INTERVAL")]
    pub station_interval: Option<u64>,

    /// Seconds between observation ingests
    #[arg(long, env = "AIRKOREA_DAEMON_OBSERVATION_INTERVAL")]
    pub observation_interval: Option<u64>,

    /// Station pass to run: refresh or initial
    #[arg(long, value_enum, env = "AIRKOREA_DAEMON_STATION_SYNC")]
    pub station_sync: Option<StationSyncMode>,

    /// Backfill the previous day of observations once after the first station sync
    #[arg(long, env = "AIRKOREA_DAEMON_BACKFILL")]
    pub backfill: Option<bool>,

    /// HTTP User-Agent header for outbound requests
    #[arg(short, long, env = "AIRKOREA_DAEMON_USER_AGENT")]
    pub user_agent: Option<String>,
}

impl Cli {
    pub fn sta_url(&self) -> String {
        self.sta_url
            .clone()
            .unwrap_or_else(|| DEFAULT_STA_URL.to_string())
    }

    pub fn airkorea_url(&self) -> String {
        self.airkorea_url
            .clone()
            .unwrap_or_else(|| DEFAULT_AIRKOREA_URL.to_string())
    }

    pub fn service_key(&self) -> String {
        self.service_key.clone().unwrap_or_default()
    }

    pub fn mock_enable(&self) -> bool {
        self.mock_enable.unwrap_or(true)
    }

    pub fn station_interval(&self) -> u64 {
        self.station_interval.unwrap_or(DEFAULT_STATION_INTERVAL)
    }

    pub fn observation_interval(&self) -> u64 {
        self.observation_interval
            .unwrap_or(DEFAULT_OBSERVATION_INTERVAL)
    }

    pub fn station_sync(&self) -> StationSyncMode {
        self.station_sync.unwrap_or_default()
    }

    pub fn backfill(&self) -> bool {
        self.backfill.unwrap_or(false)
    }

    pub fn user_agent(&self) -> String {
        self.user_agent
            .clone()
            .unwrap_or_else(|| "airkorea-sta-daemon/1.0".to_string())
    }

    /// Values set here win over `other`.
    pub fn merge(self, other: Cli) -> Cli {
        Cli {
            config: self.config,
            level: self.level.or(other.level),
            sta_url: self.sta_url.or(other.sta_url),
            airkorea_url: self.airkorea_url.or(other.airkorea_url),
            service_key: self.service_key.or(other.service_key),
            mock_enable: self.mock_enable.or(other.mock_enable),
            station_fixture: self.station_fixture.or(other.station_fixture),
            station_interval: self.station_interval.or(other.station_interval),
            observation_interval: self.observation_interval.or(other.observation_interval),
            station_sync: self.station_sync.or(other.station_sync),
            backfill: self.backfill.or(other.backfill),
            user_agent: self.user_agent.or(other.user_agent),
        }
    }
}

/// Load configuration from CLI args, config file, and environment
pub fn get_config_info() -> Cli {
    let cli_args = Cli::parse();

    let source = if let Some(ref path) = cli_args.config {
        ConfigSource::Explicit(path.into())
    } else {
        find_config_file("AIRKOREA_DAEMON_CONFIG", "daemon.toml")
    };

    let file_config: Cli = load_config(&source).unwrap_or_default();

    // CLI args override file config (env vars are handled by clap)
    cli_args.merge(file_config)
}

fn parse_level(raw: &str) -> Level {
    match raw.to_lowercase().as_str() {
        "trace" => Level::Trace,
        "debug" => Level::Debug,
        "info" => Level::Info,
        "warn" => Level::Warning,
        "error" => Level::Error,
        _ => Level::Info,
    }
}

pub fn setup_logger(cli: &Cli) -> Logger {
    let log_level = match cli.level.as_ref() {
        Some(level) => parse_level(level),
        None => parse_level(&env::var("RUST_LOG").unwrap_or_default()),
    };

    let decorator = slog_term::TermDecorator::new().build();
    let drain = slog_term::CompactFormat::new(decorator).build().fuse();
    let drain = slog_async::Async::new(drain).build().fuse();
    let drain = drain.filter_level(log_level).fuse();
    slog::Logger::root(drain, o!("version" => env!("CARGO_PKG_VERSION")))
}

/// Plain GET client for the AirKorea JSON endpoints
pub struct JsonFetcher {
    logger: Logger,
    client: Client,
}

impl JsonFetcher {
    pub fn new(logger: Logger, user_agent: &str) -> Result<JsonFetcher, Error> {
        let client = Client::builder()
            .user_agent(user_agent)
            .build()
            .map_err(|e| Error::UpstreamFetch(format!("error building http client: {}", e)))?;
        Ok(Self { logger, client })
    }

    pub async fn fetch_text(&self, url: Url) -> Result<String, Error> {
        debug!(self.logger, "requesting: {}", url);
        let response = self
            .client
            .get(url)
            .header(CONTENT_TYPE, "application/json;charset=UTF-8")
            .send()
            .await
            .map_err(|e| Error::UpstreamFetch(format!("error sending request: {}", e)))?;
        let status = response.status();
        debug!(self.logger, "response status: {}", status);
        if !status.is_success() {
            return Err(Error::UpstreamFetch(format!(
                "error response from request: {}",
                status
            )));
        }
        response
            .text()
            .await
            .map_err(|e| Error::UpstreamFetch(format!("error reading body of request: {}", e)))
    }
}

/// AirKorea and the store mix strings, numbers and nulls for the same field.
pub fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::Bool(b)) => Some(b.to_string()),
        _ => None,
    })
}
