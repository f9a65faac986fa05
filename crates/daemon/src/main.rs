use airkorea_daemon::{
    get_config_info, setup_logger, AirKoreaClient, AirQualitySource, Cli, FrostClient,
    JsonFetcher, ObservationIngest, SensorThingsStore, StationSync, StationSyncMode,
};
use slog::{info, warn, Logger};
use std::{path::PathBuf, sync::Arc, time::Duration};
use tokio::time::interval;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let cli = get_config_info();
    let logger = setup_logger(&cli);

    info!(logger, "AirKorea daemon starting...");
    info!(logger, "  SensorThings URL: {}", cli.sta_url());
    info!(
        logger,
        "  Station sync: {:?} every {} seconds",
        cli.station_sync(),
        cli.station_interval()
    );
    info!(logger, "  Observation interval: {} seconds", cli.observation_interval());
    info!(logger, "  Mock upstream: {}", cli.mock_enable());

    let store: Arc<dyn SensorThingsStore> = Arc::new(FrostClient::new(
        logger.clone(),
        cli.sta_url(),
        &cli.user_agent(),
    )?);
    let source: Arc<dyn AirQualitySource> = Arc::new(build_source(&cli, &logger)?);

    let station_sync = StationSync::new(logger.clone(), store.clone(), source.clone());
    let ingest = ObservationIngest::new(logger.clone(), store, source);

    sync_on_schedule(cli, logger, station_sync, ingest).await;
    Ok(())
}

fn build_source(cli: &Cli, logger: &Logger) -> Result<AirKoreaClient, anyhow::Error> {
    if cli.mock_enable() {
        return Ok(AirKoreaClient::mock(
            logger.clone(),
            cli.station_fixture.as_ref().map(PathBuf::from),
        ));
    }
    if cli.service_key().is_empty() {
        warn!(logger, "no AirKorea service key configured, upstream requests will be rejected");
    }
    let fetcher = JsonFetcher::new(logger.clone(), &cli.user_agent())?;
    Ok(AirKoreaClient::live(
        logger.clone(),
        fetcher,
        cli.airkorea_url(),
        cli.service_key(),
    ))
}

async fn sync_on_schedule(
    cli: Cli,
    logger: Logger,
    mut station_sync: StationSync,
    ingest: ObservationIngest,
) {
    let mut station_interval = interval(Duration::from_secs(cli.station_interval()));
    let mut observation_interval = interval(Duration::from_secs(cli.observation_interval()));
    let mut backfill_pending = cli.backfill();

    loop {
        tokio::select! {
            // station pass wins ties with the observation tick
            biased;
            _ = station_interval.tick() => {
                let report = match cli.station_sync() {
                    StationSyncMode::Refresh => station_sync.refresh().await,
                    StationSyncMode::Initial => station_sync.initial_load().await,
                };
                info!(
                    logger,
                    "Station sync done: {}, next in {} seconds",
                    report,
                    cli.station_interval()
                );

                if backfill_pending {
                    backfill_pending = false;
                    let tally = ingest.backfill_day().await;
                    info!(logger, "Backfill done: {}", tally);
                }
            }
            _ = observation_interval.tick() => {
                let tally = ingest.ingest_latest().await;
                info!(
                    logger,
                    "Observation ingest done: {}, next in {} seconds",
                    tally,
                    cli.observation_interval()
                );
            }
            _ = tokio::signal::ctrl_c() => {
                info!(logger, "Shutting down");
                break;
            }
        }
    }
}
