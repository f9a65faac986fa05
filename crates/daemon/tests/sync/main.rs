mod observation_ingest;
mod station_sync;
