/// Failure kinds of a sync pass. None of them is fatal: callers record them
/// and move on to the next entity, station or phase.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Failed to fetch from AirKorea: {0}")]
    UpstreamFetch(String),
    #[error("SensorThings store operation failed: {0}")]
    StoreOperation(String),
    #[error("Malformed record: {0}")]
    MalformedRecord(String),
}
