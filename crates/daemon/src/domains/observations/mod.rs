mod ingest_observations;

pub use ingest_observations::*;
