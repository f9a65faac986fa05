mod entity_graph;
mod station_sync;

pub use entity_graph::*;
pub use station_sync::*;
