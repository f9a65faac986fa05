mod air_quality;
mod observations;
mod report;
mod sensor_things;
mod stations;

pub use air_quality::*;
pub use observations::*;
pub use report::*;
pub use sensor_things::*;
pub use stations::*;
