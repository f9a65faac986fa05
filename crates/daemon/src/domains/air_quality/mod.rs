mod airkorea;
mod pollutant;

pub use airkorea::*;
pub use pollutant::*;

use time::{macros::offset, UtcOffset};

/// Asia/Seoul; Korea observes no daylight saving time.
pub const CIVIL_OFFSET: UtcOffset = offset!(+9);
