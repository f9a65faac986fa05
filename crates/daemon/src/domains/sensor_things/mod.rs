mod frost;
mod model;
mod query;
mod store;

pub use frost::*;
pub use model::*;
pub use query::*;
pub use store::*;
