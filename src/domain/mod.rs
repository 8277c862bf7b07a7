pub mod dataset;
pub mod model;

pub use dataset::*;
pub use model::*;
