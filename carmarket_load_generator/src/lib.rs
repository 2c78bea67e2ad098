//! Random car listings for seeding and exercising the warehouse table.

pub mod generator;
pub mod specification;

pub use generator::CarDataGenerator;
pub use specification::{CarDataSpec, RangeSpec};
