pub mod coordinate;
pub mod geo;
pub mod transform;

pub use coordinate::{CoordSystem, Coordinate};
pub use geo::{distance, interpolate, path_length};
pub use transform::{out_of_china, transform, transform_all};
