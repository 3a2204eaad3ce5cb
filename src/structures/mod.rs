// private sub-module defined in other files
mod bounding_box;
mod spatial_index;

// exports identifiers from private sub-modules in the current module namespace
pub use self::bounding_box::BoundingBox;
pub use self::spatial_index::{Neighbour, SpatialIndex};
