// private sub-module defined in other files
mod ascii_points;
mod point_data;
mod point_set;

// exports identifiers from private sub-modules in the current module namespace
pub use self::ascii_points::{write_ascii_points, AsciiPointReader, PointSource};
pub use self::point_data::{Point, PointValue, GROUND_CLASS};
pub use self::point_set::{PointSet, PointView};
