//! Raster-grid construction for irregular point clouds (e.g. LiDAR) and
//! moving-window filtering of the resulting grids.
//!
//! Points are indexed in a bucketed `SpatialIndex`, binned into the cells of
//! a `Grid` and reduced per cell, or interpolated with a k-nearest-neighbour
//! inverse-distance scheme. `TileManager` splits large extents into buffered
//! chunks that are rasterized in parallel and stitched back together, and
//! `filters::apply` runs weighted kernels and focal statistics over a grid.

pub mod configs;
pub mod error;
pub mod filters;
pub mod gridding;
pub mod lidar;
pub mod raster;
pub mod structures;
pub mod tools;
pub mod utils;

pub use crate::error::{GridError, Result};
