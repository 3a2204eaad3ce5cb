use crate::error::GridError;
use crate::lidar::{Point, PointSet};
use crate::raster::Grid;
use rayon::prelude::*;
use std::fmt;

/// Tallies of a normalization pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NormalizeReport {
    pub normalized: usize,
    /// Points outside of the terrain grid's extent.
    pub out_of_bounds: usize,
    /// Points whose terrain cell and all eight neighbours are no-data.
    pub no_terrain: usize,
    /// Points whose negative height was floored to zero.
    pub clamped: usize,
}

impl NormalizeReport {
    pub fn dropped(&self) -> usize {
        self.out_of_bounds + self.no_terrain
    }
}

impl fmt::Display for NormalizeReport {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} points normalized, {} dropped as out-of-bounds, {} dropped for lack of terrain, {} clamped to zero",
            self.normalized, self.out_of_bounds, self.no_terrain, self.clamped
        )
    }
}

enum Outcome {
    Kept(Point, bool),
    OutOfBounds,
    NoTerrain,
}

/// The terrain height under (x, y): the nearest cell, or when that cell is
/// no-data, the first valid of its eight neighbours.
pub fn terrain_height(terrain: &Grid, x: f64, y: f64) -> Result<Option<f64>, GridError> {
    let z = terrain.value_at(x, y)?;
    if !terrain.is_nodata(z) {
        return Ok(Some(z));
    }
    let (row, col) = terrain.configs.cell_of(x, y);
    let dx = [1, 1, 1, 0, -1, -1, -1, 0];
    let dy = [-1, 0, 1, 1, 1, 0, -1, -1];
    for n in 0..8 {
        let zn = terrain.get_value(row + dy[n], col + dx[n]);
        if !terrain.is_nodata(zn) {
            return Ok(Some(zn));
        }
    }
    Ok(None)
}

/// Subtracts the terrain height under each point from its elevation.
///
/// Points outside of the terrain grid, or over a no-data patch, are dropped
/// and counted in the returned report; a single warning summarises them.
/// With `clamp_negative`, heights below zero are floored to zero. Output
/// points keep their input order and attributes.
pub fn normalize(points: &PointSet, terrain: &Grid, clamp_negative: bool) -> (PointSet, NormalizeReport) {
    let outcomes: Vec<Outcome> = points
        .points()
        .par_iter()
        .map(|p| match terrain_height(terrain, p.x, p.y) {
            Ok(Some(z)) => {
                let mut q = p.clone();
                q.z = p.z - z;
                let clamped = clamp_negative && q.z < 0.0;
                if clamped {
                    q.z = 0.0;
                }
                Outcome::Kept(q, clamped)
            }
            Ok(None) => Outcome::NoTerrain,
            Err(_) => Outcome::OutOfBounds,
        })
        .collect();

    let mut report = NormalizeReport::default();
    let mut output = PointSet::new(points.crs());
    for outcome in outcomes {
        match outcome {
            Outcome::Kept(p, clamped) => {
                report.normalized += 1;
                if clamped {
                    report.clamped += 1;
                }
                output.push(p);
            }
            Outcome::OutOfBounds => report.out_of_bounds += 1,
            Outcome::NoTerrain => report.no_terrain += 1,
        }
    }
    if report.dropped() > 0 {
        log::warn!(
            "{} points dropped as out-of-bounds and {} over no-data terrain during normalization",
            report.out_of_bounds,
            report.no_terrain
        );
    }
    (output, report)
}

#[cfg(test)]
mod test {
    use super::{normalize, terrain_height};
    use crate::lidar::{Point, PointSet};
    use crate::raster::{Grid, GridConfigs, NODATA};
    use crate::structures::BoundingBox;

    fn terrain() -> Grid {
        let configs =
            GridConfigs::from_extent(BoundingBox::new(0.0, 3.0, 0.0, 2.0), 1.0, "").unwrap();
        Grid::from_data(configs, vec![1.0, 2.0, 3.0, NODATA, NODATA, 6.0]).unwrap()
    }

    #[test]
    fn test_subtracts_nearest_cell() {
        let ps = PointSet::from_points(
            vec![
                Point::new(0.5, 0.5, 11.0).with_attribute("classification", 5.0),
                Point::new(2.9, 1.9, 10.0),
            ],
            "EPSG:2958",
        );
        let (out, report) = normalize(&ps, &terrain(), false);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].z, 10.0);
        assert_eq!(out[0].classification(), Some(5.0));
        assert_eq!(out[1].z, 4.0);
        assert_eq!(out.crs(), "EPSG:2958");
        assert_eq!(report.normalized, 2);
    }

    #[test]
    fn test_nodata_cell_falls_back_to_neighbour() {
        let grid = terrain();
        // first valid neighbour of (row 1, col 0) in scan order is (row 0, col 1)
        assert_eq!(terrain_height(&grid, 0.5, 1.5).unwrap(), Some(2.0));
    }

    #[test]
    fn test_out_of_bounds_points_are_dropped_and_counted() {
        let ps = PointSet::from_points(
            vec![
                Point::new(-5.0, 0.5, 1.0),
                Point::new(0.5, 0.5, 0.5),
                Point::new(10.0, 10.0, 1.0),
            ],
            "",
        );
        let (out, report) = normalize(&ps, &terrain(), true);
        assert_eq!(out.len(), 1);
        assert_eq!(report.out_of_bounds, 2);
        assert_eq!(report.clamped, 1);
        assert_eq!(out[0].z, 0.0);
    }

    #[test]
    fn test_all_nodata_terrain_drops_points() {
        let configs =
            GridConfigs::from_extent(BoundingBox::new(0.0, 3.0, 0.0, 3.0), 1.0, "").unwrap();
        let grid = Grid::new(configs);
        let ps = PointSet::from_points(vec![Point::new(1.5, 1.5, 3.0)], "");
        let (out, report) = normalize(&ps, &grid, false);
        assert!(out.is_empty());
        assert_eq!(report.no_terrain, 1);
        assert_eq!(report.dropped(), 1);
    }
}
