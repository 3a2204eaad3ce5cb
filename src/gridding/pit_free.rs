use super::rasterizer::{rasterize_window, CellWindow, RasterizeOptions};
use super::reducer::Reducer;
use crate::error::{GridError, Result};
use crate::lidar::{Point, PointSet, PointValue, PointView};
use crate::raster::{Grid, GridConfigs};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Parameters of the pit-free canopy surface.
///
/// Layer `i` is built from the points with `z >= thresholds[i]`: each cell
/// takes the highest point it holds and empty cells are filled by KNN-IDW
/// from neighbours within `max_edge.0` (first layer) or `max_edge.1` (all
/// other layers). A `max_edge` of 0 falls back to the configured search
/// radius. When `subcircle > 0` every point is replaced by eight points on a
/// circle of that radius, widening thin crowns before gridding.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PitFreeParams {
    pub thresholds: Vec<f64>,
    pub max_edge: (f64, f64),
    pub subcircle: f64,
}

impl Default for PitFreeParams {
    fn default() -> PitFreeParams {
        PitFreeParams {
            thresholds: vec![0.0, 2.0, 5.0, 10.0, 15.0],
            max_edge: (0.0, 1.5),
            subcircle: 0.0,
        }
    }
}

impl PitFreeParams {
    pub fn validate(&self) -> Result<()> {
        if self.thresholds.is_empty() {
            return Err(GridError::invalid_parameter("thresholds", "[]"));
        }
        for pair in self.thresholds.windows(2) {
            if !(pair[1] > pair[0]) {
                return Err(GridError::invalid_parameter(
                    "thresholds",
                    format!("{:?}", self.thresholds),
                ));
            }
        }
        if !(self.max_edge.0 >= 0.0) || !(self.max_edge.1 >= 0.0) {
            return Err(GridError::invalid_parameter(
                "max_edge",
                format!("{:?}", self.max_edge),
            ));
        }
        if !(self.subcircle >= 0.0) {
            return Err(GridError::invalid_parameter("subcircle", self.subcircle));
        }
        Ok(())
    }

    /// Search radius used to fill the gaps of layer `layer`.
    pub fn layer_radius(&self, layer: usize, default: Option<f64>) -> Option<f64> {
        let edge = if layer == 0 {
            self.max_edge.0
        } else {
            self.max_edge.1
        };
        if edge > 0.0 {
            Some(edge)
        } else {
            default
        }
    }

    fn layer_points(&self, view: &PointView, threshold: f64) -> PointSet {
        let mut layer = PointSet::new(view.source().crs());
        for (_, p) in view.iter().filter(|(_, p)| p.z >= threshold) {
            if self.subcircle > 0.0 {
                for n in 0..8 {
                    let angle = n as f64 * PI / 4.0;
                    layer.push(Point::new(
                        p.x + self.subcircle * angle.cos(),
                        p.y + self.subcircle * angle.sin(),
                        p.z,
                    ));
                }
            } else {
                layer.push(Point::new(p.x, p.y, p.z));
            }
        }
        layer
    }
}

/// Builds the pit-free surface for `window` by rasterizing one gap-filled
/// maximum surface per threshold and folding them with `max_overlay`.
pub fn rasterize_pit_free(
    view: &PointView,
    geometry: &GridConfigs,
    window: CellWindow,
    params: &PitFreeParams,
    options: &RasterizeOptions,
) -> Result<Grid> {
    params.validate()?;
    if view.is_empty() {
        return Err(GridError::InsufficientPoints {
            operation: "rasterize pit-free surface",
        });
    }
    let mut output = Grid::new(window.configs(geometry));
    let layer_reducer = Reducer::Max(PointValue::Z);
    for (layer, &threshold) in params.thresholds.iter().enumerate() {
        let points = params.layer_points(view, threshold);
        if points.is_empty() {
            break;
        }
        let layer_options = RasterizeOptions {
            interpolate_missing: true,
            max_radius: params.layer_radius(layer, options.max_radius),
            ..options.clone()
        };
        let surface = rasterize_window(&points.all(), geometry, window, &layer_reducer, &layer_options)?;
        output.max_overlay(&surface)?;
    }
    Ok(output)
}
