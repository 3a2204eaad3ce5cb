use super::knn_interpolator::KnnInterpolator;
use super::pit_free;
use super::reducer::Reducer;
use crate::error::{GridError, Result};
use crate::lidar::{Point, PointSet, PointValue, PointView};
use crate::raster::{Grid, GridConfigs};
use crate::structures::{BoundingBox, SpatialIndex};
use rayon::prelude::*;

/// Settings shared by every rasterization call.
#[derive(Clone, Debug, PartialEq)]
pub struct RasterizeOptions {
    /// Fill cells without contributing points by KNN-IDW at the cell centre.
    pub interpolate_missing: bool,
    pub k: usize,
    pub power: f64,
    pub max_radius: Option<f64>,
    /// Bucket size of the spatial index. `None` picks one from the point density.
    pub bucket_size: Option<f64>,
}

impl Default for RasterizeOptions {
    fn default() -> RasterizeOptions {
        RasterizeOptions {
            interpolate_missing: false,
            k: 10,
            power: 2.0,
            max_radius: None,
            bucket_size: None,
        }
    }
}

impl RasterizeOptions {
    pub fn interpolator(&self, value: PointValue) -> KnnInterpolator {
        KnnInterpolator {
            k: self.k,
            power: self.power,
            max_radius: self.max_radius,
            value,
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.interpolator(PointValue::Z).validate()?;
        if let Some(b) = self.bucket_size {
            if !(b > 0.0) {
                return Err(GridError::invalid_parameter("bucket_size", b));
            }
        }
        Ok(())
    }
}

/// A rectangular block of cells within a larger grid geometry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CellWindow {
    pub row_start: isize,
    pub column_start: isize,
    pub rows: usize,
    pub columns: usize,
}

impl CellWindow {
    pub fn full(geometry: &GridConfigs) -> CellWindow {
        CellWindow {
            row_start: 0,
            column_start: 0,
            rows: geometry.rows,
            columns: geometry.columns,
        }
    }

    pub fn contains(&self, row: isize, column: isize) -> bool {
        row >= self.row_start
            && column >= self.column_start
            && row < self.row_start + self.rows as isize
            && column < self.column_start + self.columns as isize
    }

    /// The geometry of a grid holding just this window's cells.
    pub fn configs(&self, geometry: &GridConfigs) -> GridConfigs {
        GridConfigs {
            rows: self.rows,
            columns: self.columns,
            west: geometry.west + self.column_start as f64 * geometry.resolution,
            south: geometry.south + self.row_start as f64 * geometry.resolution,
            metadata: vec![],
            ..geometry.clone()
        }
    }
}

/// Rasterizes `points` onto a grid of `resolution`-sized cells covering
/// `extent`, evaluating `reducer` in every cell.
///
/// Cells that receive no points hold the no-data value, unless
/// `options.interpolate_missing` is set, in which case they are filled by
/// KNN-IDW over the whole point set at the cell centre.
///
/// ## Example
/// ```ignore
/// let grid = rasterize(&points, extent, 1.0, &Reducer::Mean(PointValue::Z), &options)?;
/// ```
pub fn rasterize(
    points: &PointSet,
    extent: BoundingBox,
    resolution: f64,
    reducer: &Reducer,
    options: &RasterizeOptions,
) -> Result<Grid> {
    rasterize_view(&points.all(), extent, resolution, reducer, options)
}

/// As `rasterize`, for a filtered view of a point set.
pub fn rasterize_view(
    view: &PointView,
    extent: BoundingBox,
    resolution: f64,
    reducer: &Reducer,
    options: &RasterizeOptions,
) -> Result<Grid> {
    let geometry = GridConfigs::from_extent(extent, resolution, view.source().crs())?;
    rasterize_window(view, &geometry, CellWindow::full(&geometry), reducer, options)
}

/// Builds a spatial index over `view`, sizing buckets from `options` or from
/// the view's point density.
pub fn build_index<'a>(view: &PointView<'a>, options: &RasterizeOptions) -> Result<SpatialIndex<'a>> {
    let bucket_size = match options.bucket_size {
        Some(b) => b,
        None => match view.extent() {
            Some(extent) => SpatialIndex::suggest_bucket_size(extent, view.len()),
            None => 1.0,
        },
    };
    SpatialIndex::build_from_view(view, bucket_size)
}

/// Rasterizes the cells of `window`, a block of the grid described by
/// `geometry`. Points are assigned to cells in the coordinates of `geometry`,
/// so a window's cells hold exactly the values the full grid would.
pub fn rasterize_window(
    view: &PointView,
    geometry: &GridConfigs,
    window: CellWindow,
    reducer: &Reducer,
    options: &RasterizeOptions,
) -> Result<Grid> {
    options.validate()?;
    match reducer {
        Reducer::PitFree(params) => {
            return pit_free::rasterize_pit_free(view, geometry, window, params, options);
        }
        Reducer::Surface(value) => {
            if view.is_empty() {
                return Err(GridError::InsufficientPoints {
                    operation: "rasterize surface",
                });
            }
            let mut output = Grid::new(window.configs(geometry));
            let subset = view.select(|p| p.value(value).is_some());
            if !subset.is_empty() {
                let index = build_index(&subset, options)?;
                fill_cells(&mut output, &index, &options.interpolator(value.clone()), false)?;
            }
            return Ok(output);
        }
        _ => {}
    }

    // bin the points by cell
    let mut bins: Vec<Vec<usize>> = vec![vec![]; window.rows * window.columns];
    for (i, p) in view.iter() {
        let (row, column) = geometry.cell_of(p.x, p.y);
        if window.contains(row, column) {
            let r = (row - window.row_start) as usize;
            let c = (column - window.column_start) as usize;
            bins[r * window.columns + c].push(i);
        }
    }

    let source = view.source();
    let cell_area = geometry.resolution * geometry.resolution;
    let mut output = Grid::new(window.configs(geometry));
    output
        .data_mut()
        .par_iter_mut()
        .zip(bins.par_iter())
        .for_each(|(z, bin)| {
            let pts: Vec<&Point> = bin.iter().map(|&i| &source[i]).collect();
            if let Some(v) = reducer.reduce_cell(&pts, cell_area) {
                *z = v;
            }
        });

    if options.interpolate_missing && output.num_valid_cells() < output.data().len() {
        if view.is_empty() {
            return Err(GridError::InsufficientPoints {
                operation: "interpolate missing cells",
            });
        }
        let value = reducer.interpolation_value();
        let subset = view.select(|p| p.value(&value).is_some());
        if !subset.is_empty() {
            let index = build_index(&subset, options)?;
            fill_cells(&mut output, &index, &options.interpolator(value), true)?;
        }
    }

    Ok(output)
}

/// Sets cells to the interpolated value at their centres, rows in parallel.
/// With `only_missing`, cells already holding data are left alone.
pub(crate) fn fill_cells(
    output: &mut Grid,
    index: &SpatialIndex,
    interp: &KnnInterpolator,
    only_missing: bool,
) -> Result<()> {
    let configs = output.configs.clone();
    let nodata = configs.nodata;
    output
        .data_mut()
        .par_chunks_mut(configs.columns)
        .enumerate()
        .try_for_each(|(row, values)| -> Result<()> {
            let y = configs.get_y_from_row(row as isize);
            for (col, z) in values.iter_mut().enumerate() {
                if only_missing && *z != nodata {
                    continue;
                }
                let x = configs.get_x_from_column(col as isize);
                if let Some(v) = interp.estimate(index, x, y)? {
                    *z = v;
                }
            }
            Ok(())
        })
}
