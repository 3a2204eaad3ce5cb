use super::normalize::{normalize, NormalizeReport};
use super::rasterizer::{rasterize_window, CellWindow, RasterizeOptions};
use super::reducer::Reducer;
use crate::configs::GriddingConfig;
use crate::error::{GridError, Result};
use crate::lidar::{PointSet, PointValue};
use crate::raster::{Grid, GridConfigs};
use crate::structures::BoundingBox;
use crate::utils::ProgressReporter;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;

/// A shared flag used to stop a long-running tiled rasterization. It is
/// checked before each chunk is dispatched.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> CancellationToken {
        CancellationToken::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// One unit of tiled work. `core` is the block of output cells the chunk
/// owns; `window` extends it by the buffer and is what gets rasterized;
/// `select_extent` is the core's footprint grown by the buffer distance,
/// used to pick the chunk's points.
#[derive(Clone, Debug, PartialEq)]
pub struct Chunk {
    pub id: usize,
    pub core: CellWindow,
    pub window: CellWindow,
    pub select_extent: BoundingBox,
}

/// The digital terrain model, canopy height model, and normalization tallies
/// produced by `TileManager::canopy_height_model`.
#[derive(Debug, Clone)]
pub struct HeightModels {
    pub dtm: Grid,
    pub chm: Grid,
    pub report: NormalizeReport,
}

/// Splits a large point-cloud extent into chunks with an overlap buffer,
/// rasterizes the chunks on a pool of worker threads, and stitches the core
/// cells of each into one seamless grid.
///
/// ## Example
/// ```ignore
/// let manager = TileManager::new(1.0, 250.0, 20.0)?
///     .with_options(options)
///     .with_max_procs(4);
/// let dtm = manager.rasterize_tiled(&ground, &Reducer::Surface(PointValue::Z))?;
/// ```
#[derive(Clone, Debug)]
pub struct TileManager {
    resolution: f64,
    chunk_size: Option<f64>,
    buffer: f64,
    options: RasterizeOptions,
    clamp_negative: bool,
    max_procs: isize,
    verbose: bool,
    cancel: CancellationToken,
}

fn validate_geometry(resolution: f64, chunk_size: Option<f64>, buffer: f64) -> Result<()> {
    if !(resolution > 0.0) || !resolution.is_finite() {
        return Err(GridError::invalid_parameter("resolution", resolution));
    }
    if let Some(cs) = chunk_size {
        if !(cs > 0.0) || !cs.is_finite() {
            return Err(GridError::invalid_parameter("chunk_size", cs));
        }
    }
    if !(buffer >= 0.0) || !buffer.is_finite() {
        return Err(GridError::invalid_parameter("buffer", buffer));
    }
    Ok(())
}

/// Splits `cells` cells into runs whose centres share a chunk of side
/// `chunk_size` measured from the grid origin. The last chunk absorbs
/// centres beyond `length`.
fn split_cells(cells: usize, resolution: f64, chunk_size: Option<f64>, length: f64) -> Vec<(usize, usize)> {
    let num_chunks = match chunk_size {
        Some(cs) => ((length / cs).ceil() as usize).max(1),
        None => 1,
    };
    let mut ranges = vec![];
    let mut current: Option<(usize, usize, usize)> = None;
    for c in 0..cells {
        let idx = match chunk_size {
            Some(cs) => (((c as f64 + 0.5) * resolution / cs).floor() as usize).min(num_chunks - 1),
            None => 0,
        };
        current = match current {
            Some((i, start, _)) if i == idx => Some((i, start, c + 1)),
            Some((_, start, end)) => {
                ranges.push((start, end));
                Some((idx, c, c + 1))
            }
            None => Some((idx, c, c + 1)),
        };
    }
    if let Some((_, start, end)) = current {
        ranges.push((start, end));
    }
    ranges
}

impl TileManager {
    pub fn new(resolution: f64, chunk_size: f64, buffer: f64) -> Result<TileManager> {
        validate_geometry(resolution, Some(chunk_size), buffer)?;
        Ok(TileManager {
            resolution,
            chunk_size: Some(chunk_size),
            buffer,
            options: RasterizeOptions::default(),
            clamp_negative: false,
            max_procs: -1,
            verbose: false,
            cancel: CancellationToken::new(),
        })
    }

    /// A manager processing the whole extent as a single chunk.
    pub fn single_chunk(resolution: f64) -> Result<TileManager> {
        validate_geometry(resolution, None, 0.0)?;
        let mut manager = TileManager::new(resolution, 1.0, 0.0)?;
        manager.chunk_size = None;
        Ok(manager)
    }

    /// A manager set up from a validated `GriddingConfig`. A `chunk_size` of
    /// zero means the whole extent is one chunk.
    pub fn from_config(config: &GriddingConfig) -> Result<TileManager> {
        config.validate()?;
        let chunk_size = if config.chunk_size > 0.0 {
            Some(config.chunk_size)
        } else {
            None
        };
        validate_geometry(config.resolution, chunk_size, config.buffer)?;
        Ok(TileManager {
            resolution: config.resolution,
            chunk_size,
            buffer: config.buffer,
            options: config.rasterize_options(),
            clamp_negative: config.clamp_negative,
            max_procs: -1,
            verbose: false,
            cancel: CancellationToken::new(),
        })
    }

    pub fn with_options(mut self, options: RasterizeOptions) -> TileManager {
        self.options = options;
        self
    }

    pub fn with_clamp_negative(mut self, clamp_negative: bool) -> TileManager {
        self.clamp_negative = clamp_negative;
        self
    }

    /// Caps the worker pool; values below 1 use every available core.
    pub fn with_max_procs(mut self, max_procs: isize) -> TileManager {
        self.max_procs = max_procs;
        self
    }

    /// Prints `Progress: N%` as chunks are stitched.
    pub fn with_verbose(mut self, verbose: bool) -> TileManager {
        self.verbose = verbose;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> TileManager {
        self.cancel = token;
        self
    }

    pub fn resolution(&self) -> f64 {
        self.resolution
    }

    pub fn buffer(&self) -> f64 {
        self.buffer
    }

    pub fn options(&self) -> &RasterizeOptions {
        &self.options
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Lays out the chunks covering `geometry`, built over `extent`.
    pub fn layout(&self, geometry: &GridConfigs, extent: &BoundingBox) -> Vec<Chunk> {
        let res = geometry.resolution;
        let buffer_cells = (self.buffer / res).ceil() as usize;
        let col_ranges = split_cells(geometry.columns, res, self.chunk_size, extent.get_width());
        let row_ranges = split_cells(geometry.rows, res, self.chunk_size, extent.get_height());
        let mut chunks = Vec::with_capacity(col_ranges.len() * row_ranges.len());
        for &(r0, r1) in &row_ranges {
            for &(c0, c1) in &col_ranges {
                let core = CellWindow {
                    row_start: r0 as isize,
                    column_start: c0 as isize,
                    rows: r1 - r0,
                    columns: c1 - c0,
                };
                let (wr0, wr1) = (r0.saturating_sub(buffer_cells), (r1 + buffer_cells).min(geometry.rows));
                let (wc0, wc1) = (c0.saturating_sub(buffer_cells), (c1 + buffer_cells).min(geometry.columns));
                let window = CellWindow {
                    row_start: wr0 as isize,
                    column_start: wc0 as isize,
                    rows: wr1 - wr0,
                    columns: wc1 - wc0,
                };
                let select_extent = BoundingBox::new(
                    geometry.west + c0 as f64 * res,
                    geometry.west + c1 as f64 * res,
                    geometry.south + r0 as f64 * res,
                    geometry.south + r1 as f64 * res,
                )
                .expanded_by(self.buffer);
                chunks.push(Chunk {
                    id: chunks.len(),
                    core,
                    window,
                    select_extent,
                });
            }
        }
        chunks
    }

    fn num_procs(&self, num_chunks: usize) -> usize {
        let mut num_procs = num_cpus::get() as isize;
        if self.max_procs > 0 && self.max_procs < num_procs {
            num_procs = self.max_procs;
        }
        (num_procs.max(1) as usize).min(num_chunks.max(1))
    }

    /// Rasterizes one chunk; an empty chunk gives an all no-data grid.
    fn rasterize_chunk(
        &self,
        points: &PointSet,
        geometry: &GridConfigs,
        chunk: &Chunk,
        reducer: &Reducer,
    ) -> Result<(Grid, bool)> {
        let view = points.within(chunk.select_extent);
        if view.is_empty() {
            return Ok((Grid::new(chunk.window.configs(geometry)), true));
        }
        log::debug!(
            "rasterizing chunk {} ({} points, {}x{} cells)",
            chunk.id,
            view.len(),
            chunk.window.rows,
            chunk.window.columns
        );
        let grid = rasterize_window(&view, geometry, chunk.window, reducer, &self.options)?;
        Ok((grid, false))
    }

    /// Rasterizes `points` over their own extent.
    pub fn rasterize_tiled(&self, points: &PointSet, reducer: &Reducer) -> Result<Grid> {
        let extent = points.extent().ok_or(GridError::InsufficientPoints {
            operation: "rasterize_tiled",
        })?;
        self.rasterize_tiled_extent(points, extent, reducer)
    }

    /// Rasterizes `points` over `extent`, chunk by chunk, in parallel.
    pub fn rasterize_tiled_extent(
        &self,
        points: &PointSet,
        extent: BoundingBox,
        reducer: &Reducer,
    ) -> Result<Grid> {
        self.options.validate()?;
        if let Reducer::PitFree(params) = reducer {
            params.validate()?;
        }
        let geometry = GridConfigs::from_extent(extent, self.resolution, points.crs())?;
        let chunks = self.layout(&geometry, &extent);
        let num_chunks = chunks.len();
        let mut output = Grid::new(geometry.clone());

        let chunk_list = Mutex::new(0..num_chunks);
        let abort = AtomicBool::new(false);
        let (tx, rx) = mpsc::channel();
        let mut num_empty = 0usize;
        let mut first_error: Option<GridError> = None;
        let mut progress = ProgressReporter::new("Progress", self.verbose);
        let mut num_done = 0usize;

        thread::scope(|s| {
            for _ in 0..self.num_procs(num_chunks) {
                let tx = tx.clone();
                let (chunk_list, chunks, geometry, abort) = (&chunk_list, &chunks, &geometry, &abort);
                s.spawn(move || loop {
                    if self.cancel.is_cancelled() || abort.load(Ordering::SeqCst) {
                        break;
                    }
                    // get the next chunk up for rasterizing
                    let id = match chunk_list.lock() {
                        Ok(mut list) => list.next(),
                        Err(_) => None,
                    };
                    let id = match id {
                        Some(id) => id,
                        None => break, // there are no more chunks
                    };
                    let result = self.rasterize_chunk(points, geometry, &chunks[id], reducer);
                    if tx.send((id, result)).is_err() {
                        break;
                    }
                });
            }
            drop(tx);

            for (id, result) in rx.iter() {
                match result {
                    Ok((grid, empty)) => {
                        if empty {
                            num_empty += 1;
                        }
                        stitch(&mut output, &chunks[id], &grid);
                        num_done += 1;
                        progress.update(num_done, num_chunks);
                    }
                    Err(e) => {
                        abort.store(true, Ordering::SeqCst);
                        if first_error.is_none() {
                            first_error = Some(e);
                        }
                    }
                }
            }
        });

        if let Some(e) = first_error {
            return Err(e);
        }
        if self.cancel.is_cancelled() {
            return Err(GridError::Cancelled);
        }
        if num_empty > 0 {
            log::warn!(
                "{} of {} chunks contained no points and were left as no-data",
                num_empty,
                num_chunks
            );
        }
        Ok(output)
    }

    /// Subtracts the terrain height under each point from its elevation.
    pub fn normalize(&self, points: &PointSet, terrain: &Grid) -> (PointSet, NormalizeReport) {
        normalize(points, terrain, self.clamp_negative)
    }

    /// Builds a terrain model from the ground-classified points, normalizes
    /// every point against it, and rasterizes the normalized heights with
    /// `canopy`. Both grids share the extent of the full point set.
    pub fn canopy_height_model(&self, points: &PointSet, canopy: &Reducer) -> Result<HeightModels> {
        let extent = points.extent().ok_or(GridError::InsufficientPoints {
            operation: "canopy_height_model",
        })?;
        let ground = points.select(|p| p.is_ground()).to_point_set();
        if ground.is_empty() {
            return Err(GridError::InsufficientPoints {
                operation: "canopy_height_model (ground points)",
            });
        }
        let dtm = self.rasterize_tiled_extent(&ground, extent, &Reducer::Surface(PointValue::Z))?;
        let (normalized, report) = self.normalize(points, &dtm);
        let chm = self.rasterize_tiled_extent(&normalized, extent, canopy)?;
        Ok(HeightModels { dtm, chm, report })
    }
}

/// Copies the core cells of a rasterized chunk into the output grid.
fn stitch(output: &mut Grid, chunk: &Chunk, grid: &Grid) {
    let columns = output.columns();
    let (core, window) = (chunk.core, chunk.window);
    let c0 = (core.column_start - window.column_start) as usize;
    let r0 = (core.row_start - window.row_start) as usize;
    for r in 0..core.rows {
        let src_start = (r0 + r) * window.columns + c0;
        let dst_start = (core.row_start as usize + r) * columns + core.column_start as usize;
        output.data_mut()[dst_start..dst_start + core.columns]
            .copy_from_slice(&grid.data()[src_start..src_start + core.columns]);
    }
}

/// Tiled rasterization with default options; see `TileManager`.
pub fn rasterize_tiled(
    points: &PointSet,
    resolution: f64,
    chunk_size: f64,
    buffer: f64,
    reducer: &Reducer,
) -> Result<Grid> {
    TileManager::new(resolution, chunk_size, buffer)?.rasterize_tiled(points, reducer)
}

#[cfg(test)]
mod test {
    use super::{rasterize_tiled, split_cells, CancellationToken, TileManager};
    use crate::error::GridError;
    use crate::gridding::{rasterize, RasterizeOptions, Reducer};
    use crate::lidar::{Point, PointSet, PointValue};
    use crate::raster::GridConfigs;
    use crate::structures::BoundingBox;
    use approx::assert_relative_eq;

    fn grid_points() -> PointSet {
        let mut points = vec![];
        for i in 0..40 {
            for j in 0..30 {
                let (x, y) = (i as f64 * 0.5 + 0.1, j as f64 * 0.5 + 0.2);
                points.push(Point::new(x, y, (x * 0.3).sin() * 4.0 + y));
            }
        }
        PointSet::from_points(points, "")
    }

    #[test]
    fn test_split_cells() {
        assert_eq!(split_cells(10, 1.0, Some(4.0), 10.0), vec![(0, 4), (4, 8), (8, 10)]);
        assert_eq!(split_cells(10, 1.0, None, 10.0), vec![(0, 10)]);
        // width 10 at resolution 3 needs 4 cells; the last centre (10.5) lies
        // beyond a 10 m chunk but stays in the single chunk
        assert_eq!(split_cells(4, 3.0, Some(10.0), 10.0), vec![(0, 4)]);
    }

    #[test]
    fn test_layout_cores_partition_grid() {
        let extent = BoundingBox::new(0.0, 23.0, 0.0, 17.0);
        let geometry = GridConfigs::from_extent(extent, 1.0, "").unwrap();
        let manager = TileManager::new(1.0, 5.0, 2.5).unwrap();
        let chunks = manager.layout(&geometry, &extent);
        assert_eq!(chunks.len(), 5 * 4);
        let mut owners = vec![0usize; geometry.num_cells()];
        for chunk in &chunks {
            for r in 0..chunk.core.rows as isize {
                for c in 0..chunk.core.columns as isize {
                    let (row, col) = (chunk.core.row_start + r, chunk.core.column_start + c);
                    assert!(chunk.window.contains(row, col));
                    owners[row as usize * geometry.columns + col as usize] += 1;
                }
            }
        }
        assert!(owners.iter().all(|&n| n == 1));
        assert_eq!(chunks[6].window.column_start, chunks[6].core.column_start - 3);
    }

    #[test]
    fn test_invalid_geometry() {
        for (res, cs, buf, name) in [
            (0.0, 10.0, 0.0, "resolution"),
            (1.0, -1.0, 0.0, "chunk_size"),
            (1.0, 10.0, -0.5, "buffer"),
        ] {
            match TileManager::new(res, cs, buf) {
                Err(GridError::InvalidParameter { name: n, .. }) => assert_eq!(n, name),
                _ => panic!("expected InvalidParameter for {}", name),
            }
        }
    }

    #[test]
    fn test_single_chunk_equals_direct() {
        let ps = grid_points();
        let extent = ps.extent().unwrap();
        let reducer = Reducer::Mean(PointValue::Z);
        let direct = rasterize(&ps, extent, 1.0, &reducer, &RasterizeOptions::default()).unwrap();
        for &buffer in &[0.0, 3.0, 50.0] {
            let tiled = rasterize_tiled(&ps, 1.0, 100.0, buffer, &reducer).unwrap();
            assert_eq!(tiled, direct);
        }
    }

    #[test]
    fn test_multi_chunk_bucket_reducer_is_seamless() {
        let ps = grid_points();
        let extent = ps.extent().unwrap();
        let reducer = Reducer::Max(PointValue::Z);
        let direct = rasterize(&ps, extent, 1.0, &reducer, &RasterizeOptions::default()).unwrap();
        let tiled = TileManager::new(1.0, 4.0, 0.0)
            .unwrap()
            .with_max_procs(3)
            .rasterize_tiled(&ps, &reducer)
            .unwrap();
        assert_eq!(tiled.data(), direct.data());
    }

    #[test]
    fn test_empty_chunks_are_nodata() {
        let ps = PointSet::from_points(vec![Point::new(0.5, 0.5, 1.0)], "");
        let manager = TileManager::new(1.0, 2.0, 0.0).unwrap();
        let grid = manager
            .rasterize_tiled_extent(&ps, BoundingBox::new(0.0, 6.0, 0.0, 6.0), &Reducer::Count)
            .unwrap();
        assert_eq!(grid.num_valid_cells(), 1);
        assert_eq!(grid.get_value(0, 0), 1.0);
    }

    #[test]
    fn test_cancellation() {
        let ps = grid_points();
        let token = CancellationToken::new();
        let manager = TileManager::new(1.0, 2.0, 0.0)
            .unwrap()
            .with_cancellation(token.clone());
        token.cancel();
        match manager.rasterize_tiled(&ps, &Reducer::Count) {
            Err(GridError::Cancelled) => {}
            _ => panic!("expected Cancelled"),
        }
    }

    #[test]
    fn test_canopy_height_model() {
        let mut points = vec![];
        for i in 0..10 {
            for j in 0..10 {
                let (x, y) = (i as f64 + 0.5, j as f64 + 0.5);
                let ground = 100.0 + 0.1 * x;
                points.push(Point::new(x, y, ground).with_attribute("classification", 2.0));
                if (i + j) % 2 == 0 {
                    points.push(
                        Point::new(x + 0.1, y + 0.1, ground + 15.0)
                            .with_attribute("classification", 5.0),
                    );
                }
            }
        }
        let ps = PointSet::from_points(points, "");
        let manager = TileManager::new(1.0, 4.0, 3.0).unwrap();
        let models = manager
            .canopy_height_model(&ps, &Reducer::Max(PointValue::Z))
            .unwrap();
        assert_eq!(models.report.dropped(), 0);
        assert_relative_eq!(models.chm.get_value(0, 0), 15.0, epsilon = 1e-9);
        assert_eq!(models.chm.get_value(0, 1), 0.0);
    }
}
