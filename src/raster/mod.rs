// private sub-module defined in other files
mod arcascii_raster;
mod grid;

// exports identifiers from private sub-modules in the current module namespace
pub use self::arcascii_raster::{read_arcascii, ArcAsciiWriter};
pub use self::grid::{Grid, GridConfigs, NODATA};

use crate::error::Result;

/// A destination able to persist a finished `Grid` in a georeferenced format.
pub trait RasterSink {
    fn write_grid(&mut self, grid: &Grid) -> Result<()>;
}

/// Keeps finished grids in memory; handy for tests and for chaining tools.
#[derive(Default)]
pub struct MemorySink {
    pub grids: Vec<Grid>,
}

impl RasterSink for MemorySink {
    fn write_grid(&mut self, grid: &Grid) -> Result<()> {
        self.grids.push(grid.clone());
        Ok(())
    }
}
