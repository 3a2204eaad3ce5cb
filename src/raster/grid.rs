use crate::error::{GridError, Result};
use crate::structures::BoundingBox;
use std::ops::Index;

/// Default no-data sentinel.
pub const NODATA: f64 = -32768.0;

/// Geometry and metadata of a regular grid. The origin (`west`, `south`) is
/// the lower-left corner; row 0 is the southern-most row and cell
/// `(row, column)` covers
/// `[west + column * resolution, west + (column + 1) * resolution) x
///  [south + row * resolution, south + (row + 1) * resolution)`.
#[derive(Debug, Clone, PartialEq)]
pub struct GridConfigs {
    pub rows: usize,
    pub columns: usize,
    pub resolution: f64,
    pub west: f64,
    pub south: f64,
    pub nodata: f64,
    pub crs: String,
    pub metadata: Vec<String>,
}

impl Default for GridConfigs {
    fn default() -> GridConfigs {
        GridConfigs {
            rows: 0,
            columns: 0,
            resolution: 1.0,
            west: 0.0,
            south: 0.0,
            nodata: NODATA,
            crs: "not specified".to_string(),
            metadata: vec![],
        }
    }
}

/// Number of cells of size `resolution` needed to span `length`. Quotients
/// within floating-point noise of an integer are not rounded up.
fn cells_to_cover(length: f64, resolution: f64) -> usize {
    let n = length / resolution;
    let n = if (n - n.round()).abs() < 1e-9 {
        n.round()
    } else {
        n.ceil()
    };
    (n as usize).max(1)
}

impl GridConfigs {
    /// Grid geometry covering `extent`: `columns = ceil(width / resolution)`,
    /// `rows = ceil(height / resolution)`, at least one of each.
    pub fn from_extent(extent: BoundingBox, resolution: f64, crs: &str) -> Result<GridConfigs> {
        if !(resolution > 0.0) || !resolution.is_finite() {
            return Err(GridError::invalid_parameter("resolution", resolution));
        }
        Ok(GridConfigs {
            rows: cells_to_cover(extent.get_height(), resolution),
            columns: cells_to_cover(extent.get_width(), resolution),
            resolution,
            west: extent.min_x,
            south: extent.min_y,
            crs: crs.to_string(),
            ..Default::default()
        })
    }

    pub fn east(&self) -> f64 {
        self.west + self.columns as f64 * self.resolution
    }

    pub fn north(&self) -> f64 {
        self.south + self.rows as f64 * self.resolution
    }

    pub fn num_cells(&self) -> usize {
        self.rows * self.columns
    }

    /// x coordinate of the centre of `column`.
    pub fn get_x_from_column(&self, column: isize) -> f64 {
        self.west + (column as f64 + 0.5) * self.resolution
    }

    /// y coordinate of the centre of `row`.
    pub fn get_y_from_row(&self, row: isize) -> f64 {
        self.south + (row as f64 + 0.5) * self.resolution
    }

    pub fn get_column_from_x(&self, x: f64) -> isize {
        ((x - self.west) / self.resolution).floor() as isize
    }

    pub fn get_row_from_y(&self, y: f64) -> isize {
        ((y - self.south) / self.resolution).floor() as isize
    }

    /// The `(row, column)` containing (x, y). Coordinates lying exactly on the
    /// northern or eastern grid edge belong to the last row or column. The
    /// result may lie outside of the grid.
    pub fn cell_of(&self, x: f64, y: f64) -> (isize, isize) {
        let mut row = self.get_row_from_y(y);
        let mut column = self.get_column_from_x(x);
        if column == self.columns as isize && x <= self.east() {
            column -= 1;
        }
        if row == self.rows as isize && y <= self.north() {
            row -= 1;
        }
        (row, column)
    }

    pub fn is_cell_in_grid(&self, row: isize, column: isize) -> bool {
        row >= 0 && column >= 0 && (row as usize) < self.rows && (column as usize) < self.columns
    }

    pub fn get_bounding_box(&self) -> BoundingBox {
        BoundingBox::new(self.west, self.east(), self.south, self.north())
    }

    /// True if both geometries describe the same cells.
    pub fn same_geometry(&self, other: &GridConfigs) -> bool {
        self.rows == other.rows
            && self.columns == other.columns
            && self.resolution == other.resolution
            && self.west == other.west
            && self.south == other.south
    }
}

/// A regular 2-D grid of `f64` values with a no-data sentinel.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    pub configs: GridConfigs,
    data: Vec<f64>,
}

impl Index<(isize, isize)> for Grid {
    type Output = f64;

    fn index(&self, index: (isize, isize)) -> &f64 {
        let (row, column) = index;
        if !self.configs.is_cell_in_grid(row, column) {
            return &self.configs.nodata;
        }
        &self.data[row as usize * self.configs.columns + column as usize]
    }
}

impl Grid {
    /// Creates a grid with every cell set to no-data.
    pub fn new(configs: GridConfigs) -> Grid {
        let data = vec![configs.nodata; configs.num_cells()];
        Grid { configs, data }
    }

    /// Creates a grid with every cell set to `value`.
    pub fn filled(configs: GridConfigs, value: f64) -> Grid {
        let data = vec![value; configs.num_cells()];
        Grid { configs, data }
    }

    /// Creates a grid from row-major data, row 0 first.
    pub fn from_data(configs: GridConfigs, data: Vec<f64>) -> Result<Grid> {
        if data.len() != configs.num_cells() {
            return Err(GridError::invalid_parameter("data.len()", data.len()));
        }
        Ok(Grid { configs, data })
    }

    /// A no-data grid with the same geometry, CRS, and no-data value.
    pub fn initialize_using_grid(other: &Grid) -> Grid {
        let mut configs = other.configs.clone();
        configs.metadata.clear();
        Grid::new(configs)
    }

    pub fn rows(&self) -> usize {
        self.configs.rows
    }

    pub fn columns(&self) -> usize {
        self.configs.columns
    }

    pub fn nodata(&self) -> f64 {
        self.configs.nodata
    }

    pub fn is_nodata(&self, value: f64) -> bool {
        value == self.configs.nodata
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [f64] {
        &mut self.data
    }

    /// Returns the value of the cell at `row` and `column`, or no-data for
    /// positions beyond the grid.
    pub fn get_value(&self, row: isize, column: isize) -> f64 {
        self[(row, column)]
    }

    pub fn set_value(&mut self, row: isize, column: isize, value: f64) {
        if self.configs.is_cell_in_grid(row, column) {
            let idx = row as usize * self.configs.columns + column as usize;
            self.data[idx] = value;
        }
    }

    pub fn set_row_data(&mut self, row: isize, values: Vec<f64>) {
        if row < 0 || row as usize >= self.configs.rows {
            return;
        }
        let start = row as usize * self.configs.columns;
        let n = values.len().min(self.configs.columns);
        self.data[start..start + n].copy_from_slice(&values[..n]);
    }

    pub fn get_row_data(&self, row: isize) -> Vec<f64> {
        if row < 0 || row as usize >= self.configs.rows {
            return vec![self.configs.nodata; self.configs.columns];
        }
        let start = row as usize * self.configs.columns;
        self.data[start..start + self.configs.columns].to_vec()
    }

    /// Nearest-cell lookup of the value at (x, y).
    pub fn value_at(&self, x: f64, y: f64) -> Result<f64> {
        let (row, column) = self.configs.cell_of(x, y);
        if !self.configs.is_cell_in_grid(row, column) {
            return Err(GridError::OutOfBoundsPoint { x, y });
        }
        Ok(self.get_value(row, column))
    }

    /// Replaces each cell by the larger of itself and the corresponding cell in
    /// `other`; no-data only survives where both grids are no-data.
    pub fn max_overlay(&mut self, other: &Grid) -> Result<()> {
        if !self.configs.same_geometry(&other.configs) {
            return Err(GridError::invalid_parameter(
                "other",
                format!("{}x{} grid", other.rows(), other.columns()),
            ));
        }
        let (nodata, other_nodata) = (self.configs.nodata, other.configs.nodata);
        for (z, &zn) in self.data.iter_mut().zip(other.data.iter()) {
            if zn != other_nodata && (*z == nodata || zn > *z) {
                *z = zn;
            }
        }
        Ok(())
    }

    pub fn num_valid_cells(&self) -> usize {
        let nodata = self.configs.nodata;
        self.data.iter().filter(|&&z| z != nodata).count()
    }

    /// Mean and population standard deviation of the valid cells.
    pub fn calculate_mean_and_stdev(&self) -> (f64, f64) {
        let nodata = self.configs.nodata;
        let (mut sum, mut count) = (0f64, 0f64);
        for &z in self.data.iter().filter(|&&z| z != nodata) {
            sum += z;
            count += 1.0;
        }
        if count == 0.0 {
            return (0.0, 0.0);
        }
        let mean = sum / count;
        let sq_diff_sum: f64 = self
            .data
            .iter()
            .filter(|&&z| z != nodata)
            .map(|z| (z - mean) * (z - mean))
            .sum();
        (mean, (sq_diff_sum / count).sqrt())
    }

    pub fn get_bounding_box(&self) -> BoundingBox {
        self.configs.get_bounding_box()
    }

    pub fn add_metadata_entry(&mut self, value: String) {
        self.configs.metadata.push(value);
    }
}

#[cfg(test)]
mod test {
    use super::{Grid, GridConfigs, NODATA};
    use crate::error::GridError;
    use crate::structures::BoundingBox;

    #[test]
    fn test_dimensions_from_extent() {
        let c = GridConfigs::from_extent(BoundingBox::new(0.0, 10.5, 0.0, 4.0), 1.0, "").unwrap();
        assert_eq!((c.columns, c.rows), (11, 4));
        let c = GridConfigs::from_extent(BoundingBox::new(0.0, 0.3, 0.0, 0.7), 0.1, "").unwrap();
        assert_eq!((c.columns, c.rows), (3, 7));
        let c = GridConfigs::from_extent(BoundingBox::from_point(5.0, 5.0), 2.0, "").unwrap();
        assert_eq!((c.columns, c.rows), (1, 1));
        match GridConfigs::from_extent(BoundingBox::from_point(5.0, 5.0), 0.0, "") {
            Err(GridError::InvalidParameter { name, .. }) => assert_eq!(name, "resolution"),
            _ => panic!("expected InvalidParameter"),
        }
    }

    #[test]
    fn test_cell_lookup_and_edges() {
        let c = GridConfigs::from_extent(BoundingBox::new(0.0, 2.0, 0.0, 2.0), 1.0, "").unwrap();
        assert_eq!(c.cell_of(0.0, 0.0), (0, 0));
        assert_eq!(c.cell_of(1.0, 0.0), (0, 1));
        assert_eq!(c.cell_of(0.0, 1.0), (1, 0));
        assert_eq!(c.cell_of(2.0, 2.0), (1, 1));
        assert_eq!(c.cell_of(2.5, -0.5), (-1, 2));
        assert_eq!(c.get_x_from_column(1), 1.5);
        assert_eq!(c.get_y_from_row(0), 0.5);
    }

    #[test]
    fn test_value_at_out_of_bounds() {
        let c = GridConfigs::from_extent(BoundingBox::new(0.0, 2.0, 0.0, 2.0), 1.0, "").unwrap();
        let g = Grid::filled(c, 3.0);
        assert_eq!(g.value_at(1.2, 0.1).unwrap(), 3.0);
        match g.value_at(3.0, 1.0) {
            Err(GridError::OutOfBoundsPoint { x, y }) => assert_eq!((x, y), (3.0, 1.0)),
            _ => panic!("expected OutOfBoundsPoint"),
        }
        assert_eq!(g.get_value(-1, 0), NODATA);
    }

    #[test]
    fn test_out_of_bounds_writes_are_ignored() {
        let c = GridConfigs::from_extent(BoundingBox::new(0.0, 2.0, 0.0, 2.0), 1.0, "").unwrap();
        let mut g = Grid::new(c);
        g.set_value(-1, 0, 7.0);
        g.set_value(0, 2, 7.0);
        g.set_value(1, 1, 7.0);
        assert_eq!(g.configs.nodata, NODATA);
        assert_eq!(g[(-1, 0)], NODATA);
        assert_eq!(g[(1, 1)], 7.0);
        assert_eq!(g.num_valid_cells(), 1);
    }

    #[test]
    fn test_max_overlay() {
        let c = GridConfigs::from_extent(BoundingBox::new(0.0, 3.0, 0.0, 1.0), 1.0, "").unwrap();
        let mut a = Grid::from_data(c.clone(), vec![1.0, NODATA, 5.0]).unwrap();
        let b = Grid::from_data(c, vec![2.0, 4.0, NODATA]).unwrap();
        a.max_overlay(&b).unwrap();
        assert_eq!(a.data(), &[2.0, 4.0, 5.0]);
    }

    #[test]
    fn test_row_data_and_statistics() {
        let c = GridConfigs::from_extent(BoundingBox::new(0.0, 2.0, 0.0, 2.0), 1.0, "").unwrap();
        let mut g = Grid::new(c);
        g.set_row_data(1, vec![2.0, 4.0]);
        assert_eq!(g.get_row_data(1), vec![2.0, 4.0]);
        assert_eq!(g.num_valid_cells(), 2);
        assert_eq!(g.calculate_mean_and_stdev(), (3.0, 1.0));
    }
}
