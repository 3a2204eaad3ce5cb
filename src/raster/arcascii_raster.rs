use super::grid::{Grid, GridConfigs};
use super::RasterSink;
use crate::error::{GridError, Result};
use std::fs::File;
use std::io::prelude::*;
use std::io::{BufReader, BufWriter};

/// Reads an Esri ASCII grid. Rows are stored north to south in the file and
/// are flipped so that row 0 of the returned grid is the southern row.
pub fn read_arcascii(file_name: &str) -> Result<Grid> {
    let f = File::open(file_name)?;
    let f = BufReader::new(f);

    let mut configs = GridConfigs::default();
    let mut xllcenter: Option<f64> = None;
    let mut yllcenter: Option<f64> = None;
    let mut xllcorner: Option<f64> = None;
    let mut yllcorner: Option<f64> = None;
    let mut file_rows: Vec<Vec<f64>> = vec![];

    let parse_err = |line: usize, message: String| GridError::Parse {
        file: file_name.to_string(),
        line,
        message,
    };

    for (line_num, line) in f.lines().enumerate() {
        let line = line?;
        let vec = line.split_whitespace().collect::<Vec<&str>>();
        if vec.is_empty() {
            continue;
        }
        let key = vec[0].to_lowercase();
        let header_value = || -> Result<f64> {
            vec[vec.len() - 1]
                .trim()
                .parse::<f64>()
                .map_err(|e| parse_err(line_num + 1, format!("{}: {}", key, e)))
        };
        if key.contains("nrows") {
            configs.rows = header_value()? as usize;
        } else if key.contains("ncols") {
            configs.columns = header_value()? as usize;
        } else if key.contains("xllcorner") {
            xllcorner = Some(header_value()?);
        } else if key.contains("yllcorner") {
            yllcorner = Some(header_value()?);
        } else if key.contains("xllcenter") {
            xllcenter = Some(header_value()?);
        } else if key.contains("yllcenter") {
            yllcenter = Some(header_value()?);
        } else if key.contains("cellsize") {
            configs.resolution = header_value()?;
        } else if key.contains("nodata_value") {
            configs.nodata = header_value()?;
        } else {
            // it's a data line
            let mut row = Vec::with_capacity(configs.columns);
            for val in vec {
                row.push(
                    val.parse::<f64>()
                        .map_err(|e| parse_err(line_num + 1, e.to_string()))?,
                );
            }
            file_rows.push(row);
        }
    }

    // set the lower-left corner
    match (xllcorner, yllcorner, xllcenter, yllcenter) {
        (Some(x), Some(y), _, _) => {
            configs.west = x;
            configs.south = y;
        }
        (_, _, Some(x), Some(y)) => {
            configs.west = x - 0.5 * configs.resolution;
            configs.south = y - 0.5 * configs.resolution;
        }
        _ => {
            return Err(parse_err(0, "missing lower-left corner coordinates".to_string()));
        }
    }

    let data: Vec<f64> = file_rows.into_iter().rev().flatten().collect();
    if data.len() != configs.num_cells() {
        return Err(parse_err(
            0,
            format!(
                "expected {} cell values, found {}",
                configs.num_cells(),
                data.len()
            ),
        ));
    }
    Grid::from_data(configs, data)
}

/// Writes grids in the Esri ASCII format.
pub struct ArcAsciiWriter {
    pub file_name: String,
    /// Number of decimal places written for each cell value.
    pub precision: usize,
}

impl ArcAsciiWriter {
    pub fn new(file_name: &str) -> ArcAsciiWriter {
        ArcAsciiWriter {
            file_name: file_name.to_string(),
            precision: 3,
        }
    }
}

impl RasterSink for ArcAsciiWriter {
    fn write_grid(&mut self, grid: &Grid) -> Result<()> {
        let f = File::create(&self.file_name)?;
        let mut writer = BufWriter::new(f);
        let configs = &grid.configs;

        writeln!(writer, "NCOLS {}", configs.columns)?;
        writeln!(writer, "NROWS {}", configs.rows)?;
        writeln!(writer, "XLLCORNER {}", configs.west)?;
        writeln!(writer, "YLLCORNER {}", configs.south)?;
        writeln!(writer, "CELLSIZE {}", configs.resolution)?;
        writeln!(writer, "NODATA_VALUE {:.*}", self.precision, configs.nodata)?;

        // write the data, northern row first
        for row in (0..configs.rows as isize).rev() {
            let s = grid
                .get_row_data(row)
                .iter()
                .map(|z| format!("{:.*}", self.precision, z))
                .collect::<Vec<String>>()
                .join(" ");
            writeln!(writer, "{}", s)?;
        }

        writer.flush()?;

        if !configs.crs.is_empty() && configs.crs != "not specified" {
            let prj_file = match self.file_name.rfind('.') {
                Some(i) => format!("{}.prj", &self.file_name[..i]),
                None => format!("{}.prj", self.file_name),
            };
            std::fs::write(prj_file, &configs.crs)?;
        }
        Ok(())
    }
}
