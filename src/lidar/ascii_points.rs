use super::point_data::Point;
use super::point_set::PointSet;
use crate::error::{GridError, Result};
use std::fs::File;
use std::io::prelude::*;
use std::io::{BufReader, BufWriter};

/// Anything able to yield a `PointSet`. The CRS override, when given, replaces
/// whatever tag the source carries; projections are never inferred.
pub trait PointSource {
    fn read_points(&self, crs_override: Option<&str>) -> Result<PointSet>;
}

/// Reads delimited-text point files (comma, tab, or space separated) with a
/// header row, e.g. the output of `LasToAscii`:
///
/// ```text
/// X,Y,Z,INTENSITY,CLASS,RETURN,NUM_RETURN,SCAN_ANGLE
/// 481225.31,5718910.03,250.41,212,2,1,1,-4
/// ```
///
/// The x, y, and z columns are required; every other column becomes a point
/// attribute, keyed by its lower-cased header name.
pub struct AsciiPointReader {
    pub file_name: String,
}

impl AsciiPointReader {
    pub fn new(file_name: &str) -> AsciiPointReader {
        AsciiPointReader {
            file_name: file_name.to_string(),
        }
    }
}

fn attribute_name(header: &str) -> String {
    match header.trim().to_lowercase().as_str() {
        "class" => "classification".to_string(),
        "return" | "return_num" => "return_number".to_string(),
        "num_return" | "num_returns" => "number_of_returns".to_string(),
        other => other.to_string(),
    }
}

fn split_line(line: &str) -> Vec<&str> {
    let mut vec = line.split(',').collect::<Vec<&str>>();
    if vec.len() == 1 {
        vec = line.split('\t').collect::<Vec<&str>>();
    }
    if vec.len() == 1 {
        vec = line.split_whitespace().collect::<Vec<&str>>();
    }
    vec
}

impl PointSource for AsciiPointReader {
    fn read_points(&self, crs_override: Option<&str>) -> Result<PointSet> {
        let f = File::open(&self.file_name)?;
        let f = BufReader::new(f);
        let mut points = PointSet::new(crs_override.unwrap_or("not specified"));
        let mut columns: Vec<String> = vec![];
        let (mut x_col, mut y_col, mut z_col) = (None, None, None);
        for (line_num, line) in f.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let vec = split_line(&line);
            if columns.is_empty() {
                columns = vec.iter().map(|s| attribute_name(s)).collect();
                x_col = columns.iter().position(|c| c == "x");
                y_col = columns.iter().position(|c| c == "y");
                z_col = columns.iter().position(|c| c == "z");
                if x_col.is_none() || y_col.is_none() || z_col.is_none() {
                    return Err(GridError::Parse {
                        file: self.file_name.clone(),
                        line: line_num + 1,
                        message: "header must name x, y, and z columns".to_string(),
                    });
                }
                continue;
            }
            if vec.len() != columns.len() {
                return Err(GridError::Parse {
                    file: self.file_name.clone(),
                    line: line_num + 1,
                    message: format!("expected {} fields, found {}", columns.len(), vec.len()),
                });
            }
            let mut p = Point::default();
            for (i, s) in vec.iter().enumerate() {
                let is_xyz = Some(i) == x_col || Some(i) == y_col || Some(i) == z_col;
                if !is_xyz && s.trim().is_empty() {
                    // attribute absent for this point
                    continue;
                }
                let value = s.trim().parse::<f64>().map_err(|e| GridError::Parse {
                    file: self.file_name.clone(),
                    line: line_num + 1,
                    message: format!("{} ('{}')", e, s.trim()),
                })?;
                if Some(i) == x_col {
                    p.x = value;
                } else if Some(i) == y_col {
                    p.y = value;
                } else if Some(i) == z_col {
                    p.z = value;
                } else {
                    p.attributes.insert(columns[i].clone(), value);
                }
            }
            points.push(p);
        }
        Ok(points)
    }
}

/// Writes a point set as comma-separated text, with x, y, z first followed by
/// every attribute found in the set (sorted by name). Missing attributes are
/// written as empty fields.
pub fn write_ascii_points(file_name: &str, points: &PointSet) -> Result<()> {
    let mut names: Vec<&String> = points
        .iter()
        .flat_map(|p| p.attributes.keys())
        .collect();
    names.sort();
    names.dedup();

    let f = File::create(file_name)?;
    let mut writer = BufWriter::new(f);
    let mut header = String::from("x,y,z");
    for name in &names {
        header.push_str(&format!(",{}", name));
    }
    writeln!(writer, "{}", header)?;
    for p in points.iter() {
        let mut s = format!("{},{},{}", p.x, p.y, p.z);
        for name in &names {
            match p.attribute(name) {
                Some(v) => s.push_str(&format!(",{}", v)),
                None => s.push(','),
            }
        }
        writeln!(writer, "{}", s)?;
    }
    writer.flush()?;
    Ok(())
}
