use crate::error::{GridError, Result};
use std::fs::File;
use std::io::prelude::*;
use std::io::BufReader;

/// Where a kernel sits relative to the cell being filtered.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KernelAnchor {
    Center,
    UpperLeft,
    UpperRight,
    LowerLeft,
    LowerRight,
    /// An explicit (row, column) within the kernel.
    At(usize, usize),
}

impl KernelAnchor {
    /// Parses `center`, `upper-left`, `upper-right`, `lower-left` or `lower-right`.
    pub fn from_name(name: &str) -> Result<KernelAnchor> {
        match name.trim().to_lowercase().replace('_', "-").as_str() {
            "center" | "centre" => Ok(KernelAnchor::Center),
            "upper-left" => Ok(KernelAnchor::UpperLeft),
            "upper-right" => Ok(KernelAnchor::UpperRight),
            "lower-left" => Ok(KernelAnchor::LowerLeft),
            "lower-right" => Ok(KernelAnchor::LowerRight),
            _ => Err(GridError::invalid_parameter("anchor", name)),
        }
    }
}

/// An immutable matrix of weights with an anchor cell.
///
/// Row 0 of the kernel is its top (northern) row, as weights are written in
/// a weights file. Applying the kernel at a grid cell lines the anchor up
/// with that cell.
#[derive(Clone, Debug, PartialEq)]
pub struct Kernel {
    rows: usize,
    columns: usize,
    weights: Vec<f64>,
    anchor_row: usize,
    anchor_column: usize,
}

impl Kernel {
    /// Creates a kernel from row-major `weights`, anchored at
    /// (`anchor_row`, `anchor_column`).
    pub fn new(
        rows: usize,
        columns: usize,
        weights: Vec<f64>,
        anchor_row: usize,
        anchor_column: usize,
    ) -> Result<Kernel> {
        if rows == 0 || columns == 0 {
            return Err(GridError::invalid_parameter(
                "kernel size",
                format!("{}x{}", rows, columns),
            ));
        }
        if weights.len() != rows * columns {
            return Err(GridError::invalid_parameter("weights", weights.len()));
        }
        if anchor_row >= rows || anchor_column >= columns {
            return Err(GridError::invalid_parameter(
                "anchor",
                format!("({}, {})", anchor_row, anchor_column),
            ));
        }
        Ok(Kernel {
            rows,
            columns,
            weights,
            anchor_row,
            anchor_column,
        })
    }

    /// Creates a kernel positioned by `anchor`. A centred anchor needs an odd
    /// number of rows and columns.
    pub fn with_anchor(
        rows: usize,
        columns: usize,
        weights: Vec<f64>,
        anchor: KernelAnchor,
    ) -> Result<Kernel> {
        let (anchor_row, anchor_column) = match anchor {
            KernelAnchor::Center => {
                if rows % 2 == 0 || columns % 2 == 0 {
                    return Err(GridError::invalid_parameter(
                        "anchor",
                        format!("center of an even-sized {}x{} kernel", rows, columns),
                    ));
                }
                (rows / 2, columns / 2)
            }
            KernelAnchor::UpperLeft => (0, 0),
            KernelAnchor::UpperRight => (0, columns.saturating_sub(1)),
            KernelAnchor::LowerLeft => (rows.saturating_sub(1), 0),
            KernelAnchor::LowerRight => (rows.saturating_sub(1), columns.saturating_sub(1)),
            KernelAnchor::At(r, c) => (r, c),
        };
        Kernel::new(rows, columns, weights, anchor_row, anchor_column)
    }

    /// A square kernel of side `sqrt(weights.len())`, anchored at its centre.
    pub fn centered(weights: Vec<f64>) -> Result<Kernel> {
        let side = (weights.len() as f64).sqrt().round() as usize;
        if side * side != weights.len() {
            return Err(GridError::invalid_parameter("weights", weights.len()));
        }
        Kernel::with_anchor(side, side, weights, KernelAnchor::Center)
    }

    /// The n x n mean filter, every weight `1 / (n * n)`.
    pub fn uniform(n: usize) -> Result<Kernel> {
        let w = 1.0 / (n * n) as f64;
        Kernel::with_anchor(n, n, vec![w; n * n], KernelAnchor::Center)
    }

    /// All weights zero except a 1 at the centre.
    pub fn identity(n: usize) -> Result<Kernel> {
        let mut weights = vec![0.0; n * n];
        if n > 0 {
            weights[(n / 2) * n + n / 2] = 1.0;
        }
        Kernel::with_anchor(n, n, weights, KernelAnchor::Center)
    }

    /// Reads a weights file: one kernel row per line, values separated by
    /// commas or spaces.
    pub fn from_file(file_name: &str, anchor: KernelAnchor) -> Result<Kernel> {
        let f = File::open(file_name)?;
        let f = BufReader::new(f);
        let mut weights = vec![];
        let mut rows = 0;
        let mut columns = 0;
        for (line_num, line) in f.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let mut vec = line.split(',').collect::<Vec<&str>>();
            if vec.len() == 1 {
                vec = line.split_whitespace().collect::<Vec<&str>>();
            }
            rows += 1;
            if rows == 1 {
                columns = vec.len();
            } else if vec.len() != columns {
                return Err(GridError::Parse {
                    file: file_name.to_string(),
                    line: line_num + 1,
                    message: format!("expected {} weights, found {}", columns, vec.len()),
                });
            }
            for s in vec {
                let weight = s.trim().parse::<f64>().map_err(|e| GridError::Parse {
                    file: file_name.to_string(),
                    line: line_num + 1,
                    message: format!("{} ('{}')", e, s.trim()),
                })?;
                weights.push(weight);
            }
        }
        Kernel::with_anchor(rows, columns, weights, anchor)
    }

    /// Scales the weights to sum to one. Kernels whose weights sum to zero,
    /// such as edge detectors, are returned unchanged.
    pub fn normalized(mut self) -> Kernel {
        let sum: f64 = self.weights.iter().sum();
        if sum != 0.0 {
            for w in self.weights.iter_mut() {
                *w /= sum;
            }
        }
        self
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn anchor(&self) -> (usize, usize) {
        (self.anchor_row, self.anchor_column)
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn weight(&self, row: usize, column: usize) -> f64 {
        self.weights[row * self.columns + column]
    }

    /// Grid-space `(d_row, d_column, weight)` of every kernel cell relative
    /// to the anchor. Grid rows increase northward, kernel rows southward.
    pub fn offsets(&self) -> Vec<(isize, isize, f64)> {
        let mut offsets = Vec::with_capacity(self.weights.len());
        for row in 0..self.rows {
            for col in 0..self.columns {
                offsets.push((
                    self.anchor_row as isize - row as isize,
                    col as isize - self.anchor_column as isize,
                    self.weight(row, col),
                ));
            }
        }
        offsets
    }
}

#[cfg(test)]
mod test {
    use super::{Kernel, KernelAnchor};
    use crate::error::GridError;
    use std::fs;

    #[test]
    fn test_constructors() {
        let k = Kernel::uniform(3).unwrap();
        assert_eq!(k.anchor(), (1, 1));
        assert!((k.weights().iter().sum::<f64>() - 1.0).abs() < 1e-12);
        let id = Kernel::identity(5).unwrap();
        assert_eq!(id.weight(2, 2), 1.0);
        assert_eq!(id.weights().iter().sum::<f64>(), 1.0);
        let c = Kernel::centered(vec![0.0, 1.0, 0.0, 1.0, -4.0, 1.0, 0.0, 1.0, 0.0]).unwrap();
        assert_eq!(c.rows(), 3);
        assert_eq!(c.weight(1, 1), -4.0);
        assert_eq!(c.clone().normalized(), c);
        let k = Kernel::centered(vec![1.0, 2.0, 1.0, 2.0, 4.0, 2.0, 1.0, 2.0, 1.0])
            .unwrap()
            .normalized();
        assert_eq!(k.weight(1, 1), 0.25);
    }

    #[test]
    fn test_even_kernel_needs_explicit_anchor() {
        match Kernel::uniform(4) {
            Err(GridError::InvalidParameter { name, .. }) => assert_eq!(name, "anchor"),
            _ => panic!("expected InvalidParameter"),
        }
        let k = Kernel::with_anchor(2, 2, vec![0.25; 4], KernelAnchor::LowerRight).unwrap();
        assert_eq!(k.anchor(), (1, 1));
        let k = Kernel::with_anchor(2, 2, vec![0.25; 4], KernelAnchor::At(0, 1)).unwrap();
        assert_eq!(k.anchor(), (0, 1));
        assert!(Kernel::with_anchor(2, 2, vec![0.25; 4], KernelAnchor::At(2, 0)).is_err());
    }

    #[test]
    fn test_offsets_put_top_row_north() {
        let k = Kernel::with_anchor(3, 3, (0..9).map(|v| v as f64).collect(), KernelAnchor::Center)
            .unwrap();
        let offsets = k.offsets();
        assert_eq!(offsets[0], (1, -1, 0.0));
        assert_eq!(offsets[4], (0, 0, 4.0));
        assert_eq!(offsets[8], (-1, 1, 8.0));
    }

    #[test]
    fn test_weights_file() {
        let file_name = std::env::temp_dir()
            .join(format!("whitebox_gridding_{}_weights.txt", std::process::id()))
            .to_string_lossy()
            .to_string();
        fs::write(&file_name, "1, 2, 1\n0 , 0, 0\n-1,-2,-1\n").unwrap();
        let k = Kernel::from_file(&file_name, KernelAnchor::from_name("center").unwrap()).unwrap();
        assert_eq!(k.weights(), &[1.0, 2.0, 1.0, 0.0, 0.0, 0.0, -1.0, -2.0, -1.0]);

        fs::write(&file_name, "1 1\n1 1\n").unwrap();
        let k = Kernel::from_file(&file_name, KernelAnchor::from_name("upper-left").unwrap())
            .unwrap();
        assert_eq!((k.rows(), k.columns(), k.anchor()), (2, 2, (0, 0)));
        fs::remove_file(&file_name).unwrap();
    }
}
