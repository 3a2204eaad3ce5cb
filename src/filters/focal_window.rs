use super::kernel::Kernel;
use crate::error::{GridError, Result};
use crate::raster::Grid;
use rayon::prelude::*;
use statrs::statistics::Statistics;
use std::fmt;
use std::sync::Arc;

/// How neighbours beyond the grid edge are treated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum EdgePolicy {
    /// Out-of-bounds neighbours are left out and weights are not renormalized.
    #[default]
    Shrink,
    /// Any out-of-bounds or no-data neighbour makes the output cell no-data.
    NoData,
    /// Out-of-bounds positions take the value of the nearest edge cell.
    Clamp,
}

impl EdgePolicy {
    pub fn from_name(name: &str) -> Result<EdgePolicy> {
        match name.trim().to_lowercase().replace('-', "_").as_str() {
            "shrink" => Ok(EdgePolicy::Shrink),
            "no_data" | "nodata" => Ok(EdgePolicy::NoData),
            "clamp" => Ok(EdgePolicy::Clamp),
            _ => Err(GridError::invalid_parameter("edge_policy", name)),
        }
    }
}

pub type FocalFn = Arc<dyn Fn(&[f64]) -> Option<f64> + Send + Sync>;

/// A statistic over the valid values of a neighbourhood.
#[derive(Clone)]
pub enum FocalStatistic {
    Mean,
    Sum,
    Min,
    Max,
    Range,
    Median,
    /// Population standard deviation.
    StdDev,
    Custom(FocalFn),
}

impl fmt::Debug for FocalStatistic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            FocalStatistic::Mean => "Mean",
            FocalStatistic::Sum => "Sum",
            FocalStatistic::Min => "Min",
            FocalStatistic::Max => "Max",
            FocalStatistic::Range => "Range",
            FocalStatistic::Median => "Median",
            FocalStatistic::StdDev => "StdDev",
            FocalStatistic::Custom(_) => "Custom",
        };
        write!(f, "{}", name)
    }
}

impl FocalStatistic {
    pub fn custom<F>(f: F) -> FocalStatistic
    where
        F: Fn(&[f64]) -> Option<f64> + Send + Sync + 'static,
    {
        FocalStatistic::Custom(Arc::new(f))
    }

    /// Evaluates the statistic; `values` is never empty.
    fn evaluate(&self, values: &mut [f64]) -> Option<f64> {
        let n = values.len();
        match self {
            FocalStatistic::Mean => Some(Statistics::mean(values.iter())),
            FocalStatistic::Sum => Some(values.iter().sum()),
            FocalStatistic::Min => values.iter().copied().reduce(f64::min),
            FocalStatistic::Max => values.iter().copied().reduce(f64::max),
            FocalStatistic::Range => {
                let min = values.iter().copied().reduce(f64::min)?;
                let max = values.iter().copied().reduce(f64::max)?;
                Some(max - min)
            }
            FocalStatistic::Median => {
                values.sort_by(|a, b| a.total_cmp(b));
                if n % 2 == 1 {
                    Some(values[n / 2])
                } else {
                    Some((values[n / 2 - 1] + values[n / 2]) / 2.0)
                }
            }
            FocalStatistic::StdDev => {
                if n == 1 {
                    Some(0.0)
                } else {
                    Some(Statistics::population_std_dev(values.iter()))
                }
            }
            FocalStatistic::Custom(f) => f(values),
        }
    }
}

/// How a neighbourhood is reduced to one value.
#[derive(Clone, Debug)]
pub enum FocalReducer {
    /// Sum of weight times value; no-data neighbours contribute 0.
    WeightedSum,
    /// A statistic of the raw values under the non-zero kernel weights,
    /// ignoring no-data.
    Statistic(FocalStatistic),
}

impl FocalReducer {
    /// Parses `weighted_sum` or the name of a built-in statistic.
    pub fn from_name(name: &str) -> Result<FocalReducer> {
        let stat = match name.trim().to_lowercase().replace('-', "_").as_str() {
            "weighted_sum" | "convolution" => return Ok(FocalReducer::WeightedSum),
            "mean" => FocalStatistic::Mean,
            "sum" => FocalStatistic::Sum,
            "min" | "minimum" => FocalStatistic::Min,
            "max" | "maximum" => FocalStatistic::Max,
            "range" => FocalStatistic::Range,
            "median" => FocalStatistic::Median,
            "stddev" | "stdev" | "std_dev" => FocalStatistic::StdDev,
            _ => return Err(GridError::invalid_parameter("focal_reducer", name)),
        };
        Ok(FocalReducer::Statistic(stat))
    }
}

/// Applies `kernel` at every cell of `grid`, returning a grid of identical
/// dimensions. Fails with `DimensionMismatch` only when the kernel is larger
/// than the grid in either dimension.
///
/// Under `WeightedSum`, no-data neighbours contribute 0 with their weight still
/// applied, like a plain convolution. The one exception is a cell that is itself
/// no-data: it stays no-data for every kernel, not just the identity kernel, so
/// gaps in the input are never filled with partial sums. A `Statistic` gives
/// no-data only when every value in the neighbourhood is no-data.
pub fn apply(
    grid: &Grid,
    kernel: &Kernel,
    reducer: &FocalReducer,
    edge_policy: EdgePolicy,
) -> Result<Grid> {
    let (rows, columns) = (grid.rows(), grid.columns());
    if kernel.rows() > rows || kernel.columns() > columns {
        return Err(GridError::DimensionMismatch {
            kernel_rows: kernel.rows(),
            kernel_columns: kernel.columns(),
            rows,
            columns,
        });
    }
    let nodata = grid.nodata();
    let offsets: Vec<(isize, isize, f64)> = match reducer {
        FocalReducer::WeightedSum => kernel.offsets(),
        FocalReducer::Statistic(_) => kernel
            .offsets()
            .into_iter()
            .filter(|&(_, _, w)| w != 0.0)
            .collect(),
    };
    let (max_row, max_col) = (rows as isize - 1, columns as isize - 1);

    let mut output = Grid::initialize_using_grid(grid);
    output
        .data_mut()
        .par_chunks_mut(columns)
        .enumerate()
        .for_each(|(row, data)| {
            let row = row as isize;
            let mut values: Vec<f64> = Vec::with_capacity(offsets.len());
            for col in 0..columns as isize {
                let z = grid.get_value(row, col);
                if z == nodata {
                    if let FocalReducer::WeightedSum = reducer {
                        continue;
                    }
                }
                values.clear();
                let mut sum = 0f64;
                let mut valid = true;
                for &(dy, dx, w) in &offsets {
                    let (mut y, mut x) = (row + dy, col + dx);
                    if y < 0 || x < 0 || y > max_row || x > max_col {
                        match edge_policy {
                            EdgePolicy::Shrink => continue,
                            EdgePolicy::NoData => {
                                valid = false;
                                break;
                            }
                            EdgePolicy::Clamp => {
                                y = y.clamp(0, max_row);
                                x = x.clamp(0, max_col);
                            }
                        }
                    }
                    let zn = grid.get_value(y, x);
                    if zn == nodata {
                        if edge_policy == EdgePolicy::NoData {
                            valid = false;
                            break;
                        }
                        continue;
                    }
                    match reducer {
                        FocalReducer::WeightedSum => sum += w * zn,
                        FocalReducer::Statistic(_) => values.push(zn),
                    }
                }
                if !valid {
                    continue;
                }
                match reducer {
                    FocalReducer::WeightedSum => data[col as usize] = sum,
                    FocalReducer::Statistic(stat) => {
                        if !values.is_empty() {
                            if let Some(v) = stat.evaluate(&mut values) {
                                data[col as usize] = v;
                            }
                        }
                    }
                }
            }
        });
    Ok(output)
}

#[cfg(test)]
mod test {
    use super::{apply, EdgePolicy, FocalReducer, FocalStatistic};
    use crate::error::GridError;
    use crate::filters::Kernel;
    use crate::raster::{Grid, GridConfigs, NODATA};
    use crate::structures::BoundingBox;
    use approx::assert_relative_eq;

    fn grid(rows: usize, columns: usize, data: Vec<f64>) -> Grid {
        let configs = GridConfigs::from_extent(
            BoundingBox::new(0.0, columns as f64, 0.0, rows as f64),
            1.0,
            "",
        )
        .unwrap();
        Grid::from_data(configs, data).unwrap()
    }

    #[test]
    fn test_identity_kernel_returns_input() {
        let g = grid(3, 4, (0..12).map(|v| v as f64 * 1.5).collect());
        let out = apply(&g, &Kernel::identity(3).unwrap(), &FocalReducer::WeightedSum, EdgePolicy::Shrink)
            .unwrap();
        assert_eq!(out.data(), g.data());
    }

    #[test]
    fn test_shrink_is_zero_padded_convolution() {
        let g = grid(3, 3, vec![1.0; 9]);
        let k = Kernel::centered(vec![1.0; 9]).unwrap();
        let out = apply(&g, &k, &FocalReducer::WeightedSum, EdgePolicy::Shrink).unwrap();
        assert_eq!(out.get_value(0, 0), 4.0);
        assert_eq!(out.get_value(0, 1), 6.0);
        assert_eq!(out.get_value(1, 1), 9.0);
    }

    #[test]
    fn test_edge_policies() {
        let g = grid(3, 3, (1..10).map(|v| v as f64).collect());
        let k = Kernel::centered(vec![1.0; 9]).unwrap();
        let out = apply(&g, &k, &FocalReducer::WeightedSum, EdgePolicy::NoData).unwrap();
        assert_eq!(out.get_value(0, 0), NODATA);
        assert_eq!(out.get_value(1, 1), 45.0);
        assert_eq!(out.num_valid_cells(), 1);

        let out = apply(&g, &k, &FocalReducer::WeightedSum, EdgePolicy::Clamp).unwrap();
        // clamped neighbourhood of (0, 0): 1 1 2 / 1 1 2 / 4 4 5
        assert_eq!(out.get_value(0, 0), 21.0);
    }

    #[test]
    fn test_nodata_handling() {
        let g = grid(3, 3, vec![1.0, 2.0, 3.0, 4.0, NODATA, 6.0, 7.0, 8.0, 9.0]);
        let k = Kernel::centered(vec![1.0; 9]).unwrap();
        let out = apply(&g, &k, &FocalReducer::WeightedSum, EdgePolicy::Shrink).unwrap();
        assert_eq!(out.get_value(1, 1), NODATA);
        assert_eq!(out.get_value(0, 0), 7.0);

        let mean = FocalReducer::Statistic(FocalStatistic::Mean);
        let out = apply(&g, &k, &mean, EdgePolicy::Shrink).unwrap();
        assert_relative_eq!(out.get_value(1, 1), 5.0, epsilon = 1e-12);

        let all_nodata = grid(3, 3, vec![NODATA; 9]);
        let out = apply(&all_nodata, &k, &mean, EdgePolicy::Clamp).unwrap();
        assert_eq!(out.num_valid_cells(), 0);
    }

    #[test]
    fn test_statistics() {
        let g = grid(3, 3, vec![5.0, 1.0, 9.0, 3.0, 7.0, 2.0, 8.0, 4.0, 6.0]);
        let k = Kernel::uniform(3).unwrap();
        let eval = |stat: FocalStatistic| {
            apply(&g, &k, &FocalReducer::Statistic(stat), EdgePolicy::Shrink)
                .unwrap()
                .get_value(1, 1)
        };
        assert_eq!(eval(FocalStatistic::Median), 5.0);
        assert_eq!(eval(FocalStatistic::Min), 1.0);
        assert_eq!(eval(FocalStatistic::Max), 9.0);
        assert_eq!(eval(FocalStatistic::Range), 8.0);
        assert_eq!(eval(FocalStatistic::Sum), 45.0);
        assert_eq!(eval(FocalStatistic::custom(|v| Some(v.len() as f64))), 9.0);
        assert!(matches!(
            FocalReducer::from_name("Weighted-Sum").unwrap(),
            FocalReducer::WeightedSum
        ));
        assert!(FocalReducer::from_name("mode").is_err());
    }

    #[test]
    fn test_statistic_footprint_skips_zero_weights() {
        let g = grid(3, 3, vec![100.0, 1.0, 100.0, 1.0, 1.0, 1.0, 100.0, 1.0, 100.0]);
        let cross = Kernel::centered(vec![0.0, 1.0, 0.0, 1.0, 1.0, 1.0, 0.0, 1.0, 0.0]).unwrap();
        let out = apply(&g, &cross, &FocalReducer::Statistic(FocalStatistic::Max), EdgePolicy::Shrink)
            .unwrap();
        assert_eq!(out.get_value(1, 1), 1.0);
    }

    #[test]
    fn test_weighted_sum_keeps_nodata_cells() {
        let mut data = vec![1.0; 9];
        data[4] = NODATA;
        let g = grid(3, 3, data);
        let k = Kernel::centered(vec![1.0; 9]).unwrap();
        let out = apply(&g, &k, &FocalReducer::WeightedSum, EdgePolicy::Shrink).unwrap();
        assert_eq!(out.get_value(1, 1), NODATA);
        assert_eq!(out.get_value(0, 0), 3.0);
        assert_eq!(out.get_value(0, 1), 5.0);
        let out = apply(&g, &k, &FocalReducer::Statistic(FocalStatistic::Sum), EdgePolicy::Shrink)
            .unwrap();
        assert_eq!(out.get_value(1, 1), 8.0);
    }

    #[test]
    fn test_kernel_larger_than_grid() {
        let g = grid(2, 5, vec![0.0; 10]);
        match apply(&g, &Kernel::uniform(3).unwrap(), &FocalReducer::WeightedSum, EdgePolicy::Shrink) {
            Err(GridError::DimensionMismatch { kernel_rows, rows, .. }) => {
                assert_eq!((kernel_rows, rows), (3, 2))
            }
            _ => panic!("expected DimensionMismatch"),
        }
    }
}
