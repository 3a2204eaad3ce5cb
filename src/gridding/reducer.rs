use super::pit_free::PitFreeParams;
use crate::lidar::{Point, PointValue};
use statrs::statistics::Statistics;
use std::fmt;
use std::sync::Arc;

/// A user supplied per-cell statistic over the points falling in the cell.
/// Returning `None` leaves the cell as no-data.
pub type CellFn = Arc<dyn Fn(&[&Point]) -> Option<f64> + Send + Sync>;

/// The per-cell aggregation evaluated by the rasterizer.
#[derive(Clone)]
pub enum Reducer {
    Mean(PointValue),
    /// Sample (n - 1) standard deviation; a single point gives 0.
    StdDev(PointValue),
    PopulationStdDev(PointValue),
    Count,
    /// Points per unit area.
    Density,
    Min(PointValue),
    Max(PointValue),
    /// Every cell is the KNN-IDW estimate at its centre.
    Surface(PointValue),
    /// Pit-free canopy surface: cell-wise maximum of per-threshold layers.
    PitFree(PitFreeParams),
    Custom(CellFn),
}

impl fmt::Debug for Reducer {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Reducer::Mean(v) => write!(f, "Mean({})", v),
            Reducer::StdDev(v) => write!(f, "StdDev({})", v),
            Reducer::PopulationStdDev(v) => write!(f, "PopulationStdDev({})", v),
            Reducer::Count => write!(f, "Count"),
            Reducer::Density => write!(f, "Density"),
            Reducer::Min(v) => write!(f, "Min({})", v),
            Reducer::Max(v) => write!(f, "Max({})", v),
            Reducer::Surface(v) => write!(f, "Surface({})", v),
            Reducer::PitFree(params) => write!(f, "PitFree({:?})", params),
            Reducer::Custom(_) => write!(f, "Custom"),
        }
    }
}

impl Reducer {
    /// Wraps a closure as a `Custom` reducer.
    pub fn custom<F>(f: F) -> Reducer
    where
        F: Fn(&[&Point]) -> Option<f64> + Send + Sync + 'static,
    {
        Reducer::Custom(Arc::new(f))
    }

    /// The value interpolated into empty cells when missing-cell filling is on.
    pub fn interpolation_value(&self) -> PointValue {
        match self {
            Reducer::Mean(v)
            | Reducer::StdDev(v)
            | Reducer::PopulationStdDev(v)
            | Reducer::Min(v)
            | Reducer::Max(v)
            | Reducer::Surface(v) => v.clone(),
            _ => PointValue::Z,
        }
    }

    /// True for reducers whose output at a cell depends on points outside of it.
    pub fn uses_neighbours(&self) -> bool {
        matches!(self, Reducer::Surface(_) | Reducer::PitFree(_))
    }

    /// Evaluates a bucket reducer over the points of one cell. Returns `None`
    /// for an empty cell, for cells where no point carries the selected value,
    /// and for the surface-building reducers, which are not cell-local.
    pub fn reduce_cell(&self, points: &[&Point], cell_area: f64) -> Option<f64> {
        if points.is_empty() {
            return None;
        }
        let values = |v: &PointValue| -> Vec<f64> {
            points.iter().filter_map(|p| p.value(v)).collect()
        };
        match self {
            Reducer::Count => Some(points.len() as f64),
            Reducer::Density => Some(points.len() as f64 / cell_area),
            Reducer::Mean(v) => {
                let vals = values(v);
                if vals.is_empty() {
                    return None;
                }
                Some(Statistics::mean(vals.iter()))
            }
            Reducer::StdDev(v) => {
                let vals = values(v);
                match vals.len() {
                    0 => None,
                    1 => Some(0.0),
                    _ => Some(Statistics::std_dev(vals.iter())),
                }
            }
            Reducer::PopulationStdDev(v) => {
                let vals = values(v);
                match vals.len() {
                    0 => None,
                    1 => Some(0.0),
                    _ => Some(Statistics::population_std_dev(vals.iter())),
                }
            }
            Reducer::Min(v) => values(v).into_iter().reduce(f64::min),
            Reducer::Max(v) => values(v).into_iter().reduce(f64::max),
            Reducer::Custom(f) => f(points),
            Reducer::Surface(_) | Reducer::PitFree(_) => None,
        }
    }
}

#[cfg(test)]
mod test {
    use super::Reducer;
    use crate::lidar::{Point, PointValue};
    use approx::assert_relative_eq;

    fn cell(zs: &[f64]) -> Vec<Point> {
        zs.iter().map(|&z| Point::new(0.5, 0.5, z)).collect()
    }

    #[test]
    fn test_mean_and_stddev() {
        let pts = cell(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        let refs: Vec<&Point> = pts.iter().collect();
        let mean = Reducer::Mean(PointValue::Z).reduce_cell(&refs, 1.0).unwrap();
        assert_relative_eq!(mean, 5.0, epsilon = 1e-12);
        let pop = Reducer::PopulationStdDev(PointValue::Z)
            .reduce_cell(&refs, 1.0)
            .unwrap();
        assert_relative_eq!(pop, 2.0, epsilon = 1e-12);
        let sample = Reducer::StdDev(PointValue::Z).reduce_cell(&refs, 1.0).unwrap();
        assert_relative_eq!(sample, (32.0f64 / 7.0).sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn test_single_point_stddev_is_zero() {
        let pts = cell(&[3.0]);
        let refs: Vec<&Point> = pts.iter().collect();
        assert_eq!(Reducer::StdDev(PointValue::Z).reduce_cell(&refs, 1.0), Some(0.0));
        assert_eq!(
            Reducer::PopulationStdDev(PointValue::Z).reduce_cell(&refs, 1.0),
            Some(0.0)
        );
    }

    #[test]
    fn test_count_density_min_max() {
        let pts = cell(&[3.0, -1.0, 8.0, 2.0]);
        let refs: Vec<&Point> = pts.iter().collect();
        assert_eq!(Reducer::Count.reduce_cell(&refs, 4.0), Some(4.0));
        assert_eq!(Reducer::Density.reduce_cell(&refs, 4.0), Some(1.0));
        assert_eq!(Reducer::Min(PointValue::Z).reduce_cell(&refs, 4.0), Some(-1.0));
        assert_eq!(Reducer::Max(PointValue::Z).reduce_cell(&refs, 4.0), Some(8.0));
        assert_eq!(Reducer::Count.reduce_cell(&[], 4.0), None);
    }

    #[test]
    fn test_attribute_selection_skips_missing() {
        let pts = vec![
            Point::new(0.0, 0.0, 1.0).with_attribute("intensity", 10.0),
            Point::new(0.0, 0.0, 2.0),
            Point::new(0.0, 0.0, 3.0).with_attribute("intensity", 30.0),
        ];
        let refs: Vec<&Point> = pts.iter().collect();
        let mean = Reducer::Mean(PointValue::from_name("intensity"));
        assert_relative_eq!(mean.reduce_cell(&refs, 1.0).unwrap(), 20.0);
        let missing = Reducer::Mean(PointValue::from_name("user_data"));
        assert_eq!(missing.reduce_cell(&refs, 1.0), None);
    }

    #[test]
    fn test_custom_reducer() {
        let first_return_share = Reducer::custom(|pts| {
            let first = pts.iter().filter(|p| p.return_number() == Some(1.0)).count();
            Some(first as f64 / pts.len() as f64)
        });
        let pts = vec![
            Point::new(0.0, 0.0, 1.0).with_attribute("return_number", 1.0),
            Point::new(0.0, 0.0, 2.0).with_attribute("return_number", 2.0),
        ];
        let refs: Vec<&Point> = pts.iter().collect();
        assert_eq!(first_return_share.reduce_cell(&refs, 1.0), Some(0.5));
        assert_eq!(format!("{:?}", first_return_share), "Custom");
    }
}
