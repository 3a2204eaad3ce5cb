use crate::error::{GridError, Result};
use crate::lidar::PointValue;
use crate::structures::SpatialIndex;

/// k-nearest-neighbour inverse-distance-weighted (IDW) interpolation over a
/// `SpatialIndex`.
///
/// The estimate at (x, y) is `sum(v_i / d_i^p) / sum(1 / d_i^p)` over the `k`
/// nearest points carrying the selected value. A point coincident with the
/// query location short-circuits the weighting; several coincident points are
/// averaged.
#[derive(Clone, Debug, PartialEq)]
pub struct KnnInterpolator {
    pub k: usize,
    pub power: f64,
    /// Neighbours farther than this are ignored. `None` searches without limit.
    pub max_radius: Option<f64>,
    pub value: PointValue,
}

impl Default for KnnInterpolator {
    fn default() -> KnnInterpolator {
        KnnInterpolator {
            k: 10,
            power: 2.0,
            max_radius: None,
            value: PointValue::Z,
        }
    }
}

impl KnnInterpolator {
    pub fn new(k: usize, power: f64) -> Result<KnnInterpolator> {
        let interp = KnnInterpolator {
            k,
            power,
            ..Default::default()
        };
        interp.validate()?;
        Ok(interp)
    }

    pub fn with_max_radius(mut self, max_radius: Option<f64>) -> KnnInterpolator {
        self.max_radius = max_radius;
        self
    }

    pub fn with_value(mut self, value: PointValue) -> KnnInterpolator {
        self.value = value;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.k < 1 {
            return Err(GridError::invalid_parameter("k", self.k));
        }
        if !(self.power > 0.0) || !self.power.is_finite() {
            return Err(GridError::invalid_parameter("power", self.power));
        }
        if let Some(r) = self.max_radius {
            if !(r > 0.0) {
                return Err(GridError::invalid_parameter("max_radius", r));
            }
        }
        Ok(())
    }

    /// Estimates the selected value at (x, y). Returns `None` when no
    /// neighbour carrying the value lies within `max_radius`.
    pub fn estimate(&self, index: &SpatialIndex, x: f64, y: f64) -> Result<Option<f64>> {
        self.validate()?;
        let neighbours = index.nearest(x, y, self.k, self.max_radius)?;

        // exact hit
        if neighbours.first().map_or(false, |n| n.distance == 0.0) {
            let (mut sum, mut count) = (0f64, 0f64);
            for n in index.search_radius(x, y, 0.0) {
                if let Some(v) = index.point(n.index).value(&self.value) {
                    sum += v;
                    count += 1.0;
                }
            }
            if count > 0.0 {
                return Ok(Some(sum / count));
            }
        }

        let mut val = 0f64;
        let mut sum_weights = 0f64;
        for n in &neighbours {
            if n.distance == 0.0 {
                continue;
            }
            if let Some(v) = index.point(n.index).value(&self.value) {
                let w = 1.0 / n.distance.powf(self.power);
                val += v * w;
                sum_weights += w;
            }
        }
        if sum_weights > 0.0 {
            Ok(Some(val / sum_weights))
        } else {
            Ok(None)
        }
    }
}

/// Interpolates point elevations at (x, y) from the `k` nearest indexed
/// points, weighting each by `1 / distance^power`.
pub fn interpolate(index: &SpatialIndex, x: f64, y: f64, k: usize, power: f64) -> Result<f64> {
    let interp = KnnInterpolator::new(k, power)?;
    interp
        .estimate(index, x, y)?
        .ok_or(GridError::InsufficientPoints {
            operation: "interpolate",
        })
}

#[cfg(test)]
mod test {
    use super::{interpolate, KnnInterpolator};
    use crate::error::GridError;
    use crate::lidar::{Point, PointSet, PointValue};
    use crate::structures::SpatialIndex;
    use approx::assert_relative_eq;

    fn square() -> PointSet {
        PointSet::from_points(
            vec![
                Point::new(0.0, 0.0, 10.0),
                Point::new(2.0, 0.0, 20.0),
                Point::new(0.0, 2.0, 30.0),
                Point::new(2.0, 2.0, 40.0),
            ],
            "",
        )
    }

    #[test]
    fn test_exact_hit_returns_point_value() {
        let ps = square();
        let index = SpatialIndex::build(&ps, 1.0).unwrap();
        for k in 1..5 {
            for &power in &[0.5, 1.0, 2.0, 3.5] {
                assert_eq!(interpolate(&index, 2.0, 0.0, k, power).unwrap(), 20.0);
            }
        }
    }

    #[test]
    fn test_coincident_points_are_averaged() {
        let mut ps = square();
        ps.push(Point::new(2.0, 0.0, 26.0));
        let index = SpatialIndex::build(&ps, 1.0).unwrap();
        assert_eq!(interpolate(&index, 2.0, 0.0, 1, 2.0).unwrap(), 23.0);
    }

    #[test]
    fn test_equidistant_neighbours_give_mean() {
        let ps = square();
        let index = SpatialIndex::build(&ps, 1.0).unwrap();
        assert_relative_eq!(interpolate(&index, 1.0, 1.0, 4, 2.0).unwrap(), 25.0);
    }

    #[test]
    fn test_weights_follow_inverse_distance() {
        let ps = PointSet::from_points(
            vec![Point::new(0.0, 0.0, 0.0), Point::new(3.0, 0.0, 9.0)],
            "",
        );
        let index = SpatialIndex::build(&ps, 1.0).unwrap();
        // distances 1 and 2, power 1: (0/1 + 9/2) / (1 + 1/2) = 3
        assert_relative_eq!(interpolate(&index, 1.0, 0.0, 2, 1.0).unwrap(), 3.0);
    }

    #[test]
    fn test_invalid_parameters() {
        let ps = square();
        let index = SpatialIndex::build(&ps, 1.0).unwrap();
        match interpolate(&index, 0.5, 0.5, 0, 2.0) {
            Err(GridError::InvalidParameter { name, .. }) => assert_eq!(name, "k"),
            _ => panic!("expected InvalidParameter"),
        }
        match interpolate(&index, 0.5, 0.5, 3, 0.0) {
            Err(GridError::InvalidParameter { name, .. }) => assert_eq!(name, "power"),
            _ => panic!("expected InvalidParameter"),
        }
        let empty = PointSet::new("");
        let index = SpatialIndex::build(&empty, 1.0).unwrap();
        match interpolate(&index, 0.5, 0.5, 3, 2.0) {
            Err(GridError::InsufficientPoints { .. }) => {}
            _ => panic!("expected InsufficientPoints"),
        }
    }

    #[test]
    fn test_max_radius_and_attribute_selection() {
        let ps = PointSet::from_points(
            vec![
                Point::new(0.0, 0.0, 1.0).with_attribute("intensity", 100.0),
                Point::new(1.0, 0.0, 2.0),
                Point::new(50.0, 0.0, 3.0).with_attribute("intensity", 300.0),
            ],
            "",
        );
        let index = SpatialIndex::build(&ps, 2.0).unwrap();
        let interp = KnnInterpolator::new(3, 2.0)
            .unwrap()
            .with_value(PointValue::from_name("intensity"))
            .with_max_radius(Some(5.0));
        assert_eq!(interp.estimate(&index, 0.5, 0.0).unwrap(), Some(100.0));
        assert_eq!(interp.estimate(&index, 25.0, 30.0).unwrap(), None);
    }
}
