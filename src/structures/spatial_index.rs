use crate::error::{GridError, Result};
use crate::lidar::{Point, PointSet, PointView};
use crate::structures::BoundingBox;
use std::collections::hash_map::Entry::{Occupied, Vacant};
use std::collections::HashMap;

// bucket keys stay well inside i64 so differences between them cannot overflow
const KEY_LIMIT: f64 = 1.0e18;

#[derive(Clone, Copy, Debug)]
struct SpatialIndexEntry {
    x: f64,
    y: f64,
    index: usize,
}

/// A search result: the index of a point in the indexed `PointSet` and its
/// planimetric distance from the query location.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Neighbour {
    pub index: usize,
    pub distance: f64,
}

/// A uniform-grid bucket index over the points of a `PointSet` (or a view of
/// one). Every indexed point lives in exactly one bucket, keyed by
/// `[floor(x / bucket_size), floor(y / bucket_size)]`. The index is read-only
/// once built and can be shared between threads.
///
/// ## Example
/// ```ignore
/// let index = SpatialIndex::build(&points, 5.0)?;
/// let near = index.query_radius(41.4, 31.4, 2.5);
/// let knn = index.query_knn(41.4, 31.4, 8)?;
/// ```
pub struct SpatialIndex<'a> {
    source: &'a PointSet,
    bucket_size: f64,
    inv_bucket_size: f64,
    hm: HashMap<[i64; 2], Vec<SpatialIndexEntry>>,
    length: usize,
    min_key: [i64; 2],
    max_key: [i64; 2],
}

impl<'a> SpatialIndex<'a> {
    /// Indexes every point in `points`.
    pub fn build(points: &'a PointSet, bucket_size: f64) -> Result<SpatialIndex<'a>> {
        SpatialIndex::build_from_view(&points.all(), bucket_size)
    }

    /// Indexes only the points of a filtered view.
    pub fn build_from_view(view: &PointView<'a>, bucket_size: f64) -> Result<SpatialIndex<'a>> {
        if !(bucket_size > 0.0) || !bucket_size.is_finite() {
            return Err(GridError::invalid_parameter("bucket_size", bucket_size));
        }
        let mut index = SpatialIndex {
            source: view.source(),
            bucket_size,
            inv_bucket_size: 1.0 / bucket_size,
            hm: HashMap::new(),
            length: 0,
            min_key: [i64::MAX, i64::MAX],
            max_key: [i64::MIN, i64::MIN],
        };
        for (i, p) in view.iter() {
            index.insert(p.x, p.y, i);
        }
        Ok(index)
    }

    /// Picks a bucket size giving roughly four points per bucket over `extent`.
    pub fn suggest_bucket_size(extent: BoundingBox, num_points: usize) -> f64 {
        let area = extent.get_width() * extent.get_height();
        if num_points == 0 || !(area > 0.0) {
            let side = extent.get_width().max(extent.get_height());
            return if side > 0.0 { side } else { 1.0 };
        }
        (4.0 * area / num_points as f64).sqrt()
    }

    fn key(&self, x: f64, y: f64) -> [i64; 2] {
        [
            (x * self.inv_bucket_size)
                .floor()
                .clamp(-KEY_LIMIT, KEY_LIMIT) as i64,
            (y * self.inv_bucket_size)
                .floor()
                .clamp(-KEY_LIMIT, KEY_LIMIT) as i64,
        ]
    }

    fn insert(&mut self, x: f64, y: f64, index: usize) {
        let key = self.key(x, y);
        for d in 0..2 {
            self.min_key[d] = self.min_key[d].min(key[d]);
            self.max_key[d] = self.max_key[d].max(key[d]);
        }
        let val = match self.hm.entry(key) {
            Vacant(entry) => entry.insert(vec![]),
            Occupied(entry) => entry.into_mut(),
        };
        val.push(SpatialIndexEntry { x, y, index });
        self.length += 1;
    }

    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub fn bucket_size(&self) -> f64 {
        self.bucket_size
    }

    /// The point set the indices returned by queries refer to.
    pub fn source(&self) -> &'a PointSet {
        self.source
    }

    pub fn point(&self, index: usize) -> &'a Point {
        &self.source[index]
    }

    /// Scans the square ring of buckets at Chebyshev distance `ring` from
    /// `centre`, pushing every entry within `max_dist_sq` of (x, y). Only the
    /// part of the ring overlapping the occupied key range is visited. Returns
    /// the number of buckets looked up.
    fn scan_ring(
        &self,
        centre: [i64; 2],
        ring: i64,
        x: f64,
        y: f64,
        max_dist_sq: f64,
        out: &mut Vec<Neighbour>,
    ) -> usize {
        let mut lookups = 0usize;
        let mut visit = |key: [i64; 2]| {
            lookups += 1;
            if let Some(vals) = self.hm.get(&key) {
                for val in vals {
                    let dist = (x - val.x) * (x - val.x) + (y - val.y) * (y - val.y);
                    if dist <= max_dist_sq {
                        out.push(Neighbour {
                            index: val.index,
                            distance: dist,
                        });
                    }
                }
            }
        };
        if ring == 0 {
            visit(centre);
            return lookups;
        }
        let (min_key, max_key) = (self.min_key, self.max_key);
        let in_range = |d: usize, k: i64| k >= min_key[d] && k <= max_key[d];
        let lo_i = (centre[0] - ring).max(min_key[0]);
        let hi_i = (centre[0] + ring).min(max_key[0]);
        for row in [centre[1] - ring, centre[1] + ring] {
            if in_range(1, row) {
                for i in lo_i..=hi_i {
                    visit([i, row]);
                }
            }
        }
        let lo_j = (centre[1] - ring + 1).max(min_key[1]);
        let hi_j = (centre[1] + ring - 1).min(max_key[1]);
        for col in [centre[0] - ring, centre[0] + ring] {
            if in_range(0, col) {
                for j in lo_j..=hi_j {
                    visit([col, j]);
                }
            }
        }
        lookups
    }

    /// The first ring around `centre` that touches an occupied bucket's key range.
    fn first_ring(&self, centre: [i64; 2]) -> i64 {
        let mut r = 0i64;
        for d in 0..2 {
            r = r.max(self.min_key[d].saturating_sub(centre[d]));
            r = r.max(centre[d].saturating_sub(self.max_key[d]));
        }
        r
    }

    /// Number of rings needed from `centre` before every occupied bucket has been visited.
    fn rings_to_cover(&self, centre: [i64; 2]) -> i64 {
        let mut r = 0i64;
        for d in 0..2 {
            r = r.max(centre[d].saturating_sub(self.min_key[d]).saturating_abs());
            r = r.max(self.max_key[d].saturating_sub(centre[d]).saturating_abs());
        }
        r
    }

    fn sort_neighbours(found: &mut Vec<Neighbour>) {
        found.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then(a.index.cmp(&b.index))
        });
    }

    /// All indexed points within distance `r` of (x, y), as neighbours in input order.
    pub fn search_radius(&self, x: f64, y: f64, r: f64) -> Vec<Neighbour> {
        let mut ret = vec![];
        if self.is_empty() || !(r >= 0.0) || !x.is_finite() || !y.is_finite() {
            return ret;
        }
        let centre = self.key(x, y);
        let rings = ((r * self.inv_bucket_size).ceil() as i64).min(self.rings_to_cover(centre));
        let r_sqr = r * r;
        for ring in self.first_ring(centre)..=rings {
            self.scan_ring(centre, ring, x, y, r_sqr, &mut ret);
        }
        for n in ret.iter_mut() {
            n.distance = n.distance.sqrt();
        }
        ret.sort_by_key(|n| n.index);
        ret
    }

    /// All indexed points within distance `r` of (x, y), in input order.
    pub fn query_radius(&self, x: f64, y: f64, r: f64) -> Vec<&'a Point> {
        self.search_radius(x, y, r)
            .into_iter()
            .map(|n| self.point(n.index))
            .collect()
    }

    /// The (up to) `k` nearest indexed points to (x, y), ascending by distance
    /// with ties broken by input order. When `max_radius` is given, points
    /// farther than it are never returned.
    ///
    /// The search expands ring by ring, one bucket at a time, and stops once
    /// `k` candidates lie strictly closer than the nearest unscanned bucket, or
    /// once every occupied bucket (or every bucket inside `max_radius`) has been
    /// visited.
    pub fn nearest(
        &self,
        x: f64,
        y: f64,
        k: usize,
        max_radius: Option<f64>,
    ) -> Result<Vec<Neighbour>> {
        self.knn_search(x, y, k, max_radius).map(|(found, _)| found)
    }

    /// The KNN search behind `nearest`; also reports how many buckets it looked up.
    fn knn_search(
        &self,
        x: f64,
        y: f64,
        k: usize,
        max_radius: Option<f64>,
    ) -> Result<(Vec<Neighbour>, usize)> {
        if self.is_empty() {
            return Err(GridError::InsufficientPoints {
                operation: "query_knn",
            });
        }
        if k < 1 {
            return Err(GridError::invalid_parameter("k", k));
        }
        if !x.is_finite() {
            return Err(GridError::invalid_parameter("x", x));
        }
        if !y.is_finite() {
            return Err(GridError::invalid_parameter("y", y));
        }
        let centre = self.key(x, y);
        let mut max_ring = self.rings_to_cover(centre);
        let mut max_dist_sq = f64::INFINITY;
        if let Some(r) = max_radius {
            if !(r > 0.0) {
                return Err(GridError::invalid_parameter("max_radius", r));
            }
            max_ring = max_ring.min((r * self.inv_bucket_size).ceil() as i64);
            max_dist_sq = r * r;
        }

        let mut found: Vec<Neighbour> = vec![];
        let mut lookups = 0usize;
        let mut ring = self.first_ring(centre);
        if ring > max_ring {
            return Ok((found, lookups));
        }
        loop {
            lookups += self.scan_ring(centre, ring, x, y, max_dist_sq, &mut found);
            if ring >= max_ring {
                break;
            }
            // anything not yet scanned is at least this far away
            let guaranteed = ring as f64 * self.bucket_size;
            let guaranteed_sq = guaranteed * guaranteed;
            if found.iter().filter(|n| n.distance < guaranteed_sq).count() >= k {
                break;
            }
            ring += 1;
        }

        SpatialIndex::sort_neighbours(&mut found);
        found.truncate(k);
        for n in found.iter_mut() {
            n.distance = n.distance.sqrt();
        }
        Ok((found, lookups))
    }

    /// The (up to) `k` nearest points to (x, y) paired with their distances,
    /// ascending by distance with ties broken by input order. Fails with
    /// `InsufficientPoints` only when the index is empty.
    pub fn query_knn(&self, x: f64, y: f64, k: usize) -> Result<Vec<(&'a Point, f64)>> {
        Ok(self
            .nearest(x, y, k, None)?
            .into_iter()
            .map(|n| (self.point(n.index), n.distance))
            .collect())
    }
}

#[cfg(test)]
mod test {
    use super::SpatialIndex;
    use crate::error::GridError;
    use crate::lidar::{Point, PointSet};
    use kdtree::distance::squared_euclidean;
    use kdtree::KdTree;
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    fn random_points(n: usize, seed: u64) -> PointSet {
        let mut rng = SmallRng::seed_from_u64(seed);
        PointSet::from_points(
            (0..n)
                .map(|_| {
                    Point::new(
                        rng.gen_range(-50.0..150.0),
                        rng.gen_range(0.0..80.0),
                        rng.gen_range(0.0..30.0),
                    )
                })
                .collect(),
            "",
        )
    }

    #[test]
    fn test_every_point_in_one_bucket() {
        let ps = random_points(500, 1);
        let index = SpatialIndex::build(&ps, 7.0).unwrap();
        assert_eq!(index.len(), 500);
        let total: usize = index.hm.values().map(|v| v.len()).sum();
        assert_eq!(total, 500);
        let mut seen = vec![false; 500];
        for vals in index.hm.values() {
            for v in vals {
                assert!(!seen[v.index]);
                seen[v.index] = true;
            }
        }
        assert!(seen.iter().all(|s| *s));
    }

    #[test]
    fn test_invalid_bucket_size() {
        let ps = random_points(10, 2);
        match SpatialIndex::build(&ps, 0.0) {
            Err(GridError::InvalidParameter { name, .. }) => assert_eq!(name, "bucket_size"),
            _ => panic!("expected an InvalidParameter error"),
        }
    }

    #[test]
    fn test_knn_matches_kdtree() {
        let ps = random_points(2000, 3);
        let index = SpatialIndex::build(&ps, 3.0).unwrap();
        let mut tree = KdTree::new(2);
        for (i, p) in ps.iter().enumerate() {
            tree.add([p.x, p.y], i).unwrap();
        }
        let mut rng = SmallRng::seed_from_u64(4);
        for _ in 0..100 {
            let (x, y) = (rng.gen_range(-80.0..180.0), rng.gen_range(-20.0..100.0));
            let ours = index.nearest(x, y, 7, None).unwrap();
            let theirs = tree.nearest(&[x, y], 7, &squared_euclidean).unwrap();
            assert_eq!(ours.len(), 7);
            for (a, b) in ours.iter().zip(theirs.iter()) {
                assert!((a.distance - b.0.sqrt()).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn test_knn_is_sorted_and_stable_on_ties() {
        let ps = PointSet::from_points(
            vec![
                Point::new(1.0, 0.0, 1.0),
                Point::new(0.0, 1.0, 2.0),
                Point::new(-1.0, 0.0, 3.0),
                Point::new(0.0, -1.0, 4.0),
                Point::new(0.5, 0.0, 5.0),
            ],
            "",
        );
        let index = SpatialIndex::build(&ps, 0.7).unwrap();
        let knn = index.query_knn(0.0, 0.0, 4).unwrap();
        let zs: Vec<f64> = knn.iter().map(|(p, _)| p.z).collect();
        assert_eq!(zs, vec![5.0, 1.0, 2.0, 3.0]);
        assert_eq!(knn[0].1, 0.5);
    }

    #[test]
    fn test_knn_returns_fewer_when_fewer_exist() {
        let ps = random_points(3, 5);
        let index = SpatialIndex::build(&ps, 1.0).unwrap();
        assert_eq!(index.query_knn(1000.0, -1000.0, 10).unwrap().len(), 3);
    }

    #[test]
    fn test_knn_respects_max_radius() {
        let ps = PointSet::from_points(
            vec![Point::new(0.0, 0.0, 1.0), Point::new(10.0, 0.0, 2.0)],
            "",
        );
        let index = SpatialIndex::build(&ps, 2.0).unwrap();
        let found = index.nearest(1.0, 0.0, 5, Some(3.0)).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].index, 0);
        assert!(index.nearest(5.0, 20.0, 5, Some(3.0)).unwrap().is_empty());
    }

    fn grid_points(n: usize) -> PointSet {
        let mut points = vec![];
        for row in 0..n {
            for col in 0..n {
                points.push(Point::new(col as f64, row as f64, (row * n + col) as f64));
            }
        }
        PointSet::from_points(points, "")
    }

    #[test]
    fn test_far_query_only_visits_occupied_buckets() {
        let ps = grid_points(10);
        let index = SpatialIndex::build(&ps, 1.0).unwrap();
        for x in [250.0, 2000.0, 16000.0, 1.0e9] {
            let (found, lookups) = index.knn_search(x, 0.0, 1, None).unwrap();
            assert_eq!(found.len(), 1);
            assert_eq!(ps[found[0].index].x, 9.0);
            assert_eq!(ps[found[0].index].y, 0.0);
            assert!(lookups <= 100, "{} buckets looked up for x = {}", lookups, x);
        }
        let (found, lookups) = index.knn_search(-5000.0, 4.2, 3, Some(1.0e4)).unwrap();
        assert_eq!(found.len(), 3);
        assert_eq!(ps[found[0].index].y, 4.0);
        assert!(lookups <= 100);
    }

    #[test]
    fn test_extreme_query_coordinates() {
        let ps = PointSet::from_points(vec![Point::new(-5.0, -5.0, 1.0)], "");
        let index = SpatialIndex::build(&ps, 1.0).unwrap();
        let found = index.query_knn(1e300, 0.0, 1).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].0.z, 1.0);
        assert_eq!(index.query_knn(-1e300, 1e300, 1).unwrap().len(), 1);
        assert!(index.query_radius(1e300, 0.0, 10.0).is_empty());
        match index.query_knn(f64::NAN, 0.0, 1) {
            Err(GridError::InvalidParameter { name, .. }) => assert_eq!(name, "x"),
            _ => panic!("expected an InvalidParameter error"),
        }
        assert!(index.query_radius(0.0, f64::INFINITY, 1.0).is_empty());
    }

    #[test]
    fn test_knn_on_empty_index() {
        let ps = PointSet::new("");
        let index = SpatialIndex::build(&ps, 1.0).unwrap();
        match index.query_knn(0.0, 0.0, 3) {
            Err(GridError::InsufficientPoints { .. }) => {}
            _ => panic!("expected InsufficientPoints"),
        }
    }

    #[test]
    fn test_query_radius_matches_brute_force() {
        let ps = random_points(1000, 6);
        let index = SpatialIndex::build(&ps, 4.0).unwrap();
        let (x, y, r) = (40.0, 40.0, 9.5);
        let found: Vec<f64> = index.query_radius(x, y, r).iter().map(|p| p.z).collect();
        let expected: Vec<f64> = ps
            .iter()
            .filter(|p| p.dist_sq(x, y) <= r * r)
            .map(|p| p.z)
            .collect();
        assert_eq!(found, expected);
    }
}
