use super::point_data::Point;
use crate::structures::BoundingBox;
use std::ops::Index;

/// An ordered collection of points with a coordinate-reference tag and a
/// tight bounding extent. The CRS tag is carried through, never interpreted.
#[derive(Clone, Debug, Default)]
pub struct PointSet {
    points: Vec<Point>,
    crs: String,
    extent: Option<BoundingBox>,
}

impl PointSet {
    pub fn new(crs: &str) -> PointSet {
        PointSet {
            points: vec![],
            crs: crs.to_string(),
            extent: None,
        }
    }

    pub fn from_points(points: Vec<Point>, crs: &str) -> PointSet {
        let mut ps = PointSet::new(crs);
        ps.extend(points);
        ps
    }

    /// Appends a point, growing the extent to include it.
    pub fn push(&mut self, point: Point) {
        match self.extent.as_mut() {
            Some(bb) => bb.expand_to_include(point.x, point.y),
            None => self.extent = Some(BoundingBox::from_point(point.x, point.y)),
        }
        self.points.push(point);
    }

    pub fn extend<I: IntoIterator<Item = Point>>(&mut self, points: I) {
        for p in points {
            self.push(p);
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Point> {
        self.points.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Point> {
        self.points.iter()
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn crs(&self) -> &str {
        &self.crs
    }

    pub fn set_crs(&mut self, crs: &str) {
        self.crs = crs.to_string();
    }

    /// The tight bounding box of all points, or `None` for an empty set.
    pub fn extent(&self) -> Option<BoundingBox> {
        self.extent
    }

    /// A view over every point in the set.
    pub fn all(&self) -> PointView<'_> {
        PointView {
            source: self,
            indices: (0..self.points.len()).collect(),
        }
    }

    /// A view over the points satisfying `predicate`, in input order.
    pub fn select<F>(&self, predicate: F) -> PointView<'_>
    where
        F: Fn(&Point) -> bool,
    {
        PointView {
            source: self,
            indices: self
                .points
                .iter()
                .enumerate()
                .filter(|(_, p)| predicate(p))
                .map(|(i, _)| i)
                .collect(),
        }
    }

    /// A view over the points falling inside `bb` (edges inclusive).
    pub fn within(&self, bb: BoundingBox) -> PointView<'_> {
        self.select(|p| bb.is_point_in_box(p.x, p.y))
    }
}

impl Index<usize> for PointSet {
    type Output = Point;

    fn index(&self, index: usize) -> &Point {
        &self.points[index]
    }
}

/// A filtered, non-owning view of a `PointSet`. Indices refer to positions in
/// the source set and are kept in ascending (input) order.
#[derive(Clone, Debug)]
pub struct PointView<'a> {
    source: &'a PointSet,
    indices: Vec<usize>,
}

impl<'a> PointView<'a> {
    pub fn source(&self) -> &'a PointSet {
        self.source
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Iterates over `(source index, point)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &'a Point)> + '_ {
        let source = self.source;
        self.indices.iter().map(move |&i| (i, &source[i]))
    }

    /// Narrows this view further.
    pub fn select<F>(&self, predicate: F) -> PointView<'a>
    where
        F: Fn(&Point) -> bool,
    {
        PointView {
            source: self.source,
            indices: self
                .indices
                .iter()
                .copied()
                .filter(|&i| predicate(&self.source[i]))
                .collect(),
        }
    }

    pub fn extent(&self) -> Option<BoundingBox> {
        let mut extent: Option<BoundingBox> = None;
        for (_, p) in self.iter() {
            match extent.as_mut() {
                Some(bb) => bb.expand_to_include(p.x, p.y),
                None => extent = Some(BoundingBox::from_point(p.x, p.y)),
            }
        }
        extent
    }

    /// Copies the viewed points into a new, owned `PointSet`.
    pub fn to_point_set(&self) -> PointSet {
        PointSet::from_points(self.iter().map(|(_, p)| p.clone()).collect(), self.source.crs())
    }
}
