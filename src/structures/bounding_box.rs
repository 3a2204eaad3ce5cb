/// An axis-aligned rectangular extent `{min_x, min_y, max_x, max_y}`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    pub fn new(min_x: f64, max_x: f64, min_y: f64, max_y: f64) -> BoundingBox {
        let (x1, x2) = if min_x < max_x {
            (min_x, max_x)
        } else {
            (max_x, min_x)
        };
        let (y1, y2) = if min_y < max_y {
            (min_y, max_y)
        } else {
            (max_y, min_y)
        };
        BoundingBox {
            min_x: x1,
            min_y: y1,
            max_x: x2,
            max_y: y2,
        }
    }

    /// A degenerate box containing the single coordinate (x, y).
    pub fn from_point(x: f64, y: f64) -> BoundingBox {
        BoundingBox {
            min_x: x,
            min_y: y,
            max_x: x,
            max_y: y,
        }
    }

    pub fn get_height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn get_width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn overlaps(&self, other: BoundingBox) -> bool {
        !(self.max_y < other.min_y
            || self.max_x < other.min_x
            || self.min_y > other.max_y
            || self.min_x > other.max_x)
    }

    pub fn contains(&self, other: BoundingBox) -> bool {
        other.max_y <= self.max_y
            && other.max_x <= self.max_x
            && other.min_y >= self.min_y
            && other.min_x >= self.min_x
    }

    /// Edge-inclusive point containment.
    pub fn is_point_in_box(&self, x: f64, y: f64) -> bool {
        !(self.max_y < y || self.max_x < x || self.min_y > y || self.min_x > x)
    }

    /// Grows the box, if needed, so that it includes the coordinate (x, y).
    pub fn expand_to_include(&mut self, x: f64, y: f64) {
        if x < self.min_x {
            self.min_x = x;
        }
        if x > self.max_x {
            self.max_x = x;
        }
        if y < self.min_y {
            self.min_y = y;
        }
        if y > self.max_y {
            self.max_y = y;
        }
    }

    pub fn expand_to(&mut self, other: BoundingBox) {
        self.max_y = self.max_y.max(other.max_y);
        self.max_x = self.max_x.max(other.max_x);
        self.min_y = self.min_y.min(other.min_y);
        self.min_x = self.min_x.min(other.min_x);
    }

    pub fn expand_by(&mut self, value: f64) {
        self.max_y += value;
        self.max_x += value;
        self.min_y -= value;
        self.min_x -= value;
    }

    /// Returns a copy of this box grown by `value` on every side.
    pub fn expanded_by(&self, value: f64) -> BoundingBox {
        let mut bb = *self;
        bb.expand_by(value);
        bb
    }
}

#[cfg(test)]
mod test {
    use super::BoundingBox;

    #[test]
    fn test_new_orders_coordinates() {
        let bb = BoundingBox::new(10.0, 2.0, 5.0, -1.0);
        assert_eq!(bb.min_x, 2.0);
        assert_eq!(bb.max_x, 10.0);
        assert_eq!(bb.min_y, -1.0);
        assert_eq!(bb.max_y, 5.0);
        assert_eq!(bb.get_width(), 8.0);
        assert_eq!(bb.get_height(), 6.0);
    }

    #[test]
    fn test_expand_to_include() {
        let mut bb = BoundingBox::from_point(1.0, 1.0);
        bb.expand_to_include(-2.0, 4.0);
        bb.expand_to_include(3.0, 0.5);
        assert_eq!(bb, BoundingBox::new(-2.0, 3.0, 0.5, 4.0));
    }

    #[test]
    fn test_expanded_by_and_containment() {
        let bb = BoundingBox::new(0.0, 10.0, 0.0, 10.0);
        let big = bb.expanded_by(2.5);
        assert!(big.contains(bb));
        assert!(!bb.contains(big));
        assert!(big.is_point_in_box(-2.5, 12.5));
        assert!(!bb.is_point_in_box(-0.1, 5.0));
        assert!(bb.overlaps(BoundingBox::new(9.0, 20.0, 9.0, 20.0)));
        assert!(!bb.overlaps(BoundingBox::new(11.0, 20.0, 9.0, 20.0)));
    }
}
