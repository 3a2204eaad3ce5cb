use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// ASPRS class value for ground points.
pub const GROUND_CLASS: f64 = 2.0;

/// A single point-cloud sample, with x, y, and z fields and any number of
/// named numeric attributes (intensity, return number, classification, etc.).
#[derive(Default, Clone, Debug, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub attributes: HashMap<String, f64>,
}

impl Point {
    /// Creates a new Point with no attributes.
    pub fn new(x: f64, y: f64, z: f64) -> Point {
        Point {
            x,
            y,
            z,
            attributes: HashMap::new(),
        }
    }

    /// Builder-style attribute assignment.
    pub fn with_attribute(mut self, name: &str, value: f64) -> Point {
        self.attributes.insert(name.to_string(), value);
        self
    }

    pub fn attribute(&self, name: &str) -> Option<f64> {
        self.attributes.get(name).copied()
    }

    pub fn intensity(&self) -> Option<f64> {
        self.attribute("intensity")
    }

    pub fn return_number(&self) -> Option<f64> {
        self.attribute("return_number")
    }

    pub fn classification(&self) -> Option<f64> {
        self.attribute("classification")
    }

    pub fn is_ground(&self) -> bool {
        self.classification() == Some(GROUND_CLASS)
    }

    /// Returns the value selected by `value`, or `None` if the point does not
    /// carry the requested attribute.
    pub fn value(&self, value: &PointValue) -> Option<f64> {
        match value {
            PointValue::Z => Some(self.z),
            PointValue::Attribute(name) => self.attribute(name),
        }
    }

    /// Squared planimetric distance to (x, y).
    pub fn dist_sq(&self, x: f64, y: f64) -> f64 {
        (self.x - x) * (self.x - x) + (self.y - y) * (self.y - y)
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "x={}, y={}, z={}", self.x, self.y, self.z)
    }
}

/// Selects which per-point quantity a reducer or interpolator works on.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PointValue {
    Z,
    Attribute(String),
}

impl Default for PointValue {
    fn default() -> PointValue {
        PointValue::Z
    }
}

impl PointValue {
    /// Parses a tool argument such as `z`, `elevation` or `intensity`.
    pub fn from_name(name: &str) -> PointValue {
        match name.trim().to_lowercase().as_str() {
            "z" | "elevation" | "height" => PointValue::Z,
            other => PointValue::Attribute(other.to_string()),
        }
    }
}

impl From<String> for PointValue {
    fn from(name: String) -> PointValue {
        PointValue::from_name(&name)
    }
}

impl From<PointValue> for String {
    fn from(value: PointValue) -> String {
        value.to_string()
    }
}

impl fmt::Display for PointValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PointValue::Z => write!(f, "z"),
            PointValue::Attribute(name) => write!(f, "{}", name),
        }
    }
}

#[cfg(test)]
mod test {
    use super::{Point, PointValue};

    #[test]
    fn test_point_value_selection() {
        let p = Point::new(1.0, 2.0, 3.0)
            .with_attribute("intensity", 120.0)
            .with_attribute("classification", 2.0);
        assert_eq!(p.value(&PointValue::Z), Some(3.0));
        assert_eq!(p.value(&PointValue::from_name("intensity")), Some(120.0));
        assert_eq!(p.value(&PointValue::from_name("user_data")), None);
        assert!(p.is_ground());
    }

    #[test]
    fn test_point_value_from_name() {
        assert_eq!(PointValue::from_name("Elevation"), PointValue::Z);
        assert_eq!(
            PointValue::from_name("return_number"),
            PointValue::Attribute("return_number".to_string())
        );
    }
}
