use glam::DVec2;
use serde::{Deserialize, Serialize};

/// Axis named by a placed symbol's `(mirror x|y)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MirrorAxis {
    X,
    Y,
}

impl MirrorAxis {
    pub fn as_str(self) -> &'static str {
        match self {
            MirrorAxis::X => "x",
            MirrorAxis::Y => "y",
        }
    }

    /// Case-insensitive; anything other than `x`/`y` is no mirror.
    pub fn parse(value: &str) -> Option<Self> {
        if value.eq_ignore_ascii_case("x") {
            Some(MirrorAxis::X)
        } else if value.eq_ignore_ascii_case("y") {
            Some(MirrorAxis::Y)
        } else {
            None
        }
    }
}

impl std::fmt::Display for MirrorAxis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A point on the sheet in millimetres, y pointing down as stored in the file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Both axis deltas strictly below `tolerance`.
    pub fn coincides(self, other: Point, tolerance: f64) -> bool {
        (self.x - other.x).abs() < tolerance && (self.y - other.y).abs() < tolerance
    }

    pub fn distance(self, other: Point) -> f64 {
        DVec2::from(self).distance(other.into())
    }

    /// Rounded to `decimals` places, for reports.
    pub fn rounded(self, decimals: i32) -> Self {
        let scale = 10f64.powi(decimals);
        Self {
            x: (self.x * scale).round() / scale,
            y: (self.y * scale).round() / scale,
        }
    }
}

impl From<DVec2> for Point {
    fn from(v: DVec2) -> Self {
        Self { x: v.x, y: v.y }
    }
}

impl From<Point> for DVec2 {
    fn from(p: Point) -> Self {
        DVec2::new(p.x, p.y)
    }
}

impl From<(f64, f64)> for Point {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coincidence_is_strict_per_axis() {
        let origin = Point::new(10.0, 10.0);
        assert!(origin.coincides(Point::new(10.49, 9.51), 0.5));
        assert!(!origin.coincides(Point::new(10.5, 10.0), 0.5));
        assert!(!origin.coincides(Point::new(10.0, 10.51), 0.5));
    }

    #[test]
    fn mirror_axis_tokens() {
        assert_eq!(MirrorAxis::parse("X"), Some(MirrorAxis::X));
        assert_eq!(MirrorAxis::parse("y"), Some(MirrorAxis::Y));
        assert_eq!(MirrorAxis::parse("z"), None);
        assert_eq!(MirrorAxis::Y.to_string(), "y");
    }

    #[test]
    fn rounding_and_distance() {
        assert_eq!(Point::new(1.23456, -0.006).rounded(2), Point::new(1.23, -0.01));
        assert_eq!(Point::new(0.0, 0.0).distance(Point::new(3.0, 4.0)), 5.0);
    }
}
