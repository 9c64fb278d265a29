//! Point and shape types with a fixed `(row, col)` / `(height, width)` axis order.
//!
//! Points convert to [`glam::DVec2`] with `x = col` and `y = row` for the
//! geometric kernels; nothing else in the crate is allowed to pick its own
//! convention.

use std::fmt;
use std::ops::Index;

use common::Buffer2;
use glam::DVec2;
use serde::{Deserialize, Serialize};

use crate::error::{Result, UnwarpError};

/// Image extent, height first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageShape {
    pub height: usize,
    pub width: usize,
}

impl ImageShape {
    pub const fn new(height: usize, width: usize) -> Self {
        Self { height, width }
    }

    pub fn of<T>(buffer: &Buffer2<T>) -> Self {
        Self::new(buffer.height(), buffer.width())
    }

    pub fn is_empty(&self) -> bool {
        self.height == 0 || self.width == 0
    }

    /// Fail with `ShapeMismatch` unless `buffer` has exactly this shape.
    pub fn check<T>(&self, buffer: &Buffer2<T>) -> Result<()> {
        let actual = Self::of(buffer);
        if actual != *self {
            return Err(UnwarpError::ShapeMismatch {
                expected: *self,
                actual,
            });
        }
        Ok(())
    }
}

impl fmt::Display for ImageShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{} (h x w)", self.height, self.width)
    }
}

/// Floating-point image coordinate; pixel `(r, c)` is centred on `(r, c)`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point2 {
    pub row: f64,
    pub col: f64,
}

impl Point2 {
    pub const fn new(row: f64, col: f64) -> Self {
        Self { row, col }
    }

    #[inline]
    pub fn to_dvec2(self) -> DVec2 {
        DVec2::new(self.col, self.row)
    }

    #[inline]
    pub fn from_dvec2(v: DVec2) -> Self {
        Self::new(v.y, v.x)
    }

    /// Nearest integer pixel, `(row, col)`.
    #[inline]
    pub fn round(self) -> (i64, i64) {
        (self.row.round() as i64, self.col.round() as i64)
    }

    pub fn distance(self, other: Point2) -> f64 {
        self.to_dvec2().distance(other.to_dvec2())
    }
}

impl fmt::Display for Point2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(row {:.2}, col {:.2})", self.row, self.col)
    }
}

impl From<(f64, f64)> for Point2 {
    fn from((row, col): (f64, f64)) -> Self {
        Self::new(row, col)
    }
}

/// Ordered point sequence. Index `i` of a user-marked set corresponds to
/// index `i` of the idealised grid it is paired with.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PointSet(Vec<Point2>);

impl PointSet {
    pub fn new(points: Vec<Point2>) -> Self {
        Self(points)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn points(&self) -> &[Point2] {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Point2> {
        self.0.iter()
    }

    pub fn to_dvec2(&self) -> Vec<DVec2> {
        self.0.iter().map(|p| p.to_dvec2()).collect()
    }

    pub fn into_vec(self) -> Vec<Point2> {
        self.0
    }

    /// Fail unless the set holds exactly `expected` points.
    pub fn check_len(&self, name: &'static str, expected: usize) -> Result<()> {
        if self.len() != expected {
            return Err(UnwarpError::invalid(
                name,
                format!("expected {} points, got {}", expected, self.len()),
            ));
        }
        Ok(())
    }
}

impl Index<usize> for PointSet {
    type Output = Point2;

    fn index(&self, idx: usize) -> &Self::Output {
        &self.0[idx]
    }
}

impl FromIterator<Point2> for PointSet {
    fn from_iter<I: IntoIterator<Item = Point2>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl From<Vec<Point2>> for PointSet {
    fn from(points: Vec<Point2>) -> Self {
        Self(points)
    }
}

impl<'a> IntoIterator for &'a PointSet {
    type Item = &'a Point2;
    type IntoIter = std::slice::Iter<'a, Point2>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_dvec2_axis_order() {
        let p = Point2::new(3.0, 7.0);
        let v = p.to_dvec2();
        assert_eq!(v.x, 7.0, "x must carry the column");
        assert_eq!(v.y, 3.0, "y must carry the row");
        assert_eq!(Point2::from_dvec2(v), p);
    }

    #[test]
    fn test_point_round() {
        assert_eq!(Point2::new(2.5, -0.4).round(), (3, 0));
        assert_eq!(Point2::new(9.49, 10.51).round(), (9, 11));
    }

    #[test]
    fn test_shape_check() {
        let buf = Buffer2::<f32>::new_default(4, 6);
        let shape = ImageShape::of(&buf);
        assert_eq!(shape, ImageShape::new(4, 6));
        assert!(shape.check(&buf).is_ok());

        let transposed = ImageShape::new(6, 4);
        match transposed.check(&buf) {
            Err(UnwarpError::ShapeMismatch { expected, actual }) => {
                assert_eq!(expected, transposed);
                assert_eq!(actual, shape);
            }
            other => panic!("expected ShapeMismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_point_set_check_len() {
        let set: PointSet = (0..4).map(|i| Point2::new(i as f64, 0.0)).collect();
        assert!(set.check_len("points", 4).is_ok());
        assert!(matches!(
            set.check_len("points", 9),
            Err(UnwarpError::InvalidParameter { name: "points", .. })
        ));
    }
}
