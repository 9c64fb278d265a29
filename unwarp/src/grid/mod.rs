//! Idealised dot lattice.
//!
//! The grid an undistorted image of the calibration target should show:
//! `rows x cols` dots evenly spaced between `margin * extent` and
//! `(1 - margin) * extent` along each axis, listed in row-major order.


use serde::{Deserialize, Serialize};

use crate::error::{Result, UnwarpError};
use crate::geometry::{ImageShape, Point2, PointSet};

/// Number of dot rows and columns on the calibration target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridLayout {
    pub rows: usize,
    pub cols: usize,
}

impl GridLayout {
    pub const fn new(rows: usize, cols: usize) -> Self {
        Self { rows, cols }
    }

    /// Total number of dots.
    pub fn len(&self) -> usize {
        self.rows * self.cols
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn validate(&self) -> Result<()> {
        if self.rows < 1 {
            return Err(UnwarpError::invalid("rows", "must be at least 1"));
        }
        if self.cols < 1 {
            return Err(UnwarpError::invalid("cols", "must be at least 1"));
        }
        Ok(())
    }
}

/// Reject margins outside `[0, 0.5)`.
pub fn validate_margin(margin: f64) -> Result<()> {
    if !(0.0..0.5).contains(&margin) {
        return Err(UnwarpError::invalid(
            "margin",
            format!("must be in [0, 0.5), got {}", margin),
        ));
    }
    Ok(())
}

/// Generate the idealised grid for an image of `shape`.
///
/// Point `r * cols + c` sits at row position `r` and column position `c`;
/// its row coordinate depends only on `r` and its column coordinate only on `c`.
pub fn generate_grid(shape: ImageShape, layout: GridLayout, margin: f64) -> Result<PointSet> {
    layout.validate()?;
    validate_margin(margin)?;
    if shape.is_empty() {
        return Err(UnwarpError::invalid(
            "shape",
            format!("image must not be empty, got {}", shape),
        ));
    }

    let height = shape.height as f64;
    let width = shape.width as f64;
    let row_pos = linspace(height * margin, height - height * margin, layout.rows);
    let col_pos = linspace(width * margin, width - width * margin, layout.cols);

    let points: PointSet = row_pos
        .iter()
        .flat_map(|&row| col_pos.iter().map(move |&col| Point2::new(row, col)))
        .collect();

    tracing::debug!(
        rows = layout.rows,
        cols = layout.cols,
        margin,
        "generated {} grid points for {}",
        points.len(),
        shape
    );

    Ok(points)
}

/// Pitch between neighbouring grid positions along `(rows, cols)`.
///
/// An axis with a single dot has no pitch and reports 0.
pub fn grid_pitch(shape: ImageShape, layout: GridLayout, margin: f64) -> (f64, f64) {
    let span = 1.0 - 2.0 * margin;
    let pitch = |extent: usize, n: usize| {
        if n > 1 {
            extent as f64 * span / (n - 1) as f64
        } else {
            0.0
        }
    };
    (pitch(shape.height, layout.rows), pitch(shape.width, layout.cols))
}

/// `n` evenly spaced samples from `start` to `end` inclusive; a single sample is `start`.
fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    if n == 1 {
        return vec![start];
    }
    let step = (end - start) / (n - 1) as f64;
    (0..n)
        .map(|i| {
            if i == n - 1 {
                end
            } else {
                start + step * i as f64
            }
        })
        .collect()
}
