//! Error types for grid calibration.

use common::Buffer2;
use thiserror::Error;

use crate::geometry::{ImageShape, Point2};

pub type Result<T> = std::result::Result<T, UnwarpError>;

/// Reasons a point set cannot be triangulated.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    #[error("need at least 3 points to triangulate, got {found}")]
    TooFewPoints { found: usize },

    #[error("source has {source_len} points but target has {target_len}")]
    CountMismatch {
        source_len: usize,
        target_len: usize,
    },

    #[error("point {index} duplicates an earlier point")]
    DuplicatePoint { index: usize },

    #[error("all points are collinear")]
    Collinear,
}

/// Errors returned by the calibration operations.
#[derive(Debug, Error)]
pub enum UnwarpError {
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch {
        expected: ImageShape,
        actual: ImageShape,
    },

    #[error("cannot build piecewise-affine transform: {0}")]
    Geometry(#[from] GeometryError),

    #[error("margin search did not converge after {iterations} iterations (last margin {last_margin:.4})")]
    NoConvergence {
        last_margin: f64,
        iterations: usize,
        /// Warp produced at `last_margin`, kept for diagnostics.
        image: Box<Buffer2<f32>>,
    },

    #[error(
        "correlation window of half width {half_width} around {point} leaves the {shape} plane"
    )]
    RegistrationDegenerate {
        point: Point2,
        half_width: usize,
        shape: ImageShape,
    },
}

impl UnwarpError {
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        UnwarpError::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}
