//! Unwarp - scan-lens distortion calibration from dot-grid images.
//!
//! A calibration target with a regular dot lattice is imaged through the
//! scan lens. The user marks the observed dots; the library maps them onto an
//! idealised, evenly spaced lattice with a piecewise-affine warp and searches
//! the lattice margin at which the unwarped image just fills the canvas.
//! Depth stacks are calibrated from dots marked on a single plane, which are
//! tracked through the other planes by sub-pixel phase correlation.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use unwarp::prelude::*;
//!
//! let calibrator = Calibrator::new(Config::default());
//! let result = calibrator.calibrate_image(&image, &marked_dots, GridLayout::new(9, 9), 0.1)?;
//!
//! println!("margin {:.3}, {:?}", result.margin, result.pixel_size(50.0)?);
//! ```

pub mod calibration;
pub mod config;
pub mod dewarp;
pub mod error;
pub mod geometry;
pub mod grid;
pub mod margin;
pub mod propagation;
pub mod registration;
pub mod spatial;
pub mod stack;

#[cfg(test)]
pub(crate) mod testing;

pub mod prelude;

// ============================================================================
// Core types
// ============================================================================

pub use common::Buffer2;
pub use error::{GeometryError, Result, UnwarpError};
pub use geometry::{ImageShape, Point2, PointSet};
pub use stack::{ImageStack, PlaneMetadata, mean_projection};

// ============================================================================
// Configuration
// ============================================================================

pub use config::{Config, InterpolationMethod, MarginSearchConfig, PropagationConfig};

// ============================================================================
// Grid and spacing
// ============================================================================

pub use grid::{GridLayout, generate_grid, grid_pitch};
pub use spatial::{KdTree, median_spacing, nearest_neighbor_distances};

// ============================================================================
// Registration and propagation
// ============================================================================

pub use propagation::{PointPropagator, PointTrajectory, propagate};
pub use registration::{PhaseRegistrar, Registration, register};

// ============================================================================
// Dewarping and margin search
// ============================================================================

pub use dewarp::{BorderCheck, PiecewiseAffine, UnwarpResult, unwarp};
pub use margin::{MarginOptimizer, MarginSearch, SearchDirection, optimize};

// ============================================================================
// Pipeline
// ============================================================================

pub use calibration::{Calibration, Calibrator, PixelSize, StackCalibration};
