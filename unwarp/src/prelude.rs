//! Prelude module for convenient imports.
//!
//! ```rust,ignore
//! use unwarp::prelude::*;
//! ```

// Core types
pub use crate::{Buffer2, ImageShape, ImageStack, Point2, PointSet, Result, UnwarpError};

// Configuration
pub use crate::{Config, InterpolationMethod};

// Main API
pub use crate::{
    Calibration, Calibrator, GridLayout, MarginOptimizer, PointPropagator, StackCalibration,
    generate_grid, unwarp,
};
