//! End-to-end calibration of single images and depth stacks.


use common::Buffer2;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::dewarp::{BorderCheck, unwarp};
use crate::error::{Result, UnwarpError};
use crate::geometry::{ImageShape, PointSet};
use crate::grid::{GridLayout, generate_grid, grid_pitch};
use crate::margin::{MarginOptimizer, MarginSearch};
use crate::propagation::{PointPropagator, PointTrajectory};
use crate::stack::ImageStack;

/// Physical size of one unwarped pixel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PixelSize {
    pub row_um: f64,
    pub col_um: f64,
}

/// Result of calibrating a single image.
#[derive(Debug, Clone)]
pub struct Calibration {
    pub image: Buffer2<f32>,
    /// Idealised grid the marked dots were mapped onto.
    pub grid: PointSet,
    pub margin: f64,
    /// Margin search steps taken.
    pub iterations: usize,
    pub layout: GridLayout,
    pub shape: ImageShape,
}

impl Calibration {
    /// Pixel size of the unwarped image for a target with dots `grid_spacing_um` apart.
    pub fn pixel_size(&self, grid_spacing_um: f64) -> Result<PixelSize> {
        pixel_size(self.shape, self.layout, self.margin, grid_spacing_um)
    }
}

/// Result of calibrating a depth stack with one shared grid.
#[derive(Debug, Clone)]
pub struct StackCalibration {
    /// Unwarped planes, in stack order.
    pub images: Vec<Buffer2<f32>>,
    pub grid: PointSet,
    /// Largest of `plane_margins`.
    pub margin: f64,
    pub plane_margins: Vec<f64>,
    /// Border state of each unwarped plane at `margin`.
    pub borders: Vec<BorderCheck>,
    pub trajectory: PointTrajectory,
    pub box_half_width: usize,
    pub layout: GridLayout,
    pub shape: ImageShape,
}

impl StackCalibration {
    pub fn pixel_size(&self, grid_spacing_um: f64) -> Result<PixelSize> {
        pixel_size(self.shape, self.layout, self.margin, grid_spacing_um)
    }
}

/// Runs the margin search, and for stacks the point propagation, with one configuration.
#[derive(Debug, Clone)]
pub struct Calibrator {
    config: Config,
    optimizer: MarginOptimizer,
    propagator: PointPropagator,
}

impl Default for Calibrator {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl Calibrator {
    pub fn new(config: Config) -> Self {
        config.validate();
        Self {
            optimizer: MarginOptimizer::new(&config),
            propagator: PointPropagator::new(config.propagation.clone()),
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Unwarp `image` so that `user_points` land on the best-fitting idealised grid.
    pub fn calibrate_image(
        &self,
        image: &Buffer2<f32>,
        user_points: &PointSet,
        layout: GridLayout,
        initial_margin: f64,
    ) -> Result<Calibration> {
        let MarginSearch {
            image: warped,
            margin,
            grid,
            iterations,
            ..
        } = self
            .optimizer
            .optimize(initial_margin, user_points, image, layout)?;

        tracing::info!("calibrated image at margin {:.4}", margin);
        Ok(Calibration {
            image: warped,
            grid,
            margin,
            iterations,
            layout,
            shape: ImageShape::of(image),
        })
    }

    /// Calibrate every plane of `stack` from points marked on `seed_plane` only.
    ///
    /// The points are propagated through the stack, the margin is searched
    /// per plane and the largest result is used to unwarp every plane onto a
    /// single grid.
    pub fn calibrate_stack(
        &self,
        stack: &ImageStack,
        seed_points: &PointSet,
        seed_plane: usize,
        layout: GridLayout,
        initial_margin: f64,
    ) -> Result<StackCalibration> {
        if stack.is_empty() {
            return Err(UnwarpError::invalid("stack", "must hold at least one plane"));
        }
        layout.validate()?;
        seed_points.check_len("seed_points", layout.len())?;

        let box_half_width = self.propagator.box_half_width(seed_points)?;
        let trajectory = self
            .propagator
            .propagate(stack, seed_points, seed_plane, box_half_width)?;

        let sources: Vec<&PointSet> = trajectory.iter().map(|(_, points)| points).collect();
        let searches =
            self.optimizer
                .optimize_planes(initial_margin, &sources, stack.planes(), layout)?;
        let plane_margins: Vec<f64> = searches.iter().map(|s| s.margin).collect();
        let margin = plane_margins.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        tracing::info!(
            "stack margin {:.4} (per plane {:?})",
            margin,
            plane_margins
        );

        let shape = stack.shape();
        let grid = generate_grid(shape, layout, margin)?;
        let method = self.config.interpolation;
        let warped = sources
            .par_iter()
            .zip(stack.planes().par_iter())
            .map(|(source, plane)| unwarp(source, &grid, plane, method))
            .collect::<Result<Vec<_>>>()?;

        let (images, borders) = warped.into_iter().map(|w| (w.image, w.border)).unzip();

        Ok(StackCalibration {
            images,
            grid,
            margin,
            plane_margins,
            borders,
            trajectory,
            box_half_width,
            layout,
            shape,
        })
    }
}

fn pixel_size(
    shape: ImageShape,
    layout: GridLayout,
    margin: f64,
    grid_spacing_um: f64,
) -> Result<PixelSize> {
    if !(grid_spacing_um > 0.0 && grid_spacing_um.is_finite()) {
        return Err(UnwarpError::invalid(
            "grid_spacing_um",
            format!("must be positive, got {}", grid_spacing_um),
        ));
    }
    let (row_pitch, col_pitch) = grid_pitch(shape, layout, margin);
    if row_pitch <= 0.0 || col_pitch <= 0.0 {
        return Err(UnwarpError::invalid(
            "layout",
            format!(
                "need at least two rows and columns for a pitch, got {}x{}",
                layout.rows, layout.cols
            ),
        ));
    }
    Ok(PixelSize {
        row_um: grid_spacing_um / row_pitch,
        col_um: grid_spacing_um / col_pitch,
    })
}
