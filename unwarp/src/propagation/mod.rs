//! Carry marked points through a depth stack.
//!
//! Starting from the annotated seed plane, two walks run outwards, one to
//! the last plane and one to plane 0. Every step registers a window around
//! each tracked point in the previous plane against the same window in the
//! next plane, and the shifted point becomes the anchor for the following
//! step. Registration is chained plane to plane, so errors accumulate with
//! distance from the seed.

#[cfg(test)]
mod tests;

use std::collections::BTreeMap;

use common::Buffer2;
use rayon::prelude::*;

use crate::config::PropagationConfig;
use crate::error::{Result, UnwarpError};
use crate::geometry::{ImageShape, Point2, PointSet};
use crate::registration::PhaseRegistrar;
use crate::spatial::median_spacing;
use crate::stack::ImageStack;

/// Tracked point sets keyed by plane index.
///
/// Every set is index-aligned with the seed set.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PointTrajectory {
    planes: BTreeMap<usize, PointSet>,
}

impl PointTrajectory {
    pub fn len(&self) -> usize {
        self.planes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.planes.is_empty()
    }

    pub fn get(&self, plane: usize) -> Option<&PointSet> {
        self.planes.get(&plane)
    }

    /// Plane indices in ascending order.
    pub fn plane_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.planes.keys().copied()
    }

    /// `(plane, points)` in ascending plane order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &PointSet)> {
        self.planes.iter().map(|(&k, v)| (k, v))
    }

    pub fn into_map(self) -> BTreeMap<usize, PointSet> {
        self.planes
    }
}

/// Plane-to-plane point tracker.
#[derive(Debug, Clone, Default)]
pub struct PointPropagator {
    config: PropagationConfig,
}

impl PointPropagator {
    pub fn new(config: PropagationConfig) -> Self {
        config.validate();
        Self { config }
    }

    pub fn config(&self) -> &PropagationConfig {
        &self.config
    }

    /// Correlation window half width for `seed_points`: median nearest-neighbour
    /// spacing divided by `spacing_divisor`, rounded down.
    pub fn box_half_width(&self, seed_points: &PointSet) -> Result<usize> {
        let spacing = median_spacing(seed_points)?;
        let half_width = (spacing / self.config.spacing_divisor).floor();
        if half_width < 1.0 {
            return Err(UnwarpError::invalid(
                "box_half_width",
                format!(
                    "median dot spacing {:.2} px is too small for a correlation window",
                    spacing
                ),
            ));
        }
        Ok(half_width as usize)
    }

    /// Track `seed_points`, marked on `seed_plane`, through every plane of `stack`.
    ///
    /// The trajectory holds the seed verbatim at `seed_plane` and one point set
    /// for every other plane. An empty stack yields the seed alone.
    pub fn propagate(
        &self,
        stack: &ImageStack,
        seed_points: &PointSet,
        seed_plane: usize,
        box_half_width: usize,
    ) -> Result<PointTrajectory> {
        let mut planes = BTreeMap::new();
        planes.insert(seed_plane, seed_points.clone());
        if stack.is_empty() {
            tracing::warn!("propagation over an empty stack returns the seed only");
            return Ok(PointTrajectory { planes });
        }

        if seed_plane >= stack.len() {
            return Err(UnwarpError::invalid(
                "seed_plane",
                format!("{} is outside a stack of {} planes", seed_plane, stack.len()),
            ));
        }
        if box_half_width < 1 {
            return Err(UnwarpError::invalid("box_half_width", "must be at least 1"));
        }

        let window = 2 * box_half_width;
        let registrar = PhaseRegistrar::new(ImageShape::new(window, window))?;

        tracing::info!(
            seed_plane,
            planes = stack.len(),
            points = seed_points.len(),
            box_half_width,
            "propagating points"
        );

        let upward = seed_plane + 1..stack.len();
        let downward = (0..seed_plane).rev();
        for walk in [
            upward.collect::<Vec<_>>(),
            downward.collect::<Vec<_>>(),
        ] {
            let mut previous_plane = seed_plane;
            let mut previous_points = seed_points.clone();
            for plane in walk {
                let points = self.step(
                    &registrar,
                    stack.plane(previous_plane),
                    stack.plane(plane),
                    &previous_points,
                    box_half_width,
                )?;
                tracing::debug!(
                    from = previous_plane,
                    to = plane,
                    "mean displacement {:.3} px",
                    mean_displacement(&previous_points, &points)
                );
                planes.insert(plane, points.clone());
                previous_plane = plane;
                previous_points = points;
            }
        }

        Ok(PointTrajectory { planes })
    }

    /// Track every point from `previous` into `next`.
    fn step(
        &self,
        registrar: &PhaseRegistrar,
        previous: &Buffer2<f32>,
        next: &Buffer2<f32>,
        points: &PointSet,
        half_width: usize,
    ) -> Result<PointSet> {
        let tracked = points
            .points()
            .par_iter()
            .map(|&point| self.track_point(registrar, previous, next, point, half_width))
            .collect::<Result<Vec<_>>>()?;
        Ok(PointSet::new(tracked))
    }

    fn track_point(
        &self,
        registrar: &PhaseRegistrar,
        previous: &Buffer2<f32>,
        next: &Buffer2<f32>,
        point: Point2,
        half_width: usize,
    ) -> Result<Point2> {
        let (row, col) = point.round();
        let window = 2 * half_width;
        let degenerate = || UnwarpError::RegistrationDegenerate {
            point,
            half_width,
            shape: ImageShape::of(previous),
        };

        let top = usize::try_from(row - half_width as i64).map_err(|_| degenerate())?;
        let left = usize::try_from(col - half_width as i64).map_err(|_| degenerate())?;
        let reference = previous
            .crop(top, left, window, window)
            .ok_or_else(degenerate)?;
        let moving = next.crop(top, left, window, window).ok_or_else(degenerate)?;

        let shift = registrar.register(&reference, &moving, self.config.upsample_factor)?;
        Ok(Point2::new(row as f64 - shift.row, col as f64 - shift.col))
    }
}

/// Track `seed_points` with the default configuration.
pub fn propagate(
    stack: &ImageStack,
    seed_points: &PointSet,
    seed_plane: usize,
    box_half_width: usize,
) -> Result<PointTrajectory> {
    PointPropagator::default().propagate(stack, seed_points, seed_plane, box_half_width)
}

fn mean_displacement(from: &PointSet, to: &PointSet) -> f64 {
    if from.is_empty() {
        return 0.0;
    }
    from.iter().zip(to).map(|(a, b)| a.distance(*b)).sum::<f64>() / from.len() as f64
}
