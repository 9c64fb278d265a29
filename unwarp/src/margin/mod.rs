//! Margin search.
//!
//! Finds the grid margin at which the unwarped image just reaches the image
//! borders. The direction is fixed by the first evaluation: a result with all
//! borders clear wastes field of view, so the margin shrinks until content
//! touches a border; a result that touches loses data, so the margin grows
//! until every border is clear. The search returns the first margin on the
//! other side of that transition.


use common::Buffer2;

use crate::config::{Config, InterpolationMethod, MarginSearchConfig};
use crate::dewarp::{UnwarpResult, unwarp};
use crate::error::{Result, UnwarpError};
use crate::geometry::{ImageShape, PointSet};
use crate::grid::{GridLayout, generate_grid, validate_margin};

/// Margins closer than this to a search bound count as on the bound.
const MARGIN_EPSILON: f64 = 1e-9;

/// Direction the margin moved during a search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchDirection {
    /// Initial result was clear; margin decreased until content touched a border.
    Shrink,
    /// Initial result touched a border; margin increased until all borders were clear.
    Grow,
}

impl SearchDirection {
    fn sign(self) -> f64 {
        match self {
            SearchDirection::Shrink => -1.0,
            SearchDirection::Grow => 1.0,
        }
    }
}

/// Outcome of a converged margin search.
#[derive(Debug, Clone)]
pub struct MarginSearch {
    /// Warp at the chosen margin.
    pub image: Buffer2<f32>,
    pub margin: f64,
    /// Idealised grid generated at `margin`.
    pub grid: PointSet,
    /// Number of margin steps taken after the initial evaluation.
    pub iterations: usize,
    pub direction: SearchDirection,
    /// Border state at `margin`.
    pub touches_border: bool,
}

/// Bounded linear search over the grid margin.
#[derive(Debug, Clone, Default)]
pub struct MarginOptimizer {
    search: MarginSearchConfig,
    interpolation: InterpolationMethod,
}

impl MarginOptimizer {
    pub fn new(config: &Config) -> Self {
        config.margin_search.validate();
        Self {
            search: config.margin_search.clone(),
            interpolation: config.interpolation,
        }
    }

    pub fn config(&self) -> &MarginSearchConfig {
        &self.search
    }

    /// Search from `initial_margin` for the margin where the border state flips.
    ///
    /// `source` holds the marked dots in `image`, row-major and index-aligned
    /// with the `layout` grid. Fails with `NoConvergence` when the state has
    /// not flipped after `max_iterations` steps or the next margin would leave
    /// `[min_margin, max_margin]`.
    pub fn optimize(
        &self,
        initial_margin: f64,
        source: &PointSet,
        image: &Buffer2<f32>,
        layout: GridLayout,
    ) -> Result<MarginSearch> {
        layout.validate()?;
        validate_margin(initial_margin)?;
        source.check_len("source_points", layout.len())?;
        let shape = ImageShape::of(image);

        let (_, first) = self.evaluate(shape, layout, initial_margin, source, image)?;
        let direction = if first.border.is_clear() {
            SearchDirection::Shrink
        } else {
            SearchDirection::Grow
        };
        tracing::debug!(
            margin = initial_margin,
            touches = first.touches_border(),
            ?direction,
            "margin search start"
        );

        let mut margin = initial_margin;
        let mut last_image = first.image;
        let mut iterations = 0;
        while iterations < self.search.max_iterations {
            // `initial ± k * step`, never accumulated.
            let next = initial_margin + direction.sign() * (iterations + 1) as f64 * self.search.step;
            if next < self.search.min_margin - MARGIN_EPSILON
                || next > self.search.max_margin + MARGIN_EPSILON
            {
                tracing::warn!(
                    margin,
                    next,
                    "margin search left [{}, {}]",
                    self.search.min_margin,
                    self.search.max_margin
                );
                break;
            }
            margin = next.clamp(self.search.min_margin, self.search.max_margin);
            iterations += 1;

            let (grid, result) = self.evaluate(shape, layout, margin, source, image)?;
            let touches = result.touches_border();
            tracing::debug!(iteration = iterations, margin, touches, "margin search step");

            let flipped = match direction {
                SearchDirection::Shrink => touches,
                SearchDirection::Grow => !touches,
            };
            if flipped {
                tracing::info!(
                    "margin search converged at {:.4} after {} steps ({:?})",
                    margin,
                    iterations,
                    direction
                );
                return Ok(MarginSearch {
                    image: result.image,
                    margin,
                    grid,
                    iterations,
                    direction,
                    touches_border: touches,
                });
            }
            last_image = result.image;
        }

        Err(UnwarpError::NoConvergence {
            last_margin: margin,
            iterations,
            image: Box::new(last_image),
        })
    }

    /// Run [`optimize`](Self::optimize) on every plane and report each result.
    ///
    /// Planes are independent; the stack-wide margin is chosen by the caller.
    pub fn optimize_planes(
        &self,
        initial_margin: f64,
        sources: &[&PointSet],
        planes: &[Buffer2<f32>],
        layout: GridLayout,
    ) -> Result<Vec<MarginSearch>> {
        use rayon::prelude::*;

        if sources.len() != planes.len() {
            return Err(UnwarpError::invalid(
                "sources",
                format!("{} point sets for {} planes", sources.len(), planes.len()),
            ));
        }

        sources
            .par_iter()
            .zip(planes.par_iter())
            .map(|(source, plane)| self.optimize(initial_margin, source, plane, layout))
            .collect()
    }

    fn evaluate(
        &self,
        shape: ImageShape,
        layout: GridLayout,
        margin: f64,
        source: &PointSet,
        image: &Buffer2<f32>,
    ) -> Result<(PointSet, UnwarpResult)> {
        let grid = generate_grid(shape, layout, margin)?;
        let result = unwarp(source, &grid, image, self.interpolation)?;
        Ok((grid, result))
    }
}

/// Margin search with the default configuration and a custom step.
pub fn optimize(
    initial_margin: f64,
    source: &PointSet,
    image: &Buffer2<f32>,
    layout: GridLayout,
    step: f64,
) -> Result<MarginSearch> {
    let config = Config {
        margin_search: MarginSearchConfig {
            step,
            ..Default::default()
        },
        ..Default::default()
    };
    MarginOptimizer::new(&config).optimize(initial_margin, source, image, layout)
}
