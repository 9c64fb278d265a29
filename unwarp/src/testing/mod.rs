//! Synthetic calibration targets for unit tests.

use common::Buffer2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::geometry::{ImageShape, Point2, PointSet};
use crate::stack::ImageStack;

/// Route `tracing` output through the test harness. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Single isotropic Gaussian spot on a black background.
pub fn gaussian_blob(
    shape: ImageShape,
    row: f64,
    col: f64,
    sigma: f64,
    amplitude: f64,
) -> Buffer2<f32> {
    let inv_two_sigma_sq = 1.0 / (2.0 * sigma * sigma);
    Buffer2::from_fn(shape.height, shape.width, |r, c| {
        let dr = r as f64 - row;
        let dc = c as f64 - col;
        (amplitude * (-(dr * dr + dc * dc) * inv_two_sigma_sq).exp()) as f32
    })
}

/// Dot-grid image: a Gaussian spot at every point on a constant background.
///
/// The background is strictly positive so every sample inside the image
/// is non-zero and only the warp fill produces zeros.
pub fn dot_grid_image(shape: ImageShape, dots: &PointSet, sigma: f64, background: f32) -> Buffer2<f32> {
    let inv_two_sigma_sq = 1.0 / (2.0 * sigma * sigma);
    let reach = (4.0 * sigma).ceil();
    let mut image = Buffer2::new_filled(shape.height, shape.width, background);

    for dot in dots {
        let r0 = (dot.row - reach).max(0.0) as usize;
        let r1 = ((dot.row + reach).max(0.0) as usize).min(shape.height.saturating_sub(1));
        let c0 = (dot.col - reach).max(0.0) as usize;
        let c1 = ((dot.col + reach).max(0.0) as usize).min(shape.width.saturating_sub(1));
        for r in r0..=r1 {
            for c in c0..=c1 {
                let dr = r as f64 - dot.row;
                let dc = c as f64 - dot.col;
                image[(r, c)] += (100.0 * (-(dr * dr + dc * dc) * inv_two_sigma_sq).exp()) as f32;
            }
        }
    }
    image
}

/// Add uniform noise in `[0, amplitude)` from a seeded generator.
pub fn add_noise(image: &mut Buffer2<f32>, amplitude: f32, seed: u64) {
    let mut rng = StdRng::seed_from_u64(seed);
    for v in image.iter_mut() {
        *v += rng.random::<f32>() * amplitude;
    }
}

/// Translate every point by `(d_row, d_col)`.
pub fn shifted(points: &PointSet, d_row: f64, d_col: f64) -> PointSet {
    points
        .iter()
        .map(|p| Point2::new(p.row + d_row, p.col + d_col))
        .collect()
}

/// Scale every point towards the image centre.
pub fn shrunk(points: &PointSet, shape: ImageShape, factor: f64) -> PointSet {
    let centre_row = shape.height as f64 / 2.0;
    let centre_col = shape.width as f64 / 2.0;
    points
        .iter()
        .map(|p| {
            Point2::new(
                centre_row + (p.row - centre_row) * factor,
                centre_col + (p.col - centre_col) * factor,
            )
        })
        .collect()
}

/// Depth stack whose dots drift by `drift` per plane, relative to `seed_plane`.
///
/// Returns the stack and the true dot positions of every plane.
pub fn drifting_stack(
    shape: ImageShape,
    dots: &PointSet,
    planes: usize,
    seed_plane: usize,
    drift: (f64, f64),
) -> (ImageStack, Vec<PointSet>) {
    let truth: Vec<PointSet> = (0..planes)
        .map(|p| {
            let k = p as f64 - seed_plane as f64;
            shifted(dots, drift.0 * k, drift.1 * k)
        })
        .collect();

    let images = truth
        .iter()
        .map(|points| dot_grid_image(shape, points, 2.0, 1.0))
        .collect();

    let stack = ImageStack::new(images).expect("planes share one shape");
    (stack, truth)
}
