//! Example: Synthetic Scan-Lens Calibration
//!
//! Renders a dot-grid target through a barrel-distorting lens, then:
//! 1. Calibrates a single image from the (known) distorted dot positions
//! 2. Builds a five-plane depth stack with lateral drift
//! 3. Calibrates the whole stack from dots marked on the middle plane
//!
//! # Usage
//!
//! ```bash
//! cargo run --release --example synthetic_calibration -- [log_dir]
//! ```

use std::env;

use common::log_setup::{LogConfig, setup_logging};
use unwarp::PlaneMetadata;
use unwarp::prelude::*;

const SHAPE: ImageShape = ImageShape::new(256, 256);
const LAYOUT: GridLayout = GridLayout::new(9, 9);
const GRID_SPACING_UM: f64 = 50.0;

/// Radial barrel distortion about the image centre.
fn distort(points: &PointSet, k: f64) -> PointSet {
    let (cr, cc) = (SHAPE.height as f64 / 2.0, SHAPE.width as f64 / 2.0);
    let norm = cr.max(cc);
    points
        .iter()
        .map(|p| {
            let (dr, dc) = ((p.row - cr) / norm, (p.col - cc) / norm);
            let scale = 1.0 - k * (dr * dr + dc * dc);
            Point2::new(cr + dr * scale * norm, cc + dc * scale * norm)
        })
        .collect()
}

fn render(dots: &PointSet) -> Buffer2<f32> {
    Buffer2::from_fn(SHAPE.height, SHAPE.width, |r, c| {
        let value: f64 = dots
            .iter()
            .map(|d| {
                let (dr, dc) = (r as f64 - d.row, c as f64 - d.col);
                (-(dr * dr + dc * dc) / 8.0).exp()
            })
            .sum();
        (10.0 + 1000.0 * value) as f32
    })
}

fn shifted(points: &PointSet, d_row: f64, d_col: f64) -> PointSet {
    points
        .iter()
        .map(|p| Point2::new(p.row + d_row, p.col + d_col))
        .collect()
}

fn run() -> Result<()> {
    let calibrator = Calibrator::new(Config::default());
    let ideal = generate_grid(SHAPE, LAYOUT, 0.1)?;
    let marked = distort(&ideal, 0.08);

    println!("Calibrating single image ({} dots)...", marked.len());
    let image = render(&marked);
    let single = calibrator.calibrate_image(&image, &marked, LAYOUT, 0.1)?;
    let size = single.pixel_size(GRID_SPACING_UM)?;
    println!(
        "  margin {:.4} after {} steps, pixel size {:.4} x {:.4} um",
        single.margin, single.iterations, size.row_um, size.col_um
    );

    println!("\nCalibrating five-plane stack...");
    let planes = (0..5)
        .map(|p| {
            let k = p as f64 - 2.0;
            let depth = PlaneMetadata {
                depth: Some(100.0 * k),
                zoom: Some(1.0),
            };
            (depth, render(&shifted(&marked, 0.7 * k, -0.4 * k)))
        })
        .collect();
    let stack = ImageStack::from_depth_planes(planes)?;
    let result = calibrator.calibrate_stack(&stack, &marked, 2, LAYOUT, 0.1)?;

    println!(
        "  box half width {} px, margins per plane {:?}",
        result.box_half_width, result.plane_margins
    );
    println!("  shared margin {:.4}", result.margin);
    for (plane, points) in result.trajectory.iter() {
        println!("  plane {}: first dot at {}", plane, points[0]);
    }

    Ok(())
}

fn main() {
    let mut log_config = LogConfig::default();
    if let Some(dir) = env::args().nth(1) {
        log_config = log_config.with_directory(dir);
    }
    let _log_guard = setup_logging(&log_config);

    if let Err(e) = run() {
        eprintln!("Calibration failed: {}", e);
        if let UnwarpError::NoConvergence { last_margin, .. } = e {
            eprintln!("  try a different start margin than {:.3}", last_margin);
        }
        std::process::exit(1);
    }
}
