use common::Buffer2;
use glam::DVec2;

use super::*;
use crate::geometry::{ImageShape, Point2};
use crate::grid::{GridLayout, generate_grid};
use crate::testing::{dot_grid_image, shifted, shrunk};

const SHAPE: ImageShape = ImageShape::new(60, 80);
const LAYOUT: GridLayout = GridLayout::new(4, 5);

fn target_image() -> Buffer2<f32> {
    let dots = generate_grid(SHAPE, LAYOUT, 0.1).unwrap();
    dot_grid_image(SHAPE, &dots, 2.0, 1.0)
}

#[test]
fn test_identity_round_trip_fills_canvas() {
    let image = target_image();
    let grid = generate_grid(SHAPE, LAYOUT, 0.0).unwrap();

    for method in [InterpolationMethod::Bilinear, InterpolationMethod::Bicubic] {
        let result = unwarp(&grid, &grid, &image, method).unwrap();

        assert_eq!(result.image.shape(), image.shape());
        assert!(
            result.image.iter().all(|&v| v != 0.0),
            "{:?}: identity warp must cover the whole canvas",
            method
        );
        let max_err = result
            .image
            .iter()
            .zip(image.iter())
            .map(|(a, b)| (a - b).abs())
            .fold(0.0f32, f32::max);
        assert!(max_err < 1e-3, "{:?}: max error {}", method, max_err);
        assert!(result.touches_border());
        assert_eq!(
            result.border,
            BorderCheck {
                top: false,
                bottom: false,
                left: false,
                right: false
            }
        );
    }
}

#[test]
fn test_inner_grid_leaves_borders_clear() {
    let image = target_image();
    let grid = generate_grid(SHAPE, LAYOUT, 0.1).unwrap();

    let result = unwarp(&grid, &grid, &image, InterpolationMethod::Bilinear).unwrap();

    assert!(result.border.is_clear());
    assert!(!result.touches_border());
    // Hull spans rows 6..=54 and cols 8..=72.
    assert_eq!(result.image[(5, 40)], 0.0);
    assert_eq!(result.image[(30, 7)], 0.0);
    assert!(result.image[(6, 8)] > 0.0);
    assert!(result.image[(54, 72)] > 0.0);
}

#[test]
fn test_translation_samples_shifted_content() {
    let image = Buffer2::from_fn(SHAPE.height, SHAPE.width, |r, c| (r * 100 + c) as f32 + 1.0);
    let target = generate_grid(SHAPE, LAYOUT, 0.2).unwrap();
    let source = shifted(&target, 2.0, -3.0);

    let result = unwarp(&source, &target, &image, InterpolationMethod::Bilinear).unwrap();

    for (r, c) in [(20, 30), (30, 40), (40, 50)] {
        let expected = image[(r + 2, c - 3)];
        let got = result.image[(r, c)];
        assert!(
            (got - expected).abs() < 1e-2,
            "({}, {}): got {}, expected {}",
            r,
            c,
            got,
            expected
        );
    }
}

#[test]
fn test_piecewise_affine_reproduces_affine_map() {
    let target = generate_grid(SHAPE, LAYOUT, 0.1).unwrap();
    let affine = |p: DVec2| DVec2::new(0.8 * p.x + 0.1 * p.y + 3.0, -0.05 * p.x + 0.9 * p.y + 1.5);
    let source: PointSet = target
        .iter()
        .map(|p| Point2::from_dvec2(affine(p.to_dvec2())))
        .collect();

    let transform = PiecewiseAffine::estimate(&source, &target).unwrap();
    assert_eq!(transform.triangle_count(), 2 * 3 * 4);

    for p in [DVec2::new(20.0, 20.0), DVec2::new(41.3, 33.7), DVec2::new(70.0, 50.0)] {
        let mapped = transform.apply(p).expect("inside hull");
        assert!(mapped.distance(affine(p)) < 1e-9);
    }
    assert!(transform.apply(DVec2::new(2.0, 2.0)).is_none());
    assert!(transform.apply(DVec2::new(79.0, 30.0)).is_none());
}

#[test]
fn test_monotone_border_transition() {
    let image = target_image();
    let source = shrunk(&generate_grid(SHAPE, LAYOUT, 0.1).unwrap(), SHAPE, 0.9);

    let states: Vec<bool> = (0..=18)
        .rev()
        .map(|k| {
            let margin = k as f64 * 0.025;
            let target = generate_grid(SHAPE, LAYOUT, margin).unwrap();
            unwarp(&source, &target, &image, InterpolationMethod::Bilinear)
                .unwrap()
                .touches_border()
        })
        .collect();

    assert!(!states[0], "margin 0.45 must leave the borders clear");
    assert!(states[states.len() - 1], "margin 0 must touch the borders");
    let transitions = states.windows(2).filter(|w| w[0] != w[1]).count();
    assert_eq!(transitions, 1, "states {:?}", states);
}

#[test]
fn test_mixed_border_counts_as_touching() {
    let mut image = Buffer2::new_default(5, 5);
    assert!(BorderCheck::of(&image).is_clear());

    image[(0, 2)] = 1.0;
    let border = BorderCheck::of(&image);
    assert!(!border.top);
    assert!(border.bottom && border.left && border.right);
    assert!(border.touches_border());
}

#[test]
fn test_too_few_points() {
    let image = target_image();
    let points = PointSet::new(vec![Point2::new(1.0, 1.0), Point2::new(5.0, 9.0)]);
    let err = unwarp(&points, &points, &image, InterpolationMethod::Bilinear).unwrap_err();
    assert!(matches!(
        err,
        UnwarpError::Geometry(GeometryError::TooFewPoints { found: 2 })
    ));
}

#[test]
fn test_collinear_target_rejected() {
    let image = target_image();
    let points: PointSet = (0..5).map(|i| Point2::new(10.0, 10.0 + 10.0 * i as f64)).collect();
    let err = unwarp(&points, &points, &image, InterpolationMethod::Bilinear).unwrap_err();
    assert!(matches!(err, UnwarpError::Geometry(GeometryError::Collinear)));
}

#[test]
fn test_count_mismatch() {
    let image = target_image();
    let target = generate_grid(SHAPE, LAYOUT, 0.1).unwrap();
    let source: PointSet = target.iter().skip(1).copied().collect();
    let err = unwarp(&source, &target, &image, InterpolationMethod::Bilinear).unwrap_err();
    assert!(matches!(
        err,
        UnwarpError::Geometry(GeometryError::CountMismatch {
            source_len: 19,
            target_len: 20
        })
    ));
}

#[test]
fn test_empty_image_rejected() {
    let grid = generate_grid(SHAPE, LAYOUT, 0.1).unwrap();
    let err = unwarp(&grid, &grid, &Buffer2::new_default(0, 0), InterpolationMethod::Bilinear)
        .unwrap_err();
    assert!(matches!(err, UnwarpError::InvalidParameter { name: "image", .. }));
}
