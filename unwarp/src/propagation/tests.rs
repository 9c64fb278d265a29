use common::Buffer2;

use super::*;
use crate::testing::{add_noise, dot_grid_image, drifting_stack, init_tracing, shifted};

const SHAPE: ImageShape = ImageShape::new(96, 96);

fn seed_dots() -> PointSet {
    PointSet::new(vec![
        Point2::new(30.0, 30.0),
        Point2::new(30.0, 66.0),
        Point2::new(66.0, 30.0),
        Point2::new(66.0, 66.0),
    ])
}

fn fast_propagator(upsample_factor: usize) -> PointPropagator {
    PointPropagator::new(PropagationConfig {
        upsample_factor,
        ..Default::default()
    })
}

fn assert_close(actual: &PointSet, expected: &PointSet, tolerance: f64) {
    assert_eq!(actual.len(), expected.len());
    for (i, (a, e)) in actual.iter().zip(expected).enumerate() {
        assert!(
            a.distance(*e) < tolerance,
            "point {}: tracked {} expected {}",
            i,
            a,
            e
        );
    }
}

#[test]
fn test_box_half_width_from_spacing() {
    let propagator = PointPropagator::default();
    assert_eq!(propagator.box_half_width(&seed_dots()).unwrap(), 9);

    let tight: PointSet = (0..4).map(|i| Point2::new(10.0, 10.0 + 3.0 * i as f64)).collect();
    assert!(matches!(
        propagator.box_half_width(&tight),
        Err(UnwarpError::InvalidParameter {
            name: "box_half_width",
            ..
        })
    ));

    let single = PointSet::new(vec![Point2::new(10.0, 10.0)]);
    assert!(propagator.box_half_width(&single).is_err());
}

#[test]
fn test_five_plane_trajectory() {
    init_tracing();
    let (stack, truth) = drifting_stack(SHAPE, &seed_dots(), 5, 2, (1.0, -1.0));
    let propagator = fast_propagator(20);
    let half_width = propagator.box_half_width(&seed_dots()).unwrap();

    let trajectory = propagator
        .propagate(&stack, &seed_dots(), 2, half_width)
        .unwrap();

    assert_eq!(trajectory.plane_indices().collect::<Vec<_>>(), vec![0, 1, 2, 3, 4]);
    assert_eq!(trajectory.get(2), Some(&seed_dots()), "seed plane must be verbatim");
    for (plane, points) in trajectory.iter() {
        assert_eq!(points.len(), 4);
        assert_close(points, &truth[plane], 0.1);
    }
}

#[test]
fn test_subpixel_drift_first_step() {
    let (stack, truth) = drifting_stack(SHAPE, &seed_dots(), 2, 0, (0.4, -0.3));

    let trajectory = fast_propagator(50)
        .propagate(&stack, &seed_dots(), 0, 9)
        .unwrap();

    assert_close(trajectory.get(1).unwrap(), &truth[1], 0.05);
}

#[test]
fn test_tracking_with_noise() {
    let dots = seed_dots();
    let planes: Vec<Buffer2<f32>> = (0..3)
        .map(|p| {
            let mut image = dot_grid_image(SHAPE, &shifted(&dots, 2.0 * p as f64, 0.0), 2.0, 1.0);
            add_noise(&mut image, 2.0, p as u64);
            image
        })
        .collect();
    let stack = ImageStack::new(planes).unwrap();

    let trajectory = fast_propagator(20).propagate(&stack, &dots, 0, 9).unwrap();

    assert_close(trajectory.get(2).unwrap(), &shifted(&dots, 4.0, 0.0), 0.25);
}

#[test]
fn test_default_propagate() {
    let (stack, truth) = drifting_stack(SHAPE, &seed_dots(), 2, 1, (-1.0, 2.0));
    let trajectory = propagate(&stack, &seed_dots(), 1, 9).unwrap();
    assert_close(trajectory.get(0).unwrap(), &truth[0], 0.05);
}

#[test]
fn test_empty_stack_returns_seed() {
    let stack = ImageStack::new(Vec::new()).unwrap();
    let trajectory = PointPropagator::default()
        .propagate(&stack, &seed_dots(), 0, 9)
        .unwrap();
    assert_eq!(trajectory.len(), 1);
    assert_eq!(trajectory.get(0), Some(&seed_dots()));
}

#[test]
fn test_single_plane_returns_seed() {
    let (stack, _) = drifting_stack(SHAPE, &seed_dots(), 1, 0, (0.0, 0.0));
    let trajectory = PointPropagator::default()
        .propagate(&stack, &seed_dots(), 0, 9)
        .unwrap();
    assert_eq!(trajectory.into_map().into_keys().collect::<Vec<_>>(), vec![0]);
}

#[test]
fn test_seed_plane_out_of_range() {
    let (stack, _) = drifting_stack(SHAPE, &seed_dots(), 3, 0, (0.0, 0.0));
    let err = PointPropagator::default()
        .propagate(&stack, &seed_dots(), 3, 9)
        .unwrap_err();
    assert!(matches!(
        err,
        UnwarpError::InvalidParameter {
            name: "seed_plane",
            ..
        }
    ));
}

#[test]
fn test_window_leaving_plane_is_degenerate() {
    let (stack, _) = drifting_stack(SHAPE, &seed_dots(), 2, 0, (0.0, 0.0));
    let near_edge = PointSet::new(vec![Point2::new(40.0, 40.0), Point2::new(5.0, 40.0)]);

    let err = fast_propagator(10)
        .propagate(&stack, &near_edge, 0, 9)
        .unwrap_err();

    match err {
        UnwarpError::RegistrationDegenerate {
            point,
            half_width,
            shape,
        } => {
            assert_eq!(point, Point2::new(5.0, 40.0));
            assert_eq!(half_width, 9);
            assert_eq!(shape, SHAPE);
        }
        other => panic!("expected RegistrationDegenerate, got {:?}", other),
    }
}
