mod common;

use bellshape::curve::downsample;
use bellshape::geometry::{flatten, unflatten};
use bellshape::optimization::{score, select_frequencies};
use bellshape::types::{COARSE_OUTLINE_LEN, DEFAULT_RESOLUTION, FINE_OUTLINE_LEN};
use bellshape::{ControlPointSet, CurveBuilder, GeometryError, Grade, self_intersects};
use common::{figure_eight, polygon, rotated_polygon};
use nalgebra::Point2;

const TOL: f64 = 1e-9;

#[test]
fn regular_polygons_are_valid_at_any_size_and_phase() {
    let builder = CurveBuilder::default();
    for n in 3..=10 {
        for &radius in &[20.0, 75.0, 150.0] {
            for &phase in &[0.0, 0.3, 1.1] {
                let points = rotated_polygon(n, radius, phase);
                assert!(
                    builder.is_valid(&points),
                    "{}-gon r={} phase={} rejected",
                    n,
                    radius,
                    phase
                );
            }
        }
    }
}

#[test]
fn stretched_ellipses_are_valid() {
    let builder = CurveBuilder::default();
    for &aspect in &[1.0, 2.0, 4.0] {
        let pts: Vec<Point2<f64>> = (0..8)
            .map(|k| {
                let t = std::f64::consts::TAU * k as f64 / 8.0;
                Point2::new(100.0 * aspect * t.cos(), 100.0 * t.sin())
            })
            .collect();
        let points = ControlPointSet::from_points(&pts).unwrap();
        assert!(builder.is_valid(&points), "aspect {} rejected", aspect);
    }
}

#[test]
fn figure_eight_is_rejected() {
    let builder = CurveBuilder::default();
    let points = figure_eight();
    assert!(!builder.is_valid(&points));
    assert_eq!(
        builder.realize(&points, COARSE_OUTLINE_LEN).unwrap_err(),
        GeometryError::SelfIntersecting
    );
    let curve = builder.interpolate(&points).unwrap();
    assert!(self_intersects(&curve.points, 100));
}

#[test]
fn outlines_respect_grade_caps() {
    let builder = CurveBuilder::default();
    let points = polygon(7, 120.0);
    for grade in [Grade::Coarse, Grade::Fine] {
        let shape = builder.realize(&points, grade.max_output_len()).unwrap();
        assert_eq!(shape.curve.len(), DEFAULT_RESOLUTION);
        assert!(shape.outline.len() <= grade.max_output_len());
        assert!(shape.outline.len() > grade.max_output_len() / 2);
    }
    let curve = builder.interpolate(&points).unwrap();
    assert_eq!(downsample(&curve, COARSE_OUTLINE_LEN).len(), 49);
    assert_eq!(downsample(&curve, FINE_OUTLINE_LEN).len(), 96);
}

#[test]
fn outline_area_grows_with_scale() {
    let builder = CurveBuilder::default();
    let small = builder.realize(&polygon(6, 50.0), FINE_OUTLINE_LEN).unwrap();
    let large = builder.realize(&polygon(6, 100.0), FINE_OUTLINE_LEN).unwrap();
    let ratio = large.outline.area() / small.outline.area();
    assert!((ratio - 4.0).abs() < 1e-6, "area ratio {}", ratio);
}

#[test]
fn flatten_round_trip() {
    let xs = vec![1.0, -2.5, 3.25, 0.0];
    let ys = vec![4.0, 5.5, -6.0, 7.0];
    let flat = flatten(&xs, &ys);
    assert_eq!(flat, vec![1.0, -2.5, 3.25, 0.0, 4.0, 5.5, -6.0, 7.0]);
    let (xs2, ys2) = unflatten(&flat).unwrap();
    assert_eq!(xs2, xs);
    assert_eq!(ys2, ys);
    assert!(unflatten(&flat[..7]).is_err());

    let points = ControlPointSet::new(xs, ys).unwrap();
    assert_eq!(ControlPointSet::from_flat(&points.flatten()).unwrap(), points);
}

#[test]
fn score_matches_hand_computation() {
    assert!(score(&[440.0, 660.0, 880.0], &[440.0, 660.0, 880.0]).abs() < TOL);
    let expected = ((10.0f64).powi(2) / 440.0 + (20.0f64).powi(2) / 660.0) / 2.0;
    assert!((score(&[440.0, 660.0], &[450.0, 640.0]) - expected).abs() < TOL);
}

#[test]
fn selection_picks_four_of_forty() {
    let target = [440.0, 550.0, 660.0, 880.0];
    let solved: Vec<f64> = (0..40).map(|i| 300.0 + 25.0 * i as f64).collect();
    let picked = select_frequencies(&solved, &target, 10.0).unwrap();
    assert_eq!(picked.len(), target.len());
    assert!(picked.iter().all(|f| solved.contains(f)));
    assert!(picked.windows(2).all(|w| w[0] < w[1]));
}
