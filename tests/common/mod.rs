#![allow(dead_code)]

use std::f64::consts::{PI, TAU};

use bellshape::curve::Outline;
use bellshape::error::SolverError;
use bellshape::optimization::{MaterialParams, OptimizerSettings};
use bellshape::{ControlPointSet, Eigensolver};
use nalgebra::Point2;

/// Modes fall as the plate grows: f_k = k² * 1.8e5 / area.
///
/// Squares never line up exactly with a 2:3:4 chord, so a [440, 660, 880]
/// target stays above a fit of 0.1.
#[derive(Debug, Clone, Copy)]
pub struct AreaSolver;

impl Eigensolver for AreaSolver {
    fn solve(
        &self,
        outline: &Outline,
        _material: &MaterialParams,
        num_modes: usize,
    ) -> Result<Vec<f64>, SolverError> {
        let base = 1.8e5 / outline.area();
        Ok((1..=num_modes).map(|k| base * (k * k) as f64).collect())
    }
}

/// Same frequencies for every shape.
#[derive(Debug, Clone)]
pub struct ConstantSolver(pub Vec<f64>);

impl Eigensolver for ConstantSolver {
    fn solve(
        &self,
        _outline: &Outline,
        _material: &MaterialParams,
        num_modes: usize,
    ) -> Result<Vec<f64>, SolverError> {
        Ok(self.0.iter().copied().take(num_modes).collect())
    }
}

/// Solver whose executables are not installed.
#[derive(Debug, Clone, Copy)]
pub struct MissingSolver;

impl Eigensolver for MissingSolver {
    fn solve(
        &self,
        _outline: &Outline,
        _material: &MaterialParams,
        _num_modes: usize,
    ) -> Result<Vec<f64>, SolverError> {
        Err(SolverError::ExecutableNotFound("ccx".into()))
    }

    fn check(&self) -> Result<(), SolverError> {
        Err(SolverError::ExecutableNotFound("ccx".into()))
    }
}

/// Solver that crashes the worker.
#[derive(Debug, Clone, Copy)]
pub struct PanickingSolver;

impl Eigensolver for PanickingSolver {
    fn solve(
        &self,
        _outline: &Outline,
        _material: &MaterialParams,
        _num_modes: usize,
    ) -> Result<Vec<f64>, SolverError> {
        panic!("solver crashed")
    }
}

pub fn polygon(n: usize, radius: f64) -> ControlPointSet {
    rotated_polygon(n, radius, 0.0)
}

pub fn rotated_polygon(n: usize, radius: f64, phase: f64) -> ControlPointSet {
    let points: Vec<Point2<f64>> = (0..n)
        .map(|k| {
            let t = phase + TAU * k as f64 / n as f64;
            Point2::new(radius * t.cos(), radius * t.sin())
        })
        .collect();
    ControlPointSet::from_points(&points).unwrap()
}

/// Eight points on x = 100 sin t, y = 60 sin 2t.
pub fn figure_eight() -> ControlPointSet {
    let points: Vec<Point2<f64>> = (0..8)
        .map(|k| {
            let t = PI / 8.0 + k as f64 * PI / 4.0;
            Point2::new(100.0 * t.sin(), 60.0 * (2.0 * t).sin())
        })
        .collect();
    ControlPointSet::from_points(&points).unwrap()
}

/// Default settings with a short simplex budget.
pub fn quick_settings(max_iter: usize) -> OptimizerSettings {
    OptimizerSettings {
        max_iter,
        ..OptimizerSettings::default()
    }
}
