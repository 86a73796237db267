// SPDX-License-Identifier: MIT OR Apache-2.0
//! 3x3 linear systems, consumed by the geometry modules.

use crate::math::{Mat3, Vec3};
use std::fmt;

/// The system has no unique solution
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Linear system is singular")]
pub struct Unsolvable;

/// Solves `m * x = b` for `x`
pub trait LinearSolver: Send + Sync + fmt::Debug {
    /// Solve the system, or report that it has no unique solution
    fn solve(&self, m: &Mat3, b: Vec3) -> Result<Vec3, Unsolvable>;
}

/// Gaussian elimination with partial pivoting
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GaussianElimination {
    /// Pivots smaller than this (relative to the largest matrix entry) are treated as zero
    pub epsilon: f64,
}

impl Default for GaussianElimination {
    fn default() -> Self {
        Self { epsilon: 1e-12 }
    }
}

impl LinearSolver for GaussianElimination {
    fn solve(&self, m: &Mat3, b: Vec3) -> Result<Vec3, Unsolvable> {
        let scale = m
            .rows
            .iter()
            .flatten()
            .fold(0.0_f64, |acc, v| acc.max(v.abs()));
        if scale == 0.0 || !scale.is_finite() {
            return Err(Unsolvable);
        }
        let threshold = self.epsilon * scale;

        let mut a = m.rows;
        let mut rhs = b.to_array();

        for col in 0..3 {
            let pivot = (col..3)
                .max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))
                .unwrap_or(col);
            if a[pivot][col].abs() <= threshold {
                return Err(Unsolvable);
            }
            a.swap(col, pivot);
            rhs.swap(col, pivot);

            for row in col + 1..3 {
                let factor = a[row][col] / a[col][col];
                for k in col..3 {
                    a[row][k] -= factor * a[col][k];
                }
                rhs[row] -= factor * rhs[col];
            }
        }

        let mut x = [0.0; 3];
        for row in (0..3).rev() {
            let tail: f64 = (row + 1..3).map(|k| a[row][k] * x[k]).sum();
            x[row] = (rhs[row] - tail) / a[row][row];
        }
        Ok(Vec3::from(x))
    }
}

/// Invert a matrix column by column
pub fn invert(solver: &dyn LinearSolver, m: &Mat3) -> Result<Mat3, Unsolvable> {
    Ok(Mat3::from_columns(
        solver.solve(m, Vec3::X)?,
        solver.solve(m, Vec3::Y)?,
        solver.solve(m, Vec3::Z)?,
    ))
}
