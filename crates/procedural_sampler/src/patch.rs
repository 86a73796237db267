// SPDX-License-Identifier: MIT OR Apache-2.0
//! Surface patches and the parameter-space cells sampled on them.

use procedural_graph::{SamplePoint, Vec3};
use serde::{Deserialize, Serialize};

/// A parallelogram in world space, parameterized by `(s, t)` in `[0, 1]²`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SurfacePatch {
    /// World position of `(0, 0)`
    pub origin: Vec3,
    /// World offset covered as `s` goes from 0 to 1
    pub u_axis: Vec3,
    /// World offset covered as `t` goes from 0 to 1
    pub v_axis: Vec3,
    /// Animation time of every sample
    pub time: f64,
}

impl Default for SurfacePatch {
    fn default() -> Self {
        Self::new(Vec3::ZERO, Vec3::X, Vec3::Y)
    }
}

impl SurfacePatch {
    /// Create a patch at time 0
    pub fn new(origin: Vec3, u_axis: Vec3, v_axis: Vec3) -> Self {
        Self {
            origin,
            u_axis,
            v_axis,
            time: 0.0,
        }
    }

    /// Set the animation time
    pub fn with_time(mut self, time: f64) -> Self {
        self.time = time;
        self
    }

    /// World position of a parameter point
    pub fn position(&self, s: f64, t: f64) -> Vec3 {
        self.origin + self.u_axis * s + self.v_axis * t
    }

    /// Sample point at the center of a cell, with the cell's world footprint
    pub fn sample_point(&self, cell: &Cell) -> SamplePoint {
        let (s, t) = cell.center();
        let size = self.u_axis.abs() * cell.ds + self.v_axis.abs() * cell.dt;
        SamplePoint::new(self.position(s, t))
            .with_size(size)
            .with_time(self.time)
    }
}

/// A rectangle of parameter space
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    /// Lower `s` bound
    pub s: f64,
    /// Lower `t` bound
    pub t: f64,
    /// Extent along `s`
    pub ds: f64,
    /// Extent along `t`
    pub dt: f64,
    /// Number of splits from the root cell
    pub depth: u32,
}

impl Cell {
    /// A root cell
    pub fn new(s: f64, t: f64, ds: f64, dt: f64) -> Self {
        Self {
            s,
            t,
            ds,
            dt,
            depth: 0,
        }
    }

    /// Parameter coordinates of the center
    pub fn center(&self) -> (f64, f64) {
        (self.s + 0.5 * self.ds, self.t + 0.5 * self.dt)
    }

    /// Parameter area
    pub fn area(&self) -> f64 {
        self.ds * self.dt
    }

    /// The four quadrants, row by row
    pub fn split(&self) -> [Cell; 4] {
        let ds = 0.5 * self.ds;
        let dt = 0.5 * self.dt;
        let quadrant = |i: u32, j: u32| Cell {
            s: self.s + f64::from(i) * ds,
            t: self.t + f64::from(j) * dt,
            ds,
            dt,
            depth: self.depth + 1,
        };
        [quadrant(0, 0), quadrant(1, 0), quadrant(0, 1), quadrant(1, 1)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_point_footprint() {
        let patch = SurfacePatch::new(
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(2.0, 0.0, 0.0),
            Vec3::new(0.0, -4.0, 1.0),
        )
        .with_time(3.0);
        let point = patch.sample_point(&Cell::new(0.5, 0.0, 0.5, 0.25));
        assert_eq!(point.position, Vec3::new(2.5, -0.5, 0.125));
        assert_eq!(point.size, Vec3::new(1.0, 1.0, 0.25));
        assert_eq!(point.time, 3.0);
    }

    #[test]
    fn test_split_covers_cell() {
        let cell = Cell::new(0.0, 0.5, 1.0, 0.5);
        let quadrants = cell.split();
        let area: f64 = quadrants.iter().map(Cell::area).sum();
        assert_eq!(area, cell.area());
        assert_eq!(quadrants[3].s, 0.5);
        assert_eq!(quadrants[3].t, 0.75);
        assert!(quadrants.iter().all(|q| q.depth == 1));
    }
}
