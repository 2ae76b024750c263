//! Search geometry shared by the interpolators
//!
//! A node at `(px, py)` sees a sample at `(x, y)` through the offset
//! `(rx, ry) = (x - px, y - py)`, rotated by `-angle` when the search
//! ellipse is rotated. With squared semi-axes `R1`, `R2` the sample is
//! inside iff `R2 * rx^2 + R1 * ry^2 <= R1 * R2`, which keeps every sample
//! when both radii are zero.

use std::ops::ControlFlow;

use super::quadtree::{QuadTree, Rect};

/// Squared distance below which a sample counts as sitting on the node.
pub const COINCIDENT_R2: f64 = 1e-13;

/// Precomputed search ellipse
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchEllipse {
    r1_sq: f64,
    r2_sq: f64,
    r12_sq: f64,
    cos: f64,
    sin: f64,
    rotated: bool,
}

impl SearchEllipse {
    /// Ellipse with semi-axes `radius1`, `radius2` rotated by `angle` degrees.
    pub fn new(radius1: f64, radius2: f64, angle: f64) -> Self {
        let r1_sq = radius1 * radius1;
        let r2_sq = radius2 * radius2;
        let rad = angle.to_radians();
        Self {
            r1_sq,
            r2_sq,
            r12_sq: r1_sq * r2_sq,
            cos: rad.cos(),
            sin: rad.sin(),
            rotated: angle != 0.0,
        }
    }

    /// Circle of the given radius
    pub fn circle(radius: f64) -> Self {
        Self::new(radius, radius, 0.0)
    }

    /// Both radii are zero, so every sample is inside
    pub fn is_unbounded(&self) -> bool {
        self.r1_sq == 0.0 && self.r2_sq == 0.0
    }

    /// Squared first semi-axis
    pub fn radius1_sq(&self) -> f64 {
        self.r1_sq
    }

    /// Half side of the square an indexed search should query, available
    /// only for unrotated circles of non-zero radius.
    pub fn index_radius(&self) -> Option<f64> {
        (!self.rotated && self.r1_sq == self.r2_sq && self.r1_sq > 0.0).then(|| self.r1_sq.sqrt())
    }

    /// Offset from the node to a sample, in the ellipse frame
    #[inline]
    pub fn offset(&self, x: f64, y: f64, px: f64, py: f64) -> (f64, f64) {
        let rx = x - px;
        let ry = y - py;
        if self.rotated {
            (rx * self.cos + ry * self.sin, ry * self.cos - rx * self.sin)
        } else {
            (rx, ry)
        }
    }

    /// Whether an offset lies inside the ellipse
    #[inline]
    pub fn contains(&self, rx: f64, ry: f64) -> bool {
        self.r2_sq * rx * rx + self.r1_sq * ry * ry <= self.r12_sq
    }
}

/// Read-only view of the samples, plus the spatial index when one is built.
#[derive(Debug, Clone, Copy)]
pub struct SampleView<'a> {
    pub x: &'a [f64],
    pub y: &'a [f64],
    pub z: &'a [f64],
    pub index: Option<&'a QuadTree<u32>>,
}

impl SampleView<'_> {
    pub fn len(&self) -> usize {
        self.x.len()
    }

    /// Visit candidate samples for the node `(px, py)`.
    ///
    /// With an index and a `radius`, only samples inside the square of
    /// half side `radius` are visited, in index traversal order. Otherwise
    /// every sample is visited in array order. Stops when `visit` breaks.
    pub fn for_each_candidate<F>(
        &self,
        px: f64,
        py: f64,
        radius: Option<f64>,
        scratch: &mut Vec<u32>,
        mut visit: F,
    ) where
        F: FnMut(usize) -> ControlFlow<()>,
    {
        match (self.index, radius) {
            (Some(tree), Some(r)) => {
                scratch.clear();
                tree.search_into(&Rect::around(px, py, r), scratch);
                for &i in scratch.iter() {
                    if visit(i as usize).is_break() {
                        return;
                    }
                }
            }
            _ => {
                for i in 0..self.x.len() {
                    if visit(i).is_break() {
                        return;
                    }
                }
            }
        }
    }
}

/// Per-job scratch space threaded through consecutive cells.
///
/// Only affects speed: every interpolator returns the same value whatever
/// the scratch holds on entry.
#[derive(Debug, Default)]
pub struct Scratch {
    /// Candidate indices returned by the spatial index
    pub candidates: Vec<u32>,
    /// `(effective squared distance, sample)` pairs
    pub ranked: Vec<(f64, u32)>,
    /// Coordinates of qualifying samples
    pub coords: Vec<(f64, f64)>,
    /// Facet where the last triangulation walk ended
    pub facet_hint: usize,
}
