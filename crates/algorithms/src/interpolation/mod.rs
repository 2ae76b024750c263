//! Spatial interpolation of scattered points onto regular grids
//!
//! - Inverse distance to a power, over a search ellipse or the nearest samples
//! - Moving average over a search ellipse
//! - Nearest neighbour
//! - Data metrics: minimum, maximum, range, count, average distances
//! - Linear interpolation over a triangulation
//!
//! A [`GridContext`] prepares one algorithm over one point set and evaluates
//! grids with it, using a [`QuadTree`] to restrict fixed-radius searches.

mod context;
mod idw;
mod metrics;
mod moving_average;
mod nearest;
pub mod options;
mod points;
pub mod quadtree;
mod search;
mod simd;
mod tin;

pub use context::{GridConfig, GridContext, DEFAULT_INDEX_THRESHOLD};
pub use options::{
    DataMetric, GridAlgorithm, InverseDistanceNearestParams, InverseDistanceParams, LinearParams,
    MetricParams, MovingAverageParams, NearestParams, ALGORITHM_NAMES,
};
pub use points::{Ownership, PointSet};
pub use quadtree::{QuadTree, QuadTreeStats, Rect};
pub use search::{SearchEllipse, COINCIDENT_R2};
pub use simd::SimdTier;
pub use tin::{DelaunayTriangulation, Triangulation};

/// A sample point with x, y coordinates and a value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplePoint {
    pub x: f64,
    pub y: f64,
    pub value: f64,
}

impl SamplePoint {
    pub fn new(x: f64, y: f64, value: f64) -> Self {
        Self { x, y, value }
    }
}
