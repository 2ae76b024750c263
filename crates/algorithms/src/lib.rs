//! # Gridder Algorithms
//!
//! Interpolation of scattered `(x, y, z)` samples onto regular grids.
//!
//! ## Available Algorithms
//!
//! - **invdist**, **invdistnn**: inverse distance to a power
//! - **average**: moving average
//! - **nearest**: nearest neighbour
//! - **minimum**, **maximum**, **range**, **count**, **average_distance**,
//!   **average_distance_pts**: data metrics
//! - **linear**: barycentric interpolation over a Delaunay triangulation

pub mod interpolation;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::interpolation::{
        DataMetric, GridAlgorithm, GridConfig, GridContext, InverseDistanceNearestParams,
        InverseDistanceParams, LinearParams, MetricParams, MovingAverageParams, NearestParams,
        Ownership, PointSet, SamplePoint,
    };
    pub use gridder_core::prelude::*;
    pub use gridder_parallel::{GridStatus, ThreadCount};
}
