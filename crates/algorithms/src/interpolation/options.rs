//! Algorithm selection and per-algorithm parameters

use std::fmt;
use std::str::FromStr;

use gridder_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// Parameters for inverse distance to a power
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InverseDistanceParams {
    /// Weighting power (default: 2.0)
    pub power: f64,
    /// Added to the distance before weighting
    pub smoothing: f64,
    /// First semi-axis of the search ellipse, 0 for unbounded
    pub radius1: f64,
    /// Second semi-axis of the search ellipse, 0 for unbounded
    pub radius2: f64,
    /// Counter-clockwise rotation of the ellipse, in degrees
    pub angle: f64,
    /// Stop after this many qualifying samples, 0 for no limit
    pub max_points: usize,
    /// Fewer qualifying samples than this produce `nodata`
    pub min_points: usize,
    pub nodata: f64,
}

impl Default for InverseDistanceParams {
    fn default() -> Self {
        Self {
            power: 2.0,
            smoothing: 0.0,
            radius1: 0.0,
            radius2: 0.0,
            angle: 0.0,
            max_points: 0,
            min_points: 0,
            nodata: 0.0,
        }
    }
}

/// Parameters for inverse distance to a power over the nearest samples
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InverseDistanceNearestParams {
    pub power: f64,
    pub smoothing: f64,
    /// Radius of the search circle, must be positive
    pub radius: f64,
    /// Number of closest samples used, 0 for all within `radius`
    pub max_points: usize,
    pub min_points: usize,
    pub nodata: f64,
}

impl Default for InverseDistanceNearestParams {
    fn default() -> Self {
        Self {
            power: 2.0,
            smoothing: 0.0,
            radius: 1.0,
            max_points: 12,
            min_points: 0,
            nodata: 0.0,
        }
    }
}

/// Parameters for the moving average
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MovingAverageParams {
    pub radius1: f64,
    pub radius2: f64,
    pub angle: f64,
    pub min_points: usize,
    pub nodata: f64,
}

/// Parameters for nearest neighbour
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NearestParams {
    /// First semi-axis, 0 to always find the closest sample
    pub radius1: f64,
    pub radius2: f64,
    pub angle: f64,
    pub nodata: f64,
}

/// Parameters shared by the data metrics
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricParams {
    pub radius1: f64,
    pub radius2: f64,
    pub angle: f64,
    pub min_points: usize,
    pub nodata: f64,
}

/// Parameters for linear interpolation over a triangulation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinearParams {
    /// Nodes outside the triangulation fall back to the nearest sample
    /// within this radius. Negative means no limit, 0 disables the fallback.
    pub radius: f64,
    pub nodata: f64,
}

impl Default for LinearParams {
    fn default() -> Self {
        Self {
            radius: -1.0,
            nodata: 0.0,
        }
    }
}

/// Statistic computed over the samples inside the search ellipse
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataMetric {
    Minimum,
    Maximum,
    /// Maximum minus minimum
    Range,
    /// Number of samples
    Count,
    /// Mean distance from the node to the samples
    AverageDistance,
    /// Mean distance between every pair of samples
    AverageDistancePts,
}

impl DataMetric {
    pub const ALL: [DataMetric; 6] = [
        DataMetric::Minimum,
        DataMetric::Maximum,
        DataMetric::Range,
        DataMetric::Count,
        DataMetric::AverageDistance,
        DataMetric::AverageDistancePts,
    ];

    pub fn name(self) -> &'static str {
        match self {
            DataMetric::Minimum => "minimum",
            DataMetric::Maximum => "maximum",
            DataMetric::Range => "range",
            DataMetric::Count => "count",
            DataMetric::AverageDistance => "average_distance",
            DataMetric::AverageDistancePts => "average_distance_pts",
        }
    }
}

/// Interpolation algorithm with its parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "algorithm", rename_all = "snake_case")]
pub enum GridAlgorithm {
    InverseDistance(InverseDistanceParams),
    InverseDistanceNearest(InverseDistanceNearestParams),
    MovingAverage(MovingAverageParams),
    Nearest(NearestParams),
    Metric {
        metric: DataMetric,
        #[serde(flatten)]
        params: MetricParams,
    },
    Linear(LinearParams),
}

impl Default for GridAlgorithm {
    fn default() -> Self {
        GridAlgorithm::InverseDistance(InverseDistanceParams::default())
    }
}

/// Canonical names accepted by [`GridAlgorithm::from_name`]
pub const ALGORITHM_NAMES: [&str; 11] = [
    "invdist",
    "invdistnn",
    "average",
    "nearest",
    "minimum",
    "maximum",
    "range",
    "count",
    "average_distance",
    "average_distance_pts",
    "linear",
];

impl GridAlgorithm {
    /// The algorithm called `name`, with default parameters.
    pub fn from_name(name: &str) -> Result<Self> {
        let metric = |metric| GridAlgorithm::Metric {
            metric,
            params: MetricParams::default(),
        };
        Ok(match name.trim().to_ascii_lowercase().as_str() {
            "invdist" => GridAlgorithm::InverseDistance(Default::default()),
            "invdistnn" => GridAlgorithm::InverseDistanceNearest(Default::default()),
            "average" => GridAlgorithm::MovingAverage(Default::default()),
            "nearest" => GridAlgorithm::Nearest(Default::default()),
            "linear" => GridAlgorithm::Linear(Default::default()),
            other => match DataMetric::ALL.iter().find(|m| m.name() == other) {
                Some(&m) => metric(m),
                None => {
                    return Err(Error::invalid(
                        "algorithm",
                        name,
                        format!("expected one of {}", ALGORITHM_NAMES.join(", ")),
                    ))
                }
            },
        })
    }

    /// Canonical name of the algorithm
    pub fn name(&self) -> &'static str {
        match self {
            GridAlgorithm::InverseDistance(_) => "invdist",
            GridAlgorithm::InverseDistanceNearest(_) => "invdistnn",
            GridAlgorithm::MovingAverage(_) => "average",
            GridAlgorithm::Nearest(_) => "nearest",
            GridAlgorithm::Metric { metric, .. } => metric.name(),
            GridAlgorithm::Linear(_) => "linear",
        }
    }

    /// Value written to nodes without a usable neighbourhood
    pub fn nodata(&self) -> f64 {
        match self {
            GridAlgorithm::InverseDistance(p) => p.nodata,
            GridAlgorithm::InverseDistanceNearest(p) => p.nodata,
            GridAlgorithm::MovingAverage(p) => p.nodata,
            GridAlgorithm::Nearest(p) => p.nodata,
            GridAlgorithm::Metric { params, .. } => params.nodata,
            GridAlgorithm::Linear(p) => p.nodata,
        }
    }

    /// Reject parameter combinations no node could be evaluated with.
    pub fn validate(&self) -> Result<()> {
        match self {
            GridAlgorithm::InverseDistance(p) => {
                non_negative("power", p.power)?;
                non_negative("smoothing", p.smoothing)?;
                ellipse(p.radius1, p.radius2, p.angle)?;
            }
            GridAlgorithm::InverseDistanceNearest(p) => {
                non_negative("power", p.power)?;
                non_negative("smoothing", p.smoothing)?;
                if !(p.radius.is_finite() && p.radius > 0.0) {
                    return Err(Error::invalid("radius", p.radius, "must be positive"));
                }
            }
            GridAlgorithm::MovingAverage(p) => ellipse(p.radius1, p.radius2, p.angle)?,
            GridAlgorithm::Nearest(p) => ellipse(p.radius1, p.radius2, p.angle)?,
            GridAlgorithm::Metric { params, .. } => {
                ellipse(params.radius1, params.radius2, params.angle)?
            }
            GridAlgorithm::Linear(p) => {
                if !p.radius.is_finite() {
                    return Err(Error::invalid("radius", p.radius, "must be finite"));
                }
            }
        }
        Ok(())
    }
}

fn non_negative(name: &'static str, value: f64) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(Error::invalid(name, value, "must be finite and non-negative"))
    }
}

fn ellipse(radius1: f64, radius2: f64, angle: f64) -> Result<()> {
    non_negative("radius1", radius1)?;
    non_negative("radius2", radius2)?;
    if !angle.is_finite() {
        return Err(Error::invalid("angle", angle, "must be finite"));
    }
    Ok(())
}

impl FromStr for GridAlgorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        GridAlgorithm::from_name(s)
    }
}

impl fmt::Display for GridAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
