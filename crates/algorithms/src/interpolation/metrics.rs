//! Data metrics over the samples inside the search ellipse
//!
//! Every metric writes `nodata` when fewer than `min_points` samples
//! qualify. `count` is the exception for an empty ellipse with
//! `min_points == 0`, where it writes 0. The pairwise average distance is
//! quadratic in the number of qualifying samples.

use std::ops::ControlFlow;

use super::options::{DataMetric, MetricParams};
use super::search::{SampleView, Scratch, SearchEllipse};

#[derive(Debug, Clone)]
pub(crate) struct Metrics {
    metric: DataMetric,
    params: MetricParams,
    ellipse: SearchEllipse,
}

impl Metrics {
    pub fn new(metric: DataMetric, params: &MetricParams) -> Self {
        Self {
            metric,
            params: *params,
            ellipse: SearchEllipse::new(params.radius1, params.radius2, params.angle),
        }
    }

    pub fn wants_index(&self) -> bool {
        self.ellipse.index_radius().is_some()
    }

    pub fn value(&self, view: &SampleView<'_>, scratch: &mut Scratch, px: f64, py: f64) -> f64 {
        let Scratch {
            candidates, coords, ..
        } = scratch;
        coords.clear();

        let mut n = 0usize;
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        let mut distance_sum = 0.0;
        let pairs = self.metric == DataMetric::AverageDistancePts;

        view.for_each_candidate(px, py, self.ellipse.index_radius(), candidates, |i| {
            let (rx, ry) = self.ellipse.offset(view.x[i], view.y[i], px, py);
            if !self.ellipse.contains(rx, ry) {
                return ControlFlow::Continue(());
            }
            n += 1;
            let z = view.z[i];
            min = min.min(z);
            max = max.max(z);
            distance_sum += (rx * rx + ry * ry).sqrt();
            if pairs {
                coords.push((view.x[i], view.y[i]));
            }
            ControlFlow::Continue(())
        });

        if n < self.params.min_points {
            return self.params.nodata;
        }
        match self.metric {
            DataMetric::Count => n as f64,
            _ if n == 0 => self.params.nodata,
            DataMetric::Minimum => min,
            DataMetric::Maximum => max,
            DataMetric::Range => max - min,
            DataMetric::AverageDistance => distance_sum / n as f64,
            DataMetric::AverageDistancePts => average_pairwise(coords).unwrap_or(self.params.nodata),
        }
    }
}

/// Mean distance over all unordered pairs, `None` with fewer than two points.
fn average_pairwise(coords: &[(f64, f64)]) -> Option<f64> {
    let k = coords.len();
    if k < 2 {
        return None;
    }
    let mut sum = 0.0;
    for (i, &(xi, yi)) in coords.iter().enumerate() {
        for &(xj, yj) in &coords[i + 1..] {
            sum += ((xi - xj).powi(2) + (yi - yj).powi(2)).sqrt();
        }
    }
    Some(sum / (k * (k - 1) / 2) as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const X: [f64; 3] = [0.0, 10.0, 0.0];
    const Y: [f64; 3] = [0.0, 0.0, 10.0];
    const Z: [f64; 3] = [10.0, 20.0, 30.0];

    fn view() -> SampleView<'static> {
        SampleView {
            x: &X,
            y: &Y,
            z: &Z,
            index: None,
        }
    }

    fn eval(metric: DataMetric, params: MetricParams, px: f64, py: f64) -> f64 {
        Metrics::new(metric, &params).value(&view(), &mut Scratch::default(), px, py)
    }

    fn everything() -> MetricParams {
        MetricParams {
            radius1: 100.0,
            radius2: 100.0,
            nodata: -1.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_value_metrics() {
        assert_eq!(eval(DataMetric::Minimum, everything(), 1.0, 1.0), 10.0);
        assert_eq!(eval(DataMetric::Maximum, everything(), 1.0, 1.0), 30.0);
        assert_eq!(eval(DataMetric::Range, everything(), 1.0, 1.0), 20.0);
        assert_eq!(eval(DataMetric::Count, everything(), 1.0, 1.0), 3.0);
    }

    #[test]
    fn test_average_distance() {
        let d = eval(DataMetric::AverageDistance, everything(), 0.0, 0.0);
        assert_relative_eq!(d, 20.0 / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_average_distance_between_points() {
        let d = eval(DataMetric::AverageDistancePts, everything(), 0.0, 0.0);
        assert_relative_eq!(d, (10.0 + 10.0 + 200f64.sqrt()) / 3.0, epsilon = 1e-12);

        // A single qualifying point has no pairs.
        let params = MetricParams {
            radius1: 1.0,
            radius2: 1.0,
            nodata: -1.0,
            ..Default::default()
        };
        assert_eq!(eval(DataMetric::AverageDistancePts, params, 0.0, 0.0), -1.0);
    }

    #[test]
    fn test_min_points_gives_nodata() {
        let params = MetricParams {
            radius1: 11.0,
            radius2: 11.0,
            min_points: 3,
            nodata: -1.0,
            ..Default::default()
        };
        // Two samples within reach of (10, 10).
        for metric in DataMetric::ALL {
            assert_eq!(eval(metric, params, 10.0, 10.0), -1.0, "{metric:?}");
        }
    }

    #[test]
    fn test_empty_ellipse() {
        let params = MetricParams {
            radius1: 1.0,
            radius2: 1.0,
            nodata: -1.0,
            ..Default::default()
        };
        assert_eq!(eval(DataMetric::Count, params, 50.0, 50.0), 0.0);
        assert_eq!(eval(DataMetric::Minimum, params, 50.0, 50.0), -1.0);
        assert_eq!(eval(DataMetric::AverageDistance, params, 50.0, 50.0), -1.0);
    }
}
