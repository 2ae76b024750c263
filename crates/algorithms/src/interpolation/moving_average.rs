//! Moving average over the search ellipse

use std::ops::ControlFlow;

use super::options::MovingAverageParams;
use super::search::{SampleView, Scratch, SearchEllipse};

#[derive(Debug, Clone)]
pub(crate) struct MovingAverage {
    params: MovingAverageParams,
    ellipse: SearchEllipse,
}

impl MovingAverage {
    pub fn new(params: &MovingAverageParams) -> Self {
        Self {
            params: *params,
            ellipse: SearchEllipse::new(params.radius1, params.radius2, params.angle),
        }
    }

    pub fn wants_index(&self) -> bool {
        self.ellipse.index_radius().is_some()
    }

    /// Mean of the samples inside the ellipse
    pub fn value(&self, view: &SampleView<'_>, scratch: &mut Scratch, px: f64, py: f64) -> f64 {
        let mut sum = 0.0;
        let mut n = 0usize;
        view.for_each_candidate(
            px,
            py,
            self.ellipse.index_radius(),
            &mut scratch.candidates,
            |i| {
                let (rx, ry) = self.ellipse.offset(view.x[i], view.y[i], px, py);
                if self.ellipse.contains(rx, ry) {
                    sum += view.z[i];
                    n += 1;
                }
                ControlFlow::Continue(())
            },
        );

        if n == 0 || n < self.params.min_points {
            self.params.nodata
        } else {
            sum / n as f64
        }
    }
}
