//! Inverse Distance Weighting (IDW) interpolation
//!
//! Estimates the value at a node as a weighted average of the samples
//! inside the search ellipse, with weights inversely proportional to the
//! smoothed distance raised to a power:
//!
//! ```text
//! z(x,y) = Σ(wi * zi) / Σ(wi)
//! where wi = 1 / (di² + s²)^(p/2)
//! ```
//!
//! A sample closer to the node than `sqrt(COINCIDENT_R2)` (after smoothing)
//! is returned as is.
//!
//! Reference:
//! Shepard, D. (1968). A two-dimensional interpolation function for
//! irregularly-spaced data. ACM National Conference.

use std::ops::ControlFlow;

use super::options::{InverseDistanceNearestParams, InverseDistanceParams};
use super::search::{SampleView, Scratch, SearchEllipse, COINCIDENT_R2};
use super::simd::PackedPoints;

#[inline]
fn weight(r2: f64, half_power: f64) -> f64 {
    if half_power == 1.0 {
        1.0 / r2
    } else {
        1.0 / r2.powf(half_power)
    }
}

/// Inverse distance to a power over a search ellipse
#[derive(Debug, Clone)]
pub(crate) struct InverseDistance {
    params: InverseDistanceParams,
    ellipse: SearchEllipse,
    half_power: f64,
    smoothing_sq: f64,
}

impl InverseDistance {
    pub fn new(params: &InverseDistanceParams) -> Self {
        Self {
            params: *params,
            ellipse: SearchEllipse::new(params.radius1, params.radius2, params.angle),
            half_power: params.power / 2.0,
            smoothing_sq: params.smoothing * params.smoothing,
        }
    }

    /// Every sample takes part, so the ellipse test can be skipped
    pub fn is_no_search(&self) -> bool {
        self.ellipse.is_unbounded() && self.params.max_points == 0
    }

    /// Power 2 without smoothing over all samples, the case the packed
    /// single precision kernel handles
    pub fn is_packable(&self) -> bool {
        self.is_no_search() && self.params.power == 2.0 && self.params.smoothing == 0.0
    }

    pub fn wants_index(&self) -> bool {
        self.ellipse.index_radius().is_some()
    }

    pub fn value(
        &self,
        view: &SampleView<'_>,
        packed: Option<&PackedPoints>,
        scratch: &mut Scratch,
        px: f64,
        py: f64,
    ) -> f64 {
        if self.is_no_search() {
            if view.len() < self.params.min_points {
                return self.params.nodata;
            }
            if let Some((nom, den)) = packed.and_then(|p| p.inverse_distance_sq(view, px, py)) {
                return self.ratio(nom, den);
            }
            return self.value_no_search(view, px, py);
        }

        let mut nom = 0.0;
        let mut den = 0.0;
        let mut n = 0usize;
        let mut coincident = None;
        view.for_each_candidate(
            px,
            py,
            self.ellipse.index_radius(),
            &mut scratch.candidates,
            |i| {
                let (rx, ry) = self.ellipse.offset(view.x[i], view.y[i], px, py);
                if !self.ellipse.contains(rx, ry) {
                    return ControlFlow::Continue(());
                }
                let r2 = rx * rx + ry * ry + self.smoothing_sq;
                if r2 < COINCIDENT_R2 {
                    coincident = Some(view.z[i]);
                    return ControlFlow::Break(());
                }
                let w = weight(r2, self.half_power);
                nom += w * view.z[i];
                den += w;
                n += 1;
                if self.params.max_points > 0 && n >= self.params.max_points {
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(())
                }
            },
        );

        if let Some(z) = coincident {
            return z;
        }
        if n < self.params.min_points {
            return self.params.nodata;
        }
        self.ratio(nom, den)
    }

    fn value_no_search(&self, view: &SampleView<'_>, px: f64, py: f64) -> f64 {
        let mut nom = 0.0;
        let mut den = 0.0;
        for i in 0..view.len() {
            let rx = view.x[i] - px;
            let ry = view.y[i] - py;
            let r2 = rx * rx + ry * ry + self.smoothing_sq;
            if r2 < COINCIDENT_R2 {
                return view.z[i];
            }
            let w = weight(r2, self.half_power);
            nom += w * view.z[i];
            den += w;
        }
        self.ratio(nom, den)
    }

    fn ratio(&self, nom: f64, den: f64) -> f64 {
        if den == 0.0 {
            self.params.nodata
        } else {
            nom / den
        }
    }
}

/// Inverse distance to a power over the closest samples within a circle
#[derive(Debug, Clone)]
pub(crate) struct InverseDistanceNearest {
    params: InverseDistanceNearestParams,
    radius_sq: f64,
    half_power: f64,
    smoothing_sq: f64,
}

impl InverseDistanceNearest {
    pub fn new(params: &InverseDistanceNearestParams) -> Self {
        Self {
            params: *params,
            radius_sq: params.radius * params.radius,
            half_power: params.power / 2.0,
            smoothing_sq: params.smoothing * params.smoothing,
        }
    }

    pub fn value(&self, view: &SampleView<'_>, scratch: &mut Scratch, px: f64, py: f64) -> f64 {
        let Scratch {
            candidates, ranked, ..
        } = scratch;
        ranked.clear();
        view.for_each_candidate(px, py, Some(self.params.radius), candidates, |i| {
            let rx = view.x[i] - px;
            let ry = view.y[i] - py;
            let r2 = rx * rx + ry * ry;
            if r2 <= self.radius_sq {
                ranked.push((r2 + self.smoothing_sq, i as u32));
            }
            ControlFlow::Continue(())
        });

        // Equal distances keep array order whichever way candidates arrived.
        ranked.sort_unstable_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        if self.params.max_points > 0 {
            ranked.truncate(self.params.max_points);
        }

        match ranked.first() {
            Some(&(r2, i)) if r2 < COINCIDENT_R2 => return view.z[i as usize],
            _ => {}
        }
        if ranked.is_empty() || ranked.len() < self.params.min_points {
            return self.params.nodata;
        }

        let mut nom = 0.0;
        let mut den = 0.0;
        for &(r2, i) in ranked.iter() {
            let w = weight(r2, self.half_power);
            nom += w * view.z[i as usize];
            den += w;
        }
        if den == 0.0 {
            self.params.nodata
        } else {
            nom / den
        }
    }
}
