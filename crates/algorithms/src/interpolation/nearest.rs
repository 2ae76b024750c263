//! Nearest Neighbor interpolation
//!
//! Assigns each node the value of the closest sample inside the search
//! ellipse, producing a Voronoi-like tessellation. Equally distant samples
//! resolve to the lowest array index, so the result does not depend on
//! whether candidates come from the index or a linear scan.
//!
//! With `radius1 == 0` the closest sample is always found. When an index is
//! available, the search starts from a square of half side
//! `sqrt(area / n)` and doubles it until the inscribed circle holds a
//! sample.

use std::ops::ControlFlow;

use super::options::NearestParams;
use super::search::{SampleView, Scratch, SearchEllipse};

/// Doublings of the search radius before giving up on the index.
const MAX_GROWTH_STEPS: usize = 64;

#[derive(Debug, Clone)]
pub(crate) struct Nearest {
    params: NearestParams,
    ellipse: SearchEllipse,
}

/// Closest sample so far, ordered by distance then index
#[derive(Debug, Clone, Copy)]
struct Best {
    r2: f64,
    index: usize,
}

#[inline]
fn closer(candidate: Best, best: Option<Best>) -> bool {
    match best {
        None => true,
        Some(b) => candidate.r2 < b.r2 || (candidate.r2 == b.r2 && candidate.index < b.index),
    }
}

impl Nearest {
    pub fn new(params: &NearestParams) -> Self {
        Self {
            params: *params,
            ellipse: SearchEllipse::new(params.radius1, params.radius2, params.angle),
        }
    }

    /// Nearest sample within `radius`, or anywhere for a negative radius.
    pub fn with_radius(radius: f64, nodata: f64) -> Self {
        let r = radius.max(0.0);
        Self::new(&NearestParams {
            radius1: r,
            radius2: r,
            angle: 0.0,
            nodata,
        })
    }

    fn is_unbounded(&self) -> bool {
        self.ellipse.radius1_sq() == 0.0
    }

    pub fn wants_index(&self) -> bool {
        self.ellipse.index_radius().is_some() || self.ellipse.is_unbounded()
    }

    /// Value of the closest sample. `initial_radius` seeds the growing
    /// search of the unbounded case.
    pub fn value(
        &self,
        view: &SampleView<'_>,
        initial_radius: f64,
        scratch: &mut Scratch,
        px: f64,
        py: f64,
    ) -> f64 {
        let best = if self.is_unbounded() {
            match view.index {
                Some(_) if initial_radius > 0.0 => self
                    .grow(view, initial_radius, scratch, px, py)
                    .or_else(|| self.scan(view, None, scratch, px, py)),
                _ => self.scan(view, None, scratch, px, py),
            }
        } else {
            self.scan(view, self.ellipse.index_radius(), scratch, px, py)
        };
        best.map_or(self.params.nodata, |b| view.z[b.index])
    }

    fn scan(
        &self,
        view: &SampleView<'_>,
        radius: Option<f64>,
        scratch: &mut Scratch,
        px: f64,
        py: f64,
    ) -> Option<Best> {
        let unbounded = self.is_unbounded();
        let mut best = None;
        view.for_each_candidate(px, py, radius, &mut scratch.candidates, |i| {
            let (rx, ry) = self.ellipse.offset(view.x[i], view.y[i], px, py);
            if unbounded || self.ellipse.contains(rx, ry) {
                let candidate = Best {
                    r2: rx * rx + ry * ry,
                    index: i,
                };
                if closer(candidate, best) {
                    best = Some(candidate);
                }
            }
            ControlFlow::Continue(())
        });
        best
    }

    fn grow(
        &self,
        view: &SampleView<'_>,
        initial_radius: f64,
        scratch: &mut Scratch,
        px: f64,
        py: f64,
    ) -> Option<Best> {
        let mut radius = initial_radius;
        for _ in 0..MAX_GROWTH_STEPS {
            let r_sq = radius * radius;
            let mut best = None;
            view.for_each_candidate(px, py, Some(radius), &mut scratch.candidates, |i| {
                let rx = view.x[i] - px;
                let ry = view.y[i] - py;
                let candidate = Best {
                    r2: rx * rx + ry * ry,
                    index: i,
                };
                // Anything outside the inscribed circle may have a closer
                // sample just outside the square.
                if candidate.r2 <= r_sq && closer(candidate, best) {
                    best = Some(candidate);
                }
                ControlFlow::Continue(())
            });
            if best.is_some() {
                return best;
            }
            radius *= 2.0;
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpolation::quadtree::{QuadTree, Rect};

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

    #[test]
    fn test_nearest_unbounded() {
        let nn = Nearest::new(&NearestParams::default());
        assert_eq!(nn.value(&view(), 0.0, &mut Scratch::default(), 1.0, 1.0), 10.0);
        assert_eq!(nn.value(&view(), 0.0, &mut Scratch::default(), 9.0, 2.0), 20.0);
    }

    #[test]
    fn test_nearest_radius() {
        let nn = Nearest::with_radius(2.0, -9.0);
        assert_eq!(nn.value(&view(), 0.0, &mut Scratch::default(), 1.0, 1.0), 10.0);
        assert_eq!(nn.value(&view(), 0.0, &mut Scratch::default(), 5.0, 5.0), -9.0);
    }

    #[test]
    fn test_tie_goes_to_lowest_index() {
        // (5, 0) is equally far from the first two samples.
        let nn = Nearest::new(&NearestParams::default());
        assert_eq!(nn.value(&view(), 0.0, &mut Scratch::default(), 5.0, 0.0), 10.0);
        // (5, 5) is equally far from all three.
        assert_eq!(nn.value(&view(), 0.0, &mut Scratch::default(), 5.0, 5.0), 10.0);
    }

    #[test]
    fn test_growing_search_matches_scan() {
        let n = 300;
        let x: Vec<f64> = (0..n).map(|i| ((i * 7919) % 1000) as f64 / 10.0).collect();
        let y: Vec<f64> = (0..n).map(|i| ((i * 104_729) % 1000) as f64 / 10.0).collect();
        let z: Vec<f64> = (0..n).map(|i| i as f64).collect();
        let bounds = Rect::bounding(&x, &y).unwrap();
        let mut tree = QuadTree::new(bounds);
        for i in 0..n {
            tree.insert_point(i as u32, x[i], y[i]);
        }
        let brute = SampleView { x: &x, y: &y, z: &z, index: None };
        let indexed = SampleView { index: Some(&tree), ..brute };
        let initial = (bounds.area() / n as f64).sqrt();

        let nn = Nearest::new(&NearestParams::default());
        assert!(nn.wants_index());
        let mut scratch = Scratch::default();
        for k in 0..50 {
            let px = (k * 13 % 50) as f64 * 2.3 - 10.0;
            let py = (k * 29 % 50) as f64 * 2.1 - 5.0;
            assert_eq!(
                nn.value(&indexed, initial, &mut scratch, px, py),
                nn.value(&brute, initial, &mut scratch, px, py),
                "node ({px}, {py})"
            );
        }
    }

    #[test]
    fn test_far_node_still_finds_a_sample() {
        let mut tree = QuadTree::new(Rect::new(0.0, 0.0, 10.0, 10.0));
        for i in 0..3 {
            tree.insert_point(i as u32, X[i], Y[i]);
        }
        let indexed = SampleView { index: Some(&tree), ..view() };
        let nn = Nearest::new(&NearestParams::default());
        let v = nn.value(&indexed, 1.0, &mut Scratch::default(), 1e6, 1e6);
        assert_eq!(v, 20.0);
    }
}
