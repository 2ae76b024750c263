//! Packed single precision kernel for global inverse distance squared
//!
//! Coordinates are stored relative to an origin (the lower left corner of
//! the samples' bounding box) so that single precision keeps as many
//! significant digits as the extent allows. Only whole lanes are packed;
//! the remaining samples are weighted in double precision.
//!
//! Results may differ from the double precision path in the last bits.
//! Nodes that might coincide with a sample are left to the exact path.

use std::fmt;

use wide::{f32x4, f32x8};

use super::search::{SampleView, COINCIDENT_R2};

/// Vector instruction tier the packed kernel runs with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimdTier {
    /// 8 lanes
    Avx,
    /// 4 lanes
    Sse,
    /// No packed kernel
    Scalar,
}

impl SimdTier {
    /// Best tier the CPU supports among those enabled.
    pub fn detect(use_avx: bool, use_sse: bool) -> Self {
        #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
        {
            if use_avx && is_x86_feature_detected!("avx") {
                return SimdTier::Avx;
            }
            if use_sse && is_x86_feature_detected!("sse") {
                return SimdTier::Sse;
            }
            SimdTier::Scalar
        }
        #[cfg(not(any(target_arch = "x86", target_arch = "x86_64")))]
        {
            let _ = (use_avx, use_sse);
            SimdTier::Scalar
        }
    }

    /// Lane count, 1 for scalar
    pub fn lanes(self) -> usize {
        match self {
            SimdTier::Avx => 8,
            SimdTier::Sse => 4,
            SimdTier::Scalar => 1,
        }
    }
}

impl fmt::Display for SimdTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SimdTier::Avx => "avx",
            SimdTier::Sse => "sse",
            SimdTier::Scalar => "scalar",
        })
    }
}

enum Lanes {
    Eight {
        x: Vec<f32x8>,
        y: Vec<f32x8>,
        z: Vec<f32x8>,
    },
    Four {
        x: Vec<f32x4>,
        y: Vec<f32x4>,
        z: Vec<f32x4>,
    },
}

/// Single precision copies of the samples, grouped by lane count
pub struct PackedPoints {
    lanes: Lanes,
    tier: SimdTier,
    origin_x: f64,
    origin_y: f64,
    /// Samples covered by whole lanes
    packed_len: usize,
    /// Packed squared distances below this may hide a coincident sample
    suspect_r2: f32,
}

macro_rules! pack {
    ($simd:ty, $n:expr, $values:expr, $origin:expr, $chunks:expr) => {{
        let values: &[f64] = $values;
        let origin: f64 = $origin;
        values
            .chunks_exact($n)
            .take($chunks)
            .map(|chunk| {
                let mut lane = [0.0f32; $n];
                for (l, &v) in lane.iter_mut().zip(chunk) {
                    *l = (v - origin) as f32;
                }
                <$simd>::from(lane)
            })
            .collect::<Vec<$simd>>()
    }};
}

macro_rules! packed_sums {
    ($name:ident, $simd:ty) => {
        /// Returns `(Σ z/r², Σ 1/r², min r²)` over the packed samples.
        fn $name(x: &[$simd], y: &[$simd], z: &[$simd], px: f32, py: f32) -> (f64, f64, f32) {
            let vpx = <$simd>::splat(px);
            let vpy = <$simd>::splat(py);
            let one = <$simd>::splat(1.0);
            let mut nom = <$simd>::splat(0.0);
            let mut den = <$simd>::splat(0.0);
            let mut min_r2 = <$simd>::splat(f32::MAX);
            for ((&vx, &vy), &vz) in x.iter().zip(y).zip(z) {
                let dx = vx - vpx;
                let dy = vy - vpy;
                let r2 = dx * dx + dy * dy;
                let inv = one / r2;
                nom = nom + inv * vz;
                den = den + inv;
                min_r2 = min_r2.min(r2);
            }
            let nom: f64 = nom.to_array().iter().map(|&v| v as f64).sum();
            let den: f64 = den.to_array().iter().map(|&v| v as f64).sum();
            let min_r2 = min_r2.to_array().iter().copied().fold(f32::MAX, f32::min);
            (nom, den, min_r2)
        }
    };
}

packed_sums!(sums_x8, f32x8);
packed_sums!(sums_x4, f32x4);

impl PackedPoints {
    /// Pack the samples for `tier`, `None` for the scalar tier or when
    /// there are too few samples to fill one lane group.
    pub fn new(tier: SimdTier, x: &[f64], y: &[f64], z: &[f64], origin: (f64, f64)) -> Option<Self> {
        let n_lanes = tier.lanes();
        if tier == SimdTier::Scalar || x.len() < n_lanes {
            return None;
        }
        let chunks = x.len() / n_lanes;
        let (ox, oy) = origin;

        let lanes = match tier {
            SimdTier::Avx => Lanes::Eight {
                x: pack!(f32x8, 8, x, ox, chunks),
                y: pack!(f32x8, 8, y, oy, chunks),
                z: pack!(f32x8, 8, z, 0.0, chunks),
            },
            _ => Lanes::Four {
                x: pack!(f32x4, 4, x, ox, chunks),
                y: pack!(f32x4, 4, y, oy, chunks),
                z: pack!(f32x4, 4, z, 0.0, chunks),
            },
        };

        let scale = x
            .iter()
            .map(|v| (v - ox).abs())
            .chain(y.iter().map(|v| (v - oy).abs()))
            .fold(0.0f64, f64::max);
        let tolerance = scale * 4.0 * f32::EPSILON as f64;
        let suspect_r2 = (tolerance * tolerance).max(COINCIDENT_R2) as f32;

        Some(Self {
            lanes,
            tier,
            origin_x: ox,
            origin_y: oy,
            packed_len: chunks * n_lanes,
            suspect_r2,
        })
    }

    pub fn tier(&self) -> SimdTier {
        self.tier
    }

    /// Number of samples held in packed form
    pub fn packed_len(&self) -> usize {
        self.packed_len
    }

    /// `(Σ z/r², Σ 1/r²)` over every sample of `view` for the node
    /// `(px, py)`, or `None` when a sample may coincide with the node.
    pub fn inverse_distance_sq(&self, view: &SampleView<'_>, px: f64, py: f64) -> Option<(f64, f64)> {
        let rpx = (px - self.origin_x) as f32;
        let rpy = (py - self.origin_y) as f32;
        let (mut nom, mut den, min_r2) = match &self.lanes {
            Lanes::Eight { x, y, z } => sums_x8(x, y, z, rpx, rpy),
            Lanes::Four { x, y, z } => sums_x4(x, y, z, rpx, rpy),
        };
        if min_r2 < self.suspect_r2 {
            return None;
        }

        for i in self.packed_len..view.len() {
            let rx = view.x[i] - px;
            let ry = view.y[i] - py;
            let r2 = rx * rx + ry * ry;
            if r2 < COINCIDENT_R2 {
                return None;
            }
            nom += view.z[i] / r2;
            den += 1.0 / r2;
        }
        Some((nom, den))
    }
}

impl fmt::Debug for PackedPoints {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PackedPoints")
            .field("tier", &self.tier)
            .field("packed_len", &self.packed_len)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn samples(n: usize) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
        let x = (0..n).map(|i| 1000.0 + (i * 37 % 101) as f64).collect();
        let y = (0..n).map(|i| 2000.0 + (i * 53 % 97) as f64).collect();
        let z = (0..n).map(|i| (i % 17) as f64).collect();
        (x, y, z)
    }

    fn exact(x: &[f64], y: &[f64], z: &[f64], px: f64, py: f64) -> f64 {
        let mut nom = 0.0;
        let mut den = 0.0;
        for i in 0..x.len() {
            let r2 = (x[i] - px).powi(2) + (y[i] - py).powi(2);
            nom += z[i] / r2;
            den += 1.0 / r2;
        }
        nom / den
    }

    #[test]
    fn test_packed_matches_exact() {
        let (x, y, z) = samples(45);
        let view = SampleView { x: &x, y: &y, z: &z, index: None };
        for tier in [SimdTier::Avx, SimdTier::Sse] {
            let packed = PackedPoints::new(tier, &x, &y, &z, (1000.0, 2000.0)).unwrap();
            assert_eq!(packed.packed_len(), 45 / tier.lanes() * tier.lanes());
            for (px, py) in [(1010.25, 2011.5), (1099.9, 2000.1), (950.0, 2150.0)] {
                let (nom, den) = packed.inverse_distance_sq(&view, px, py).unwrap();
                assert_relative_eq!(nom / den, exact(&x, &y, &z, px, py), max_relative = 1e-3);
            }
        }
    }

    #[test]
    fn test_coincident_node_is_left_to_exact_path() {
        let (x, y, z) = samples(16);
        let view = SampleView { x: &x, y: &y, z: &z, index: None };
        let packed = PackedPoints::new(SimdTier::Sse, &x, &y, &z, (1000.0, 2000.0)).unwrap();
        assert!(packed.inverse_distance_sq(&view, x[3], y[3]).is_none());
    }

    #[test]
    fn test_scalar_tier_and_tiny_sets_are_not_packed() {
        let (x, y, z) = samples(3);
        assert!(PackedPoints::new(SimdTier::Scalar, &x, &y, &z, (0.0, 0.0)).is_none());
        assert!(PackedPoints::new(SimdTier::Sse, &x, &y, &z, (0.0, 0.0)).is_none());
    }

    #[test]
    fn test_detect_respects_switches() {
        assert_eq!(SimdTier::detect(false, false), SimdTier::Scalar);
        assert_ne!(SimdTier::detect(false, true), SimdTier::Avx);
    }
}
