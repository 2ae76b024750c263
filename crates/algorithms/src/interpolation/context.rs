//! Reusable gridding context
//!
//! A [`GridContext`] is built once from a point set and an algorithm. It
//! prepares everything the algorithm needs (spatial index, triangulation,
//! packed single precision copies, worker pool) and then evaluates any
//! number of grids. Evaluations only read the context, so one context can
//! serve concurrent evaluations into distinct buffers.

use std::sync::OnceLock;

use gridder_core::{try_alloc, Error, GridExtent, Raster, RasterElement, Result};
use gridder_parallel::{no_progress, run_scanlines, GridStatus, ScanlineSource, ThreadCount, WorkerPool};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::idw::{InverseDistance, InverseDistanceNearest};
use super::metrics::Metrics;
use super::moving_average::MovingAverage;
use super::nearest::Nearest;
use super::options::GridAlgorithm;
use super::points::PointSet;
use super::quadtree::QuadTree;
use super::search::{SampleView, Scratch};
use super::simd::{PackedPoints, SimdTier};
use super::tin::{DelaunayTriangulation, Linear, Triangulation};

/// Default number of points above which a spatial index is built.
pub const DEFAULT_INDEX_THRESHOLD: usize = 100;

/// Construction-time configuration of a [`GridContext`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// Worker threads for grid evaluation
    pub threads: ThreadCount,
    /// A spatial index is only built for more points than this
    pub index_threshold: usize,
    /// Depth bound of the index, 0 for bucket-driven splitting
    pub index_max_depth: usize,
    /// Allow the 8-lane packed kernel
    pub use_avx: bool,
    /// Allow the 4-lane packed kernel
    pub use_sse: bool,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            threads: ThreadCount::AllCpus,
            index_threshold: DEFAULT_INDEX_THRESHOLD,
            index_max_depth: 0,
            use_avx: true,
            use_sse: true,
        }
    }
}

/// Prepared per-node evaluator
#[derive(Debug, Clone)]
enum Kernel {
    InverseDistance(InverseDistance),
    InverseDistanceNearest(InverseDistanceNearest),
    MovingAverage(MovingAverage),
    Nearest(Nearest),
    Metric(Metrics),
    Linear(Linear),
}

impl Kernel {
    fn new(algorithm: &GridAlgorithm) -> Self {
        match algorithm {
            GridAlgorithm::InverseDistance(p) => Kernel::InverseDistance(InverseDistance::new(p)),
            GridAlgorithm::InverseDistanceNearest(p) => {
                Kernel::InverseDistanceNearest(InverseDistanceNearest::new(p))
            }
            GridAlgorithm::MovingAverage(p) => Kernel::MovingAverage(MovingAverage::new(p)),
            GridAlgorithm::Nearest(p) => Kernel::Nearest(Nearest::new(p)),
            GridAlgorithm::Metric { metric, params } => Kernel::Metric(Metrics::new(*metric, params)),
            GridAlgorithm::Linear(p) => Kernel::Linear(Linear::new(p)),
        }
    }

    /// Whether the search geometry lets an index answer the queries.
    fn wants_index(&self) -> bool {
        match self {
            Kernel::InverseDistance(k) => k.wants_index(),
            Kernel::InverseDistanceNearest(_) => true,
            Kernel::MovingAverage(k) => k.wants_index(),
            Kernel::Nearest(k) => k.wants_index(),
            Kernel::Metric(k) => k.wants_index(),
            // Built on demand by the edge check.
            Kernel::Linear(_) => false,
        }
    }
}

/// Points, algorithm and prepared search structures for gridding.
pub struct GridContext<'a> {
    points: PointSet<'a>,
    algorithm: GridAlgorithm,
    kernel: Kernel,
    config: GridConfig,
    index: OnceLock<QuadTree<u32>>,
    triangulation: Option<Box<dyn Triangulation + 'a>>,
    packed: Option<PackedPoints>,
    simd_tier: SimdTier,
    /// Starting half side of the growing nearest neighbour search
    initial_radius: f64,
    pool: WorkerPool,
}

impl<'a> GridContext<'a> {
    /// Prepare a context for `algorithm` over `points`.
    ///
    /// The linear algorithm triangulates the points with
    /// [`DelaunayTriangulation`].
    pub fn new(points: PointSet<'a>, algorithm: GridAlgorithm, config: GridConfig) -> Result<Self> {
        let triangulation: Option<Box<dyn Triangulation + 'a>> = match algorithm {
            GridAlgorithm::Linear(_) => Some(Box::new(DelaunayTriangulation::new(points.x(), points.y()))),
            _ => None,
        };
        Self::build(points, algorithm, config, triangulation)
    }

    /// Prepare a linear context over a caller supplied triangulation of
    /// `points`.
    pub fn with_triangulation<T>(
        points: PointSet<'a>,
        algorithm: GridAlgorithm,
        config: GridConfig,
        triangulation: T,
    ) -> Result<Self>
    where
        T: Triangulation + 'a,
    {
        if !matches!(algorithm, GridAlgorithm::Linear(_)) {
            return Err(Error::invalid(
                "algorithm",
                algorithm.name(),
                "a triangulation is only used by the linear algorithm",
            ));
        }
        let n = points.len();
        for facet in 0..triangulation.facet_count() {
            if let Some(&v) = triangulation.vertices(facet).iter().find(|&&v| v >= n) {
                return Err(Error::invalid("triangulation", v, format!("vertex beyond the {n} points")));
            }
        }
        Self::build(points, algorithm, config, Some(Box::new(triangulation)))
    }

    fn build(
        points: PointSet<'a>,
        algorithm: GridAlgorithm,
        config: GridConfig,
        triangulation: Option<Box<dyn Triangulation + 'a>>,
    ) -> Result<Self> {
        algorithm.validate()?;
        let kernel = Kernel::new(&algorithm);
        let n = points.len();

        let index = OnceLock::new();
        if n > config.index_threshold && kernel.wants_index() {
            let _ = index.set(build_index(&points, config.index_max_depth));
        }

        let simd_tier = SimdTier::detect(config.use_avx, config.use_sse);
        let packed = match &kernel {
            Kernel::InverseDistance(k) if k.is_packable() => {
                let origin = (points.bounds().min_x, points.bounds().min_y);
                PackedPoints::new(simd_tier, points.x(), points.y(), points.z(), origin)
            }
            _ => None,
        };

        let pool = WorkerPool::new(config.threads);
        debug!(
            algorithm = algorithm.name(),
            points = n,
            indexed = index.get().is_some(),
            simd = %packed.as_ref().map_or(SimdTier::Scalar, PackedPoints::tier),
            packed = packed.as_ref().map_or(0, PackedPoints::packed_len),
            threads = pool.threads(),
            "prepared grid context"
        );

        Ok(Self {
            initial_radius: initial_radius(&points),
            points,
            algorithm,
            kernel,
            config,
            index,
            triangulation,
            packed,
            simd_tier,
            pool,
        })
    }

    pub fn points(&self) -> &PointSet<'a> {
        &self.points
    }

    pub fn algorithm(&self) -> &GridAlgorithm {
        &self.algorithm
    }

    pub fn config(&self) -> &GridConfig {
        &self.config
    }

    /// Whether a spatial index has been built
    pub fn has_index(&self) -> bool {
        self.index.get().is_some()
    }

    /// Tier the packed kernel runs with, `Scalar` when it is not used
    pub fn simd_tier(&self) -> SimdTier {
        match self.packed {
            Some(_) => self.simd_tier,
            None => SimdTier::Scalar,
        }
    }

    /// Number of worker threads
    pub fn threads(&self) -> usize {
        self.pool.threads()
    }

    /// The triangulation used by the linear algorithm
    pub fn triangulation(&self) -> Option<&dyn Triangulation> {
        self.triangulation.as_deref().map(|t| t as &dyn Triangulation)
    }

    fn view(&self) -> SampleView<'_> {
        SampleView {
            x: self.points.x(),
            y: self.points.y(),
            z: self.points.z(),
            index: self.index.get(),
        }
    }

    fn value_at(&self, scratch: &mut Scratch, px: f64, py: f64) -> f64 {
        let view = self.view();
        match &self.kernel {
            Kernel::InverseDistance(k) => k.value(&view, self.packed.as_ref(), scratch, px, py),
            Kernel::InverseDistanceNearest(k) => k.value(&view, scratch, px, py),
            Kernel::MovingAverage(k) => k.value(&view, scratch, px, py),
            Kernel::Nearest(k) => k.value(&view, self.initial_radius, scratch, px, py),
            Kernel::Metric(k) => k.value(&view, scratch, px, py),
            Kernel::Linear(k) => k.value(
                &view,
                self.triangulation(),
                self.initial_radius,
                scratch,
                px,
                py,
            ),
        }
    }

    /// Interpolate a single node
    pub fn interpolate(&self, x: f64, y: f64) -> f64 {
        self.value_at(&mut Scratch::default(), x, y)
    }

    /// Evaluate every node of `extent` into the row-major `output`.
    ///
    /// `progress` runs on the calling thread after each completed row with
    /// the fraction done; returning `false` cancels. A cancelled or failed
    /// evaluation leaves `output` partially written.
    pub fn evaluate<T, P>(&self, extent: &GridExtent, output: &mut [T], progress: P) -> Result<GridStatus>
    where
        T: RasterElement,
        P: FnMut(f64, &str) -> bool,
    {
        extent.validate()?;
        if output.len() != extent.len() {
            return Err(Error::SizeMismatch {
                expected: extent.len(),
                actual: output.len(),
            });
        }
        self.check_edges(extent);

        let source = Scanlines { ctx: self, extent };
        run_scanlines(&self.pool, &source, extent.cols, output, progress)
    }

    /// Evaluate `extent` into a new raster with its transform and nodata set.
    pub fn evaluate_raster<T: RasterElement>(&self, extent: &GridExtent) -> Result<Raster<T>> {
        extent.validate()?;
        let mut data = try_alloc("raster", extent.len(), T::zero())?;
        self.evaluate(extent, &mut data, no_progress)?;

        let mut raster = Raster::from_vec(data, extent.rows, extent.cols)?;
        raster.set_transform(extent.transform());
        raster.set_nodata(Some(T::from_f64(self.algorithm.nodata())));
        Ok(raster)
    }

    /// Build the index ahead of a linear evaluation when a node on the grid
    /// border lies outside the triangulation, since interior nodes will
    /// likely need the nearest neighbour fallback too.
    fn check_edges(&self, extent: &GridExtent) {
        let Kernel::Linear(linear) = &self.kernel else {
            return;
        };
        if !linear.has_fallback() || self.has_index() || self.points.len() <= self.config.index_threshold {
            return;
        }
        let Some(tri) = self.triangulation() else {
            return;
        };
        let mut hint = 0;
        let outside = extent.edge_nodes().into_iter().any(|(col, row)| {
            let (x, y) = extent.cell_center(col, row);
            linear.needs_fallback(tri, &mut hint, x, y)
        });
        if outside {
            self.index
                .get_or_init(|| build_index(&self.points, self.config.index_max_depth));
            debug!("grid border leaves the triangulation, built spatial index");
        }
    }
}

impl std::fmt::Debug for GridContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GridContext")
            .field("points", &self.points.len())
            .field("algorithm", &self.algorithm)
            .field("indexed", &self.has_index())
            .field("simd", &self.simd_tier())
            .field("threads", &self.threads())
            .finish()
    }
}

fn build_index(points: &PointSet<'_>, max_depth: usize) -> QuadTree<u32> {
    let mut tree = QuadTree::new(points.bounds()).with_max_depth(max_depth);
    for (i, (&x, &y)) in points.x().iter().zip(points.y()).enumerate() {
        tree.insert_point(i as u32, x, y);
    }
    debug!(?max_depth, stats = ?tree.stats(), "built spatial index");
    tree
}

/// `sqrt(area / n)` of the bounding box, the longer side for a flat box,
/// 1 when all points coincide.
fn initial_radius(points: &PointSet<'_>) -> f64 {
    let bounds = points.bounds();
    let area = bounds.area();
    if area > 0.0 {
        (area / points.len() as f64).sqrt()
    } else {
        let side = bounds.width().max(bounds.height());
        if side > 0.0 {
            side
        } else {
            1.0
        }
    }
}

/// One evaluation of a context over an extent
struct Scanlines<'c, 'a> {
    ctx: &'c GridContext<'a>,
    extent: &'c GridExtent,
}

impl ScanlineSource for Scanlines<'_, '_> {
    type State = Scratch;

    fn start_job(&self) -> Result<Scratch> {
        Ok(Scratch::default())
    }

    fn fill_row(&self, scratch: &mut Scratch, row: usize, out: &mut [f64]) -> Result<()> {
        for (col, v) in out.iter_mut().enumerate() {
            let (x, y) = self.extent.cell_center(col, row);
            *v = self.ctx.value_at(scratch, x, y);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpolation::options::{LinearParams, MovingAverageParams, NearestParams};
    use approx::assert_relative_eq;

    fn triangle() -> PointSet<'static> {
        PointSet::owned(vec![0.0, 10.0, 0.0], vec![0.0, 0.0, 10.0], vec![10.0, 20.0, 30.0]).unwrap()
    }

    fn scattered(n: usize) -> PointSet<'static> {
        let x = (0..n).map(|i| ((i * 7919) % 997) as f64 / 9.97).collect();
        let y = (0..n).map(|i| ((i * 6271) % 991) as f64 / 9.91).collect();
        let z = (0..n).map(|i| (i % 23) as f64).collect();
        PointSet::owned(x, y, z).unwrap()
    }

    fn single_thread() -> GridConfig {
        GridConfig {
            threads: ThreadCount::Fixed(1),
            ..Default::default()
        }
    }

    #[test]
    fn test_config_defaults() {
        let config = GridConfig::default();
        assert_eq!(config.threads, ThreadCount::AllCpus);
        assert_eq!(config.index_threshold, 100);
        assert!(config.use_avx && config.use_sse);
    }

    #[test]
    fn test_index_only_above_threshold() {
        let algorithm = GridAlgorithm::MovingAverage(MovingAverageParams {
            radius1: 5.0,
            radius2: 5.0,
            ..Default::default()
        });
        let small = GridContext::new(scattered(100), algorithm, single_thread()).unwrap();
        assert!(!small.has_index());
        let large = GridContext::new(scattered(101), algorithm, single_thread()).unwrap();
        assert!(large.has_index());

        let rotated = GridAlgorithm::MovingAverage(MovingAverageParams {
            radius1: 5.0,
            radius2: 5.0,
            angle: 30.0,
            ..Default::default()
        });
        let ctx = GridContext::new(scattered(500), rotated, single_thread()).unwrap();
        assert!(!ctx.has_index());
    }

    #[test]
    fn test_rejects_invalid_algorithm() {
        let algorithm = GridAlgorithm::Nearest(NearestParams {
            radius1: -1.0,
            ..Default::default()
        });
        assert!(GridContext::new(triangle(), algorithm, single_thread()).is_err());
    }

    #[test]
    fn test_output_size_is_checked() {
        let ctx = GridContext::new(triangle(), GridAlgorithm::default(), single_thread()).unwrap();
        let extent = GridExtent::new(0.0, 10.0, 0.0, 10.0, 4, 4);
        let mut short = vec![0.0f64; 15];
        let err = ctx.evaluate(&extent, &mut short, no_progress).unwrap_err();
        assert!(matches!(err, Error::SizeMismatch { expected: 16, actual: 15 }));

        let empty = GridExtent::new(0.0, 10.0, 0.0, 10.0, 0, 4);
        assert!(ctx.evaluate(&empty, &mut [0.0f64; 0], no_progress).is_err());
    }

    #[test]
    fn test_evaluate_raster() {
        let ctx = GridContext::new(
            triangle(),
            GridAlgorithm::MovingAverage(MovingAverageParams {
                radius1: 100.0,
                radius2: 100.0,
                nodata: -1.0,
                ..Default::default()
            }),
            single_thread(),
        )
        .unwrap();
        let raster: Raster<f32> = ctx
            .evaluate_raster(&GridExtent::new(0.0, 10.0, 0.0, 5.0, 5, 3))
            .unwrap();
        assert_eq!(raster.shape(), (3, 5));
        assert_eq!(raster.nodata(), Some(-1.0));
        assert_relative_eq!(raster.view()[(2, 4)], 20.0);
    }

    #[test]
    fn test_packed_kernel_agrees_with_exact() {
        let algorithm = GridAlgorithm::default();
        let exact = GridContext::new(
            scattered(300),
            algorithm,
            GridConfig {
                use_avx: false,
                use_sse: false,
                ..single_thread()
            },
        )
        .unwrap();
        assert_eq!(exact.simd_tier(), SimdTier::Scalar);
        let fast = GridContext::new(scattered(300), algorithm, single_thread()).unwrap();

        for (x, y) in [(12.5, 40.25), (99.0, 0.5), (50.05, 50.05)] {
            assert_relative_eq!(fast.interpolate(x, y), exact.interpolate(x, y), max_relative = 1e-2);
        }
    }

    #[test]
    fn test_edge_check_builds_index() {
        let ctx = GridContext::new(
            scattered(200),
            GridAlgorithm::Linear(LinearParams::default()),
            single_thread(),
        )
        .unwrap();
        assert!(!ctx.has_index());
        // The grid reaches well beyond the hull of the samples.
        let extent = GridExtent::new(-50.0, 150.0, -50.0, 150.0, 8, 8);
        let mut out = vec![0.0f64; 64];
        ctx.evaluate(&extent, &mut out, no_progress).unwrap();
        assert!(ctx.has_index());
    }

    #[test]
    fn test_supplied_triangulation_is_checked() {
        let pts = triangle();
        let tri = DelaunayTriangulation::new(&[0.0, 1.0, 0.0, 5.0], &[0.0, 0.0, 1.0, 5.0]);
        let linear = GridAlgorithm::Linear(LinearParams::default());
        assert!(GridContext::with_triangulation(pts.clone(), linear, single_thread(), tri.clone()).is_err());
        assert!(GridContext::with_triangulation(pts, GridAlgorithm::default(), single_thread(), tri).is_err());

        let ok = DelaunayTriangulation::new(&[0.0, 10.0, 0.0], &[0.0, 0.0, 10.0]);
        let ctx = GridContext::with_triangulation(triangle(), linear, single_thread(), ok).unwrap();
        assert_relative_eq!(ctx.interpolate(2.0, 2.0), 10.0 + 2.0 + 4.0, epsilon = 1e-9);
    }
}
