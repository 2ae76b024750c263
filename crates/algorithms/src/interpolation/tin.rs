//! TIN (Triangulated Irregular Network) linear interpolation
//!
//! Locates the facet holding each node with a directed walk from the facet
//! where the previous node of the same job ended, then interpolates with
//! barycentric coordinates. Nodes outside the triangulation fall back to a
//! nearest neighbour search, or get `nodata` when the fallback is disabled.
//!
//! [`DelaunayTriangulation`] builds a triangulation with the incremental
//! Bowyer-Watson algorithm, inserting points in Hilbert curve order, and
//! closes it to the convex hull so a walk that leaves through the boundary
//! ends the search. Any other [`Triangulation`] can be supplied.

use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};

use super::nearest::Nearest;
use super::options::LinearParams;
use super::quadtree::Rect;
use super::search::{SampleView, Scratch};

/// Barycentric coordinates below this still count as inside a facet.
const INSIDE_EPS: f64 = -1e-10;

/// A planar triangulation of the sample points
pub trait Triangulation: Send + Sync {
    /// Number of facets
    fn facet_count(&self) -> usize;

    /// Sample indices of the three vertices of `facet`
    fn vertices(&self, facet: usize) -> [usize; 3];

    /// Walk from `hint` towards `(x, y)` and return the facet holding it,
    /// or `None` when the point lies outside the triangulation.
    fn locate(&self, hint: usize, x: f64, y: f64) -> Option<usize>;

    /// Barycentric coordinates of `(x, y)` relative to `facet`'s vertices
    fn barycentric(&self, facet: usize, x: f64, y: f64) -> [f64; 3];
}

/// A triangle defined by three vertex indices, counter-clockwise
#[derive(Debug, Clone, Copy)]
struct Triangle {
    v: [usize; 3],
}

/// Circumcircle of a triangle
#[derive(Debug, Clone, Copy)]
struct Circumcircle {
    cx: f64,
    cy: f64,
    radius_sq: f64,
}

impl Circumcircle {
    /// Strictly inside; cocircular points keep the existing facets
    #[inline]
    fn contains(&self, x: f64, y: f64) -> bool {
        let dx = x - self.cx;
        let dy = y - self.cy;
        dx * dx + dy * dy < self.radius_sq
    }
}

/// Compute the circumcircle of three points
fn circumcircle(a: (f64, f64), b: (f64, f64), c: (f64, f64)) -> Option<Circumcircle> {
    let (ax, ay) = a;
    let (bx, by) = b;
    let (cx, cy) = c;

    let d = 2.0 * (ax * (by - cy) + bx * (cy - ay) + cx * (ay - by));
    if d.abs() < 1e-12 {
        return None; // Degenerate triangle
    }

    let ux = ((ax * ax + ay * ay) * (by - cy)
        + (bx * bx + by * by) * (cy - ay)
        + (cx * cx + cy * cy) * (ay - by))
        / d;

    let uy = ((ax * ax + ay * ay) * (cx - bx)
        + (bx * bx + by * by) * (ax - cx)
        + (cx * cx + cy * cy) * (bx - ax))
        / d;

    let dx = ax - ux;
    let dy = ay - uy;

    Some(Circumcircle {
        cx: ux,
        cy: uy,
        radius_sq: dx * dx + dy * dy,
    })
}

/// Twice the signed area of `(a, b, c)`, positive when counter-clockwise
#[inline]
fn orient(a: (f64, f64), b: (f64, f64), c: (f64, f64)) -> f64 {
    (b.0 - a.0) * (c.1 - a.1) - (b.1 - a.1) * (c.0 - a.0)
}

/// Barycentric coordinates of `p` within `(p1, p2, p3)`.
///
/// Exact at the vertices: a vertex gets 1 and the others 0.
fn barycentric(p: (f64, f64), p1: (f64, f64), p2: (f64, f64), p3: (f64, f64)) -> Option<[f64; 3]> {
    let det = (p2.1 - p3.1) * (p1.0 - p3.0) + (p3.0 - p2.0) * (p1.1 - p3.1);
    if det == 0.0 {
        return None;
    }
    let l1 = ((p2.1 - p3.1) * (p.0 - p3.0) + (p3.0 - p2.0) * (p.1 - p3.1)) / det;
    let l2 = ((p3.1 - p1.1) * (p.0 - p3.0) + (p1.0 - p3.0) * (p.1 - p3.1)) / det;
    Some([l1, l2, 1.0 - l1 - l2])
}

/// Delaunay triangulation with facet adjacency
#[derive(Debug, Clone)]
pub struct DelaunayTriangulation {
    points: Vec<(f64, f64)>,
    triangles: Vec<Triangle>,
    /// `neighbors[f][k]`: facet across the edge opposite vertex `k`
    neighbors: Vec<[Option<usize>; 3]>,
    bounds: Option<Rect>,
    /// Facets tile the convex hull of their vertices, so a walk leaving
    /// through a boundary edge proves the point is outside.
    convex: bool,
}

/// Where a directed walk ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Walk {
    Found(usize),
    Outside,
    /// Step limit hit, or a boundary exit on a non-convex triangulation
    Lost,
}

impl DelaunayTriangulation {
    /// Triangulate the points `(x[i], y[i])`.
    ///
    /// Duplicate coordinates are triangulated once, through their first
    /// occurrence. Fewer than three distinct or only collinear points give
    /// an empty triangulation.
    pub fn new(x: &[f64], y: &[f64]) -> Self {
        let points: Vec<(f64, f64)> = x.iter().copied().zip(y.iter().copied()).collect();
        let (mut triangles, visits) = delaunay(&points);
        let convex = close_hull(&points, &mut triangles);
        let neighbors = adjacency(&triangles);
        let bounds = if triangles.is_empty() {
            None
        } else {
            Rect::bounding(x, y)
        };
        debug!(
            points = points.len(),
            facets = triangles.len(),
            visits,
            convex,
            "built Delaunay triangulation"
        );
        if triangles.is_empty() && !points.is_empty() {
            warn!("samples cannot be triangulated (fewer than 3 distinct or all collinear)");
        }
        Self {
            points,
            triangles,
            neighbors,
            bounds,
            convex,
        }
    }

    fn corner(&self, facet: usize, k: usize) -> (f64, f64) {
        self.points[self.triangles[facet].v[k]]
    }

    fn coords(&self, facet: usize, x: f64, y: f64) -> Option<[f64; 3]> {
        barycentric(
            (x, y),
            self.corner(facet, 0),
            self.corner(facet, 1),
            self.corner(facet, 2),
        )
    }

    /// Step from `start` across the edge with the most negative barycentric
    /// coordinate until the facet holding `(x, y)` or the hull is reached.
    /// `steps` counts the facets visited.
    fn walk(&self, start: usize, x: f64, y: f64, steps: &mut usize) -> Walk {
        let mut facet = start;
        while *steps < self.triangles.len() {
            *steps += 1;
            let Some(l) = self.coords(facet, x, y) else {
                return Walk::Lost;
            };
            let (k, &worst) = l
                .iter()
                .enumerate()
                .min_by(|a, b| a.1.total_cmp(b.1))
                .unwrap_or((0, &0.0));
            if worst >= INSIDE_EPS {
                return Walk::Found(facet);
            }
            match self.neighbors[facet][k] {
                Some(next) => facet = next,
                None if self.convex => return Walk::Outside,
                None => return Walk::Lost,
            }
        }
        Walk::Lost
    }

    fn locate_exhaustive(&self, x: f64, y: f64) -> Option<usize> {
        (0..self.triangles.len()).find(|&f| {
            self.coords(f, x, y)
                .is_some_and(|l| l.iter().all(|&c| c >= INSIDE_EPS))
        })
    }
}

impl Triangulation for DelaunayTriangulation {
    fn facet_count(&self) -> usize {
        self.triangles.len()
    }

    fn vertices(&self, facet: usize) -> [usize; 3] {
        self.triangles[facet].v
    }

    fn locate(&self, hint: usize, x: f64, y: f64) -> Option<usize> {
        let bounds = self.bounds?;
        if !Rect::point(x, y).overlaps(&bounds) {
            return None;
        }
        let start = if hint < self.triangles.len() { hint } else { 0 };
        let mut steps = 0;
        match self.walk(start, x, y, &mut steps) {
            Walk::Found(facet) => Some(facet),
            Walk::Outside => None,
            Walk::Lost => self.locate_exhaustive(x, y),
        }
    }

    fn barycentric(&self, facet: usize, x: f64, y: f64) -> [f64; 3] {
        self.coords(facet, x, y).unwrap_or([f64::NAN; 3])
    }
}

/// Build Delaunay triangulation using Bowyer-Watson algorithm.
///
/// Returns the facets and the number of cells the construction inspected.
fn delaunay(points: &[(f64, f64)]) -> (Vec<Triangle>, usize) {
    if points.len() < 3 {
        return (Vec::new(), 0);
    }
    let Some(bounds) = Rect::bounding(
        &points.iter().map(|p| p.0).collect::<Vec<_>>(),
        &points.iter().map(|p| p.1).collect::<Vec<_>>(),
    ) else {
        return (Vec::new(), 0);
    };

    let mut mesh = Mesh::new(points, &bounds);
    for vi in insertion_order(points, &bounds) {
        mesh.insert(vi);
    }
    let visits = mesh.visits;
    (mesh.into_triangles(points.len()), visits)
}

/// Distinct points, first occurrence wins, sorted along a Hilbert curve so
/// consecutive insertions land close together
fn insertion_order(points: &[(f64, f64)], bounds: &Rect) -> Vec<usize> {
    let mut seen: HashSet<(u64, u64)> = HashSet::with_capacity(points.len());
    let mut keyed: Vec<(u64, usize)> = points
        .iter()
        .enumerate()
        .filter(|(_, p)| seen.insert((p.0.to_bits(), p.1.to_bits())))
        .map(|(i, p)| (hilbert_key(p.0, p.1, bounds), i))
        .collect();
    keyed.sort_unstable();
    keyed.into_iter().map(|(_, i)| i).collect()
}

/// Distance along an order 16 Hilbert curve laid over `bounds`
fn hilbert_key(x: f64, y: f64, bounds: &Rect) -> u64 {
    const SIDE: u32 = 1 << 16;
    let cell = |v: f64, lo: f64, span: f64| -> u32 {
        if span > 0.0 {
            let top = f64::from(SIDE - 1);
            ((v - lo) / span * top).round().clamp(0.0, top) as u32
        } else {
            0
        }
    };
    let mut hx = cell(x, bounds.min_x, bounds.width());
    let mut hy = cell(y, bounds.min_y, bounds.height());

    let mut key = 0u64;
    let mut s = SIDE / 2;
    while s > 0 {
        let rx = u32::from((hx & s) != 0);
        let ry = u32::from((hy & s) != 0);
        key += u64::from(s) * u64::from(s) * u64::from((3 * rx) ^ ry);
        if ry == 0 {
            if rx == 1 {
                hx = SIDE - 1 - hx;
                hy = SIDE - 1 - hy;
            }
            std::mem::swap(&mut hx, &mut hy);
        }
        s /= 2;
    }
    key
}

/// Triangle under construction
#[derive(Debug, Clone, Copy)]
struct Cell {
    v: [usize; 3],
    /// `n[k]`: cell across the edge opposite vertex `k`
    n: [Option<usize>; 3],
    cc: Option<Circumcircle>,
    alive: bool,
}

/// Incremental Bowyer-Watson state.
///
/// Each insertion walks from the newest cell to the one holding the point,
/// grows the cavity of cells whose circumcircle contains it through the
/// adjacency, and fans new cells from the point to the cavity rim.
struct Mesh {
    vertices: Vec<(f64, f64)>,
    cells: Vec<Cell>,
    free: Vec<usize>,
    /// Insertion round that last put each cell in a cavity
    stamp: Vec<u32>,
    round: u32,
    last: usize,
    visits: usize,
    stack: Vec<usize>,
    cavity: Vec<usize>,
    /// Cavity edges `(a, b)` with the outer cell and its slot pointing back
    rim: Vec<(usize, usize, Option<(usize, usize)>)>,
    fan: Vec<usize>,
}

impl Mesh {
    fn new(points: &[(f64, f64)], bounds: &Rect) -> Self {
        let dx = bounds.width();
        let dy = bounds.height();
        let delta = dx.max(dy).max(1.0);
        let (min_x, min_y, max_x, max_y) = (bounds.min_x, bounds.min_y, bounds.max_x, bounds.max_y);

        // Super-triangle vertices sit at the end so sample indices stay as is.
        let n = points.len();
        let mut vertices = Vec::with_capacity(n + 3);
        vertices.extend_from_slice(points);
        vertices.push((min_x - 10.0 * delta, min_y - delta));
        vertices.push((max_x + 10.0 * delta, min_y - delta));
        vertices.push((min_x + 0.5 * dx, max_y + 10.0 * delta));

        let root = Cell {
            v: [n, n + 1, n + 2],
            n: [None; 3],
            cc: circumcircle(vertices[n], vertices[n + 1], vertices[n + 2]),
            alive: true,
        };
        Self {
            vertices,
            cells: vec![root],
            free: Vec::new(),
            stamp: vec![0],
            round: 0,
            last: 0,
            visits: 0,
            stack: Vec::new(),
            cavity: Vec::new(),
            rim: Vec::new(),
            fan: Vec::new(),
        }
    }

    /// An edge of `cell` with `p` strictly on its outer side
    fn exit_edge(&self, cell: &Cell, p: (f64, f64)) -> Option<usize> {
        (0..3).find(|&k| {
            orient(
                self.vertices[cell.v[(k + 1) % 3]],
                self.vertices[cell.v[(k + 2) % 3]],
                p,
            ) < 0.0
        })
    }

    /// Cell whose closed triangle holds `p`
    fn seed(&mut self, p: (f64, f64)) -> Option<usize> {
        let mut t = self.last;
        let mut steps = 0;
        let found = loop {
            if steps >= self.cells.len() {
                break None;
            }
            steps += 1;
            let cell = self.cells[t];
            match self.exit_edge(&cell, p) {
                None => break Some(t),
                Some(k) => match cell.n[k] {
                    Some(u) => t = u,
                    None => break None,
                },
            }
        };
        self.visits += steps;
        if found.is_some() {
            return found;
        }

        self.visits += self.cells.len();
        self.cells
            .iter()
            .enumerate()
            .find(|(_, c)| c.alive && self.exit_edge(c, p).is_none())
            .map(|(t, _)| t)
    }

    fn insert(&mut self, vi: usize) {
        let p = self.vertices[vi];
        let Some(seed) = self.seed(p) else {
            return;
        };
        self.round += 1;
        let round = self.round;

        self.stamp[seed] = round;
        self.cavity.clear();
        self.stack.clear();
        self.stack.push(seed);
        while let Some(t) = self.stack.pop() {
            self.cavity.push(t);
            for u in self.cells[t].n.into_iter().flatten() {
                self.visits += 1;
                if self.stamp[u] != round && self.cells[u].cc.is_some_and(|c| c.contains(p.0, p.1)) {
                    self.stamp[u] = round;
                    self.stack.push(u);
                }
            }
        }

        // Near-degenerate circles can leave rim edges the point does not
        // see; absorb the cell behind each until the cavity is star-shaped.
        loop {
            self.collect_rim(round);
            let before = self.cavity.len();
            for i in 0..self.rim.len() {
                let (a, b, outer) = self.rim[i];
                if let Some((u, _)) = outer {
                    if self.stamp[u] != round && orient(self.vertices[a], self.vertices[b], p) <= 0.0 {
                        self.stamp[u] = round;
                        self.cavity.push(u);
                    }
                }
            }
            if self.cavity.len() == before {
                break;
            }
        }

        for &t in &self.cavity {
            self.cells[t].alive = false;
            self.free.push(t);
        }

        self.fan.clear();
        for i in 0..self.rim.len() {
            let (a, b, outer) = self.rim[i];
            let cell = Cell {
                v: [a, b, vi],
                n: [None, None, outer.map(|(u, _)| u)],
                cc: circumcircle(self.vertices[a], self.vertices[b], p),
                alive: true,
            };
            let id = self.alloc(cell);
            if let Some((u, j)) = outer {
                self.cells[u].n[j] = Some(id);
            }
            self.fan.push(id);
        }
        // Fan cells meet along the spokes from the new point.
        for i in 0..self.fan.len() {
            let t = self.fan[i];
            let b = self.cells[t].v[1];
            if let Some(&u) = self.fan.iter().find(|&&u| self.cells[u].v[0] == b) {
                self.cells[t].n[0] = Some(u);
                self.cells[u].n[1] = Some(t);
            }
        }
        if let Some(&t) = self.fan.first() {
            self.last = t;
        }
    }

    /// Edges of the cavity not shared with another cavity cell
    fn collect_rim(&mut self, round: u32) {
        self.rim.clear();
        for &t in &self.cavity {
            let cell = self.cells[t];
            for k in 0..3 {
                let outer = match cell.n[k] {
                    Some(u) if self.stamp[u] == round => continue,
                    Some(u) => self.cells[u].n.iter().position(|&m| m == Some(t)).map(|j| (u, j)),
                    None => None,
                };
                self.rim.push((cell.v[(k + 1) % 3], cell.v[(k + 2) % 3], outer));
            }
        }
    }

    fn alloc(&mut self, cell: Cell) -> usize {
        match self.free.pop() {
            Some(id) => {
                self.cells[id] = cell;
                id
            }
            None => {
                self.cells.push(cell);
                self.stamp.push(0);
                self.cells.len() - 1
            }
        }
    }

    /// Live cells without a super-triangle vertex
    fn into_triangles(self, n: usize) -> Vec<Triangle> {
        let Mesh { vertices, cells, .. } = self;
        cells
            .into_iter()
            .filter(|c| c.alive && c.v.iter().all(|&v| v < n))
            .filter(|c| orient(vertices[c.v[0]], vertices[c.v[1]], vertices[c.v[2]]) > 0.0)
            .map(|c| Triangle { v: c.v })
            .collect()
    }
}

/// Fill the pockets left along the boundary by the super triangle so the
/// facets cover the convex hull of their vertices.
///
/// Walks the counter-clockwise boundary from its lowest leftmost vertex and
/// closes every reflex turn with a facet. Returns whether the result tiles
/// the hull; a pinched or holed boundary is left as is and reports `false`.
fn close_hull(points: &[(f64, f64)], triangles: &mut Vec<Triangle>) -> bool {
    if triangles.is_empty() {
        return false;
    }
    let neighbors = adjacency(triangles);
    let mut next: HashMap<usize, usize> = HashMap::new();
    for (t, nb) in triangles.iter().zip(&neighbors) {
        for k in 0..3 {
            if nb[k].is_none() && next.insert(t.v[(k + 1) % 3], t.v[(k + 2) % 3]).is_some() {
                return false;
            }
        }
    }

    let Some(&start) = next.keys().min_by(|&&a, &&b| {
        let (pa, pb) = (points[a], points[b]);
        pa.0.total_cmp(&pb.0).then(pa.1.total_cmp(&pb.1))
    }) else {
        return false;
    };
    let mut ring = Vec::with_capacity(next.len());
    let mut v = start;
    loop {
        ring.push(v);
        match next.get(&v) {
            Some(&w) if w == start => break,
            Some(&w) if ring.len() < next.len() => v = w,
            _ => return false,
        }
    }
    if ring.len() != next.len() {
        return false;
    }

    let mut hull: Vec<usize> = Vec::with_capacity(ring.len() + 1);
    for &c in ring.iter().chain(std::iter::once(&start)) {
        while let [.., a, b] = hull[..] {
            if orient(points[a], points[b], points[c]) >= 0.0 {
                break;
            }
            triangles.push(Triangle { v: [a, c, b] });
            hull.pop();
        }
        hull.push(c);
    }
    hull.pop();
    if hull.len() < 3 {
        return false;
    }

    let area = |a: usize, b: usize, c: usize| orient(points[a], points[b], points[c]);
    let covered: f64 = triangles.iter().map(|t| area(t.v[0], t.v[1], t.v[2])).sum();
    let enclosed: f64 = (1..hull.len() - 1).map(|i| area(hull[0], hull[i], hull[i + 1])).sum();
    enclosed > 0.0 && (covered - enclosed).abs() <= 1e-9 * enclosed
}

/// For each facet, the facet across each edge (opposite vertex k)
fn adjacency(triangles: &[Triangle]) -> Vec<[Option<usize>; 3]> {
    let mut edges: HashMap<(usize, usize), (usize, usize)> = HashMap::with_capacity(triangles.len() * 3);
    let mut neighbors = vec![[None; 3]; triangles.len()];
    for (f, t) in triangles.iter().enumerate() {
        for k in 0..3 {
            let a = t.v[(k + 1) % 3];
            let b = t.v[(k + 2) % 3];
            let key = (a.min(b), a.max(b));
            match edges.remove(&key) {
                Some((g, j)) => {
                    neighbors[f][k] = Some(g);
                    neighbors[g][j] = Some(f);
                }
                None => {
                    edges.insert(key, (f, k));
                }
            }
        }
    }
    neighbors
}

/// Linear interpolation inside the triangulation with a nearest fallback
#[derive(Debug, Clone)]
pub(crate) struct Linear {
    nodata: f64,
    fallback: Option<Nearest>,
}

impl Linear {
    pub fn new(params: &LinearParams) -> Self {
        let fallback = (params.radius != 0.0).then(|| Nearest::with_radius(params.radius, params.nodata));
        Self {
            nodata: params.nodata,
            fallback,
        }
    }

    pub fn has_fallback(&self) -> bool {
        self.fallback.is_some()
    }

    /// Whether `(x, y)` would need the fallback
    pub fn needs_fallback(&self, triangulation: &dyn Triangulation, hint: &mut usize, x: f64, y: f64) -> bool {
        match triangulation.locate(*hint, x, y) {
            Some(facet) => {
                *hint = facet;
                false
            }
            None => true,
        }
    }

    pub fn value(
        &self,
        view: &SampleView<'_>,
        triangulation: Option<&dyn Triangulation>,
        initial_radius: f64,
        scratch: &mut Scratch,
        px: f64,
        py: f64,
    ) -> f64 {
        if let Some(tri) = triangulation {
            if let Some(facet) = tri.locate(scratch.facet_hint, px, py) {
                scratch.facet_hint = facet;
                let l = tri.barycentric(facet, px, py);
                let v = tri.vertices(facet);
                return l[0] * view.z[v[0]] + l[1] * view.z[v[1]] + l[2] * view.z[v[2]];
            }
        }
        match &self.fallback {
            Some(nearest) => nearest.value(view, initial_radius, scratch, px, py),
            None => self.nodata,
        }
    }
}
