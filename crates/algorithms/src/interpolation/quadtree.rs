//! Region quadtree for rectangle overlap queries
//!
//! Stores items keyed by axis-aligned bounding rectangles (degenerate ones
//! for points) and returns every item whose rectangle overlaps a query
//! rectangle. Used to restrict neighbour searches to a fixed-radius window
//! around each grid node.
//!
//! Nodes split into four quadrants by halving the longer axis twice. With a
//! split ratio above 0.5 the two halves overlap, so fewer rectangles straddle
//! a boundary and get stuck at an inner node. An item is pushed into the
//! first child that fully contains its rectangle and stays at the current
//! node when none does.
//!
//! Two insertion policies are available:
//! - bucket driven (default): a node splits once it holds `bucket_capacity`
//!   items, with no depth limit;
//! - depth bounded: items are pushed down to `max_depth` regardless of
//!   occupancy, with `max_depth` capped at [`MAX_DEPTH_CAP`].

/// Default number of items a node holds before splitting.
pub const DEFAULT_BUCKET_CAPACITY: usize = 8;
/// Default split ratio of each halving.
pub const DEFAULT_SPLIT_RATIO: f64 = 0.55;
/// Upper bound on the depth of a depth-bounded tree.
pub const MAX_DEPTH_CAP: usize = 12;

/// Axis-aligned rectangle with closed bounds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Rect {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Degenerate rectangle of a single point
    #[inline]
    pub fn point(x: f64, y: f64) -> Self {
        Self::new(x, y, x, y)
    }

    /// Square of half-side `r` centred on `(x, y)`
    #[inline]
    pub fn around(x: f64, y: f64, r: f64) -> Self {
        Self::new(x - r, y - r, x + r, y + r)
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    /// Whether the two rectangles share at least one point
    #[inline]
    pub fn overlaps(&self, other: &Rect) -> bool {
        self.min_x <= other.max_x
            && self.max_x >= other.min_x
            && self.min_y <= other.max_y
            && self.max_y >= other.min_y
    }

    /// Whether `self` lies entirely within `outer`
    #[inline]
    pub fn contained_in(&self, outer: &Rect) -> bool {
        self.min_x >= outer.min_x
            && self.max_x <= outer.max_x
            && self.min_y >= outer.min_y
            && self.max_y <= outer.max_y
    }

    /// Smallest rectangle covering every `(x, y)` pair, `None` if empty.
    pub fn bounding(xs: &[f64], ys: &[f64]) -> Option<Rect> {
        let mut iter = xs.iter().zip(ys);
        let (&x0, &y0) = iter.next()?;
        let mut rect = Rect::point(x0, y0);
        for (&x, &y) in iter {
            rect.min_x = rect.min_x.min(x);
            rect.min_y = rect.min_y.min(y);
            rect.max_x = rect.max_x.max(x);
            rect.max_y = rect.max_y.max(y);
        }
        Some(rect)
    }

    /// Split along the longer axis into two overlapping halves
    fn split(&self, ratio: f64) -> (Rect, Rect) {
        let (mut lo, mut hi) = (*self, *self);
        let range_x = self.width();
        let range_y = self.height();
        if range_x > range_y {
            lo.max_x = self.min_x + range_x * ratio;
            hi.min_x = self.max_x - range_x * ratio;
        } else {
            lo.max_y = self.min_y + range_y * ratio;
            hi.min_y = self.max_y - range_y * ratio;
        }
        (lo, hi)
    }

    /// Whether the rectangle is still wide enough, relative to its
    /// coordinates, for a split to separate anything.
    fn is_splittable(&self) -> bool {
        let extent = self.width().max(self.height());
        let scale = self
            .min_x
            .abs()
            .max(self.max_x.abs())
            .max(self.min_y.abs())
            .max(self.max_y.abs())
            .max(1.0);
        extent > scale * 1e-12
    }

    fn quadrants(&self, ratio: f64) -> [Rect; 4] {
        let (half1, half2) = self.split(ratio);
        let (q1, q2) = half1.split(ratio);
        let (q3, q4) = half2.split(ratio);
        [q1, q2, q3, q4]
    }
}

#[derive(Debug)]
struct QuadNode<T> {
    rect: Rect,
    items: Vec<(Rect, T)>,
    /// Index of the first of four consecutive children, if split
    children: Option<usize>,
}

impl<T> QuadNode<T> {
    fn new(rect: Rect) -> Self {
        Self {
            rect,
            items: Vec::new(),
            children: None,
        }
    }
}

/// Shape statistics of a quadtree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuadTreeStats {
    /// Number of stored items
    pub features: usize,
    /// Number of nodes, root included
    pub nodes: usize,
    /// Depth of the deepest node (root is depth 1)
    pub max_depth: usize,
    /// Largest number of items held by a single node
    pub max_bucket: usize,
}

/// A region quadtree over items keyed by rectangles.
#[derive(Debug)]
pub struct QuadTree<T> {
    nodes: Vec<QuadNode<T>>,
    bucket_capacity: usize,
    split_ratio: f64,
    /// 0 means bucket-driven splitting without a depth limit
    max_depth: usize,
    len: usize,
}

impl<T: Copy> QuadTree<T> {
    /// Create an empty bucket-driven tree covering `bounds`.
    pub fn new(bounds: Rect) -> Self {
        Self {
            nodes: vec![QuadNode::new(bounds)],
            bucket_capacity: DEFAULT_BUCKET_CAPACITY,
            split_ratio: DEFAULT_SPLIT_RATIO,
            max_depth: 0,
            len: 0,
        }
    }

    /// Use a depth-bounded tree instead of bucket-driven splitting.
    ///
    /// `depth` is capped at [`MAX_DEPTH_CAP`]; 0 restores bucket-driven
    /// splitting. Only meaningful before the first insertion.
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth.min(MAX_DEPTH_CAP);
        self
    }

    /// Change the number of items a node holds before splitting.
    pub fn with_bucket_capacity(mut self, capacity: usize) -> Self {
        self.bucket_capacity = capacity.max(1);
        self
    }

    /// Change the split ratio (clamped to `[0.5, 0.99]`).
    pub fn with_split_ratio(mut self, ratio: f64) -> Self {
        self.split_ratio = ratio.clamp(0.5, 0.99);
        self
    }

    /// A depth suited to `expected` items: the smallest `d` with
    /// `2^d >= expected / 4`, capped at [`MAX_DEPTH_CAP`].
    pub fn advised_max_depth(expected: usize) -> usize {
        let mut depth = 0;
        let mut node_count = 1usize;
        while node_count < expected / 4 {
            depth += 1;
            node_count *= 2;
        }
        depth.min(MAX_DEPTH_CAP)
    }

    /// Number of stored items
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Rectangle covered by the root
    pub fn bounds(&self) -> Rect {
        self.nodes[0].rect
    }

    /// Insert `item` keyed by `rect`
    pub fn insert(&mut self, item: T, rect: Rect) {
        self.len += 1;
        if self.max_depth == 0 {
            self.insert_bucketed(item, rect);
        } else {
            self.insert_bounded(0, item, rect, self.max_depth);
        }
    }

    /// Insert a point item
    pub fn insert_point(&mut self, item: T, x: f64, y: f64) {
        self.insert(item, Rect::point(x, y));
    }

    fn insert_bucketed(&mut self, item: T, rect: Rect) {
        let mut node = 0;
        loop {
            if let Some(first) = self.nodes[node].children {
                match (first..first + 4).find(|&c| rect.contained_in(&self.nodes[c].rect)) {
                    Some(child) => {
                        node = child;
                        continue;
                    }
                    None => break,
                }
            }

            if self.nodes[node].items.len() < self.bucket_capacity {
                break;
            }

            let parent = self.nodes[node].rect;
            // Clusters of coincident points end up in a node at the limit of
            // coordinate precision, which keeps everything.
            if !parent.is_splittable() {
                break;
            }
            let quads = parent.quadrants(self.split_ratio);
            if !quads.iter().any(|q| rect.contained_in(q)) {
                break;
            }
            self.split_node(node, quads);
        }
        self.nodes[node].items.push((rect, item));
    }

    /// Create four children under `node` and move down the items that fit.
    fn split_node(&mut self, node: usize, quads: [Rect; 4]) {
        let first = self.nodes.len();
        self.nodes.extend(quads.into_iter().map(QuadNode::new));
        self.nodes[node].children = Some(first);

        let items = std::mem::take(&mut self.nodes[node].items);
        for (rect, item) in items {
            match (first..first + 4).find(|&c| rect.contained_in(&self.nodes[c].rect)) {
                Some(child) => self.nodes[child].items.push((rect, item)),
                None => self.nodes[node].items.push((rect, item)),
            }
        }
    }

    fn insert_bounded(&mut self, node: usize, item: T, rect: Rect, depth: usize) {
        if depth > 1 {
            if self.nodes[node].children.is_none() && self.nodes[node].rect.is_splittable() {
                let quads = self.nodes[node].rect.quadrants(self.split_ratio);
                if quads.iter().any(|q| rect.contained_in(q)) {
                    let first = self.nodes.len();
                    self.nodes.extend(quads.into_iter().map(QuadNode::new));
                    self.nodes[node].children = Some(first);
                }
            }
            if let Some(first) = self.nodes[node].children {
                if let Some(child) =
                    (first..first + 4).find(|&c| rect.contained_in(&self.nodes[c].rect))
                {
                    self.insert_bounded(child, item, rect, depth - 1);
                    return;
                }
            }
        }
        self.nodes[node].items.push((rect, item));
    }

    /// All items whose rectangle overlaps `query`, in traversal order.
    pub fn search(&self, query: &Rect) -> Vec<T> {
        let mut out = Vec::new();
        self.search_into(query, &mut out);
        out
    }

    /// Like [`QuadTree::search`], appending into a reusable buffer.
    pub fn search_into(&self, query: &Rect, out: &mut Vec<T>) {
        self.collect(0, query, out);
    }

    fn collect(&self, node: usize, query: &Rect, out: &mut Vec<T>) {
        let n = &self.nodes[node];
        // The root also holds items lying outside its rectangle.
        if node != 0 && !n.rect.overlaps(query) {
            return;
        }
        out.extend(
            n.items
                .iter()
                .filter(|(rect, _)| rect.overlaps(query))
                .map(|&(_, item)| item),
        );
        if let Some(first) = n.children {
            for child in first..first + 4 {
                self.collect(child, query, out);
            }
        }
    }

    /// Shape statistics of the tree
    pub fn stats(&self) -> QuadTreeStats {
        let mut stats = QuadTreeStats {
            features: 0,
            nodes: 0,
            max_depth: 0,
            max_bucket: 0,
        };
        let mut stack = vec![(0usize, 1usize)];
        while let Some((node, depth)) = stack.pop() {
            let n = &self.nodes[node];
            stats.nodes += 1;
            stats.features += n.items.len();
            stats.max_depth = stats.max_depth.max(depth);
            stats.max_bucket = stats.max_bucket.max(n.items.len());
            if let Some(first) = n.children {
                stack.extend((first..first + 4).map(|c| (c, depth + 1)));
            }
        }
        stats
    }
}
