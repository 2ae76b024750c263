//! Output grid geometry

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::raster::GeoTransform;

/// Extent and resolution of an interpolated grid.
///
/// Cell `(col, row)` is centred at
/// `(x_min + (col + 0.5) * dx, y_min + (row + 0.5) * dy)` with
/// `dx = (x_max - x_min) / cols` and `dy = (y_max - y_min) / rows`,
/// so row 0 lies along the minimum Y edge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridExtent {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
    /// Number of columns (nXSize)
    pub cols: usize,
    /// Number of rows (nYSize)
    pub rows: usize,
}

impl GridExtent {
    pub fn new(x_min: f64, x_max: f64, y_min: f64, y_max: f64, cols: usize, rows: usize) -> Self {
        Self {
            x_min,
            x_max,
            y_min,
            y_max,
            cols,
            rows,
        }
    }

    /// Reject empty grids and non-finite bounds.
    pub fn validate(&self) -> Result<()> {
        if self.cols == 0 || self.rows == 0 {
            return Err(Error::InvalidDimensions {
                width: self.cols,
                height: self.rows,
            });
        }
        for (name, v) in [
            ("x_min", self.x_min),
            ("x_max", self.x_max),
            ("y_min", self.y_min),
            ("y_max", self.y_max),
        ] {
            if !v.is_finite() {
                return Err(Error::invalid(name, v, "grid bounds must be finite"));
            }
        }
        Ok(())
    }

    /// Total number of cells
    pub fn len(&self) -> usize {
        self.cols * self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn delta_x(&self) -> f64 {
        (self.x_max - self.x_min) / self.cols as f64
    }

    pub fn delta_y(&self) -> f64 {
        (self.y_max - self.y_min) / self.rows as f64
    }

    /// Affine transform whose pixel centres are the grid nodes.
    pub fn transform(&self) -> GeoTransform {
        GeoTransform::new(self.x_min, self.y_min, self.delta_x(), self.delta_y())
    }

    /// Geographic coordinates of the node at `(col, row)`.
    #[inline]
    pub fn cell_center(&self, col: usize, row: usize) -> (f64, f64) {
        self.transform().pixel_to_geo(col, row)
    }

    /// Every node along the four edges of the grid, without duplicates.
    pub fn edge_nodes(&self) -> Vec<(usize, usize)> {
        let mut nodes = Vec::with_capacity(2 * (self.cols + self.rows));
        for col in 0..self.cols {
            nodes.push((col, 0));
            if self.rows > 1 {
                nodes.push((col, self.rows - 1));
            }
        }
        for row in 1..self.rows.saturating_sub(1) {
            nodes.push((0, row));
            if self.cols > 1 {
                nodes.push((self.cols - 1, row));
            }
        }
        nodes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_cell_centers() {
        let extent = GridExtent::new(0.0, 10.0, 0.0, 5.0, 10, 5);
        let (x, y) = extent.cell_center(0, 0);
        assert_relative_eq!(x, 0.5);
        assert_relative_eq!(y, 0.5);

        let (x, y) = extent.cell_center(9, 4);
        assert_relative_eq!(x, 9.5);
        assert_relative_eq!(y, 4.5);

    }

    #[test]
    fn test_zero_size_rejected() {
        let extent = GridExtent::new(0.0, 10.0, 0.0, 5.0, 0, 5);
        assert!(matches!(
            extent.validate(),
            Err(Error::InvalidDimensions { width: 0, height: 5 })
        ));
    }

    #[test]
    fn test_edge_nodes() {
        let extent = GridExtent::new(0.0, 4.0, 0.0, 3.0, 4, 3);
        let nodes = extent.edge_nodes();
        // 4 + 4 along top/bottom, 1 + 1 along the sides
        assert_eq!(nodes.len(), 10);
        assert!(!nodes.contains(&(1, 1)));

        let single = GridExtent::new(0.0, 1.0, 0.0, 1.0, 1, 1);
        assert_eq!(single.edge_nodes(), vec![(0, 0)]);
    }
}
