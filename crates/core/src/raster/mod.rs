//! Raster data structures and grid geometry

mod element;
mod extent;
mod geotransform;
mod grid;

pub use element::{PixelType, RasterElement};
pub use extent::GridExtent;
pub use geotransform::GeoTransform;
pub use grid::{Raster, RasterStatistics};
