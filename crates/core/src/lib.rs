//! # Gridder Core
//!
//! Core types shared by the gridder crates.
//!
//! This crate provides:
//! - `Raster<T>`: Generic raster grid type
//! - `RasterElement`: output pixel types and scanline conversion
//! - `GridExtent` / `GeoTransform`: output grid geometry
//! - `Error` / `Result`: the error taxonomy used across the workspace

pub mod error;
pub mod raster;

pub use error::{try_alloc, Error, Result};
pub use raster::{GeoTransform, GridExtent, PixelType, Raster, RasterElement};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::raster::{GeoTransform, GridExtent, PixelType, Raster, RasterElement};
}
