//! # Gridder Parallel
//!
//! Parallel execution of grid evaluations.
//!
//! This crate provides:
//! - A fixed-size worker pool sized from a [`ThreadCount`]
//! - Row-stripe assignment (`row mod T`) of an output grid
//! - A scanline scheduler with progress reporting and cooperative cancellation
//!
//! Without the `parallel` feature every pool is single threaded and the
//! scheduler runs all rows in order on the calling thread.

pub mod scheduler;
pub mod strategy;
pub mod stripes;

pub use scheduler::{no_progress, run_scanlines, GridStatus, ScanlineSource};
pub use strategy::{ThreadCount, WorkerPool, MAX_THREADS};
pub use stripes::{RowStripe, StripeIterator};
