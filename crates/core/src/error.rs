//! Error types for gridder

use thiserror::Error;

/// Main error type for gridding operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid grid dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Buffer size mismatch: expected {expected} cells, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("Failed to allocate {bytes} bytes for {what}")]
    Allocation { what: &'static str, bytes: usize },

    #[error("Algorithm error: {0}")]
    Algorithm(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Shorthand for an [`Error::InvalidParameter`].
    pub fn invalid(name: &'static str, value: impl ToString, reason: impl Into<String>) -> Self {
        Error::InvalidParameter {
            name,
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for gridding operations
pub type Result<T> = std::result::Result<T, Error>;

/// Allocate a vector of `len` copies of `value`, reporting exhaustion as
/// [`Error::Allocation`] instead of aborting.
pub fn try_alloc<T: Clone>(what: &'static str, len: usize, value: T) -> Result<Vec<T>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len).map_err(|_| Error::Allocation {
        what,
        bytes: len.saturating_mul(std::mem::size_of::<T>()),
    })?;
    buf.resize(len, value);
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_try_alloc() {
        let buf = try_alloc("scanline", 16, 0.0f64).unwrap();
        assert_eq!(buf.len(), 16);
    }

    #[test]
    fn test_try_alloc_overflow() {
        let err = try_alloc("scanline", usize::MAX / 2, 0u64).unwrap_err();
        assert!(matches!(err, Error::Allocation { what: "scanline", .. }));
    }

    #[test]
    fn test_invalid_message() {
        let err = Error::invalid("threads", 0, "must be positive");
        assert_eq!(
            err.to_string(),
            "Invalid parameter: threads = 0 (must be positive)"
        );
    }
}
