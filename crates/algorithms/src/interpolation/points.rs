//! Scattered sample points as parallel coordinate arrays

use std::borrow::Cow;

use gridder_core::{Error, Result};

use super::quadtree::Rect;
use super::SamplePoint;

/// How a [`PointSet`] holds the caller's arrays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Ownership {
    /// Keep referring to the caller's arrays, which must outlive the set
    #[default]
    Borrow,
    /// Copy the arrays into storage owned by the set
    Copy,
}

/// Parallel `x`, `y`, `z` arrays of sample points.
///
/// Immutable once built. The number of points fits in a `u32`, which is
/// also the item type of the spatial index.
#[derive(Debug, Clone)]
pub struct PointSet<'a> {
    x: Cow<'a, [f64]>,
    y: Cow<'a, [f64]>,
    z: Cow<'a, [f64]>,
    bounds: Rect,
}

impl<'a> PointSet<'a> {
    /// Build a point set from parallel arrays.
    ///
    /// Fails when the arrays differ in length, are empty, or hold more
    /// than `u32::MAX` points.
    pub fn new(x: &'a [f64], y: &'a [f64], z: &'a [f64], ownership: Ownership) -> Result<Self> {
        match ownership {
            Ownership::Borrow => Self::from_cows(Cow::Borrowed(x), Cow::Borrowed(y), Cow::Borrowed(z)),
            Ownership::Copy => Self::from_cows(
                Cow::Owned(x.to_vec()),
                Cow::Owned(y.to_vec()),
                Cow::Owned(z.to_vec()),
            ),
        }
    }

    /// Borrow the caller's arrays
    pub fn borrowed(x: &'a [f64], y: &'a [f64], z: &'a [f64]) -> Result<Self> {
        Self::new(x, y, z, Ownership::Borrow)
    }

    fn from_cows(x: Cow<'a, [f64]>, y: Cow<'a, [f64]>, z: Cow<'a, [f64]>) -> Result<Self> {
        if x.len() != y.len() || x.len() != z.len() {
            return Err(Error::invalid(
                "points",
                format!("{}/{}/{}", x.len(), y.len(), z.len()),
                "x, y and z must have the same length",
            ));
        }
        if x.len() > u32::MAX as usize {
            return Err(Error::invalid("points", x.len(), "at most 2^32 - 1 points"));
        }
        let bounds = Rect::bounding(&x, &y)
            .ok_or_else(|| Error::invalid("points", 0, "at least one point is required"))?;
        Ok(Self { x, y, z, bounds })
    }

    /// Detach from any borrowed arrays by copying them
    pub fn into_owned(self) -> PointSet<'static> {
        PointSet {
            x: Cow::Owned(self.x.into_owned()),
            y: Cow::Owned(self.y.into_owned()),
            z: Cow::Owned(self.z.into_owned()),
            bounds: self.bounds,
        }
    }

    /// Whether the set refers to caller-owned arrays
    pub fn is_borrowed(&self) -> bool {
        matches!(self.x, Cow::Borrowed(_))
    }

    /// Number of points
    #[inline]
    pub fn len(&self) -> usize {
        self.x.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    #[inline]
    pub fn x(&self) -> &[f64] {
        &self.x
    }

    #[inline]
    pub fn y(&self) -> &[f64] {
        &self.y
    }

    #[inline]
    pub fn z(&self) -> &[f64] {
        &self.z
    }

    /// Bounding rectangle of all points
    pub fn bounds(&self) -> Rect {
        self.bounds
    }
}

impl PointSet<'static> {
    /// Take ownership of the arrays
    pub fn owned(x: Vec<f64>, y: Vec<f64>, z: Vec<f64>) -> Result<Self> {
        Self::from_cows(Cow::Owned(x), Cow::Owned(y), Cow::Owned(z))
    }

    /// Collect sample points into parallel arrays
    pub fn from_samples(samples: &[SamplePoint]) -> Result<Self> {
        Self::owned(
            samples.iter().map(|p| p.x).collect(),
            samples.iter().map(|p| p.y).collect(),
            samples.iter().map(|p| p.value).collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_borrow_and_copy() {
        let x = [0.0, 10.0, 0.0];
        let y = [0.0, 0.0, 10.0];
        let z = [10.0, 20.0, 30.0];

        let borrowed = PointSet::new(&x, &y, &z, Ownership::Borrow).unwrap();
        assert!(borrowed.is_borrowed());
        let copied = PointSet::new(&x, &y, &z, Ownership::Copy).unwrap();
        assert!(!copied.is_borrowed());
        assert_eq!(copied.z(), &z);
        assert!(!borrowed.into_owned().is_borrowed());
    }

    #[test]
    fn test_bounds() {
        let set = PointSet::from_samples(&[
            SamplePoint::new(-1.0, 2.0, 0.0),
            SamplePoint::new(4.0, -3.0, 0.0),
        ])
        .unwrap();
        assert_eq!(set.bounds(), Rect::new(-1.0, -3.0, 4.0, 2.0));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(PointSet::owned(vec![0.0], vec![0.0, 1.0], vec![0.0]).is_err());
        assert!(PointSet::owned(vec![], vec![], vec![]).is_err());
    }
}
