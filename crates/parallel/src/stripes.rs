//! Row-stripe partitioning of an output grid

/// The rows owned by one job: `first, first + stride, first + 2 * stride, ...`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowStripe {
    /// First row of the stripe (also the job index)
    pub first: usize,
    /// Distance between consecutive rows (the number of jobs)
    pub stride: usize,
    /// Number of rows in the whole grid
    pub total_rows: usize,
}

impl RowStripe {
    /// Create a new stripe
    pub fn new(first: usize, stride: usize, total_rows: usize) -> Self {
        Self {
            first,
            stride: stride.max(1),
            total_rows,
        }
    }

    /// Rows of this stripe in increasing order
    pub fn rows(&self) -> impl Iterator<Item = usize> {
        (self.first..self.total_rows).step_by(self.stride)
    }
}

/// Iterator over the stripes covering a grid.
///
/// Never yields more stripes than there are rows, so every stripe is non-empty.
#[derive(Debug, Clone)]
pub struct StripeIterator {
    total_rows: usize,
    jobs: usize,
    current: usize,
}

impl StripeIterator {
    /// Stripes for `total_rows` rows spread over `threads` jobs
    pub fn new(total_rows: usize, threads: usize) -> Self {
        Self {
            total_rows,
            jobs: threads.clamp(1, total_rows.max(1)),
            current: 0,
        }
    }

    /// Number of stripes the grid is split into
    pub fn jobs(&self) -> usize {
        self.jobs
    }
}

impl Iterator for StripeIterator {
    type Item = RowStripe;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current >= self.jobs || self.total_rows == 0 {
            return None;
        }
        let stripe = RowStripe::new(self.current, self.jobs, self.total_rows);
        self.current += 1;
        Some(stripe)
    }
}

/// Split a row-major buffer into per-stripe lists of `(row, row_slice)`,
/// one list for each stripe of `stripes`.
#[cfg_attr(not(feature = "parallel"), allow(dead_code))]
pub(crate) fn split_rows<T>(
    buffer: &mut [T],
    cols: usize,
    stripes: StripeIterator,
) -> Vec<Vec<(usize, &mut [T])>> {
    let mut rows: Vec<Option<&mut [T]>> = buffer.chunks_mut(cols.max(1)).map(Some).collect();
    stripes
        .map(|stripe| {
            stripe
                .rows()
                .filter_map(|row| rows.get_mut(row)?.take().map(|chunk| (row, chunk)))
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stripe_rows() {
        let stripe = RowStripe::new(1, 3, 10);
        assert_eq!(stripe.rows().collect::<Vec<_>>(), vec![1, 4, 7]);
        assert_eq!(RowStripe::new(12, 3, 10).rows().count(), 0);
    }

    #[test]
    fn test_stripes_cover_every_row_once() {
        let rows = 37;
        let mut seen = vec![0u32; rows];
        for stripe in StripeIterator::new(rows, 4) {
            for row in stripe.rows() {
                seen[row] += 1;
            }
        }
        assert!(seen.iter().all(|&n| n == 1));
    }

    #[test]
    fn test_more_threads_than_rows() {
        let stripes: Vec<_> = StripeIterator::new(3, 8).collect();
        assert_eq!(stripes.len(), 3);
        assert!(stripes.iter().all(|s| s.rows().count() == 1));
    }

    #[test]
    fn test_split_rows_matches_stripes() {
        let mut buffer: Vec<u32> = (0..12).collect();
        let split = split_rows(&mut buffer, 3, StripeIterator::new(4, 2));
        assert_eq!(split.len(), 2);
        assert_eq!(split[0].len(), 2);
        let rows: Vec<usize> = split[1].iter().map(|(r, _)| *r).collect();
        assert_eq!(rows, vec![1, 3]);
        assert_eq!(&*split[1][0].1, &[3, 4, 5][..]);
    }
}
