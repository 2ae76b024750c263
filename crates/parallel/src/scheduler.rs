//! Scanline scheduler
//!
//! Splits an output grid into row stripes (`row mod T`), runs one job per
//! stripe on the worker pool and aggregates progress on the calling thread.
//!
//! Each job fills a private double precision scanline per owned row, converts
//! it into the caller's pixel type at that row's offset, then reports the row
//! and checks the shared stop flag. The progress callback only ever runs on
//! the coordinating thread; returning `false` from it raises the stop flag,
//! which every job observes after its current scanline.

use gridder_core::{try_alloc, Error, RasterElement, Result};
use tracing::debug;

use crate::strategy::WorkerPool;
use crate::stripes::StripeIterator;

/// Outcome of an evaluation that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridStatus {
    /// Every row was written.
    Completed,
    /// The progress callback asked to stop. The output is only partially
    /// written and must not be used as a result.
    Cancelled,
}

/// A row-at-a-time producer of interpolated values.
///
/// One `State` is created per job and threaded through that job's rows in
/// order, on a single thread.
pub trait ScanlineSource: Sync {
    /// Per-job mutable state (search hints, scratch buffers)
    type State: Send;

    /// Create the state for one job
    fn start_job(&self) -> Result<Self::State>;

    /// Compute every column of `row`, left to right, into `out`
    fn fill_row(&self, state: &mut Self::State, row: usize, out: &mut [f64]) -> Result<()>;
}

/// Progress callback that never cancels
pub fn no_progress(_done: f64, _message: &str) -> bool {
    true
}

/// Evaluate `source` into a row-major `output` of `cols` columns.
///
/// Returns `Err` when a job fails (allocation or per-cell error); other jobs
/// are stopped cooperatively and already written rows stay in `output`.
pub fn run_scanlines<S, T, P>(
    pool: &WorkerPool,
    source: &S,
    cols: usize,
    output: &mut [T],
    mut progress: P,
) -> Result<GridStatus>
where
    S: ScanlineSource,
    T: RasterElement,
    P: FnMut(f64, &str) -> bool,
{
    if cols == 0 || output.is_empty() || output.len() % cols != 0 {
        return Err(Error::InvalidDimensions {
            width: cols,
            height: if cols == 0 { 0 } else { output.len() / cols },
        });
    }
    let rows = output.len() / cols;
    let jobs = StripeIterator::new(rows, pool.threads()).jobs();
    debug!(rows, cols, jobs, "scheduling scanlines");

    #[cfg(feature = "parallel")]
    if jobs > 1 {
        if let Some(rayon_pool) = pool.rayon() {
            return run_parallel(rayon_pool, source, cols, rows, jobs, output, &mut progress);
        }
    }

    run_sequential(source, cols, rows, output, &mut progress)
}

fn run_sequential<S, T, P>(
    source: &S,
    cols: usize,
    rows: usize,
    output: &mut [T],
    progress: &mut P,
) -> Result<GridStatus>
where
    S: ScanlineSource,
    T: RasterElement,
    P: FnMut(f64, &str) -> bool,
{
    let mut state = source.start_job()?;
    let mut scanline = try_alloc("scanline", cols, 0.0f64)?;

    for (row, out_row) in output.chunks_mut(cols).enumerate() {
        source.fill_row(&mut state, row, &mut scanline)?;
        T::copy_from_f64(&scanline, out_row);
        if !progress((row + 1) as f64 / rows as f64, "") {
            debug!(row, "evaluation cancelled");
            return Ok(GridStatus::Cancelled);
        }
    }
    Ok(GridStatus::Completed)
}

#[cfg(feature = "parallel")]
enum JobEvent {
    RowDone,
    Finished(Result<()>),
}

#[cfg(feature = "parallel")]
fn run_parallel<S, T, P>(
    rayon_pool: &rayon::ThreadPool,
    source: &S,
    cols: usize,
    rows: usize,
    jobs: usize,
    output: &mut [T],
    progress: &mut P,
) -> Result<GridStatus>
where
    S: ScanlineSource,
    T: RasterElement,
    P: FnMut(f64, &str) -> bool,
{
    use std::sync::atomic::{AtomicBool, Ordering};

    let stop = AtomicBool::new(false);
    let stripes = crate::stripes::split_rows(output, cols, StripeIterator::new(rows, jobs));

    rayon_pool.in_place_scope(|scope| {
        let (tx, rx) = crossbeam_channel::unbounded::<JobEvent>();

        for stripe in stripes {
            let tx = tx.clone();
            let stop = &stop;
            scope.spawn(move |_| {
                let result = run_stripe(source, stripe, cols, stop, &tx);
                // The coordinator only goes away once every job has reported.
                let _ = tx.send(JobEvent::Finished(result));
            });
        }
        drop(tx);

        let mut done_rows = 0usize;
        let mut finished = 0usize;
        let mut status = GridStatus::Completed;
        let mut failure: Option<Error> = None;

        while finished < jobs {
            match rx.recv() {
                Ok(JobEvent::RowDone) => {
                    done_rows += 1;
                    if status == GridStatus::Completed
                        && failure.is_none()
                        && !progress(done_rows as f64 / rows as f64, "")
                    {
                        debug!(done_rows, "evaluation cancelled");
                        status = GridStatus::Cancelled;
                        stop.store(true, Ordering::Release);
                    }
                }
                Ok(JobEvent::Finished(Ok(()))) => finished += 1,
                Ok(JobEvent::Finished(Err(e))) => {
                    finished += 1;
                    stop.store(true, Ordering::Release);
                    if failure.is_none() {
                        failure = Some(e);
                    }
                }
                // Every sender is gone, which only happens if a job panicked;
                // the scope re-raises that panic.
                Err(_) => break,
            }
        }

        match failure {
            Some(e) => Err(e),
            None => Ok(status),
        }
    })
}

#[cfg(feature = "parallel")]
fn run_stripe<S, T>(
    source: &S,
    stripe: Vec<(usize, &mut [T])>,
    cols: usize,
    stop: &std::sync::atomic::AtomicBool,
    tx: &crossbeam_channel::Sender<JobEvent>,
) -> Result<()>
where
    S: ScanlineSource,
    T: RasterElement,
{
    use std::sync::atomic::Ordering;

    let mut state = source.start_job()?;
    let mut scanline = try_alloc("scanline", cols, 0.0f64)?;

    for (row, out_row) in stripe {
        source.fill_row(&mut state, row, &mut scanline)?;
        T::copy_from_f64(&scanline, out_row);
        let _ = tx.send(JobEvent::RowDone);
        if stop.load(Ordering::Acquire) {
            break;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::ThreadCount;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Writes `row * 100 + col` and counts the rows it filled.
    struct Ramp {
        filled: AtomicUsize,
        fail_at: Option<usize>,
    }

    impl Ramp {
        fn new() -> Self {
            Self {
                filled: AtomicUsize::new(0),
                fail_at: None,
            }
        }
    }

    impl ScanlineSource for Ramp {
        type State = usize;

        fn start_job(&self) -> Result<usize> {
            Ok(0)
        }

        fn fill_row(&self, state: &mut usize, row: usize, out: &mut [f64]) -> Result<()> {
            if self.fail_at == Some(row) {
                return Err(Error::Algorithm(format!("row {row} failed")));
            }
            *state += 1;
            for (col, v) in out.iter_mut().enumerate() {
                *v = (row * 100 + col) as f64;
            }
            self.filled.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }
    }

    fn expected(rows: usize, cols: usize) -> Vec<f64> {
        (0..rows)
            .flat_map(|r| (0..cols).map(move |c| (r * 100 + c) as f64))
            .collect()
    }

    #[test]
    fn test_sequential_fills_all_rows() {
        let pool = WorkerPool::single_threaded();
        let mut out = vec![0.0f64; 7 * 5];
        let mut calls = Vec::new();
        let status = run_scanlines(&pool, &Ramp::new(), 5, &mut out, |done, _| {
            calls.push(done);
            true
        })
        .unwrap();

        assert_eq!(status, GridStatus::Completed);
        assert_eq!(out, expected(7, 5));
        assert_eq!(calls.len(), 7);
        assert_eq!(*calls.last().unwrap(), 1.0);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let pool = WorkerPool::new(ThreadCount::Fixed(4));
        let mut out = vec![0i32; 23 * 9];
        let status = run_scanlines(&pool, &Ramp::new(), 9, &mut out, no_progress).unwrap();

        assert_eq!(status, GridStatus::Completed);
        let want: Vec<i32> = expected(23, 9).into_iter().map(|v| v as i32).collect();
        assert_eq!(out, want);
    }

    #[test]
    fn test_progress_is_monotonic_and_complete() {
        let pool = WorkerPool::new(ThreadCount::Fixed(3));
        let mut out = vec![0.0f32; 40 * 4];
        let mut last = 0.0;
        let mut count = 0;
        run_scanlines(&pool, &Ramp::new(), 4, &mut out, |done, _| {
            assert!(done > last);
            last = done;
            count += 1;
            true
        })
        .unwrap();
        assert_eq!(count, 40);
        assert_eq!(last, 1.0);
    }

    #[test]
    fn test_cancel_stops_early() {
        for threads in [1, 4] {
            let pool = WorkerPool::new(ThreadCount::Fixed(threads));
            let source = Ramp::new();
            let mut out = vec![0.0f64; 200 * 3];
            let status = run_scanlines(&pool, &source, 3, &mut out, |done, _| done < 0.05).unwrap();

            assert_eq!(status, GridStatus::Cancelled);
            if threads == 1 {
                assert_eq!(source.filled.load(Ordering::Relaxed), 10);
            }
        }
    }

    #[test]
    fn test_failure_is_reported() {
        for threads in [1, 3] {
            let pool = WorkerPool::new(ThreadCount::Fixed(threads));
            let source = Ramp {
                filled: AtomicUsize::new(0),
                fail_at: Some(5),
            };
            let mut out = vec![0u8; 12 * 2];
            let err = run_scanlines(&pool, &source, 2, &mut out, no_progress).unwrap_err();
            assert!(matches!(err, Error::Algorithm(_)));
        }
    }

    #[test]
    fn test_rejects_ragged_buffer() {
        let pool = WorkerPool::single_threaded();
        let mut out = vec![0.0f64; 10];
        assert!(run_scanlines(&pool, &Ramp::new(), 3, &mut out, no_progress).is_err());
        assert!(run_scanlines(&pool, &Ramp::new(), 0, &mut out, no_progress).is_err());
    }
}
