//! Worker pool sizing and creation

use std::fmt;
use std::str::FromStr;

use gridder_core::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Hard upper bound on the number of worker threads.
pub const MAX_THREADS: usize = 128;

/// Requested number of worker threads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ThreadCount {
    /// One thread per logical core
    #[default]
    AllCpus,
    /// A fixed number of threads
    Fixed(usize),
}

impl ThreadCount {
    /// Number of threads this request resolves to on the current machine,
    /// clamped to `1..=MAX_THREADS`.
    pub fn resolve(self) -> usize {
        let n = match self {
            ThreadCount::AllCpus => std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            ThreadCount::Fixed(n) => n,
        };
        n.clamp(1, MAX_THREADS)
    }
}

impl FromStr for ThreadCount {
    type Err = Error;

    /// Accepts `ALL_CPUS` (any case) or a positive integer.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("ALL_CPUS") {
            return Ok(ThreadCount::AllCpus);
        }
        match s.parse::<usize>() {
            Ok(n) if n > 0 => Ok(ThreadCount::Fixed(n)),
            _ => Err(Error::invalid(
                "threads",
                s,
                "expected ALL_CPUS or a positive integer",
            )),
        }
    }
}

impl fmt::Display for ThreadCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThreadCount::AllCpus => f.write_str("ALL_CPUS"),
            ThreadCount::Fixed(n) => write!(f, "{n}"),
        }
    }
}

/// A fixed-size pool of OS threads.
///
/// Falls back to single-threaded execution on the calling thread when only
/// one thread is requested or the pool cannot be created.
pub struct WorkerPool {
    #[cfg(feature = "parallel")]
    pool: Option<rayon::ThreadPool>,
    threads: usize,
}

impl WorkerPool {
    /// Create a pool for the requested thread count
    pub fn new(threads: ThreadCount) -> Self {
        let n = threads.resolve();
        if n <= 1 {
            return Self::single_threaded();
        }
        Self::build(n)
    }

    #[cfg(feature = "parallel")]
    fn build(n: usize) -> Self {
        match rayon::ThreadPoolBuilder::new()
            .num_threads(n)
            .thread_name(|i| format!("gridder-worker-{i}"))
            .build()
        {
            Ok(pool) => {
                debug!(threads = n, "created worker pool");
                Self {
                    pool: Some(pool),
                    threads: n,
                }
            }
            Err(e) => {
                warn!("could not create a pool of {n} threads, running single-threaded: {e}");
                Self::single_threaded()
            }
        }
    }

    #[cfg(not(feature = "parallel"))]
    fn build(n: usize) -> Self {
        debug!(requested = n, "built without parallel support, running single-threaded");
        Self::single_threaded()
    }

    /// A pool that runs everything on the calling thread
    pub fn single_threaded() -> Self {
        Self {
            #[cfg(feature = "parallel")]
            pool: None,
            threads: 1,
        }
    }

    /// Number of threads jobs are spread over
    pub fn threads(&self) -> usize {
        self.threads
    }

    #[cfg(feature = "parallel")]
    pub(crate) fn rayon(&self) -> Option<&rayon::ThreadPool> {
        self.pool.as_ref()
    }
}

impl fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("threads", &self.threads)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_thread_count() {
        assert_eq!("ALL_CPUS".parse::<ThreadCount>().unwrap(), ThreadCount::AllCpus);
        assert_eq!("all_cpus".parse::<ThreadCount>().unwrap(), ThreadCount::AllCpus);
        assert_eq!(" 4 ".parse::<ThreadCount>().unwrap(), ThreadCount::Fixed(4));
        assert!("0".parse::<ThreadCount>().is_err());
        assert!("many".parse::<ThreadCount>().is_err());
    }

    #[test]
    fn test_resolve_is_capped() {
        assert_eq!(ThreadCount::Fixed(1000).resolve(), MAX_THREADS);
        assert_eq!(ThreadCount::Fixed(0).resolve(), 1);
        assert!(ThreadCount::AllCpus.resolve() >= 1);
    }

    #[test]
    fn test_single_threaded_pool() {
        let pool = WorkerPool::new(ThreadCount::Fixed(1));
        assert_eq!(pool.threads(), 1);
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn test_multi_threaded_pool() {
        let pool = WorkerPool::new(ThreadCount::Fixed(3));
        assert_eq!(pool.threads(), 3);
        assert!(pool.rayon().is_some());
    }
}
