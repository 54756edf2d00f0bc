//! Parallel processing strategies for per-asset pipelines

use geowatch_core::{Error, Result};
use rayon::prelude::*;

/// How the batch spreads assets over threads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessingMode {
    /// One asset at a time on the calling thread
    Sequential,
    /// Rayon's global pool, all available cores
    #[default]
    Parallel,
    /// A dedicated pool with the given number of threads
    ParallelWith(usize),
}

impl ProcessingMode {
    /// Mode for a configured thread count: 0 means all cores, 1 sequential
    pub fn from_threads(threads: usize) -> Self {
        match threads {
            0 => ProcessingMode::Parallel,
            1 => ProcessingMode::Sequential,
            n => ProcessingMode::ParallelWith(n),
        }
    }
}

/// Strategy for parallel execution
pub trait ParallelStrategy {
    /// Map a function over indices and collect results in index order
    fn par_map<T, F>(&self, range: std::ops::Range<usize>, f: F) -> Result<Vec<T>>
    where
        T: Send,
        F: Fn(usize) -> T + Sync + Send;
}

impl ParallelStrategy for ProcessingMode {
    fn par_map<T, F>(&self, range: std::ops::Range<usize>, f: F) -> Result<Vec<T>>
    where
        T: Send,
        F: Fn(usize) -> T + Sync + Send,
    {
        match self {
            ProcessingMode::Sequential => Ok(range.map(f).collect()),
            ProcessingMode::Parallel => Ok(range.into_par_iter().map(f).collect()),
            ProcessingMode::ParallelWith(threads) => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(*threads)
                    .build()
                    .map_err(|e| Error::Other(format!("failed to build thread pool: {e}")))?;
                Ok(pool.install(|| range.into_par_iter().map(f).collect()))
            }
        }
    }
}

/// Get the number of available CPU cores
pub fn num_cpus() -> usize {
    rayon::current_num_threads()
}
