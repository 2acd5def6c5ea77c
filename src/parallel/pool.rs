//! Rayon thread pool configuration for battle replay workloads.
//!
//! Use [WorkerPool::install] to run seed sweeps or bulk snapshot resumes with a
//! fixed number of threads, or rely on Rayon's default (all CPU cores).

use log::warn;
use rayon::ThreadPoolBuilder;

/// Configures how many worker threads are used for parallel replay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerPool {
    /// Number of worker threads. If 0, use Rayon default (num_cpus).
    pub workers: usize,
}

impl WorkerPool {
    /// Use all available CPU cores (Rayon default).
    pub fn default_workers() -> Self {
        Self::default()
    }

    /// Use exactly `n` worker threads.
    pub fn with_workers(n: usize) -> Self {
        Self { workers: n }
    }

    /// Threads work is actually spread over.
    pub fn effective_workers(&self) -> usize {
        if self.workers == 0 {
            rayon::current_num_threads()
        } else {
            self.workers
        }
    }

    /// Run a closure on a thread pool with this worker count. If [workers](WorkerPool::workers) is 0,
    /// uses the global Rayon pool. A pool that cannot be built also falls back to the global one.
    pub fn install<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R + Send,
        R: Send,
    {
        if self.workers == 0 {
            return f();
        }
        match ThreadPoolBuilder::new().num_threads(self.workers).build() {
            Ok(pool) => pool.install(f),
            Err(err) => {
                warn!("could not build {}-thread pool ({err}); using global pool", self.workers);
                f()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_pool_runs_closure() {
        let pool = WorkerPool::with_workers(2);
        assert_eq!(pool.install(rayon::current_num_threads), 2);
        assert_eq!(pool.effective_workers(), 2);
    }
}
