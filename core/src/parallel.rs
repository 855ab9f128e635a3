//! Static fan-out over workers.
//!
//! Work items are handed out round-robin: item `i` belongs to the worker whose
//! global id equals `i mod worker_count`. The global id of a thread is
//! `process_rank * thread_count + thread`, so several cooperating processes can
//! split the same item list without talking to each other.

use crate::{config::GugaConfig, error::GugaError};

/// Whether item `index` belongs to worker `worker_id` out of `worker_count`.
#[inline]
pub fn partition(index: usize, worker_id: usize, worker_count: usize) -> bool {
    index % worker_count == worker_id
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorkerLayout {
    pub process_rank: usize,
    pub process_count: usize,
    pub thread_count: usize,
}

impl WorkerLayout {
    /// Fails if this process isn't one of the `process_count` cooperating
    /// processes, it would own no work at all.
    pub fn from_config(config: &GugaConfig) -> Result<Self, GugaError> {
        if config.process_rank >= config.process_count {
            return Err(GugaError::InvalidWorkerLayout {
                process_rank: config.process_rank,
                process_count: config.process_count,
            });
        }

        Ok(Self {
            process_rank: config.process_rank,
            process_count: config.process_count,
            thread_count: config.thread_count(),
        })
    }

    pub fn worker_count(&self) -> usize {
        self.process_count * self.thread_count
    }

    pub fn worker_id(&self, thread: usize) -> usize {
        self.process_rank * self.thread_count + thread
    }

    /// Runs `work` once per local thread with that thread's global worker id and
    /// collects the results in thread order. The first error aborts the whole
    /// fan-out.
    pub(crate) fn fan_out<T, F>(&self, work: F) -> Result<Vec<T>, GugaError>
    where
        T: Send,
        F: Fn(usize) -> Result<T, GugaError> + Sync,
    {
        let worker_count = self.worker_count();
        log::debug!(
            "fanning out over {} local threads ({worker_count} workers in total)",
            self.thread_count
        );

        #[cfg(feature = "rayon")]
        let results = {
            use rayon::iter::{IntoParallelIterator, ParallelIterator};

            (0..self.thread_count)
                .into_par_iter()
                .map(|thread| work(self.worker_id(thread)))
                .collect::<Result<Vec<_>, _>>()
        };

        #[cfg(not(feature = "rayon"))]
        let results = (0..self.thread_count)
            .map(|thread| work(self.worker_id(thread)))
            .collect::<Result<Vec<_>, _>>();

        results
    }
}
