//! Bounded worker pool for batch jobs (uploads, evaluation queries).
//!
//! The service crate decides what runs; this crate only bounds how many tasks
//! are in flight and reports progress. Results come back in input order, and a
//! failing task never cancels its siblings: each task returns its own outcome
//! value (usually a sentinel on failure) rather than an error.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use rayon::prelude::*;
use thiserror::Error;

/// Upload and evaluation fan-out default.
pub const DEFAULT_WORKERS: usize = 10;

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("worker count must be at least 1")]
    ZeroWorkers,
    #[error("failed to build worker pool: {0}")]
    Build(#[from] rayon::ThreadPoolBuildError),
}

/// Whether to draw a progress bar on stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Progress {
    #[default]
    Visible,
    Hidden,
}

pub struct WorkerPool {
    pool: rayon::ThreadPool,
    workers: usize,
    progress: Progress,
}

impl WorkerPool {
    pub fn new(workers: usize) -> Result<Self, PoolError> {
        if workers == 0 {
            return Err(PoolError::ZeroWorkers);
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("storelens-worker-{i}"))
            .build()?;
        Ok(Self {
            pool,
            workers,
            progress: Progress::Visible,
        })
    }

    pub fn with_progress(mut self, progress: Progress) -> Self {
        self.progress = progress;
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    fn bar(&self, label: &str, len: usize) -> ProgressBar {
        let bar = ProgressBar::new(len as u64);
        match self.progress {
            Progress::Hidden => bar.set_draw_target(ProgressDrawTarget::hidden()),
            Progress::Visible => {
                if let Ok(style) = ProgressStyle::with_template(
                    "{msg:>12} [{elapsed_precise}] {bar:40} {pos}/{len}",
                ) {
                    bar.set_style(style);
                }
            }
        }
        bar.set_message(label.to_string());
        bar
    }

    /// Run `task` over every item with at most `workers` in flight.
    ///
    /// Output order matches input order regardless of completion order.
    pub fn run<T, R, F>(&self, label: &str, items: Vec<T>, task: F) -> Vec<R>
    where
        T: Send,
        R: Send,
        F: Fn(T) -> R + Send + Sync,
    {
        let total = items.len();
        tracing::debug!(label, total, workers = self.workers, "dispatching batch");
        let bar = self.bar(label, total);
        let results = self.pool.install(|| {
            items
                .into_par_iter()
                .map(|item| {
                    let out = task(item);
                    bar.inc(1);
                    out
                })
                .collect::<Vec<_>>()
        });
        bar.finish_and_clear();
        results
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("workers", &self.workers)
            .field("progress", &self.progress)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    fn quiet(workers: usize) -> WorkerPool {
        WorkerPool::new(workers)
            .unwrap()
            .with_progress(Progress::Hidden)
    }

    #[test]
    fn zero_workers_rejected() {
        assert!(matches!(WorkerPool::new(0), Err(PoolError::ZeroWorkers)));
    }

    #[test]
    fn results_keep_input_order() {
        let pool = quiet(4);
        let out = pool.run("square", (0..50u64).collect(), |n| {
            // Later items finish first.
            thread::sleep(Duration::from_micros(50 * (50 - n)));
            n * n
        });
        assert_eq!(out, (0..50u64).map(|n| n * n).collect::<Vec<_>>());
    }

    #[test]
    fn concurrency_is_bounded() {
        let pool = quiet(3);
        let active = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);
        pool.run("bounded", (0..24).collect(), |_: i32| {
            let now = active.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(5));
            active.fetch_sub(1, Ordering::SeqCst);
        });
        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert_eq!(pool.workers(), 3);
    }

    #[test]
    fn failures_do_not_cancel_siblings() {
        let pool = quiet(2);
        let out: Vec<Result<i32, String>> = pool.run("mixed", vec![1, 2, 3, 4], |n| {
            if n % 2 == 0 {
                Err(format!("bad {n}"))
            } else {
                Ok(n)
            }
        });
        assert_eq!(out.iter().filter(|r| r.is_ok()).count(), 2);
        assert_eq!(out[1], Err("bad 2".to_string()));
    }

    #[test]
    fn empty_batch_is_fine() {
        let out: Vec<i32> = quiet(1).run("none", Vec::<i32>::new(), |n| n);
        assert!(out.is_empty());
    }
}
