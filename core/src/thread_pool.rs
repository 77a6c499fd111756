//! A fixed-size worker pool for batch object construction.
//!
//! The pool executes fire-and-forget jobs on a fixed set of worker threads.
//! [`ThreadPool::wait_for_all`] is the only synchronization barrier offered:
//! there is no cancellation and no timeout. A job that blocks indefinitely
//! blocks the barrier with it.
//!
//! # Example
//!
//! ```
//! use vermilion_core::ThreadPool;
//! use std::sync::mpsc;
//!
//! let pool = ThreadPool::new(4);
//! let (tx, rx) = mpsc::channel();
//!
//! for i in 0..4u32 {
//!     let tx = tx.clone();
//!     pool.spawn(move || {
//!         tx.send(i * 10).ok();
//!     });
//! }
//! drop(tx);
//! pool.wait_for_all();
//!
//! let mut results: Vec<u32> = rx.iter().collect();
//! results.sort();
//! assert_eq!(results, vec![0, 10, 20, 30]);
//! ```

use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::{Condvar, Mutex};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Shared bookkeeping between the pool handle and its workers.
struct PoolState {
    pending: Mutex<usize>,
    idle: Condvar,
}

impl PoolState {
    fn finish_one(&self) {
        let mut pending = self.pending.lock();
        *pending -= 1;
        if *pending == 0 {
            self.idle.notify_all();
        }
    }
}

/// Decrements the pending counter even if the job panics, so a panicking
/// job cannot wedge `wait_for_all`.
struct FinishGuard<'a>(&'a PoolState);

impl Drop for FinishGuard<'_> {
    fn drop(&mut self) {
        self.0.finish_one();
    }
}

/// A fixed-size pool of worker threads.
///
/// Jobs are enqueued with [`spawn`](Self::spawn) and run in submission order
/// across however many workers the pool owns. The pool is `Send + Sync` and
/// is typically shared behind an `Arc`.
pub struct ThreadPool {
    sender: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
    state: Arc<PoolState>,
    num_threads: usize,
}

impl ThreadPool {
    /// Creates a pool with the given number of worker threads.
    ///
    /// A count of zero is clamped to one.
    pub fn new(num_threads: usize) -> Self {
        let num_threads = num_threads.max(1);
        let (sender, receiver) = channel::<Job>();
        let receiver = Arc::new(Mutex::new(receiver));
        let state = Arc::new(PoolState {
            pending: Mutex::new(0),
            idle: Condvar::new(),
        });

        let workers = (0..num_threads)
            .map(|i| {
                let receiver = Arc::clone(&receiver);
                let state = Arc::clone(&state);
                std::thread::Builder::new()
                    .name(format!("vermilion-worker-{i}"))
                    .spawn(move || worker_loop(&receiver, &state))
                    .unwrap_or_else(|e| panic!("failed to spawn worker thread: {e}"))
            })
            .collect();

        Self {
            sender: Some(sender),
            workers,
            state,
            num_threads,
        }
    }

    /// Creates a pool sized to the number of available CPU cores.
    pub fn default_threads() -> Self {
        Self::new(std::thread::available_parallelism().map_or(1, |n| n.get()))
    }

    /// Enqueues a job for execution on one of the workers.
    ///
    /// Submission is fire-and-forget; results must travel through a channel
    /// or another owned side-channel set up by the caller.
    pub fn spawn<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        {
            let mut pending = self.state.pending.lock();
            *pending += 1;
        }
        // The sender only becomes None in drop(), after which no spawn can
        // be issued through a live handle.
        if let Some(sender) = &self.sender {
            if sender.send(Box::new(job)).is_err() {
                self.state.finish_one();
                log::error!("thread pool queue is closed; job dropped");
            }
        }
    }

    /// Blocks until every job spawned so far has finished.
    pub fn wait_for_all(&self) {
        let mut pending = self.state.pending.lock();
        while *pending > 0 {
            self.state.idle.wait(&mut pending);
        }
    }

    /// The number of worker threads owned by this pool.
    pub fn num_threads(&self) -> usize {
        self.num_threads
    }
}

impl Default for ThreadPool {
    fn default() -> Self {
        Self::default_threads()
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        // Closing the channel lets each worker's recv() fail and exit.
        self.sender.take();
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                log::error!("thread pool worker panicked during shutdown");
            }
        }
    }
}

fn worker_loop(receiver: &Mutex<Receiver<Job>>, state: &PoolState) {
    loop {
        let job = {
            let receiver = receiver.lock();
            receiver.recv()
        };
        match job {
            Ok(job) => {
                let _guard = FinishGuard(state);
                if std::panic::catch_unwind(std::panic::AssertUnwindSafe(job)).is_err() {
                    log::error!("thread pool job panicked");
                }
            }
            // Channel closed: the pool is shutting down.
            Err(_) => return,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn runs_single_job() {
        let pool = ThreadPool::new(2);
        let counter = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&counter);
        pool.spawn(move || {
            c.fetch_add(1, Ordering::Relaxed);
        });
        pool.wait_for_all();
        assert_eq!(counter.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn runs_many_jobs() {
        let pool = ThreadPool::new(4);
        let counter = Arc::new(AtomicU32::new(0));
        for _ in 0..100 {
            let c = Arc::clone(&counter);
            pool.spawn(move || {
                c.fetch_add(1, Ordering::Relaxed);
            });
        }
        pool.wait_for_all();
        assert_eq!(counter.load(Ordering::Relaxed), 100);
    }

    #[test]
    fn wait_with_no_jobs_returns_immediately() {
        let pool = ThreadPool::new(2);
        pool.wait_for_all();
    }

    #[test]
    fn barrier_can_be_reused() {
        let pool = ThreadPool::new(2);
        let counter = Arc::new(AtomicU32::new(0));

        for _ in 0..10 {
            let c = Arc::clone(&counter);
            pool.spawn(move || {
                c.fetch_add(1, Ordering::Relaxed);
            });
        }
        pool.wait_for_all();
        assert_eq!(counter.load(Ordering::Relaxed), 10);

        for _ in 0..10 {
            let c = Arc::clone(&counter);
            pool.spawn(move || {
                c.fetch_add(1, Ordering::Relaxed);
            });
        }
        pool.wait_for_all();
        assert_eq!(counter.load(Ordering::Relaxed), 20);
    }

    #[test]
    fn panicking_job_does_not_wedge_barrier() {
        let pool = ThreadPool::new(2);
        let counter = Arc::new(AtomicU32::new(0));

        pool.spawn(|| panic!("job failure"));
        let c = Arc::clone(&counter);
        pool.spawn(move || {
            c.fetch_add(1, Ordering::Relaxed);
        });

        pool.wait_for_all();
        assert_eq!(counter.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn zero_threads_clamps_to_one() {
        let pool = ThreadPool::new(0);
        assert_eq!(pool.num_threads(), 1);
    }

    #[test]
    fn default_threads_at_least_one() {
        let pool = ThreadPool::default_threads();
        assert!(pool.num_threads() >= 1);
    }
}
