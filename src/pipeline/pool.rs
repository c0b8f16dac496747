//! Worker pool for independent units of work
//!
//! A thin lifecycle around a rayon thread pool. The pool is created by
//! `start()` and released by `shutdown()`; tasks that panic are reported
//! as failures instead of tearing down the batch.

use log::{debug, info};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::error::{ChipError, ChipResult};

/// Explicitly started and stopped thread pool
pub struct WorkerPool {
    threads: usize,
    pool: Option<ThreadPool>,
}

/// Text of a panic payload
fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl WorkerPool {
    /// Pool with `threads` workers; 0 lets rayon pick one per core
    pub fn new(threads: usize) -> Self {
        WorkerPool { threads, pool: None }
    }

    pub fn start(&mut self) -> ChipResult<()> {
        if self.pool.is_some() {
            return Ok(());
        }
        let pool = ThreadPoolBuilder::new()
            .num_threads(self.threads)
            .thread_name(|index| format!("chipkit-worker-{}", index))
            .build()
            .map_err(|e| ChipError::Config(format!("Failed to start worker pool: {}", e)))?;
        info!("Started worker pool with {} threads", pool.current_num_threads());
        self.pool = Some(pool);
        Ok(())
    }

    /// Release the worker threads; running tasks are waited for
    pub fn shutdown(&mut self) {
        if self.pool.take().is_some() {
            debug!("Worker pool shut down");
        }
    }

    pub fn is_running(&self) -> bool {
        self.pool.is_some()
    }

    pub fn current_num_threads(&self) -> usize {
        self.pool.as_ref().map_or(0, ThreadPool::current_num_threads)
    }

    /// Run `task` over every item and wait for all of them
    ///
    /// Results keep the order of `items`. A task that panics yields
    /// `Err` with the panic message.
    pub fn run_all<T, R, F>(&self, items: Vec<T>, task: F) -> ChipResult<Vec<Result<R, String>>>
    where
        T: Send,
        R: Send,
        F: Fn(T) -> R + Sync,
    {
        let pool = self.pool.as_ref()
            .ok_or_else(|| ChipError::Config("Worker pool is not started".to_string()))?;

        Ok(pool.install(|| {
            items.into_par_iter()
                .map(|item| catch_unwind(AssertUnwindSafe(|| task(item))).map_err(panic_message))
                .collect()
        }))
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_lifecycle() {
        let mut pool = WorkerPool::new(2);
        assert!(!pool.is_running());
        assert!(pool.run_all(vec![1], |x: i32| x).is_err());

        pool.start().unwrap();
        assert!(pool.is_running());
        assert_eq!(pool.current_num_threads(), 2);

        pool.shutdown();
        assert!(!pool.is_running());
    }

    #[test]
    fn test_results_keep_order() {
        let mut pool = WorkerPool::new(4);
        pool.start().unwrap();
        let results = pool.run_all((0..50).collect(), |x: u32| x * 2).unwrap();
        let values: Vec<u32> = results.into_iter().map(Result::unwrap).collect();
        assert_eq!(values, (0..50).map(|x| x * 2).collect::<Vec<_>>());
    }

    #[test]
    fn test_panics_are_contained() {
        let mut pool = WorkerPool::new(2);
        pool.start().unwrap();
        let completed = AtomicUsize::new(0);

        let results = pool.run_all(vec![1, 2, 3, 4], |x: u32| {
            if x == 3 {
                panic!("unit {} exploded", x);
            }
            completed.fetch_add(1, Ordering::SeqCst);
            x
        }).unwrap();

        assert_eq!(completed.load(Ordering::SeqCst), 3);
        assert_eq!(results[2], Err("unit 3 exploded".to_string()));
        assert_eq!(results[3], Ok(4));
    }
}
