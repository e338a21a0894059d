//! Worker pool for crawl rounds
//!
//! The executor runs one handler over every item of a round, either on the
//! caller's thread in input order or on a bounded set of worker threads that
//! drain a shared FIFO queue. Handler failures (errors and panics) are
//! isolated per item; they are counted, logged, and never stop the queue from
//! draining.
//!
//! Shutdown is cooperative: a worker finishes its current item, sees the
//! shutdown flag, and exits without taking more work.

use crate::UnfurlError;
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;
use thiserror::Error;

/// How long an idle worker waits for more work before exiting
pub const DEFAULT_IDLE_GRACE: Duration = Duration::from_millis(500);

/// Errors that abort a whole round, as opposed to a single item
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("Failed to start any worker thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("All workers exited with {remaining} item(s) still outstanding")]
    Stalled { remaining: usize },
}

/// Whether items are processed on worker threads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    Threaded,
    Unthreaded,
}

/// Per-round tally returned by [`Executor::work_on`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkSummary {
    /// Items the handler ran on, successfully or not
    pub processed: usize,

    /// Items whose handler returned an error or panicked
    pub failed: usize,

    /// Items never started because the pool was shut down
    pub abandoned: usize,
}

type Handler<T> = dyn Fn(&T) -> Result<(), UnfurlError> + Send + Sync;

#[derive(Debug, Default)]
struct Counters {
    live_workers: usize,
    outstanding: usize,
    processed: usize,
    failed: usize,
}

/// State shared between the executor and its workers
#[derive(Debug, Default)]
struct PoolState {
    shutdown: AtomicBool,
    counters: Mutex<Counters>,
    changed: Condvar,
}

impl PoolState {
    // Counter updates never panic while holding the lock, so a poisoned
    // mutex still holds consistent data.
    fn lock(&self) -> MutexGuard<'_, Counters> {
        self.counters.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    fn finish_item(&self, ok: bool) {
        let mut counters = self.lock();
        counters.outstanding = counters.outstanding.saturating_sub(1);
        counters.processed += 1;
        if !ok {
            counters.failed += 1;
        }
        drop(counters);
        self.changed.notify_all();
    }

    fn worker_exited(&self) {
        let mut counters = self.lock();
        counters.live_workers = counters.live_workers.saturating_sub(1);
        drop(counters);
        self.changed.notify_all();
    }
}

/// Requests shutdown of an executor from another thread without waiting
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    pool: Arc<PoolState>,
}

impl ShutdownHandle {
    /// Sets the cancellation flag; workers exit after their current item
    pub fn signal(&self) {
        self.pool.shutdown.store(true, Ordering::Release);
        self.pool.changed.notify_all();
    }
}

/// Bounded worker pool running one handler over a round of items
pub struct Executor<T> {
    handler: Arc<Handler<T>>,
    mode: ExecutionMode,
    max_workers: usize,
    idle_grace: Duration,
    pool: Arc<PoolState>,
    round: Mutex<()>,
}

impl<T: Clone + Send + 'static> Executor<T> {
    /// Creates an executor
    ///
    /// # Arguments
    ///
    /// * `handler` - Called once per item; errors are counted, not propagated
    /// * `mode` - Threaded or unthreaded processing
    /// * `max_workers` - Upper bound on worker threads (clamped to at least 1)
    pub fn new<F>(handler: F, mode: ExecutionMode, max_workers: usize) -> Self
    where
        F: Fn(&T) -> Result<(), UnfurlError> + Send + Sync + 'static,
    {
        Self {
            handler: Arc::new(handler),
            mode,
            max_workers: max_workers.max(1),
            idle_grace: DEFAULT_IDLE_GRACE,
            pool: Arc::new(PoolState::default()),
            round: Mutex::new(()),
        }
    }

    /// Sets how long an idle worker waits on an empty queue before exiting
    pub fn with_idle_grace(mut self, idle_grace: Duration) -> Self {
        self.idle_grace = idle_grace;
        self
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            pool: Arc::clone(&self.pool),
        }
    }

    /// Processes every item once and blocks until the round is done
    ///
    /// The round is done when every item has been handled, or when the pool
    /// was shut down (remaining items are reported as abandoned). A pool that
    /// is already shut down abandons the whole round; call [`Executor::rearm`]
    /// first to run it.
    ///
    /// In unthreaded mode items are handled in input order on this thread.
    /// In threaded mode there is no ordering guarantee.
    pub fn work_on(&self, items: &[T]) -> Result<WorkSummary, ExecutorError> {
        let _round = self.round.lock().unwrap_or_else(PoisonError::into_inner);

        if items.is_empty() {
            return Ok(WorkSummary::default());
        }

        match self.mode {
            ExecutionMode::Unthreaded => Ok(self.run_unthreaded(items)),
            ExecutionMode::Threaded => self.run_threaded(items),
        }
    }

    /// Clears a previous shutdown so the next round runs
    pub fn rearm(&self) {
        self.pool.shutdown.store(false, Ordering::Release);
    }

    /// Stops the pool and blocks until every worker has exited
    ///
    /// Idempotent, and a no-op when no round is running.
    pub fn shutdown(&self) {
        self.shutdown_handle().signal();

        let mut counters = self.pool.lock();
        while counters.live_workers > 0 {
            tracing::debug!("Waiting for {} worker(s) to exit", counters.live_workers);
            counters = self
                .pool
                .changed
                .wait(counters)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    fn run_unthreaded(&self, items: &[T]) -> WorkSummary {
        let mut summary = WorkSummary::default();

        for (index, item) in items.iter().enumerate() {
            if self.pool.is_shutdown() {
                summary.abandoned = items.len() - index;
                tracing::info!("Shutdown requested, {} item(s) skipped", summary.abandoned);
                break;
            }

            summary.processed += 1;
            if !invoke(self.handler.as_ref(), item, "main") {
                summary.failed += 1;
            }
        }

        summary
    }

    fn run_threaded(&self, items: &[T]) -> Result<WorkSummary, ExecutorError> {
        {
            let mut counters = self.pool.lock();
            counters.outstanding = items.len();
            counters.processed = 0;
            counters.failed = 0;
        }

        let (sender, receiver) = unbounded::<T>();
        for item in items {
            // Cannot fail while `receiver` is alive
            let _ = sender.send(item.clone());
        }

        let worker_count = self.max_workers.min(items.len());
        let started = self.spawn_workers(worker_count, &receiver)?;
        drop(receiver);

        tracing::debug!(
            "Dispatched {} item(s) to {} worker(s)",
            items.len(),
            started
        );

        let mut counters = self.pool.lock();
        while counters.outstanding > 0 && counters.live_workers > 0 {
            counters = self
                .pool
                .changed
                .wait(counters)
                .unwrap_or_else(PoisonError::into_inner);
        }

        let summary = WorkSummary {
            processed: counters.processed,
            failed: counters.failed,
            abandoned: counters.outstanding,
        };
        drop(counters);

        // Closing the queue lets idle workers exit without waiting out the grace period
        drop(sender);

        if summary.abandoned > 0 && !self.pool.is_shutdown() {
            return Err(ExecutorError::Stalled {
                remaining: summary.abandoned,
            });
        }

        Ok(summary)
    }

    fn spawn_workers(&self, count: usize, queue: &Receiver<T>) -> Result<usize, ExecutorError> {
        let mut started = 0;

        for id in 0..count {
            // Count the worker before it exists so shutdown() always waits for it
            self.pool.lock().live_workers += 1;

            let worker = Worker {
                id,
                queue: queue.clone(),
                handler: Arc::clone(&self.handler),
                pool: Arc::clone(&self.pool),
                idle_grace: self.idle_grace,
            };

            let spawned = thread::Builder::new()
                .name(format!("unfurl-worker-{}", id))
                .spawn(move || worker.run());

            match spawned {
                Ok(_) => started += 1,
                Err(e) => {
                    self.pool.worker_exited();
                    if started == 0 {
                        return Err(ExecutorError::Spawn(e));
                    }
                    tracing::warn!("Started only {} of {} workers: {}", started, count, e);
                    break;
                }
            }
        }

        Ok(started)
    }
}

struct Worker<T> {
    id: usize,
    queue: Receiver<T>,
    handler: Arc<Handler<T>>,
    pool: Arc<PoolState>,
    idle_grace: Duration,
}

impl<T> Worker<T> {
    fn run(self) {
        let _exit = ExitGuard(&self.pool);
        let name = format!("worker-{}", self.id);

        while !self.pool.is_shutdown() {
            match self.queue.recv_timeout(self.idle_grace) {
                Ok(item) => {
                    let ok = invoke(self.handler.as_ref(), &item, &name);
                    self.pool.finish_item(ok);
                }
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        tracing::trace!("{} exiting", name);
    }
}

/// Decrements the live-worker count however the worker leaves its loop
struct ExitGuard<'a>(&'a PoolState);

impl Drop for ExitGuard<'_> {
    fn drop(&mut self) {
        self.0.worker_exited();
    }
}

/// Runs the handler on one item; returns false if it failed or panicked
fn invoke<T>(handler: &Handler<T>, item: &T, worker: &str) -> bool {
    match catch_unwind(AssertUnwindSafe(|| handler(item))) {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            tracing::warn!("[{}] item failed: {}", worker, e);
            false
        }
        Err(panic) => {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            tracing::error!("[{}] handler panicked: {}", worker, message);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::AtomicUsize;
    use std::time::Instant;

    fn counting_executor(
        mode: ExecutionMode,
        max_workers: usize,
    ) -> (Executor<usize>, Arc<Mutex<HashMap<usize, usize>>>) {
        let seen = Arc::new(Mutex::new(HashMap::new()));
        let seen_in_handler = Arc::clone(&seen);
        let executor = Executor::new(
            move |item: &usize| {
                *seen_in_handler.lock().unwrap().entry(*item).or_insert(0) += 1;
                Ok(())
            },
            mode,
            max_workers,
        )
        .with_idle_grace(Duration::from_millis(50));
        (executor, seen)
    }

    #[test]
    fn test_unthreaded_preserves_input_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let order_in_handler = Arc::clone(&order);
        let executor = Executor::new(
            move |item: &usize| {
                order_in_handler.lock().unwrap().push(*item);
                Ok(())
            },
            ExecutionMode::Unthreaded,
            4,
        );

        let items: Vec<usize> = vec![5, 3, 9, 1, 7];
        let summary = executor.work_on(&items).unwrap();

        assert_eq!(*order.lock().unwrap(), items);
        assert_eq!(summary.processed, 5);
        assert_eq!(summary.failed, 0);
    }

    #[test]
    fn test_unthreaded_runs_on_calling_thread() {
        let caller = thread::current().id();
        let executor = Executor::new(
            move |_: &usize| {
                assert_eq!(thread::current().id(), caller);
                Ok(())
            },
            ExecutionMode::Unthreaded,
            1,
        );
        let summary = executor.work_on(&[1, 2, 3]).unwrap();
        assert_eq!(summary.failed, 0);
    }

    #[test]
    fn test_threaded_processes_each_item_exactly_once() {
        for max_workers in [1, 2, 3, 8, 64] {
            let (executor, seen) = counting_executor(ExecutionMode::Threaded, max_workers);
            let items: Vec<usize> = (0..100).collect();

            let summary = executor.work_on(&items).unwrap();

            assert_eq!(summary.processed, 100, "max_workers={}", max_workers);
            assert_eq!(summary.abandoned, 0);
            let seen = seen.lock().unwrap();
            assert_eq!(seen.len(), 100);
            assert!(seen.values().all(|count| *count == 1));
        }
    }

    #[test]
    fn test_threaded_uses_multiple_threads() {
        let threads = Arc::new(Mutex::new(std::collections::HashSet::new()));
        let threads_in_handler = Arc::clone(&threads);
        let executor = Executor::new(
            move |_: &usize| {
                threads_in_handler
                    .lock()
                    .unwrap()
                    .insert(thread::current().id());
                thread::sleep(Duration::from_millis(20));
                Ok(())
            },
            ExecutionMode::Threaded,
            4,
        );

        executor.work_on(&(0..16).collect::<Vec<_>>()).unwrap();
        assert!(threads.lock().unwrap().len() > 1);
        assert!(!threads.lock().unwrap().contains(&thread::current().id()));
    }

    #[test]
    fn test_empty_round() {
        let (executor, seen) = counting_executor(ExecutionMode::Threaded, 4);
        let summary = executor.work_on(&[]).unwrap();
        assert_eq!(summary, WorkSummary::default());
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_handler_errors_do_not_stop_draining() {
        for mode in [ExecutionMode::Unthreaded, ExecutionMode::Threaded] {
            let calls = Arc::new(AtomicUsize::new(0));
            let calls_in_handler = Arc::clone(&calls);
            let executor = Executor::new(
                move |item: &usize| {
                    calls_in_handler.fetch_add(1, Ordering::SeqCst);
                    if item % 3 == 0 {
                        return Err(UnfurlError::NoSuchRecord {
                            resource_id: item.to_string(),
                        });
                    }
                    Ok(())
                },
                mode,
                3,
            )
            .with_idle_grace(Duration::from_millis(50));

            let summary = executor.work_on(&(0..30).collect::<Vec<_>>()).unwrap();

            assert_eq!(calls.load(Ordering::SeqCst), 30);
            assert_eq!(summary.processed, 30);
            assert_eq!(summary.failed, 10);
        }
    }

    #[test]
    fn test_handler_panics_are_isolated() {
        for mode in [ExecutionMode::Unthreaded, ExecutionMode::Threaded] {
            let calls = Arc::new(AtomicUsize::new(0));
            let calls_in_handler = Arc::clone(&calls);
            let executor = Executor::new(
                move |item: &usize| {
                    calls_in_handler.fetch_add(1, Ordering::SeqCst);
                    if *item == 4 {
                        panic!("boom on {}", item);
                    }
                    Ok(())
                },
                mode,
                2,
            )
            .with_idle_grace(Duration::from_millis(50));

            let summary = executor.work_on(&(0..10).collect::<Vec<_>>()).unwrap();

            assert_eq!(calls.load(Ordering::SeqCst), 10);
            assert_eq!(summary.failed, 1);
        }
    }

    #[test]
    fn test_pool_is_reusable_across_rounds() {
        let (executor, seen) = counting_executor(ExecutionMode::Threaded, 3);
        let items: Vec<usize> = (0..10).collect();

        executor.work_on(&items).unwrap();
        executor.shutdown();
        executor.rearm();
        executor.work_on(&items).unwrap();

        assert!(seen.lock().unwrap().values().all(|count| *count == 2));
    }

    #[test]
    fn test_shutdown_is_idempotent_and_safe_when_idle() {
        let (executor, _) = counting_executor(ExecutionMode::Threaded, 2);
        executor.shutdown();
        executor.shutdown();

        executor.rearm();
        executor.work_on(&[1, 2, 3]).unwrap();
        executor.shutdown();
        executor.shutdown();
    }

    #[test]
    fn test_shut_down_pool_stays_down_until_rearmed() {
        for mode in [ExecutionMode::Unthreaded, ExecutionMode::Threaded] {
            let (executor, seen) = counting_executor(mode, 2);
            executor.shutdown_handle().signal();

            let summary = executor.work_on(&[1, 2, 3]).unwrap();
            assert_eq!(summary.processed, 0);
            assert_eq!(summary.abandoned, 3);
            assert!(seen.lock().unwrap().is_empty());

            executor.rearm();
            let summary = executor.work_on(&[1, 2, 3]).unwrap();
            assert_eq!(summary.processed, 3);
            assert_eq!(seen.lock().unwrap().len(), 3);
        }
    }

    #[test]
    fn test_shutdown_waits_for_workers_after_round() {
        let (executor, _) = counting_executor(ExecutionMode::Threaded, 8);
        executor.work_on(&(0..50).collect::<Vec<_>>()).unwrap();

        let started = Instant::now();
        executor.shutdown();

        assert_eq!(executor.pool.lock().live_workers, 0);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_shutdown_mid_round_abandons_remaining_items() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_in_handler = Arc::clone(&calls);
        let executor = Arc::new(
            Executor::new(
                move |_: &usize| {
                    calls_in_handler.fetch_add(1, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(50));
                    Ok(())
                },
                ExecutionMode::Threaded,
                2,
            )
            .with_idle_grace(Duration::from_millis(50)),
        );

        let handle = executor.shutdown_handle();
        let stopper = thread::spawn(move || {
            thread::sleep(Duration::from_millis(120));
            handle.signal();
        });

        let started = Instant::now();
        let summary = executor.work_on(&(0..100).collect::<Vec<_>>()).unwrap();
        stopper.join().unwrap();
        executor.shutdown();

        assert!(started.elapsed() < Duration::from_secs(3));
        assert!(summary.abandoned > 0);
        assert_eq!(summary.processed + summary.abandoned, 100);
        assert_eq!(calls.load(Ordering::SeqCst), summary.processed);
    }

    #[test]
    fn test_unthreaded_shutdown_from_handler_skips_rest() {
        let slot: Arc<Mutex<Option<ShutdownHandle>>> = Arc::new(Mutex::new(None));
        let handle_slot = Arc::clone(&slot);
        let pool = Executor::new(
            move |item: &usize| {
                if *item == 2 {
                    if let Some(handle) = handle_slot.lock().unwrap().as_ref() {
                        handle.signal();
                    }
                }
                Ok(())
            },
            ExecutionMode::Unthreaded,
            1,
        );
        *slot.lock().unwrap() = Some(pool.shutdown_handle());

        let summary = pool.work_on(&[0, 1, 2, 3, 4]).unwrap();
        assert_eq!(summary.processed, 3);
        assert_eq!(summary.abandoned, 2);
    }

    #[test]
    fn test_max_workers_clamped_to_one() {
        let (executor, seen) = counting_executor(ExecutionMode::Threaded, 0);
        assert_eq!(executor.max_workers(), 1);
        executor.work_on(&[1, 2, 3]).unwrap();
        assert_eq!(seen.lock().unwrap().len(), 3);
    }
}
