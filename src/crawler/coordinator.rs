//! Crawler coordinator - repeated crawl rounds
//!
//! This module contains the round loop that coordinates:
//! - Dispatching every target to the worker pool once per round
//! - The per-target fetch, snapshot, dedup and persist step
//! - Sleeping between rounds and stopping after the configured count

use crate::config::CrawlerConfig;
use crate::crawler::executor::{
    ExecutionMode, Executor, ExecutorError, ShutdownHandle, WorkSummary, DEFAULT_IDLE_GRACE,
};
use crate::crawler::{FetchResult, Fetcher, Target};
use crate::snapshot::{build_snapshot, check_duplicate, DedupOutcome, DedupPolicy, Snapshot, StoredSnapshot};
use crate::storage::{SnapshotStore, StorageResult};
use crate::UnfurlError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Scheduling settings for a [`Crawler`]
#[derive(Debug, Clone)]
pub struct CrawlerSettings {
    /// Time to sleep between rounds
    pub period: Duration,

    /// Number of rounds; negative runs until stopped, zero disables crawling
    pub count: i64,

    pub mode: ExecutionMode,

    /// Worker bound in threaded mode
    pub max_workers: usize,

    /// How long an idle worker waits for more work
    pub idle_grace: Duration,

    pub dedup: DedupPolicy,
}

impl Default for CrawlerSettings {
    fn default() -> Self {
        Self::from_config(&CrawlerConfig::default())
    }
}

impl CrawlerSettings {
    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self {
            period: Duration::from_secs(config.period),
            count: config.count,
            mode: if config.threaded {
                ExecutionMode::Threaded
            } else {
                ExecutionMode::Unthreaded
            },
            max_workers: config.max_workers,
            idle_grace: Duration::from_millis(config.idle_grace_ms),
            dedup: config.dedup,
        }
    }

    /// Unthreaded, single round, no sleeping
    pub fn once() -> Self {
        Self {
            period: Duration::ZERO,
            count: 1,
            mode: ExecutionMode::Unthreaded,
            max_workers: 1,
            idle_grace: DEFAULT_IDLE_GRACE,
            dedup: DedupPolicy::default(),
        }
    }
}

/// Totals over every round of one `crawl` call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrawlReport {
    /// Rounds started
    pub rounds: u64,

    /// New snapshots persisted
    pub snapshots_stored: usize,

    /// Snapshots skipped because an equivalent one was already stored
    pub duplicates: usize,

    /// Targets that could not be loaded
    pub fetch_failures: usize,

    /// Targets whose handling failed after loading (e.g. storage errors)
    pub handler_failures: usize,

    /// Rounds aborted by a pool-level error
    pub round_failures: usize,
}

/// What happened to a loaded snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistOutcome {
    /// An equivalent snapshot was already stored; nothing written
    Duplicate,

    /// The snapshot was new and has been stored
    NewSnapshot(StoredSnapshot),
}

/// Persists `snapshot` unless an equivalent one is already stored
pub fn persist_snapshot(
    snapshot: &Snapshot,
    store: &dyn SnapshotStore,
    policy: DedupPolicy,
) -> StorageResult<PersistOutcome> {
    match check_duplicate(snapshot, store, policy)? {
        DedupOutcome::Duplicate(existing) => {
            tracing::debug!(
                "{} unchanged (matches snapshot {}), not storing",
                snapshot.resource_id(),
                existing.id
            );
            Ok(PersistOutcome::Duplicate)
        }
        DedupOutcome::New => {
            let stored = store.insert(snapshot)?;
            tracing::info!(
                "Stored snapshot {} for {} ({} links)",
                stored.id,
                stored.resource_id(),
                stored.links().len()
            );
            Ok(PersistOutcome::NewSnapshot(stored))
        }
    }
}

/// Runs the full per-target step: fetch, build, dedup, persist
///
/// # Returns
///
/// * `Ok(None)` - The target could not be loaded and was skipped
/// * `Ok(Some(outcome))` - A snapshot was built and checked against the store
/// * `Err(UnfurlError)` - The store failed
pub fn crawl_target(
    target: &Target,
    fetcher: &dyn Fetcher,
    store: &dyn SnapshotStore,
    policy: DedupPolicy,
) -> Result<Option<PersistOutcome>, UnfurlError> {
    let links = match fetcher.fetch(target.resource_id(), target.filter()) {
        FetchResult::Success { links } => links,
        FetchResult::Failed { reason } => {
            tracing::warn!("Skipping {}: {}", target.resource_id(), reason);
            return Ok(None);
        }
    };

    let snapshot = build_snapshot(target.resource_id(), target.filter().pattern(), links);
    Ok(Some(persist_snapshot(&snapshot, store, policy)?))
}

#[derive(Debug, Default)]
struct Tally {
    stored: AtomicUsize,
    duplicates: AtomicUsize,
    fetch_failures: AtomicUsize,
}

#[derive(Debug, Default)]
struct StopSignal {
    stopped: Mutex<bool>,
    changed: Condvar,
}

/// Stops a running [`Crawler`] from another thread
///
/// Stopping is permanent: once stopped, later `crawl` calls on the same
/// crawler return without starting a round.
#[derive(Debug, Clone)]
pub struct StopHandle {
    signal: Arc<StopSignal>,
    pool: ShutdownHandle,
}

impl StopHandle {
    /// Ends the crawl at the next round boundary
    ///
    /// A sleeping crawler wakes up immediately; a running round stops handing
    /// out new targets once in-flight ones finish.
    pub fn stop(&self) {
        *self
            .signal
            .stopped
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = true;
        self.signal.changed.notify_all();
        self.pool.signal();
    }

    pub fn is_stopped(&self) -> bool {
        *self
            .signal
            .stopped
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Sleeps for `period` unless stopped first; returns true if stopped
    fn sleep(&self, period: Duration) -> bool {
        let guard = self
            .signal
            .stopped
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let (guard, _) = self
            .signal
            .changed
            .wait_timeout_while(guard, period, |stopped| !*stopped)
            .unwrap_or_else(PoisonError::into_inner);
        *guard
    }
}

type RoundRunner =
    dyn Fn(&Executor<Target>, &[Target]) -> Result<WorkSummary, ExecutorError> + Send + Sync;

/// Runs crawl rounds over a fixed target set
pub struct Crawler {
    settings: CrawlerSettings,
    executor: Executor<Target>,
    run_round: Box<RoundRunner>,
    tally: Arc<Tally>,
    stop: StopHandle,
}

impl Crawler {
    /// Creates a crawler
    ///
    /// # Arguments
    ///
    /// * `settings` - Round scheduling and pool settings
    /// * `fetcher` - Link source shared by all workers
    /// * `store` - Snapshot store shared by all workers
    pub fn new(
        settings: CrawlerSettings,
        fetcher: Arc<dyn Fetcher>,
        store: Arc<dyn SnapshotStore>,
    ) -> Self {
        let tally = Arc::new(Tally::default());
        let policy = settings.dedup;

        let handler_tally = Arc::clone(&tally);
        let handler = move |target: &Target| -> Result<(), UnfurlError> {
            match crawl_target(target, fetcher.as_ref(), store.as_ref(), policy)? {
                None => handler_tally.fetch_failures.fetch_add(1, Ordering::Relaxed),
                Some(PersistOutcome::Duplicate) => {
                    handler_tally.duplicates.fetch_add(1, Ordering::Relaxed)
                }
                Some(PersistOutcome::NewSnapshot(_)) => {
                    handler_tally.stored.fetch_add(1, Ordering::Relaxed)
                }
            };
            Ok(())
        };

        let executor = Executor::new(handler, settings.mode, settings.max_workers)
            .with_idle_grace(settings.idle_grace);

        let stop = StopHandle {
            signal: Arc::new(StopSignal::default()),
            pool: executor.shutdown_handle(),
        };

        tracing::debug!(
            "Crawler period: {:?}, count: {}, mode: {:?}, max workers: {}",
            settings.period,
            settings.count,
            settings.mode,
            settings.max_workers
        );

        Self {
            settings,
            executor,
            run_round: Box::new(|executor: &Executor<Target>, targets: &[Target]| {
                executor.work_on(targets)
            }),
            tally,
            stop,
        }
    }

    /// Replaces how a round is handed to the pool
    #[cfg(test)]
    fn with_round_runner<F>(mut self, run_round: F) -> Self
    where
        F: Fn(&Executor<Target>, &[Target]) -> Result<WorkSummary, ExecutorError>
            + Send
            + Sync
            + 'static,
    {
        self.run_round = Box::new(run_round);
        self
    }

    pub fn settings(&self) -> &CrawlerSettings {
        &self.settings
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Crawls `targets` for the configured number of rounds
    ///
    /// A count of zero returns immediately without fetching anything. Failed
    /// targets are skipped for their round only; a round-level pool error is
    /// logged, shuts the pool down, and the loop carries on. A crawler whose
    /// [`StopHandle`] has fired does not start any round.
    pub fn crawl(&self, targets: &[Target]) -> CrawlReport {
        let mut report = CrawlReport::default();

        if self.settings.count == 0 {
            tracing::info!("Crawl count is 0, nothing to do");
            return report;
        }

        let totals_before = self.totals();

        loop {
            // Must come before the stop check or a concurrent stop is lost
            self.executor.rearm();
            if self.stop.is_stopped() {
                tracing::info!("Crawl stopped");
                break;
            }

            report.rounds += 1;
            let round = report.rounds;
            let started = Instant::now();
            tracing::info!("Starting round {} over {} target(s)", round, targets.len());

            match (self.run_round)(&self.executor, targets) {
                Ok(summary) => {
                    report.handler_failures += summary.failed;
                    tracing::info!(
                        "Round {} finished in {:.3}s: {} processed, {} failed, {} abandoned",
                        round,
                        started.elapsed().as_secs_f64(),
                        summary.processed,
                        summary.failed,
                        summary.abandoned
                    );
                }
                Err(e) => {
                    report.round_failures += 1;
                    tracing::error!("Round {} failed: {}", round, e);
                    self.executor.shutdown();
                }
            }

            if self.settings.count > 0 && round >= self.settings.count.unsigned_abs() {
                break;
            }

            tracing::debug!("Sleeping {:?} before round {}", self.settings.period, round + 1);
            if self.stop.sleep(self.settings.period) {
                tracing::info!("Crawl stopped while sleeping");
                break;
            }
        }

        self.executor.shutdown();

        let totals_after = self.totals();
        report.snapshots_stored = totals_after.0 - totals_before.0;
        report.duplicates = totals_after.1 - totals_before.1;
        report.fetch_failures = totals_after.2 - totals_before.2;

        tracing::info!(
            "Crawl finished after {} round(s): {} stored, {} unchanged, {} fetch failure(s)",
            report.rounds,
            report.snapshots_stored,
            report.duplicates,
            report.fetch_failures
        );

        report
    }

    fn totals(&self) -> (usize, usize, usize) {
        (
            self.tally.stored.load(Ordering::Relaxed),
            self.tally.duplicates.load(Ordering::Relaxed),
            self.tally.fetch_failures.load(Ordering::Relaxed),
        )
    }
}
