use std::{future::Future, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use futures::future::{self, join_all};
use rand::{rngs::SmallRng, Rng, SeedableRng};
use tokio::{
    select,
    sync::mpsc,
    time::{self, Instant, MissedTickBehavior},
};
use tracing::{debug_span, info, trace, warn, Instrument};
use typed_builder::TypedBuilder;

use crate::{election::Catalog, store::CounterStore, Error, Result};

mod worker;

use worker::{submitter, Slot};

/// Parameters of one load run.
#[derive(Debug, Clone, TypedBuilder)]
pub struct LoadConfig {
    /// Wall-clock time the votes are spread over.
    pub duration_secs: u64,
    /// Number of votes to dispatch.
    pub votes: u32,
    /// Size of the submitter pool, and so the most store calls in flight.
    #[builder(default = 10)]
    pub workers: usize,
    /// Seed for picking vote targets. Zero picks a random seed.
    #[builder(default = 0)]
    pub seed: u64,
}

impl LoadConfig {
    /// Time between two dispatched votes.
    pub fn interval(&self) -> Result<Duration> {
        if self.duration_secs == 0 || self.votes == 0 {
            return Err(Error::InvalidParameters(
                "duration and votes count must be positive integers".into(),
            ));
        }
        if self.workers == 0 {
            return Err(Error::InvalidParameters(
                "worker pool must not be empty".into(),
            ));
        }
        let interval = Duration::from_secs(self.duration_secs) / self.votes;
        if interval.is_zero() {
            return Err(Error::InvalidParameters(format!(
                "{} votes in {} seconds is more than one per nanosecond",
                self.votes, self.duration_secs
            )));
        }
        // the first tick and the one after it must be representable deadlines
        let schedulable = interval
            .checked_mul(2)
            .and_then(|lead| Instant::now().checked_add(lead));
        if schedulable.is_none() {
            return Err(Error::InvalidParameters(format!(
                "{} seconds per vote is too long to schedule",
                interval.as_secs()
            )));
        }
        Ok(interval)
    }
}

/// What a finished load run did.
#[derive(Debug, Clone)]
pub struct LoadSummary {
    /// Votes handed to a worker.
    pub ticks: u64,
    /// Votes the store accepted.
    pub submitted: u64,
    /// Workers that stopped early after a failed submission.
    pub failed_workers: usize,
    /// The run was stopped by its shutdown signal before the last tick.
    pub cancelled: bool,
    pub elapsed: Duration,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Paces votes against a ticker and hands each one to whichever worker of a
/// fixed pool is idle.
///
/// Pacing and concurrency are independent: the ticker fixes the rate, the
/// pool bounds the load on the store. When every worker is busy the
/// dispatcher waits at the handoff, so a slow store slows the run down
/// instead of queueing votes.
pub struct Dispatcher<S: ?Sized> {
    catalog: Arc<Catalog>,
    store: Arc<S>,
    config: LoadConfig,
    interval: Duration,
}

impl<S> Dispatcher<S>
where
    S: CounterStore + ?Sized + 'static,
{
    /// Fails with [`Error::InvalidParameters`] before anything is started if
    /// the configuration can't be run.
    pub fn new(
        catalog: Arc<Catalog>,
        store: Arc<S>,
        config: LoadConfig,
    ) -> Result<Self> {
        let interval = config.interval()?;
        Ok(Self {
            catalog,
            store,
            config,
            interval,
        })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Dispatches every configured vote, then waits for the pool to drain.
    pub async fn run(self) -> Result<LoadSummary> {
        self.run_until(future::pending()).await
    }

    /// Like [`run`](Self::run), but stops dispatching once `shutdown`
    /// completes. Workers are drained either way.
    pub async fn run_until<F>(self, shutdown: F) -> Result<LoadSummary>
    where
        F: Future<Output = ()>,
    {
        let Self {
            catalog,
            store,
            config,
            interval,
        } = self;

        let seed = if config.seed == 0 {
            rand::thread_rng().gen()
        } else {
            config.seed
        };
        let mut rng = SmallRng::seed_from_u64(seed);

        let started_at = Utc::now();
        let start = Instant::now();
        let first_tick = start.checked_add(interval).ok_or_else(|| {
            Error::InvalidParameters("vote interval overflows the clock".into())
        })?;
        let mut ticker = time::interval_at(first_tick, interval);
        // a late tick is never made up for, votes stay one interval apart
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // every worker has at most one slot queued, so announcing idleness
        // never blocks
        let (idle_tx, mut idle_rx) = mpsc::channel::<Slot>(config.workers);
        let workers = (0..config.workers)
            .map(|id| {
                let span = debug_span!("submitter", worker = id);
                tokio::spawn(
                    submitter(store.clone(), idle_tx.clone()).instrument(span),
                )
            })
            .collect::<Vec<_>>();
        drop(idle_tx);

        info!(
            votes = config.votes,
            duration_secs = config.duration_secs,
            workers = config.workers,
            ?interval,
            seed,
            "starting vote load"
        );

        tokio::pin!(shutdown);

        let mut ticks = 0u64;
        let mut cancelled = false;
        let mut exhausted = false;
        'dispatch: while ticks < u64::from(config.votes) {
            let ticked = select! {
                biased;
                _ = &mut shutdown => false,
                _ = ticker.tick() => true,
            };
            if !ticked {
                cancelled = true;
                break;
            }

            let target = catalog.random_target(&mut rng);
            let due = Instant::now();
            loop {
                let idle = select! {
                    biased;
                    _ = &mut shutdown => None,
                    slot = idle_rx.recv() => Some(slot),
                };
                match idle {
                    None => {
                        cancelled = true;
                        break 'dispatch;
                    }
                    // every worker has stopped
                    Some(None) => {
                        exhausted = true;
                        break 'dispatch;
                    }
                    Some(Some(slot)) => {
                        if slot.send(target).is_ok() {
                            break;
                        }
                    }
                }
            }
            ticks += 1;
            trace!(tick = ticks, %target, "vote dispatched");
            // waited a whole interval or more for a worker
            if due.elapsed() >= interval {
                ticker.reset();
            }
        }

        if cancelled {
            warn!(ticks, "vote load cancelled");
        }
        info!("submitted {} votes in {} seconds", ticks, config.duration_secs);

        // closing the idle queue releases workers waiting on it as well as
        // the ones whose slot was still queued
        drop(idle_rx);
        let mut submitted = 0;
        let mut failed_workers = 0;
        for report in join_all(workers).await {
            match report {
                Ok(report) => {
                    submitted += report.submitted;
                    failed_workers += usize::from(report.failed);
                }
                Err(e) => {
                    warn!(error = %e, "worker did not finish cleanly");
                    failed_workers += 1;
                }
            }
        }

        if exhausted {
            return Err(Error::WorkersExhausted { dispatched: ticks });
        }

        let summary = LoadSummary {
            ticks,
            submitted,
            failed_workers,
            cancelled,
            elapsed: start.elapsed(),
            started_at,
            finished_at: Utc::now(),
        };
        info!(
            submitted = summary.submitted,
            failed_workers = summary.failed_workers,
            elapsed = ?summary.elapsed,
            "vote load finished"
        );
        Ok(summary)
    }
}
