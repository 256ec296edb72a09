/// Bounded-concurrency work pool.
///
/// The pool keeps a fixed window of `concurrency` jobs in flight. It starts
/// with `concurrency` success tokens; every finished job hands its outcome
/// back as a new token, and each token buys exactly one more call to the
/// cursor. A slow job holds its slot without blocking the others, a fast job
/// frees its slot for the next item immediately.
///
/// Dispatch stops when the cursor is exhausted, when the parent token is
/// cancelled, or when more than `MAX_CONSECUTIVE_FAILURES` jobs fail in a row.
/// In every case the jobs already running are awaited, never aborted.
use std::fmt::Display;
use std::future::Future;

use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::constants::MAX_CONSECUTIVE_FAILURES;

/// Why the pool stopped dispatching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolStop {
    /// The cursor ran out of items.
    Exhausted,
    /// The consecutive-failure streak went past the limit.
    TooManyFailures,
    /// The cancellation token fired.
    Cancelled,
}

/// What happened during a `run_pool` call. Informational only: job errors
/// have already been logged, and stopping early is not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolReport {
    pub dispatched: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub stop: PoolStop,
}

/// Returns a job's slot to the dispatch loop.
///
/// If the job panics the slot is dropped without `release`, which still sends
/// a failure so the window never shrinks.
struct Slot {
    tx: mpsc::UnboundedSender<bool>,
    released: bool,
}

impl Slot {
    fn release(mut self, ok: bool) {
        self.released = true;
        // The loop may already be gone after a stop; nothing to hand back then.
        let _ = self.tx.send(ok);
    }
}

impl Drop for Slot {
    fn drop(&mut self) {
        if !self.released {
            let _ = self.tx.send(false);
        }
    }
}

#[derive(Default)]
struct Tally {
    seeds: usize,
    succeeded: usize,
    failed: usize,
}

impl Tally {
    fn record(&mut self, ok: bool) {
        // Seeds are queued before any job can finish, so they always come first.
        if self.seeds > 0 {
            self.seeds -= 1;
        } else if ok {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
    }
}

fn reap(result: Result<(), JoinError>) {
    if let Err(e) = result {
        if e.is_panic() {
            warn!("work pool job panicked");
        }
    }
}

/// Pull items from `next` and run `job` on each with at most `concurrency`
/// jobs in flight.
///
/// `next` is only ever called from this function's own loop, one call at a
/// time, so it can mutate its captured state freely. `job` is called on the
/// loop too, but the future it returns runs on its own task; anything it
/// shares with other jobs needs its own lock.
///
/// `concurrency` below 1 is treated as 1.
pub async fn run_pool<T, E, N, J, Fut>(
    cancel: &CancellationToken,
    concurrency: usize,
    mut next: N,
    job: J,
) -> PoolReport
where
    E: Display + Send + 'static,
    N: FnMut() -> Option<T>,
    J: Fn(T) -> Fut,
    Fut: Future<Output = Result<(), E>> + Send + 'static,
{
    let concurrency = concurrency.max(1);
    let (tx, mut rx) = mpsc::unbounded_channel::<bool>();
    for _ in 0..concurrency {
        let _ = tx.send(true);
    }

    let mut tasks = JoinSet::new();
    let mut tally = Tally { seeds: concurrency, ..Default::default() };
    let mut consecutive_failures = 0usize;
    let mut dispatched = 0usize;

    let stop = loop {
        let ok = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!("context cancelled");
                break PoolStop::Cancelled;
            }
            token = rx.recv() => match token {
                Some(ok) => ok,
                // We hold `tx`, so the channel cannot close under us.
                None => break PoolStop::Exhausted,
            },
        };
        tally.record(ok);

        if ok {
            consecutive_failures = 0;
        } else {
            consecutive_failures += 1;
        }
        if consecutive_failures > MAX_CONSECUTIVE_FAILURES {
            warn!(consecutive_failures, "too many consecutive errors");
            break PoolStop::TooManyFailures;
        }

        let Some(item) = next() else {
            break PoolStop::Exhausted;
        };

        let slot = Slot { tx: tx.clone(), released: false };
        let fut = job(item);
        dispatched += 1;
        tasks.spawn(async move {
            match fut.await {
                Ok(()) => slot.release(true),
                Err(e) => {
                    warn!(error = %e, "job failed");
                    slot.release(false);
                }
            }
        });

        while let Some(result) = tasks.try_join_next() {
            reap(result);
        }
    };

    debug!(in_flight = tasks.len(), ?stop, "work pool draining");
    while let Some(result) = tasks.join_next().await {
        reap(result);
    }

    drop(tx);
    while let Ok(ok) = rx.try_recv() {
        tally.record(ok);
    }

    PoolReport {
        dispatched,
        succeeded: tally.succeeded,
        failed: tally.failed,
        stop,
    }
}
