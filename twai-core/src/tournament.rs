/// Elo tournament: rank posts by many random pairwise LLM comparisons.
///
/// Every post starts at `INITIAL_RATING`. Each iteration visits every post
/// once; the visited post is compared against a uniformly random opponent with
/// a different link, and both ratings are updated from the verdict. Work goes
/// through the same pool as scoring, so `concurrency` comparisons can be in
/// flight while ratings keep moving underneath them.
use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::completer::Completer;
use crate::constants::INITIAL_RATING;
use crate::elo::update_stored_ratings;
use crate::error::{RankError, Result};
use crate::parse::parse_verdict;
use crate::pool::run_pool;
use crate::prompt::{DEFAULT_ELO_PROMPT, build_elo_prompt};
use crate::types::{Post, RankedRecord, sort_ranked};

/// Options for `run_tournament()`.
#[derive(Debug, Clone)]
pub struct EloOptions {
    /// Max LLM calls in flight.
    pub concurrency: usize,
    /// Full passes over the post list. Values below 1 are treated as 1.
    pub iterations: usize,
    /// Instruction placed before the two permalinks.
    pub prompt: String,
    /// Seed for opponent selection. `None` seeds from the OS.
    pub seed: Option<u64>,
}

impl Default for EloOptions {
    fn default() -> Self {
        EloOptions {
            concurrency: 1,
            iterations: 10,
            prompt: DEFAULT_ELO_PROMPT.to_string(),
            seed: None,
        }
    }
}

/// Walks `iterations` full passes over `len` records, yielding record indices.
///
/// Fused: once exhausted it keeps returning `None`.
#[derive(Debug)]
struct PassCursor {
    index: usize,
    iteration: usize,
    len: usize,
    iterations: usize,
}

impl PassCursor {
    fn new(len: usize, iterations: usize) -> Self {
        PassCursor { index: 0, iteration: 0, len, iterations }
    }

    fn next(&mut self) -> Option<usize> {
        if self.index >= self.len {
            self.index = 0;
            self.iteration += 1;
        }
        if self.iteration >= self.iterations {
            return None;
        }
        let index = self.index;
        info!(
            "ai: iteration {}/{}, tweet {}/{}",
            self.iteration + 1,
            self.iterations,
            index + 1,
            self.len,
        );
        self.index += 1;
        Some(index)
    }
}

/// Pick a random opponent for `a` whose link differs from `a`'s.
///
/// Callers guarantee at least two distinct links, so this terminates.
fn pick_opponent(rng: &Mutex<StdRng>, links: &[String], a: usize) -> usize {
    let mut rng = rng.lock();
    loop {
        let b = rng.random_range(0..links.len());
        if links[b] != links[a] {
            return b;
        }
    }
}

/// Run the tournament and return the records sorted by final rating.
///
/// Needs at least two posts with distinct links. A comparison whose answer is
/// not exactly `1` or `2` fails its job and leaves both ratings untouched.
pub async fn run_tournament(
    completer: Arc<dyn Completer>,
    posts: Vec<Post>,
    options: &EloOptions,
    cancel: &CancellationToken,
) -> Result<Vec<RankedRecord>> {
    if posts.len() < 2 {
        return Err(RankError::NotEnoughPosts { need: 2, got: posts.len() });
    }

    let records: Vec<RankedRecord> = posts
        .iter()
        .map(|post| RankedRecord::from_post(post, INITIAL_RATING))
        .collect();
    let links: Arc<Vec<String>> = Arc::new(records.iter().map(|r| r.link.clone()).collect());
    if links.iter().collect::<HashSet<_>>().len() < 2 {
        return Err(RankError::NoDistinctPosts);
    }

    let rng = Arc::new(Mutex::new(match options.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    }));
    let records = Arc::new(Mutex::new(records));

    let mut cursor = PassCursor::new(links.len(), options.iterations.max(1));

    let report = run_pool(cancel, options.concurrency, || cursor.next(), |a: usize| {
        let completer = completer.clone();
        let records = records.clone();
        let links = links.clone();
        let rng = rng.clone();
        let template = options.prompt.clone();
        async move {
            let b = pick_opponent(&rng, &links, a);
            let prompt = build_elo_prompt(&template, &links[a], &links[b]);

            let response = completer.complete(&prompt).await?;
            let winner = parse_verdict(&response).inspect_err(|e| {
                warn!(error = %e, response = %response, "unusable comparison verdict");
            })?;

            let mut records = records.lock();
            let (rating_a, rating_b) =
                update_stored_ratings(records[a].score, records[b].score, winner);
            records[a].score = rating_a;
            records[b].score = rating_b;
            Ok::<(), RankError>(())
        }
    })
    .await;

    info!(
        compared = report.succeeded,
        failed = report.failed,
        stop = ?report.stop,
        "tournament finished"
    );

    let mut records = std::mem::take(&mut *records.lock());
    sort_ranked(&mut records);
    Ok(records)
}
