/// Absolute scoring: every post gets one LLM call and a 1-10 score.
///
/// Posts are fed through the work pool one at a time. Each job asks the
/// completer for a score, pairs it with the post's engagement counters and
/// pushes the record under the results lock. Once the pool drains the records
/// are sorted by score, then views.
use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::completer::Completer;
use crate::error::{RankError, Result};
use crate::parse::{NumberError, first_integer};
use crate::pool::run_pool;
use crate::prompt::{DEFAULT_SCORE_PROMPT, build_score_prompt};
use crate::types::{Post, RankedRecord, sort_ranked};

/// Options for `score_posts()`.
#[derive(Debug, Clone)]
pub struct ScoreOptions {
    /// Max LLM calls in flight.
    pub concurrency: usize,
    /// Instruction placed before each post's text.
    pub prompt: String,
}

impl Default for ScoreOptions {
    fn default() -> Self {
        ScoreOptions {
            concurrency: 1,
            prompt: DEFAULT_SCORE_PROMPT.to_string(),
        }
    }
}

/// Turn a model answer into a score. Anything unparsable scores 0.
fn score_from_response(response: &str) -> i64 {
    match first_integer(response) {
        Ok(n) => n,
        Err(NumberError::Missing) => {
            warn!("no number found in response");
            0
        }
        Err(e) => {
            warn!(error = %e, "error parsing number from response");
            0
        }
    }
}

/// Score every post and return the records sorted best first.
///
/// Fails up front if `posts` is empty. Individual LLM failures only cost that
/// post its record; if the pool gives up after too many failures in a row, the
/// records scored so far are still returned.
pub async fn score_posts(
    completer: Arc<dyn Completer>,
    posts: Vec<Post>,
    options: &ScoreOptions,
    cancel: &CancellationToken,
) -> Result<Vec<RankedRecord>> {
    if posts.is_empty() {
        return Err(RankError::NotEnoughPosts { need: 1, got: 0 });
    }

    let total = posts.len();
    let results = Arc::new(Mutex::new(Vec::with_capacity(total)));

    let mut cursor = posts.into_iter().enumerate();
    let next = move || {
        let (idx, post) = cursor.next()?;
        info!("ai: tweet {}/{}", idx + 1, total);
        Some(post)
    };

    let report = run_pool(cancel, options.concurrency, next, |post: Post| {
        let completer = completer.clone();
        let results = results.clone();
        let prompt = build_score_prompt(&options.prompt, &post.text);
        async move {
            let response = completer.complete(&prompt).await?;
            let record = RankedRecord::from_post(&post, score_from_response(&response));
            results.lock().push(record);
            Ok::<(), RankError>(())
        }
    })
    .await;

    info!(
        scored = report.succeeded,
        failed = report.failed,
        stop = ?report.stop,
        "scoring finished"
    );

    let mut records = std::mem::take(&mut *results.lock());
    sort_ranked(&mut records);
    Ok(records)
}
