/// twai-core: rank posts with an LLM.
///
/// Two ranking modes share one bounded-concurrency work pool:
/// absolute scoring (one call per post, answer 1-10) and an Elo tournament
/// (random pairwise comparisons, ratings updated live). No HTTP, no files,
/// no browser. Bring your own `Completer`.
///
/// # Quick start
///
/// ```rust
/// use twai_core::{expected_score, update_ratings};
///
/// // Two posts at 1200; the first wins.
/// assert!((expected_score(1200.0, 1200.0) - 0.5).abs() < 1e-12);
/// let (a, b) = update_ratings(1200.0, 1200.0, 1.0, 0.0);
/// assert_eq!((a as i64, b as i64), (1216, 1184));
/// ```
///
/// Running a pipeline needs an async runtime and a completer:
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use twai_core::{Completer, CompletionError, Post, ScoreOptions, score_posts};
/// use tokio_util::sync::CancellationToken;
///
/// struct AlwaysEight;
///
/// #[async_trait::async_trait]
/// impl Completer for AlwaysEight {
///     async fn complete(&self, _prompt: &str) -> Result<String, CompletionError> {
///         Ok("8".to_string())
///     }
/// }
///
/// # async fn run(posts: Vec<Post>) -> twai_core::Result<()> {
/// let ranked = score_posts(Arc::new(AlwaysEight), posts, &ScoreOptions::default(), &CancellationToken::new()).await?;
/// for r in &ranked {
///     println!("{} {}", r.score, r.link);
/// }
/// # Ok(())
/// # }
/// ```

pub mod completer;
pub mod constants;
pub mod elo;
pub mod error;
pub mod parse;
pub mod pool;
pub mod prompt;
pub mod scoring;
pub mod tournament;
pub mod types;

// Re-export primary public API at crate root.
pub use completer::{Completer, CompletionError};
pub use elo::{Winner, expected_score, update_ratings, update_stored_ratings};
pub use error::{RankError, Result};
pub use parse::{NumberError, first_integer, parse_verdict};
pub use pool::{PoolReport, PoolStop, run_pool};
pub use prompt::{DEFAULT_ELO_PROMPT, DEFAULT_SCORE_PROMPT, build_elo_prompt, build_score_prompt};
pub use scoring::{ScoreOptions, score_posts};
pub use tournament::{EloOptions, run_tournament};
pub use types::{Post, RankedRecord, permalink, sort_ranked};
