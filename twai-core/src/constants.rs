/// Rating every post starts the Elo tournament with.
pub const INITIAL_RATING: i64 = 1200;

/// Elo K-factor: the largest rating change a single comparison can cause.
pub const K_FACTOR: f64 = 32.0;

/// Scale of the logistic curve in the expected-score formula.
/// A 400 point rating gap means the stronger side is expected to win 10:1.
pub const RATING_SCALE: f64 = 400.0;

/// Consecutive job failures the work pool tolerates.
///
/// The pool stops dispatching once the streak goes *past* this value, so with
/// a single worker and a job that always fails exactly 11 jobs run.
/// Any success resets the streak.
pub const MAX_CONSECUTIVE_FAILURES: usize = 10;

/// Base URL permalinks are built from: `{base}/{user_id}/status/{post_id}`.
pub const PERMALINK_BASE: &str = "https://x.com";
