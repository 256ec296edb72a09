/// Elo rating math for pairwise comparisons.
///
/// Pure functions only. Ratings are `f64` here; the tournament stores them as
/// integers and truncates after every update.
use crate::constants::{K_FACTOR, RATING_SCALE};

/// Which side of a comparison won. There are no draws.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Winner {
    First,
    Second,
}

impl Winner {
    /// Match outcome as `(score_first, score_second)`.
    pub fn scores(self) -> (f64, f64) {
        match self {
            Winner::First => (1.0, 0.0),
            Winner::Second => (0.0, 1.0),
        }
    }
}

/// Probability that a player rated `rating_a` beats one rated `rating_b`.
pub fn expected_score(rating_a: f64, rating_b: f64) -> f64 {
    1.0 / (1.0 + 10f64.powf((rating_b - rating_a) / RATING_SCALE))
}

/// Apply one comparison outcome and return both new ratings.
pub fn update_ratings(rating_a: f64, rating_b: f64, score_a: f64, score_b: f64) -> (f64, f64) {
    let expected_a = expected_score(rating_a, rating_b);
    let expected_b = expected_score(rating_b, rating_a);

    let new_rating_a = rating_a + K_FACTOR * (score_a - expected_a);
    let new_rating_b = rating_b + K_FACTOR * (score_b - expected_b);

    (new_rating_a, new_rating_b)
}

/// Integer version used for stored ratings: truncates toward zero, the same
/// way the stored value is fed into the next update.
pub fn update_stored_ratings(rating_a: i64, rating_b: i64, winner: Winner) -> (i64, i64) {
    let (score_a, score_b) = winner.scores();
    let (a, b) = update_ratings(rating_a as f64, rating_b as f64, score_a, score_b);
    (a as i64, b as i64)
}
