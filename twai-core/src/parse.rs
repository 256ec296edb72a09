/// Number extraction from free-form LLM responses.
///
/// Both pipelines ask the model to answer with a bare number, but models often
/// wrap it ("Score: 8/10", "I'd say 2."). Only the first run of ASCII digits
/// counts.
use std::num::ParseIntError;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

use crate::elo::Winner;

static NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").expect("valid regex"));

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NumberError {
    #[error("no number found in response")]
    Missing,

    #[error("error parsing number from response: {0}")]
    Invalid(#[from] ParseIntError),

    #[error("invalid number found in response: {0}")]
    NotAVerdict(i64),
}

/// Parse the first run of digits in `text`.
///
/// `"3.5"` gives 3, `"score: 8/10"` gives 8. A run too long for `i64` is an
/// error rather than a saturated value.
pub fn first_integer(text: &str) -> Result<i64, NumberError> {
    let digits = NUMBER_RE.find(text).ok_or(NumberError::Missing)?;
    Ok(digits.as_str().parse()?)
}

/// Parse a pairwise verdict: the first number must be exactly 1 or 2.
pub fn parse_verdict(text: &str) -> Result<Winner, NumberError> {
    match first_integer(text)? {
        1 => Ok(Winner::First),
        2 => Ok(Winner::Second),
        n => Err(NumberError::NotAVerdict(n)),
    }
}
