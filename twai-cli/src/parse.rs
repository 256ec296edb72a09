/// Engagement counter parsing for scraped pages.
///
/// Counters are rendered for humans: `"1,234"`, `"12.5K"`, `"3M"`.
use std::sync::LazyLock;

use regex::Regex;

use crate::error::ScrapeError;

static DECIMAL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+\.\d+").expect("valid regex"));
static NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").expect("valid regex"));

/// Parse a human-formatted counter. Empty means zero.
pub fn parse_count(raw: &str) -> Result<i64, ScrapeError> {
    let s = raw.trim().replace(',', "");
    if s.is_empty() {
        return Ok(0);
    }

    let multiplier: i64 = if s.ends_with('K') {
        1_000
    } else if s.ends_with('M') {
        1_000_000
    } else if s.ends_with('B') {
        1_000_000_000
    } else {
        1
    };

    if let Some(m) = DECIMAL_RE.find(&s) {
        let value: f64 = m.as_str().parse().map_err(|_| ScrapeError::Count(raw.to_string()))?;
        return Ok((value * multiplier as f64).round() as i64);
    }
    if let Some(m) = NUMBER_RE.find(&s) {
        let value: i64 = m.as_str().parse().map_err(|_| ScrapeError::Count(raw.to_string()))?;
        return value
            .checked_mul(multiplier)
            .ok_or_else(|| ScrapeError::Count(raw.to_string()));
    }
    Err(ScrapeError::Count(raw.to_string()))
}
