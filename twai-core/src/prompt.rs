/// Prompt building for absolute scoring and pairwise comparisons.

/// Default instruction for absolute 1-10 scoring. The post text is appended.
pub const DEFAULT_SCORE_PROMPT: &str = "Rate the following tweet from 1 to 10 based on relevance, clarity, engagement, and impact. Only answer with a number.";

/// Default instruction for pairwise comparison. Both permalinks are appended.
pub const DEFAULT_ELO_PROMPT: &str = "Which tweet is best based on relevance, clarity, engagement, and impact.? 1 or 2? Answer only with the number 1 or 2.";

/// Build a scoring prompt: the instruction, a blank line, then the post text.
pub fn build_score_prompt(instruction: &str, text: &str) -> String {
    format!("{instruction}\n\n{text}")
}

/// Build a comparison prompt embedding both posts' permalinks.
///
/// The model answers `1` if the first post wins and `2` if the second does.
pub fn build_elo_prompt(instruction: &str, first_link: &str, second_link: &str) -> String {
    format!("{instruction}\n\nTWEET 1: {first_link}\n\nTWEET 2: {second_link}")
}
