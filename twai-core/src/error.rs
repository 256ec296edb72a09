use thiserror::Error;

use crate::completer::CompletionError;
use crate::parse::NumberError;

pub type Result<T> = std::result::Result<T, RankError>;

#[derive(Debug, Error)]
pub enum RankError {
    #[error("need at least {need} posts, got {got}")]
    NotEnoughPosts { need: usize, got: usize },

    #[error("need at least 2 posts with distinct links to compare")]
    NoDistinctPosts,

    #[error(transparent)]
    Completion(#[from] CompletionError),

    #[error("invalid verdict: {0}")]
    Verdict(#[from] NumberError),
}
