use chrono::{DateTime, Utc};

use crate::constants::PERMALINK_BASE;

/// A post as returned by the scraper.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Post {
    /// Status ID, the last path segment of the post URL.
    pub id: String,
    pub text: String,
    pub time: DateTime<Utc>,
    /// Author handle without the leading `@`.
    pub user_id: String,
    /// Author display name.
    pub user_name: String,
    /// Follower count, only filled when the scrape asked for it.
    pub user_followers: i64,
    pub comments: i64,
    pub retweets: i64,
    pub likes: i64,
    pub views: i64,
}

impl Post {
    /// Stable permalink for this post.
    pub fn permalink(&self) -> String {
        permalink(&self.user_id, &self.id)
    }
}

/// Build `https://x.com/{user_id}/status/{post_id}`.
pub fn permalink(user_id: &str, post_id: &str) -> String {
    format!("{PERMALINK_BASE}/{user_id}/status/{post_id}")
}

/// A post with the score it earned, in the shape that gets written out.
///
/// In scoring mode `score` is the LLM's 1-10 answer. In Elo mode it is the
/// post's current rating.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RankedRecord {
    pub score: i64,

    pub comments: i64,
    pub retweets: i64,
    pub likes: i64,
    pub views: i64,

    pub time: DateTime<Utc>,
    pub text: String,
    pub link: String,
}

impl RankedRecord {
    pub fn from_post(post: &Post, score: i64) -> Self {
        RankedRecord {
            score,
            comments: post.comments,
            retweets: post.retweets,
            likes: post.likes,
            views: post.views,
            time: post.time,
            text: post.text.clone(),
            link: post.permalink(),
        }
    }
}

/// Sort by score descending, then views descending.
///
/// The sort is stable: records equal on both keys keep their relative order.
pub fn sort_ranked(records: &mut [RankedRecord]) {
    records.sort_by(|a, b| b.score.cmp(&a.score).then(b.views.cmp(&a.views)));
}
