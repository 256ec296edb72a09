/// Post extraction from rendered timeline HTML.
///
/// Each `<article>` on a timeline or profile page is one post. Only posts with
/// a status link and a machine-readable timestamp are kept.
use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scraper::{ElementRef, Html, Selector};
use tracing::{info, warn};
use twai_core::Post;

use crate::browser::{BrowserSession, Render};
use crate::error::ScrapeError;
use crate::parse::parse_count;

const SITE: &str = "https://x.com";
/// Rendering waits for this before the first snapshot.
const POSTS_READY: &str = "article time[datetime]";
/// More than this many scroll rounds in a row without a new post ends the feed.
const MAX_IDLE_ROUNDS: usize = 2;

static ARTICLE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("article").expect("valid selector"));
static TIME: LazyLock<Selector> = LazyLock::new(|| Selector::parse("time[datetime]").expect("valid selector"));
static USER_NAME: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"div[data-testid="User-Name"] a"#).expect("valid selector"));
static TWEET_TEXT: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"div[data-testid="tweetText"]"#).expect("valid selector"));
static STAT: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"span[data-testid="app-text-transition-container"]"#).expect("valid selector"));

/// Source of scraped posts.
#[async_trait]
pub trait PostSource: Send + Sync {
    /// Fetch up to `max` posts from `page` (`"home"` or a user handle).
    async fn fetch_posts(&self, page: &str, max: usize, with_followers: bool) -> Result<Vec<Post>, ScrapeError>;
}

fn text_of(element: ElementRef) -> String {
    element.text().collect::<String>().trim().to_string()
}

fn extract_post(article: ElementRef) -> Option<Post> {
    let time_node = article.select(&TIME).next()?;
    let datetime = time_node.value().attr("datetime")?;
    let time = match DateTime::parse_from_rfc3339(datetime) {
        Ok(t) => t.with_timezone(&Utc),
        Err(e) => {
            warn!(datetime, error = %e, "error parsing time");
            return None;
        }
    };

    // The timestamp is wrapped in the status link: /{user}/status/{id}
    let link = time_node.parent().and_then(ElementRef::wrap)?.value().attr("href")?;
    let mut parts = link.trim_start_matches('/').split('/');
    let (Some(user_id), Some("status"), Some(id)) = (parts.next(), parts.next(), parts.next()) else {
        warn!(link, "not a status link");
        return None;
    };
    if user_id.is_empty() || id.is_empty() {
        return None;
    }

    let user_name = article.select(&USER_NAME).next().map(text_of).unwrap_or_default();
    let text = article
        .select(&TWEET_TEXT)
        .next()
        .map(|e| text_of(e).replace('\n', " "))
        .unwrap_or_default();

    let mut post = Post {
        id: id.to_string(),
        text,
        time,
        user_id: user_id.to_string(),
        user_name,
        ..Default::default()
    };

    for (i, stat) in article.select(&STAT).take(4).enumerate() {
        let n = match parse_count(&text_of(stat)) {
            Ok(n) => n,
            Err(e) => {
                warn!(error = %e, "error parsing number");
                continue;
            }
        };
        match i {
            0 => post.comments = n,
            1 => post.retweets = n,
            2 => post.likes = n,
            _ => post.views = n,
        }
    }
    Some(post)
}

/// Extract every post from a rendered page, in page order.
pub fn extract_posts(html: &str) -> Vec<Post> {
    let fragment = Html::parse_fragment(html);
    fragment.select(&ARTICLE).filter_map(extract_post).collect()
}

/// Read the followers counter from a rendered profile page.
pub fn extract_followers(html: &str, user_id: &str) -> Option<i64> {
    let selector = Selector::parse(&format!(
        r#"a[href="/{user_id}/verified_followers"], a[href="/{user_id}/followers"]"#
    ))
    .ok()?;
    let fragment = Html::parse_fragment(html);
    let text = text_of(fragment.select(&selector).next()?);
    let count = text.split_whitespace().next()?;
    match parse_count(count) {
        Ok(n) => Some(n),
        Err(e) => {
            warn!(error = %e, "error parsing followers");
            None
        }
    }
}

/// Most viewed first. Stable, so equal views keep page order.
pub fn sort_by_views(posts: &mut [Post]) {
    posts.sort_by(|a, b| b.views.cmp(&a.views));
}

/// Fold scroll snapshots into a list of at most `max` unique posts.
///
/// Stops early once `max` posts are collected or more than
/// `MAX_IDLE_ROUNDS` snapshots in a row add nothing new.
fn collect_posts(snapshots: &[String], max: usize) -> Vec<Post> {
    let mut ids = HashSet::new();
    let mut posts = Vec::new();
    let mut idle = 0;

    for html in snapshots {
        let before = posts.len();
        posts.extend(extract_posts(html).into_iter().filter(|p| ids.insert(p.id.clone())));

        if posts.len() == before {
            idle += 1;
            if idle > MAX_IDLE_ROUNDS {
                info!("no more posts found, reached the end");
                break;
            }
        } else {
            idle = 0;
        }
        if posts.len() >= max {
            break;
        }
        info!("tweet {}/{}", posts.len(), max);
    }

    posts.truncate(max);
    posts
}

#[async_trait]
impl PostSource for BrowserSession {
    async fn fetch_posts(&self, page: &str, max: usize, with_followers: bool) -> Result<Vec<Post>, ScrapeError> {
        let page = if page.is_empty() { "home" } else { page };
        let url = format!("{SITE}/{page}");
        let render = Render {
            url: &url,
            wait_for: Some(POSTS_READY),
            want: max,
            max_idle: MAX_IDLE_ROUNDS,
            // Every productive round adds at least one post.
            max_rounds: max + MAX_IDLE_ROUNDS + 1,
        };
        let snapshots = self.render(&render).await?;

        let mut posts = collect_posts(&snapshots, max);
        if posts.is_empty() {
            info!("no posts found");
        }

        if with_followers {
            let mut followers: HashMap<String, i64> = HashMap::new();
            for post in &mut posts {
                if let Some(&n) = followers.get(&post.user_id) {
                    post.user_followers = n;
                    continue;
                }
                let profile_url = format!("{SITE}/{}", post.user_id);
                let profile = self.render(&Render::once(&profile_url)).await?;
                let n = profile
                    .first()
                    .and_then(|html| extract_followers(html, &post.user_id))
                    .unwrap_or_default();
                followers.insert(post.user_id.clone(), n);
                post.user_followers = n;
            }
        }

        Ok(posts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::tests::{config, rendered, store};
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{body_partial_json, method};
    use wiremock::{Mock, MockServer};

    fn article(user: &str, id: &str, datetime: &str, text: &str, stats: [&str; 4]) -> String {
        let stats: String = stats
            .iter()
            .map(|s| {
                format!(
                    r#"<span data-testid="app-text-transition-container" style="x"><span class="c"><span>{s}</span></span></span>"#
                )
            })
            .collect();
        format!(
            r#"<article role="article"><div data-testid="User-Name"><a href="/{user}"><div><span class="n"><span>Display {user}</span></span></div></a></div>
<a href="/{user}/status/{id}" dir="ltr"><time datetime="{datetime}">Jan 1</time></a>
<div lang="en" data-testid="tweetText"><span>{text}</span></div>
<div role="group">{stats}</div></article>"#
        )
    }

    fn simple(user: &str, id: &str, views: &str) -> String {
        article(user, id, "2024-05-01T10:00:00.000Z", "hi", ["", "", "", views])
    }

    fn main_of(articles: &[String]) -> String {
        format!("<main>{}</main>", articles.concat())
    }

    #[test]
    fn test_extract_posts_reads_fields() {
        let html = main_of(&[
            article("alice", "111", "2024-05-01T10:00:00.000Z", "Hello &amp; welcome\nfriends", ["3", "1,204", "12.5K", "2M"]),
            article("bob", "222", "2024-05-02T11:30:00.000Z", "Second", ["", "", "7", "90"]),
        ]);

        let posts = extract_posts(&html);
        assert_eq!(posts.len(), 2);

        let a = &posts[0];
        assert_eq!(a.id, "111");
        assert_eq!(a.user_id, "alice");
        assert_eq!(a.user_name, "Display alice");
        assert_eq!(a.text, "Hello & welcome friends");
        assert_eq!(a.time.to_rfc3339(), "2024-05-01T10:00:00+00:00");
        assert_eq!((a.comments, a.retweets, a.likes, a.views), (3, 1204, 12_500, 2_000_000));
        assert_eq!(a.permalink(), "https://x.com/alice/status/111");

        let b = &posts[1];
        assert_eq!((b.comments, b.retweets, b.likes, b.views), (0, 0, 7, 90));
    }

    #[test]
    fn test_text_keeps_nested_mentions() {
        let html = article(
            "carol",
            "444",
            "2024-05-01T10:00:00Z",
            r#"Thanks </span><div class="css-175oi2r r-xoduu5"><span><a href="/bob">@bob</a></span></div><span> for the great review of our release"#,
            ["", "", "", ""],
        );
        let posts = extract_posts(&html);
        assert_eq!(posts[0].text, "Thanks @bob for the great review of our release");
    }

    #[test]
    fn test_articles_without_timestamp_are_skipped() {
        let html = r#"<article><div data-testid="tweetText">Promoted</div></article>"#;
        assert!(extract_posts(html).is_empty());

        let bad_time = article("carol", "333", "yesterday", "x", ["", "", "", ""]);
        assert!(extract_posts(&bad_time).is_empty());
    }

    #[test]
    fn test_extract_followers() {
        let html = r#"<a href="/alice/verified_followers" role="link"><span><span>12.3K</span></span> <span>Followers</span></a>"#;
        assert_eq!(extract_followers(html, "alice"), Some(12_300));
        assert_eq!(extract_followers(html, "bob"), None);
    }

    #[test]
    fn test_collect_drops_duplicates_and_truncates() {
        let snapshots = vec![
            main_of(&[simple("a", "1", "10"), simple("b", "2", "20")]),
            main_of(&[simple("b", "2", "20"), simple("c", "3", "30"), simple("d", "4", "40")]),
        ];

        let ids: Vec<String> = collect_posts(&snapshots, 10).into_iter().map(|p| p.id).collect();
        assert_eq!(ids, vec!["1", "2", "3", "4"]);

        let ids: Vec<String> = collect_posts(&snapshots, 3).into_iter().map(|p| p.id).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
    }

    #[test]
    fn test_collect_stops_after_idle_rounds() {
        let first = main_of(&[simple("a", "1", "1")]);
        let late = main_of(&[simple("z", "9", "1")]);
        // Three rounds with nothing new end the feed before `late` is read.
        let snapshots = vec![first.clone(), first.clone(), first.clone(), first, late];
        let posts = collect_posts(&snapshots, 50);
        assert_eq!(posts.len(), 1);
    }

    #[test]
    fn test_sort_by_views() {
        let mut posts: Vec<Post> = [("a", 5), ("b", 50), ("c", 5), ("d", 500)]
            .iter()
            .map(|(id, views)| Post { id: id.to_string(), views: *views, ..Default::default() })
            .collect();
        sort_by_views(&mut posts);
        let ids: Vec<&str> = posts.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["d", "b", "a", "c"]);
    }

    #[tokio::test]
    async fn test_fetch_posts_scrolls_and_caches_followers() {
        let server = MockServer::start().await;
        let timeline = [
            main_of(&[simple("alice", "1", "10"), simple("bob", "2", "20")]),
            main_of(&[simple("bob", "2", "20"), simple("alice", "3", "30")]),
        ];
        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "context": { "url": "https://x.com/home", "want": 3 } })))
            .respond_with(rendered(&[timeline[0].as_str(), timeline[1].as_str()], json!([])))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "context": { "url": "https://x.com/alice" } })))
            .respond_with(rendered(
                &[r#"<a href="/alice/verified_followers"><span>1.5K</span> Followers</a>"#],
                json!([]),
            ))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "context": { "url": "https://x.com/bob" } })))
            .respond_with(rendered(&[r#"<a href="/bob/followers"><span>42</span> Followers</a>"#], json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let session = BrowserSession::start(&config(&server, Duration::ZERO), store("a=1")).await.unwrap();
        let posts = session.fetch_posts("home", 3, true).await.unwrap();

        let got: Vec<(&str, &str, i64)> = posts
            .iter()
            .map(|p| (p.id.as_str(), p.user_id.as_str(), p.user_followers))
            .collect();
        assert_eq!(got, vec![("1", "alice", 1500), ("2", "bob", 42), ("3", "alice", 1500)]);
    }

    #[tokio::test]
    async fn test_fetch_posts_without_followers_renders_once() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "context": { "url": "https://x.com/someone" } })))
            .respond_with(rendered(&[main_of(&[simple("someone", "7", "1")]).as_str()], json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let session = BrowserSession::start(&config(&server, Duration::ZERO), store("a=1")).await.unwrap();
        let posts = session.fetch_posts("someone", 50, false).await.unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].user_followers, 0);
    }
}
