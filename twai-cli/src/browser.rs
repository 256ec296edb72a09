/// Rate-limited browser session backed by a Browserless instance.
///
/// Pages are rendered remotely through the Browserless `/function` endpoint:
/// one call opens a tab with the session cookies, optionally scrolls it a few
/// rounds, and hands back one HTML snapshot per round plus the cookies the tab
/// ended up with. Calls are serialised and spaced at least `wait` apart, so
/// the session behaves like one careful user.
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::cookies::{Cookie, CookieStore, format_cookies, parse_cookies};
use crate::error::ScrapeError;

/// Domain the session cookies are scoped to.
const COOKIE_DOMAIN: &str = "x.com";

/// Runs inside the remote browser. Snapshots `main` every round, scrolls to
/// the bottom, and stops once `want` distinct status links were seen or
/// `maxIdle` rounds in a row brought nothing new.
const RENDER_FUNCTION: &str = r#"export default async function ({ page, context }) {
  await page.setCookie(...context.cookies);
  await page.goto(context.url, { waitUntil: "domcontentloaded", timeout: context.timeout });
  if (context.waitFor) {
    await page.waitForSelector(context.waitFor, { timeout: context.timeout });
  }
  const snapshots = [];
  const seen = new Set();
  let idle = 0;
  for (let round = 0; round < context.maxRounds; round++) {
    snapshots.push(await page.evaluate(() => (document.querySelector("main") || document.body).outerHTML));
    const links = await page.$$eval("article time[datetime]", (nodes) =>
      nodes.map((n) => n.parentElement && n.parentElement.getAttribute("href")));
    let fresh = 0;
    for (const link of links) {
      if (link && !seen.has(link)) {
        seen.add(link);
        fresh++;
      }
    }
    idle = fresh === 0 ? idle + 1 : 0;
    if (seen.size >= context.want || idle > context.maxIdle) break;
    await page.evaluate(() => window.scrollTo(0, document.body.scrollHeight));
    await new Promise((resolve) => setTimeout(resolve, context.scrollWaitMs));
  }
  const cookies = (await page.cookies("https://x.com")).map(({ name, value }) => ({ name, value }));
  return { data: { snapshots, cookies }, type: "application/json" };
}"#;

pub struct BrowserConfig {
    /// Browserless base URL, e.g. `http://localhost:3000`.
    pub base_url: String,
    pub token: Option<String>,
    /// Minimum interval between two renders.
    pub wait: Duration,
    /// Pause after each scroll so the timeline can load more posts.
    pub scroll_wait: Duration,
    pub timeout: Duration,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        BrowserConfig {
            base_url: "http://localhost:3000".to_string(),
            token: None,
            wait: Duration::from_secs(1),
            scroll_wait: Duration::from_secs(2),
            timeout: Duration::from_secs(60),
        }
    }
}

/// One page render.
#[derive(Debug, Clone, Copy)]
pub struct Render<'a> {
    pub url: &'a str,
    /// Wait for this selector before the first snapshot.
    pub wait_for: Option<&'a str>,
    /// Stop scrolling once this many distinct posts were seen.
    pub want: usize,
    /// Stop after more than this many rounds in a row without new posts.
    pub max_idle: usize,
    /// Hard cap on snapshots; 1 means no scrolling.
    pub max_rounds: usize,
}

impl<'a> Render<'a> {
    /// A single snapshot, no scrolling.
    pub fn once(url: &'a str) -> Self {
        Render { url, wait_for: None, want: 0, max_idle: 0, max_rounds: 1 }
    }
}

#[derive(Serialize)]
struct BrowserCookie<'a> {
    name: &'a str,
    value: &'a str,
    domain: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RenderContext<'a> {
    url: &'a str,
    cookies: Vec<BrowserCookie<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    wait_for: Option<&'a str>,
    want: usize,
    max_idle: usize,
    max_rounds: usize,
    scroll_wait_ms: u64,
    timeout: u64,
}

#[derive(Serialize)]
struct FunctionRequest<'a> {
    code: &'static str,
    context: RenderContext<'a>,
}

#[derive(Deserialize)]
struct RenderResponse {
    snapshots: Vec<String>,
    #[serde(default)]
    cookies: Vec<Cookie>,
}

pub struct BrowserSession {
    client: reqwest::Client,
    endpoint: String,
    token: Option<String>,
    cookies: Mutex<Vec<Cookie>>,
    store: Arc<dyn CookieStore>,
    wait: Duration,
    scroll_wait: Duration,
    timeout: Duration,
    last_render: tokio::sync::Mutex<Option<Instant>>,
}

impl BrowserSession {
    /// Load cookies from `store` and prepare the session.
    ///
    /// Fails if the stored cookie is empty or malformed: scraping without a
    /// logged-in session only ever sees the login wall.
    pub async fn start(config: &BrowserConfig, store: Arc<dyn CookieStore>) -> Result<Self, ScrapeError> {
        let raw = store.get_cookie().await?;
        if raw.trim().is_empty() {
            return Err(ScrapeError::EmptyCookie);
        }
        let cookies = parse_cookies(&raw)?;

        info!(cookies = cookies.len(), "browser: session started");
        Ok(BrowserSession {
            client: reqwest::Client::new(),
            endpoint: format!("{}/function", config.base_url.trim_end_matches('/')),
            token: config.token.clone().filter(|t| !t.is_empty()),
            cookies: Mutex::new(cookies),
            store,
            wait: config.wait,
            scroll_wait: config.scroll_wait,
            timeout: config.timeout,
            last_render: tokio::sync::Mutex::new(None),
        })
    }

    /// Render a page and return its snapshots, one per scroll round.
    ///
    /// Cookies reported by the browser replace the session's cookies.
    pub async fn render(&self, render: &Render<'_>) -> Result<Vec<String>, ScrapeError> {
        let mut last = self.last_render.lock().await;
        if let Some(previous) = *last {
            tokio::time::sleep_until(previous + self.wait).await;
        }

        let cookies = self.cookies.lock().clone();
        let max_rounds = render.max_rounds.max(1);
        let body = FunctionRequest {
            code: RENDER_FUNCTION,
            context: RenderContext {
                url: render.url,
                cookies: cookies
                    .iter()
                    .map(|c| BrowserCookie { name: &c.name, value: &c.value, domain: COOKIE_DOMAIN })
                    .collect(),
                wait_for: render.wait_for,
                want: render.want,
                max_idle: render.max_idle,
                max_rounds,
                scroll_wait_ms: self.scroll_wait.as_millis() as u64,
                timeout: self.timeout.as_millis() as u64,
            },
        };

        debug!(url = render.url, max_rounds, "browser: rendering");
        let mut request = self
            .client
            .post(&self.endpoint)
            .timeout(self.timeout + self.scroll_wait * max_rounds as u32)
            .json(&body);
        if let Some(ref token) = self.token {
            request = request.query(&[("token", token)]);
        }

        let result = request.send().await;
        *last = Some(Instant::now());
        let resp = result?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(ScrapeError::Api { status: status.as_u16(), message });
        }

        let rendered: RenderResponse = resp.json().await?;
        if !rendered.cookies.is_empty() {
            *self.cookies.lock() = rendered.cookies;
        }
        debug!(snapshots = rendered.snapshots.len(), "browser: rendered");
        Ok(rendered.snapshots)
    }

    /// Persist the session's latest cookies back to the store.
    pub async fn stop(self) -> Result<(), ScrapeError> {
        let raw = format_cookies(&self.cookies.lock());
        self.store.set_cookie(&raw).await?;
        info!("browser: session stopped");
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    pub(crate) struct MemoryStore(pub(crate) Mutex<String>);

    #[async_trait]
    impl CookieStore for MemoryStore {
        async fn get_cookie(&self) -> Result<String, ScrapeError> {
            Ok(self.0.lock().clone())
        }
        async fn set_cookie(&self, cookie: &str) -> Result<(), ScrapeError> {
            *self.0.lock() = cookie.to_string();
            Ok(())
        }
    }

    pub(crate) fn store(raw: &str) -> Arc<MemoryStore> {
        Arc::new(MemoryStore(Mutex::new(raw.to_string())))
    }

    pub(crate) fn config(server: &MockServer, wait: Duration) -> BrowserConfig {
        BrowserConfig {
            base_url: server.uri(),
            token: Some("tok".into()),
            wait,
            scroll_wait: Duration::ZERO,
            timeout: Duration::from_secs(5),
        }
    }

    pub(crate) fn rendered(snapshots: &[&str], cookies: serde_json::Value) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({ "snapshots": snapshots, "cookies": cookies }))
    }

    #[tokio::test]
    async fn test_render_sends_cookies_and_limits() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/function"))
            .and(query_param("token", "tok"))
            .and(body_partial_json(json!({
                "context": {
                    "url": "https://x.com/home",
                    "cookies": [{ "name": "auth_token", "value": "abc", "domain": "x.com" }],
                    "waitFor": "article",
                    "want": 20,
                    "maxIdle": 2,
                    "maxRounds": 40
                }
            })))
            .respond_with(rendered(&["<main>1</main>", "<main>2</main>"], json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let session = BrowserSession::start(&config(&server, Duration::ZERO), store("auth_token=abc"))
            .await
            .unwrap();
        let render = Render { url: "https://x.com/home", wait_for: Some("article"), want: 20, max_idle: 2, max_rounds: 40 };
        let snapshots = session.render(&render).await.unwrap();
        assert_eq!(snapshots, vec!["<main>1</main>", "<main>2</main>"]);
    }

    #[tokio::test]
    async fn test_token_is_query_encoded() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(query_param("token", "a&b=c d"))
            .respond_with(rendered(&["ok"], json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let mut cfg = config(&server, Duration::ZERO);
        cfg.token = Some("a&b=c d".into());
        let session = BrowserSession::start(&cfg, store("a=1")).await.unwrap();
        session.render(&Render::once("https://x.com/a")).await.unwrap();
    }

    #[tokio::test]
    async fn test_renders_are_spaced() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(rendered(&["ok"], json!([])))
            .mount(&server)
            .await;

        let session = BrowserSession::start(&config(&server, Duration::from_millis(150)), store("a=1"))
            .await
            .unwrap();
        let started = std::time::Instant::now();
        session.render(&Render::once("https://x.com/a")).await.unwrap();
        session.render(&Render::once("https://x.com/b")).await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(150));
    }

    #[tokio::test]
    async fn test_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .mount(&server)
            .await;

        let session = BrowserSession::start(&config(&server, Duration::ZERO), store("a=1")).await.unwrap();
        match session.render(&Render::once("https://x.com/home")).await {
            Err(ScrapeError::Api { status, message }) => {
                assert_eq!(status, 429);
                assert_eq!(message, "slow down");
            }
            other => panic!("expected API error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_empty_cookie_refuses_to_start() {
        let server = MockServer::start().await;
        let result = BrowserSession::start(&config(&server, Duration::ZERO), store("  ")).await;
        assert!(matches!(result, Err(ScrapeError::EmptyCookie)));
    }

    #[tokio::test]
    async fn test_stop_persists_refreshed_cookies() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(rendered(
                &["<main></main>"],
                json!([{ "name": "auth_token", "value": "abc" }, { "name": "ct0", "value": "new" }]),
            ))
            .mount(&server)
            .await;

        let cookies = store("auth_token=abc; ct0=old");
        let session = BrowserSession::start(&config(&server, Duration::ZERO), cookies.clone()).await.unwrap();
        session.render(&Render::once("https://x.com/home")).await.unwrap();
        session.stop().await.unwrap();
        assert_eq!(*cookies.0.lock(), "auth_token=abc; ct0=new");
    }

    #[tokio::test]
    async fn test_stop_without_render_keeps_cookies() {
        let server = MockServer::start().await;
        let cookies = store("b=2;a=1");
        let session = BrowserSession::start(&config(&server, Duration::ZERO), cookies.clone()).await.unwrap();
        session.stop().await.unwrap();
        assert_eq!(*cookies.0.lock(), "b=2; a=1");
    }
}
