/// Cookie persistence for the browser session.
///
/// Cookies are stored as a single raw header-style string:
/// `auth_token=abc; ct0=def`. That is the format you get by copying the
/// `cookie` request header out of a logged-in browser.
use std::path::PathBuf;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::ScrapeError;

/// One name/value pair.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Cookie {
    pub name: String,
    pub value: String,
}

/// Where the session's raw cookie string lives between runs.
#[async_trait]
pub trait CookieStore: Send + Sync {
    async fn get_cookie(&self) -> Result<String, ScrapeError>;
    async fn set_cookie(&self, cookie: &str) -> Result<(), ScrapeError>;
}

/// Cookie string kept in a plain text file.
pub struct FileCookieStore {
    path: PathBuf,
}

impl FileCookieStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileCookieStore { path: path.into() }
    }
}

#[async_trait]
impl CookieStore for FileCookieStore {
    async fn get_cookie(&self) -> Result<String, ScrapeError> {
        tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| ScrapeError::CookieFile { action: "read", path: self.path.clone(), source })
    }

    async fn set_cookie(&self, cookie: &str) -> Result<(), ScrapeError> {
        tokio::fs::write(&self.path, cookie)
            .await
            .map_err(|source| ScrapeError::CookieFile { action: "write", path: self.path.clone(), source })
    }
}

/// Split a raw cookie string into pairs.
///
/// Empty segments are skipped. A segment without `=` is an error. Values
/// containing a double quote are query-escaped so they survive as a cookie
/// value.
pub fn parse_cookies(raw: &str) -> Result<Vec<Cookie>, ScrapeError> {
    let mut cookies = Vec::new();
    for segment in raw.split(';') {
        let segment = segment.trim();
        if segment.is_empty() {
            continue;
        }
        let (name, value) = segment
            .split_once('=')
            .ok_or_else(|| ScrapeError::InvalidCookie(segment.to_string()))?;
        let value = if value.contains('"') { query_escape(value) } else { value.to_string() };
        cookies.push(Cookie { name: name.to_string(), value });
    }
    Ok(cookies)
}

/// Join pairs back into a raw cookie string.
pub fn format_cookies(cookies: &[Cookie]) -> String {
    cookies
        .iter()
        .map(|c| format!("{}={}", c.name, c.value))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Query-style escaping, with space as `+`.
fn query_escape(s: &str) -> String {
    urlencoding::encode(s).replace("%20", "+")
}
