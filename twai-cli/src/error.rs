use std::path::PathBuf;

use thiserror::Error;
use twai_core::RankError;

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("browser: network error: {0}")]
    Network(String),

    #[error("browser: API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("browser: cookie is empty")]
    EmptyCookie,

    #[error("browser: invalid cookie: {0}")]
    InvalidCookie(String),

    #[error("browser: couldn't {action} cookie file {path}: {source}")]
    CookieFile {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("browser: error parsing count {0:?}")]
    Count(String),
}

impl From<reqwest::Error> for ScrapeError {
    fn from(err: reqwest::Error) -> Self {
        ScrapeError::Network(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("config file already exists at {0}")]
    Exists(PathBuf),

    #[error("failed to write config to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("HOME environment variable not set")]
    NoHome,
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Scrape(#[from] ScrapeError),

    #[error(transparent)]
    Rank(#[from] RankError),

    #[error("couldn't read tweets from file {path}: {source}")]
    ReadInput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("couldn't write tweets to file {path}: {source}")]
    WriteOutput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("couldn't {action} tweets as csv: {source}")]
    Csv {
        action: &'static str,
        #[source]
        source: csv::Error,
    },
}
