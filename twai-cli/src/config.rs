/// Config file loading and creation for the twai CLI.
///
/// Config lives at ~/.config/twai/config.toml.
/// All fields are optional. CLI flags and `TWAI_*` env vars override config values.
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Keys shared by every LLM-backed command, settable at the top level or per section.
#[derive(Deserialize, Default, Debug, Clone)]
pub struct LlmSection {
    pub model: Option<String>,
    pub host: Option<String>,
    pub token: Option<String>,
}

#[derive(Deserialize, Default, Debug)]
pub struct ScrapeSection {
    pub page: Option<String>,
    pub count: Option<usize>,
    pub cookie_file: Option<String>,
    pub browserless_url: Option<String>,
    pub browserless_token: Option<String>,
    pub wait_ms: Option<u64>,
}

#[derive(Deserialize, Default, Debug)]
pub struct RankSection {
    pub concurrency: Option<usize>,
    pub prompt: Option<String>,
    pub iterations: Option<usize>,
    #[serde(flatten)]
    pub llm: LlmSection,
}

#[derive(Deserialize, Default, Debug)]
pub struct TwaiConfig {
    #[serde(flatten)]
    pub llm: LlmSection,
    #[serde(default)]
    pub scrape: ScrapeSection,
    #[serde(default)]
    pub score: RankSection,
    #[serde(default)]
    pub elo: RankSection,
}

impl TwaiConfig {
    /// LLM settings for a section, falling back to the top-level keys.
    pub fn llm_for(&self, section: &RankSection) -> LlmSection {
        LlmSection {
            model: section.llm.model.clone().or_else(|| self.llm.model.clone()),
            host: section.llm.host.clone().or_else(|| self.llm.host.clone()),
            token: section.llm.token.clone().or_else(|| self.llm.token.clone()),
        }
    }
}

const DEFAULT_CONFIG_TEMPLATE: &str = "\
# twai configuration
# All values here can be overridden by CLI flags or TWAI_* environment variables.

# OpenAI-compatible API endpoint (shared by score and elo)
# host = \"http://localhost:11434/v1\"

# Model ID
# model = \"llama3\"

# Authorization token: prefer the TWAI_TOKEN env var over storing it here
# token = \"\"

[scrape]
# page = \"home\"
# count = 50
# cookie_file = \"cookie.txt\"
# browserless_url = \"http://localhost:3000\"
# wait_ms = 1000

[score]
# concurrency = 1
# prompt = \"Rate the following tweet from 1 to 10 ...\"

[elo]
# concurrency = 1
# iterations = 10
# prompt = \"Which tweet is best ...? Answer only with the number 1 or 2.\"
";

/// Returns the default config path: ~/.config/twai/config.toml
pub fn config_path() -> Result<PathBuf, ConfigError> {
    let home = std::env::var("HOME").map_err(|_| ConfigError::NoHome)?;
    Ok(PathBuf::from(home).join(".config").join("twai").join("config.toml"))
}

/// Load config from a file path. Returns default (all None) if file doesn't exist.
pub fn load_config(path: &Path) -> Result<TwaiConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => toml::from_str(&content).map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(TwaiConfig::default()),
        Err(source) => Err(ConfigError::Read { path: path.to_path_buf(), source }),
    }
}

/// Create the default config file. Errors if it already exists.
pub fn create_default_config(path: &Path) -> Result<(), ConfigError> {
    if path.exists() {
        return Err(ConfigError::Exists(path.to_path_buf()));
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| ConfigError::Write { path: parent.to_path_buf(), source })?;
    }

    std::fs::write(path, DEFAULT_CONFIG_TEMPLATE).map_err(|source| ConfigError::Write { path: path.to_path_buf(), source })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_default() {
        let cfg = load_config(Path::new("/no/such/twai/config.toml")).unwrap();
        assert!(cfg.llm.model.is_none());
        assert!(cfg.elo.iterations.is_none());
    }

    #[test]
    fn test_sections_and_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "model = \"llama3\"\nhost = \"http://gpu:11434/v1\"\n\n[elo]\niterations = 4\nmodel = \"mistral\"\n\n[scrape]\ncount = 20\n",
        )
        .unwrap();

        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.elo.iterations, Some(4));
        assert_eq!(cfg.scrape.count, Some(20));

        let elo = cfg.llm_for(&cfg.elo);
        assert_eq!(elo.model.as_deref(), Some("mistral"));
        assert_eq!(elo.host.as_deref(), Some("http://gpu:11434/v1"));

        let score = cfg.llm_for(&cfg.score);
        assert_eq!(score.model.as_deref(), Some("llama3"));
    }

    #[test]
    fn test_bad_toml_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "iterations = [").unwrap();
        assert!(matches!(load_config(&path), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_default_template_parses_and_is_not_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        create_default_config(&path).unwrap();
        assert!(load_config(&path).is_ok());
        assert!(matches!(create_default_config(&path), Err(ConfigError::Exists(_))));
    }
}
