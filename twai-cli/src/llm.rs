/// OpenAI-compatible chat completion client.
///
/// Works against OpenAI itself or any server that speaks the same
/// `/chat/completions` API (Ollama, vLLM, llama.cpp).
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use twai_core::{Completer, CompletionError};

const DEFAULT_HOST: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
const MAX_TOKENS: u32 = 1024;

/// Configuration for the LLM endpoint.
#[derive(Debug, Clone, Default)]
pub struct LlmConfig {
    /// Base URL up to and including the API version, e.g. `http://localhost:11434/v1`.
    pub host: String,
    pub model: String,
    pub token: Option<String>,
    /// Log full request and response bodies at debug level.
    pub debug: bool,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: MessageContent,
}

#[derive(Debug, Deserialize)]
struct MessageContent {
    content: Option<String>,
}

pub struct LlmClient {
    http: Client,
    url: String,
    model: String,
    token: Option<String>,
    debug: bool,
    cancel: CancellationToken,
}

impl LlmClient {
    /// Empty `host` or `model` fall back to OpenAI and `gpt-3.5-turbo`.
    /// Every request is raced against `cancel`.
    pub fn new(config: &LlmConfig, cancel: CancellationToken) -> Self {
        let host = if config.host.is_empty() { DEFAULT_HOST } else { &config.host };
        let model = if config.model.is_empty() { DEFAULT_MODEL } else { &config.model };
        LlmClient {
            http: Client::new(),
            url: format!("{}/chat/completions", host.trim_end_matches('/')),
            model: model.to_string(),
            token: config.token.clone().filter(|t| !t.is_empty()),
            debug: config.debug,
            cancel,
        }
    }

    async fn send(&self, prompt: &str) -> Result<String, CompletionError> {
        let request = ChatCompletionRequest {
            model: &self.model,
            messages: vec![ChatMessage { role: "user", content: prompt }],
            max_tokens: MAX_TOKENS,
        };
        if self.debug {
            if let Ok(js) = serde_json::to_string_pretty(&request) {
                debug!("openai: req: {js}");
            }
        }

        let mut req_builder = self.http.post(&self.url).json(&request);
        if let Some(ref token) = self.token {
            req_builder = req_builder.bearer_auth(token);
        }

        let resp = req_builder
            .send()
            .await
            .map_err(|e| CompletionError::Http(e.to_string()))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| CompletionError::Http(e.to_string()))?;
        if !status.is_success() {
            return Err(CompletionError::Api {
                status: status.as_u16(),
                message: body.chars().take(200).collect(),
            });
        }
        if self.debug {
            debug!("openai: resp: {body}");
        }

        let data: ChatCompletionResponse =
            serde_json::from_str(&body).map_err(|e| CompletionError::Decode(e.to_string()))?;

        data.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.is_empty())
            .ok_or(CompletionError::Empty)
    }
}

#[async_trait]
impl Completer for LlmClient {
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
        tokio::select! {
            _ = self.cancel.cancelled() => Err(CompletionError::Cancelled),
            result = self.send(prompt) => result,
        }
    }
}
