use crate::config;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("API key not set (expected in ${0})")]
    MissingApiKey(String),

    #[error("HTTP client error: {0}")]
    Http(String),

    #[error("LLM API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("failed to parse LLM response: {0}")]
    ResponseParsing(String),

    #[error("LLM response contained no message")]
    EmptyResponse,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sampling {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl From<&config::Llm> for Sampling {
    fn from(cfg: &config::Llm) -> Self {
        Self {
            temperature: cfg.temperature,
            max_tokens: cfg.max_tokens,
        }
    }
}

/// Single-turn text generation.
pub trait LlmClient: Send + Sync {
    fn complete(&self, prompt: &str, sampling: &Sampling) -> Result<String, LlmError>;
}

impl<T: LlmClient + ?Sized> LlmClient for Arc<T> {
    fn complete(&self, prompt: &str, sampling: &Sampling) -> Result<String, LlmError> {
        (**self).complete(prompt, sampling)
    }
}

/// OpenAI-compatible `/chat/completions` client.
pub struct OpenAiChatClient {
    base_url: String,
    model: String,
    api_key: Option<String>,
    api_key_env: String,
    client: reqwest::blocking::Client,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

impl OpenAiChatClient {
    /// Reads the credential from the environment once, at construction.
    pub fn from_config(cfg: &config::Llm) -> Result<Self, LlmError> {
        let api_key = std::env::var(&cfg.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty());
        Self::new(cfg, api_key)
    }

    pub fn new(cfg: &config::Llm, api_key: Option<String>) -> Result<Self, LlmError> {
        let mut builder = reqwest::blocking::Client::builder();
        // reqwest's blocking client defaults to 30s; 0 means no timeout at all.
        builder = if cfg.timeout_seconds > 0 {
            builder.timeout(Duration::from_secs(cfg.timeout_seconds))
        } else {
            builder.timeout(None)
        };
        let client = builder.build().map_err(|e| LlmError::Http(e.to_string()))?;

        Ok(Self {
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            model: cfg.model.clone(),
            api_key,
            api_key_env: cfg.api_key_env.clone(),
            client,
        })
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

impl LlmClient for OpenAiChatClient {
    fn complete(&self, prompt: &str, sampling: &Sampling) -> Result<String, LlmError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| LlmError::MissingApiKey(self.api_key_env.clone()))?;

        let url = format!("{}/chat/completions", self.base_url);
        let body = ChatRequest {
            model: &self.model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: sampling.temperature,
            max_tokens: sampling.max_tokens,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .map_err(|e| LlmError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response
            .json()
            .map_err(|e| LlmError::ResponseParsing(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(LlmError::EmptyResponse)
    }
}

/// Returns a fixed response and records every prompt it was given.
pub struct MockLlmClient {
    outcome: Result<String, String>,
    prompts: Mutex<Vec<(String, Sampling)>>,
}

impl MockLlmClient {
    pub fn new(response: &str) -> Self {
        Self {
            outcome: Ok(response.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            outcome: Err(reason.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<(String, Sampling)> {
        self.prompts
            .lock()
            .map(|p| p.clone())
            .unwrap_or_default()
    }
}

impl LlmClient for MockLlmClient {
    fn complete(&self, prompt: &str, sampling: &Sampling) -> Result<String, LlmError> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push((prompt.to_string(), *sampling));
        }
        self.outcome.clone().map_err(LlmError::Http)
    }
}
