use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

const API_KEY_VAR: &str = "OPENAI_API_KEY";
const HTTP_TIMEOUT: Duration = Duration::from_secs(20);
const PROMPT: &str = "Shorten this product listing title to a plain product name of at most five words. \
Reply with the name only, no quotes or punctuation around it.";

/// Turns a long listing title into a short display name.
pub trait Shortener {
    fn shorten(&self, name: &str) -> Result<String>;
}

impl<T: Shortener + ?Sized> Shortener for Box<T> {
    fn shorten(&self, name: &str) -> Result<String> {
        (**self).shorten(name)
    }
}

/// Leaves names as they are. Used when no API key is configured.
pub struct Passthrough;

impl Shortener for Passthrough {
    fn shorten(&self, name: &str) -> Result<String> {
        Ok(name.to_string())
    }
}

/// Chat-completion backed shortener for any OpenAI-compatible endpoint.
pub struct LlmShortener {
    client: reqwest::blocking::Client,
    endpoint: String,
    model: String,
    api_key: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
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
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    content: Option<String>,
}

impl LlmShortener {
    pub fn new(endpoint: &str, model: &str, api_key: String) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(LlmShortener {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key,
        })
    }

    /// `None` when `OPENAI_API_KEY` is unset or empty.
    pub fn from_env(endpoint: &str, model: &str) -> Result<Option<Self>> {
        match std::env::var(API_KEY_VAR) {
            Ok(key) if !key.trim().is_empty() => Self::new(endpoint, model, key).map(Some),
            _ => Ok(None),
        }
    }
}

impl Shortener for LlmShortener {
    fn shorten(&self, name: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: name,
                },
            ],
            temperature: 0.0,
        };

        let response: ChatResponse = self
            .client
            .post(format!("{}/chat/completions", self.endpoint))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()?
            .error_for_status()?
            .json()
            .context("Malformed chat completion response")?;

        let reply = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| anyhow!("Chat completion returned no content"))?;
        let short = tidy_reply(&reply);
        debug!("Shortened {:?} to {:?}", name, short);
        Ok(short)
    }
}

fn tidy_reply(reply: &str) -> String {
    reply
        .lines()
        .next()
        .unwrap_or_default()
        .trim()
        .trim_matches(|c| c == '"' || c == '\'' || c == '`')
        .trim()
        .to_string()
}
