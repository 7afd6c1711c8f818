use async_trait::async_trait;
use log::debug;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::config::LlmConfig;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("GROQ_API_KEY is not set")]
    MissingApiKey,

    #[error("HTTP error calling the completion API: {0}")]
    Http(#[from] reqwest::Error),

    #[error("completion API returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("completion API returned no content")]
    EmptyResponse,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system: String,
    pub prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Single request/response text completion
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError>;
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
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
    #[serde(default)]
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

/// Groq chat completions (OpenAI-compatible endpoint)
pub struct GroqClient {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
}

impl GroqClient {
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let api_key = config.api_key.clone().ok_or(LlmError::MissingApiKey)?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(GroqClient {
            http,
            api_url: config.api_url.clone(),
            api_key,
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl CompletionClient for GroqClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError> {
        let body = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage { role: "system", content: &request.system },
                ChatMessage { role: "user", content: &request.prompt },
            ],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        debug!("POST {} (model: {}, max_tokens: {})", self.api_url, self.model, request.max_tokens);

        let response = self
            .http
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status { status: status.as_u16(), body });
        }

        let parsed: ChatResponse = response.json().await?;
        first_choice_content(parsed)
    }
}

fn first_choice_content(response: ChatResponse) -> Result<String, LlmError> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .map(|content| content.trim().to_string())
        .filter(|content| !content.is_empty())
        .ok_or(LlmError::EmptyResponse)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Result<String, LlmError> {
        first_choice_content(serde_json::from_str(json).unwrap())
    }

    #[test]
    fn test_first_choice_content() {
        let json = r#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":"  QUESTION \n"}}]}"#;
        assert_eq!(parse(json).unwrap(), "QUESTION");
    }

    #[test]
    fn test_empty_choices_is_an_error() {
        assert!(matches!(parse(r#"{"choices":[]}"#), Err(LlmError::EmptyResponse)));
        assert!(matches!(parse(r#"{}"#), Err(LlmError::EmptyResponse)));
        assert!(matches!(
            parse(r#"{"choices":[{"message":{"content":"   "}}]}"#),
            Err(LlmError::EmptyResponse)
        ));
    }

    #[test]
    fn test_missing_api_key() {
        let config = LlmConfig {
            api_key: None,
            api_url: "http://localhost".to_string(),
            model: "m".to_string(),
            timeout_secs: 1,
            reply_temperature: 0.7,
            reply_max_tokens: 10,
        };
        assert!(matches!(GroqClient::new(&config), Err(LlmError::MissingApiKey)));
    }

    #[test]
    fn test_request_serialization() {
        let body = ChatRequest {
            model: "llama",
            messages: [
                ChatMessage { role: "system", content: "sys" },
                ChatMessage { role: "user", content: "hi" },
            ],
            temperature: 0.5,
            max_tokens: 50,
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["model"], "llama");
        assert_eq!(value["messages"][1]["content"], "hi");
        assert_eq!(value["max_tokens"], 50);
    }
}
