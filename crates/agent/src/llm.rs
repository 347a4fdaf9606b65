use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use leadflow_core::config::LlmConfig;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum LlmError {
    #[error("generative backend is unavailable")]
    Unavailable,
    #[error("generative call timed out")]
    Timeout,
    #[error("generative transport failure: {0}")]
    Transport(String),
    #[error("generative response was empty")]
    EmptyCompletion,
}

/// Opaque generative-text capability. Callers bound it with a timeout and
/// always have a scripted reply to fall back on.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn generate_reply(
        &self,
        system_context: &str,
        user_message: &str,
    ) -> Result<String, LlmError>;
}

/// Stand-in when no API credential is configured: the dialogue degrades to
/// scripted replies instead of crashing.
#[derive(Default)]
pub struct DisabledLlm;

#[async_trait]
impl LlmClient for DisabledLlm {
    async fn generate_reply(
        &self,
        _system_context: &str,
        _user_message: &str,
    ) -> Result<String, LlmError> {
        Err(LlmError::Unavailable)
    }
}

/// Messages-API HTTP client.
pub struct HttpLlmClient {
    http: reqwest::Client,
    base_url: String,
    api_key: SecretString,
    model: String,
    max_tokens: u32,
}

impl HttpLlmClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let Some(api_key) = config.api_key.clone() else {
            return Err(LlmError::Unavailable);
        };

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|error| LlmError::Transport(error.to_string()))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            api_key,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
        })
    }
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn generate_reply(
        &self,
        system_context: &str,
        user_message: &str,
    ) -> Result<String, LlmError> {
        let body = MessagesRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            temperature: 0.7,
            system: system_context.to_owned(),
            messages: vec![MessageBody {
                role: "user".to_owned(),
                content: format!("MENSAGEM ATUAL: {user_message}"),
            }],
        };

        let response = self
            .http
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", "2023-06-01")
            .json(&body)
            .send()
            .await
            .map_err(|error| {
                if error.is_timeout() {
                    LlmError::Timeout
                } else {
                    LlmError::Transport(error.to_string())
                }
            })?
            .error_for_status()
            .map_err(|error| LlmError::Transport(error.to_string()))?;

        let completion: MessagesResponse =
            response.json().await.map_err(|error| LlmError::Transport(error.to_string()))?;

        let text = completion
            .content
            .iter()
            .filter(|block| block.kind == "text")
            .map(|block| block.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");

        let text = text.trim().to_owned();
        if text.is_empty() {
            return Err(LlmError::EmptyCompletion);
        }
        Ok(text)
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    temperature: f32,
    system: String,
    messages: Vec<MessageBody>,
}

#[derive(Debug, Serialize)]
struct MessageBody {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    text: String,
}

#[cfg(test)]
mod tests {
    use leadflow_core::config::LlmConfig;

    use super::{DisabledLlm, HttpLlmClient, LlmClient, LlmError};

    fn config(api_key: Option<&str>) -> LlmConfig {
        LlmConfig {
            api_key: api_key.map(|key| key.to_owned().into()),
            base_url: "http://127.0.0.1:9".to_owned(),
            model: "claude-3-5-sonnet-latest".to_owned(),
            max_tokens: 180,
            timeout_secs: 1,
        }
    }

    #[tokio::test]
    async fn disabled_llm_reports_unavailable() {
        let result = DisabledLlm.generate_reply("ctx", "oi").await;
        assert_eq!(result, Err(LlmError::Unavailable));
    }

    #[test]
    fn missing_credential_degrades_at_construction() {
        assert!(matches!(HttpLlmClient::from_config(&config(None)), Err(LlmError::Unavailable)));
        assert!(HttpLlmClient::from_config(&config(Some("sk-test"))).is_ok());
    }

    #[tokio::test]
    async fn transport_failures_are_classified() {
        let client = HttpLlmClient::from_config(&config(Some("sk-test"))).expect("client");
        let result = client.generate_reply("ctx", "oi").await;
        assert!(matches!(result, Err(LlmError::Transport(_) | LlmError::Timeout)));
    }
}
