use std::time::Duration;

use async_trait::async_trait;
use patchwise_core::{LlmConfig, ReviewerError};
use serde::{Deserialize, Serialize};

use crate::retry::{classify_status, classify_transport, retry_after_secs};

const DEFAULT_BASE_URL: &str = "https://api.openai.com";

/// A message in a chat conversation with the LLM.
///
/// # Examples
///
/// ```
/// use patchwise_review::llm::{ChatMessage, Role};
///
/// let msg = ChatMessage {
///     role: Role::User,
///     content: "Review this code".into(),
/// };
/// assert!(matches!(msg.role, Role::User));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    /// Role of the message sender.
    pub role: Role,
    /// Text content of the message.
    pub content: String,
}

/// Role in the chat conversation.
///
/// # Examples
///
/// ```
/// use patchwise_review::llm::Role;
///
/// let role = Role::System;
/// assert_eq!(serde_json::to_string(&role).unwrap(), "\"system\"");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System-level instructions.
    System,
    /// User input.
    User,
    /// Assistant response.
    Assistant,
}

/// A chat model that answers one conversation with one text reply.
///
/// Implementations make a single attempt; retries live in the caller.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Model identifier, for logs and reports.
    fn model(&self) -> &str;

    /// Send `messages` and return the assistant's reply text.
    async fn chat(&self, messages: &[ChatMessage]) -> Result<String, ReviewerError>;
}

/// OpenAI-compatible chat completions client.
///
/// Works with any provider that exposes the `/v1/chat/completions` endpoint:
/// OpenAI, Azure-style proxies, Ollama, vLLM, LiteLLM, etc.
///
/// # Examples
///
/// ```
/// use patchwise_core::LlmConfig;
/// use patchwise_review::llm::{ChatModel, OpenAiClient};
///
/// let client = OpenAiClient::new(&LlmConfig::default(), "sk-test").unwrap();
/// assert_eq!(client.model(), "gpt-4o");
/// ```
pub struct OpenAiClient {
    client: reqwest::Client,
    config: LlmConfig,
    api_key: String,
}

impl OpenAiClient {
    /// Create a new client from configuration and an API key.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewerError::Llm`] if the HTTP client cannot be built.
    pub fn new(config: &LlmConfig, api_key: impl Into<String>) -> Result<Self, ReviewerError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ReviewerError::Llm(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            config: config.clone(),
            api_key: api_key.into(),
        })
    }

    fn endpoint(&self) -> String {
        let base_url = self
            .config
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/');
        format!("{base_url}/v1/chat/completions")
    }
}

#[async_trait]
impl ChatModel for OpenAiClient {
    fn model(&self) -> &str {
        &self.config.model
    }

    /// Builds a request to `{base_url}/v1/chat/completions` with the configured
    /// model and temperature, asking for a JSON object response.
    async fn chat(&self, messages: &[ChatMessage]) -> Result<String, ReviewerError> {
        let body = serde_json::json!({
            "model": self.config.model,
            "messages": messages,
            "temperature": self.config.temperature,
            "response_format": { "type": "json_object" },
        });

        tracing::debug!(model = %self.config.model, messages = messages.len(), "calling chat completions");
        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| classify_transport(&e, ReviewerError::Llm))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = retry_after_secs(response.headers());
            let body_text = response.text().await.unwrap_or_default();
            return Err(classify_status(
                status.as_u16(),
                retry_after,
                body_text,
                ReviewerError::Llm,
            ));
        }

        let response_body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| classify_transport(&e, ReviewerError::MalformedResponse))?;

        extract_content(&response_body)
    }
}

fn extract_content(response_body: &serde_json::Value) -> Result<String, ReviewerError> {
    response_body
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| {
            ReviewerError::MalformedResponse(format!(
                "unexpected response structure: {response_body}"
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_uses_custom_base_url() {
        let config = LlmConfig {
            base_url: Some("http://localhost:11434/".into()),
            ..LlmConfig::default()
        };
        let client = OpenAiClient::new(&config, "k").unwrap();
        assert_eq!(
            client.endpoint(),
            "http://localhost:11434/v1/chat/completions"
        );
    }

    #[test]
    fn endpoint_defaults_to_openai() {
        let client = OpenAiClient::new(&LlmConfig::default(), "k").unwrap();
        assert_eq!(
            client.endpoint(),
            "https://api.openai.com/v1/chat/completions"
        );
    }

    #[test]
    fn model_returns_config_model() {
        let config = LlmConfig {
            model: "gpt-4o-mini".into(),
            ..LlmConfig::default()
        };
        let client = OpenAiClient::new(&config, "k").unwrap();
        assert_eq!(client.model(), "gpt-4o-mini");
    }

    #[test]
    fn chat_message_serializes() {
        let msg = ChatMessage {
            role: Role::System,
            content: "hello".into(),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "system");
        assert_eq!(json["content"], "hello");
    }

    #[test]
    fn extracts_first_choice() {
        let body = serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": "{\"comments\":[]}" } }]
        });
        assert_eq!(extract_content(&body).unwrap(), "{\"comments\":[]}");
    }

    #[test]
    fn missing_choices_is_malformed() {
        let body = serde_json::json!({ "error": "nope" });
        assert!(matches!(
            extract_content(&body),
            Err(ReviewerError::MalformedResponse(_))
        ));
    }
}
