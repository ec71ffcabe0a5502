use crate::llm::client::{ChatMessage, LLMClient, LLMError, Role};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

pub const ANTHROPIC_API_BASE: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 1024;

#[derive(Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "String::is_empty")]
    system: String,
    messages: Vec<&'a ChatMessage>,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

/// Client for the Anthropic Messages API
pub struct AnthropicClient {
    api_base: String,
    api_key: String,
    model: String,
    temperature: f32,
    http_client: Client,
}

impl AnthropicClient {
    pub fn new(
        api_base: impl Into<String>,
        model: impl Into<String>,
        api_key: String,
        timeout: Duration,
    ) -> Result<Self, LLMError> {
        let http_client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            api_base: api_base.into(),
            api_key,
            model: model.into(),
            temperature: 0.2,
            http_client,
        })
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/messages", self.api_base.trim_end_matches('/'))
    }

    /// Messages API takes the system prompt as a top-level field
    fn build_request<'a>(&'a self, messages: &'a [ChatMessage]) -> AnthropicRequest<'a> {
        let system = messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");

        AnthropicRequest {
            model: &self.model,
            max_tokens: MAX_TOKENS,
            temperature: self.temperature,
            system,
            messages: messages.iter().filter(|m| m.role != Role::System).collect(),
        }
    }
}

#[async_trait]
impl LLMClient for AnthropicClient {
    async fn chat(&self, messages: &[ChatMessage]) -> Result<String, LLMError> {
        let request_body = self.build_request(messages);

        debug!(endpoint = %self.endpoint(), model = %self.model, messages = messages.len(), "sending messages request");

        let response = self
            .http_client
            .post(self.endpoint())
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request_body)
            .send()
            .await
            .map_err(LLMError::from_transport)?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(LLMError::ApiError(format!(
                "API returned status {}: {}",
                status, error_text
            )));
        }

        let body = response.text().await.map_err(LLMError::from_transport)?;
        let api_response: AnthropicResponse = serde_json::from_str(&body)?;

        let text: Vec<String> = api_response
            .content
            .into_iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text)
            .collect();

        if text.is_empty() {
            return Err(LLMError::InvalidResponse("No text content in response".to_string()));
        }

        Ok(text.join(""))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> AnthropicClient {
        AnthropicClient::new(ANTHROPIC_API_BASE, "claude-test", "key".to_string(), Duration::from_secs(5))
            .unwrap()
    }

    #[test]
    fn test_system_prompt_is_hoisted() {
        let client = client();
        let messages = vec![
            ChatMessage::system("be terse"),
            ChatMessage::user("what is HEAD?"),
            ChatMessage::assistant("{\"action\":\"git\"}"),
        ];

        let request = client.build_request(&messages);
        assert_eq!(request.system, "be terse");
        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.messages[0].role, Role::User);

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["messages"][1]["role"], "assistant");
    }

    #[test]
    fn test_empty_system_is_omitted() {
        let client = client();
        let messages = vec![ChatMessage::user("hi")];
        let json = serde_json::to_value(client.build_request(&messages)).unwrap();
        assert!(json.get("system").is_none());
    }

    #[test]
    fn test_endpoint() {
        assert_eq!(client().endpoint(), "https://api.anthropic.com/v1/messages");
    }
}
