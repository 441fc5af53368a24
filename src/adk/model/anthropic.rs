//! Anthropic Model - Claude messages API implementation

use super::{ChatModel, GenerationConfig, Message, OutputSchema, Role};
use crate::error::ModelError;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::env;

const PROVIDER: &str = "Anthropic";

/// Anthropic Claude model implementation
pub struct AnthropicModel {
    client: Client,
    api_key: String,
    model_name: String,
    base_url: String,
}

impl AnthropicModel {
    /// Create a new AnthropicModel
    ///
    /// Requires `ANTHROPIC_API_KEY` environment variable to be set.
    /// Optionally uses `ANTHROPIC_BASE_URL` for custom endpoints.
    pub fn new(model_name: String) -> Result<Self, ModelError> {
        let api_key = env::var("ANTHROPIC_API_KEY")
            .map_err(|_| ModelError::ApiKeyMissing(PROVIDER.into()))?;
        let base_url = env::var("ANTHROPIC_BASE_URL")
            .unwrap_or_else(|_| "https://api.anthropic.com/v1".to_string());

        Ok(Self {
            client: Client::new(),
            api_key,
            model_name,
            base_url,
        })
    }

    /// Override the endpoint
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// System messages are sent separately; join them in order
    fn extract_system_message(messages: &[Message]) -> Option<String> {
        let system: Vec<&str> = messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .collect();
        if system.is_empty() {
            None
        } else {
            Some(system.join("\n\n"))
        }
    }

    fn to_anthropic_message(message: &Message) -> Option<Value> {
        let role = match message.role {
            Role::System => return None,
            Role::User => "user",
            Role::Assistant => "assistant",
        };
        Some(json!({
            "role": role,
            "content": [{ "type": "text", "text": message.content }]
        }))
    }

    fn request_body(&self, messages: &[Message], config: Option<&GenerationConfig>) -> Value {
        let converted: Vec<Value> = messages
            .iter()
            .filter_map(Self::to_anthropic_message)
            .collect();

        let mut body = json!({
            "model": self.model_name,
            "messages": converted,
            "max_tokens": config.and_then(|c| c.max_output_tokens).unwrap_or(4096)
        });

        if let Some(sys) = Self::extract_system_message(messages) {
            body["system"] = json!(sys);
        }

        if let Some(cfg) = config {
            if let Some(temp) = cfg.temperature {
                body["temperature"] = json!(temp);
            }
            if let Some(top_p) = cfg.top_p {
                body["top_p"] = json!(top_p);
            }
        }

        body
    }

    /// Concatenated text blocks of a response
    fn parse_text(response: &Value) -> Result<String, ModelError> {
        let blocks = response["content"]
            .as_array()
            .ok_or_else(|| ModelError::InvalidResponse("No content in Anthropic response".into()))?;

        if let Some(stop_reason) = response["stop_reason"].as_str() {
            log::debug!("Anthropic stop reason: {}", stop_reason);
        }

        Ok(blocks
            .iter()
            .filter(|b| b["type"] == "text")
            .filter_map(|b| b["text"].as_str())
            .collect::<Vec<_>>()
            .join(""))
    }

    /// Input of the forced tool call, falling back to the text output
    fn parse_tool_input(response: &Value, tool_name: &str) -> Result<Value, ModelError> {
        let blocks = response["content"]
            .as_array()
            .ok_or_else(|| ModelError::InvalidResponse("No content in Anthropic response".into()))?;

        let tool_input = blocks
            .iter()
            .find(|b| b["type"] == "tool_use" && b["name"] == tool_name)
            .map(|b| b["input"].clone());

        match tool_input {
            Some(input) => Ok(input),
            None => Ok(Value::String(Self::parse_text(response)?)),
        }
    }

    async fn send(&self, body: &Value) -> Result<Value, ModelError> {
        let url = format!("{}/messages", self.base_url);

        log::debug!(
            "Anthropic request body: {}",
            serde_json::to_string_pretty(body).unwrap_or_default()
        );

        let resp = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await?;
            return Err(ModelError::api(PROVIDER, format!("{}: {}", status, text)));
        }

        let resp_json: Value = resp.json().await?;
        log::debug!("Anthropic response: {}", resp_json);
        Ok(resp_json)
    }
}

#[async_trait]
impl ChatModel for AnthropicModel {
    async fn invoke(
        &self,
        messages: &[Message],
        config: Option<&GenerationConfig>,
    ) -> Result<Message, ModelError> {
        let body = self.request_body(messages, config);
        let resp = self.send(&body).await?;
        Ok(Message::assistant(Self::parse_text(&resp)?))
    }

    async fn invoke_json(
        &self,
        messages: &[Message],
        schema: &OutputSchema,
        config: Option<&GenerationConfig>,
    ) -> Result<Value, ModelError> {
        let mut body = self.request_body(messages, config);
        body["tools"] = json!([{
            "name": schema.name,
            "description": format!("Respond with a {} object", schema.name),
            "input_schema": schema.schema
        }]);
        body["tool_choice"] = json!({ "type": "tool", "name": schema.name });

        let resp = self.send(&body).await?;
        Self::parse_tool_input(&resp, &schema.name)
    }
}
