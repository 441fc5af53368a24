// SPDX-License-Identifier: MIT

//! OpenAI Model - chat completions API implementation

use super::{ChatModel, GenerationConfig, Message, OutputSchema, Role};
use crate::error::ModelError;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::env;

const PROVIDER: &str = "OpenAI";

/// OpenAI chat model implementation
pub struct OpenAIModel {
    client: Client,
    api_key: String,
    model_name: String,
    base_url: String,
}

impl OpenAIModel {
    /// Create a new OpenAIModel
    ///
    /// Requires `OPENAI_API_KEY` environment variable to be set.
    /// Optionally uses `OPENAI_BASE_URL` for custom endpoints.
    pub fn new(model_name: String) -> Result<Self, ModelError> {
        let api_key =
            env::var("OPENAI_API_KEY").map_err(|_| ModelError::ApiKeyMissing(PROVIDER.into()))?;
        let base_url =
            env::var("OPENAI_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/v1".to_string());

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

    fn to_openai_message(message: &Message) -> Value {
        let role = match message.role {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        };
        json!({
            "role": role,
            "content": message.content
        })
    }

    fn request_body(
        &self,
        messages: &[Message],
        config: Option<&GenerationConfig>,
    ) -> Value {
        let messages: Vec<Value> = messages.iter().map(Self::to_openai_message).collect();

        let mut body = json!({
            "model": self.model_name,
            "messages": messages
        });

        if let Some(cfg) = config {
            if let Some(temp) = cfg.temperature {
                body["temperature"] = json!(temp);
            }
            if let Some(max_tokens) = cfg.max_output_tokens {
                body["max_tokens"] = json!(max_tokens);
            }
            if let Some(top_p) = cfg.top_p {
                body["top_p"] = json!(top_p);
            }
        }

        body
    }

    /// Extract the assistant text of the first choice
    fn parse_openai_response(response: &Value) -> Result<String, ModelError> {
        let choice = response["choices"]
            .as_array()
            .and_then(|c| c.first())
            .ok_or_else(|| ModelError::InvalidResponse("No choices in OpenAI response".into()))?;

        if let Some(refusal) = choice["message"]["refusal"].as_str() {
            return Err(ModelError::api(PROVIDER, format!("refused: {}", refusal)));
        }

        Ok(choice["message"]["content"]
            .as_str()
            .unwrap_or_default()
            .to_string())
    }

    async fn send(&self, body: &Value) -> Result<Value, ModelError> {
        let url = format!("{}/chat/completions", self.base_url);

        log::debug!(
            "OpenAI request body: {}",
            serde_json::to_string_pretty(body).unwrap_or_default()
        );

        let resp = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
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
        log::debug!("OpenAI response: {}", resp_json);
        Ok(resp_json)
    }
}

#[async_trait]
impl ChatModel for OpenAIModel {
    async fn invoke(
        &self,
        messages: &[Message],
        config: Option<&GenerationConfig>,
    ) -> Result<Message, ModelError> {
        let body = self.request_body(messages, config);
        let resp = self.send(&body).await?;
        Ok(Message::assistant(Self::parse_openai_response(&resp)?))
    }

    async fn invoke_json(
        &self,
        messages: &[Message],
        schema: &OutputSchema,
        config: Option<&GenerationConfig>,
    ) -> Result<Value, ModelError> {
        let mut body = self.request_body(messages, config);
        body["response_format"] = json!({
            "type": "json_schema",
            "json_schema": {
                "name": schema.name,
                "schema": schema.schema,
                "strict": false
            }
        });

        let resp = self.send(&body).await?;
        Ok(Value::String(Self::parse_openai_response(&resp)?))
    }
}
