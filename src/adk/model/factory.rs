// SPDX-License-Identifier: MIT

//! Model factory - builds a chat model from settings

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::OnceCell;

use super::anthropic::AnthropicModel;
use super::openai::OpenAIModel;
use super::{ChatModel, GenerationConfig, Message, OutputSchema};
use crate::error::ModelError;
use crate::settings::ModelSettings;

/// Providers the factory can build
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    OpenAI,
    Anthropic,
}

/// Resolve the provider: explicit setting > model name prefix
pub fn resolve_provider(settings: &ModelSettings) -> Result<Provider, ModelError> {
    let provider = settings
        .provider
        .clone()
        .unwrap_or_else(|| infer_provider_from_model(&settings.name));

    match provider.as_str() {
        "OpenAI" | "openai" => Ok(Provider::OpenAI),
        "Anthropic" | "anthropic" => Ok(Provider::Anthropic),
        other => Err(ModelError::UnsupportedProvider(other.to_string())),
    }
}

/// Create the chat model described by `settings`
///
/// Fails with [`ModelError::ApiKeyMissing`] when the provider's key is not set.
pub fn create_model(settings: &ModelSettings) -> Result<Arc<dyn ChatModel>, ModelError> {
    let provider = resolve_provider(settings)?;
    log::debug!(
        "Using provider '{:?}' with model '{}'",
        provider,
        settings.name
    );

    match provider {
        Provider::OpenAI => {
            let mut model = OpenAIModel::new(settings.name.clone())?;
            if let Some(base_url) = &settings.base_url {
                model = model.with_base_url(base_url.trim_end_matches('/'));
            }
            Ok(Arc::new(model))
        }
        Provider::Anthropic => {
            let mut model = AnthropicModel::new(settings.name.clone())?;
            if let Some(base_url) = &settings.base_url {
                model = model.with_base_url(base_url.trim_end_matches('/'));
            }
            Ok(Arc::new(model))
        }
    }
}

/// Chat model created on first use
///
/// Graphs whose runs may never reach a model (for example when only stored
/// rules are read) can be built without provider credentials. A missing key
/// surfaces from the first `invoke`/`invoke_json` instead.
pub struct LazyModel {
    settings: ModelSettings,
    model: OnceCell<Arc<dyn ChatModel>>,
}

impl LazyModel {
    /// Check the provider now, defer client creation
    pub fn new(settings: ModelSettings) -> Result<Self, ModelError> {
        resolve_provider(&settings)?;
        Ok(Self {
            settings,
            model: OnceCell::new(),
        })
    }

    /// Whether the underlying client has been created
    pub fn is_initialized(&self) -> bool {
        self.model.initialized()
    }

    async fn model(&self) -> Result<&Arc<dyn ChatModel>, ModelError> {
        self.model
            .get_or_try_init(|| async { create_model(&self.settings) })
            .await
    }
}

#[async_trait]
impl ChatModel for LazyModel {
    async fn invoke(
        &self,
        messages: &[Message],
        config: Option<&GenerationConfig>,
    ) -> Result<Message, ModelError> {
        self.model().await?.invoke(messages, config).await
    }

    async fn invoke_json(
        &self,
        messages: &[Message],
        schema: &OutputSchema,
        config: Option<&GenerationConfig>,
    ) -> Result<Value, ModelError> {
        self.model().await?.invoke_json(messages, schema, config).await
    }
}

/// Infer the provider from a model name prefix, defaulting to OpenAI
pub fn infer_provider_from_model(model_name: &str) -> String {
    let name_lower = model_name.to_lowercase();
    if name_lower.starts_with("claude") {
        "Anthropic".to_string()
    } else {
        // gpt-*, o1-*, o3-* and anything served from an OpenAI-compatible endpoint
        "OpenAI".to_string()
    }
}
