// SPDX-License-Identifier: MIT

//! Model module - defines the chat model trait and implementations
//!
//! This module provides the core [`ChatModel`] trait and shared types.
//! Provider implementations are in their own submodules:
//! - [anthropic] - Anthropic's Claude API
//! - [openai] - OpenAI's chat completions API
//!
//! Structured output goes through [`invoke_structured`], which derives the
//! JSON schema from the target type and coerces the raw model output into it.

pub mod anthropic;
pub mod factory;
pub mod openai;
mod structured;

pub use structured::{coerce, invoke_structured, output_schema, OutputSchema};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ModelError;

/// Configuration for model generation
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct GenerationConfig {
    pub temperature: Option<f32>,
    pub max_output_tokens: Option<u32>,
    pub top_p: Option<f32>,
}

/// Author of a message
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A message in the conversation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Core trait for model inference collaborators
///
/// Latency, retries and rate limits are the implementation's concern; the
/// graph engine only sees the returned result or error.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Free-form completion
    async fn invoke(
        &self,
        messages: &[Message],
        config: Option<&GenerationConfig>,
    ) -> Result<Message, ModelError>;

    /// Completion constrained to `schema`
    ///
    /// Returns the raw output: either a JSON value or the text the model
    /// produced. Use [`invoke_structured`] to get a typed result.
    async fn invoke_json(
        &self,
        messages: &[Message],
        schema: &OutputSchema,
        config: Option<&GenerationConfig>,
    ) -> Result<Value, ModelError>;
}
