// SPDX-License-Identifier: MIT

//! Structured output: schema derivation and coercion

use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::{ChatModel, GenerationConfig, Message};
use crate::error::ModelError;

/// JSON schema a structured completion must satisfy
#[derive(Debug, Clone, PartialEq)]
pub struct OutputSchema {
    /// Schema name, also used as the tool/format name sent to providers
    pub name: String,
    pub schema: Value,
}

/// Derive the output schema of `T`
pub fn output_schema<T: JsonSchema>() -> OutputSchema {
    let root = schemars::schema_for!(T);
    OutputSchema {
        name: T::schema_name(),
        schema: serde_json::to_value(root).unwrap_or(Value::Null),
    }
}

/// Ask `model` for output matching `T`'s schema and coerce it into `T`
///
/// Fails with [`ModelError::SchemaValidation`] when the raw output cannot be
/// coerced. No retry happens here; callers decide whether to try again.
pub async fn invoke_structured<T>(
    model: &dyn ChatModel,
    messages: &[Message],
    config: Option<&GenerationConfig>,
) -> Result<T, ModelError>
where
    T: DeserializeOwned + JsonSchema,
{
    let schema = output_schema::<T>();
    let raw = model.invoke_json(messages, &schema, config).await?;
    coerce(&schema.name, raw)
}

/// Coerce raw model output into `T`
///
/// Text output is parsed as JSON first, tolerating a surrounding markdown
/// code fence.
pub fn coerce<T: DeserializeOwned>(schema_name: &str, raw: Value) -> Result<T, ModelError> {
    let value = match raw {
        Value::String(text) => serde_json::from_str(strip_code_fence(&text))
            .map_err(|e| ModelError::schema(schema_name, format!("output is not JSON: {}", e)))?,
        other => other,
    };

    serde_json::from_value(value).map_err(|e| ModelError::schema(schema_name, e.to_string()))
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // drop an optional language tag on the opening fence
    let body = rest.split_once('\n').map(|(_, body)| body).unwrap_or(rest);
    body.trim_end().trim_end_matches("```").trim()
}
