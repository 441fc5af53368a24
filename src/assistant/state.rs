// SPDX-License-Identifier: MIT

//! Assistant state layout and names

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::adk::model::Message;
use crate::graph::{FieldPolicy, FieldType, StateFieldDef, StateSchema, StateSnapshot};

// State fields
pub const MESSAGES: &str = "messages";
pub const CONTENT_GENERATED: &str = "contentGenerated";
pub const RULES: &str = "rules";
pub const USER_RULES: &str = "userRules";

// Run configuration options
pub const ASSISTANT_ID: &str = "assistant_id";
pub const ONLY_GET_RULES: &str = "onlyGetRules";
pub const HAS_ACCEPTED_TEXT: &str = "hasAcceptedText";

// Nodes
pub const CALL_MODEL: &str = "callModel";
pub const WAS_CONTENT_GENERATED: &str = "wasContentGenerated";
pub const GENERATE_INSIGHTS: &str = "generateInsights";
pub const GET_RULES: &str = "getRules";

/// Style and content rules learned for one assistant
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserRules {
    /// Rules about tone, formatting and voice
    #[serde(default)]
    pub style_rules: Vec<String>,
    /// Rules about what to include or avoid
    #[serde(default)]
    pub content_rules: Vec<String>,
}

impl UserRules {
    pub fn is_empty(&self) -> bool {
        self.style_rules.is_empty() && self.content_rules.is_empty()
    }

    /// Read the rules from a snapshot; absent or malformed values read as empty
    pub fn from_snapshot(state: &StateSnapshot) -> Self {
        state
            .get(USER_RULES)
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default()
    }
}

/// Whether the last assistant reply contains generated content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ContentCheck {
    pub content_generated: bool,
}

/// Schema of the assistant graph state
pub fn schema() -> StateSchema {
    StateSchema::new()
        .field(
            MESSAGES,
            StateFieldDef::new(FieldType::Array, FieldPolicy::Append),
        )
        .field(
            CONTENT_GENERATED,
            StateFieldDef::new(FieldType::Boolean, FieldPolicy::Replace).with_default(json!(false)),
        )
        .field(
            RULES,
            StateFieldDef::new(FieldType::Object, FieldPolicy::Replace),
        )
        .field(
            USER_RULES,
            StateFieldDef::new(
                FieldType::Object,
                FieldPolicy::Shared {
                    partition_by: ASSISTANT_ID.to_string(),
                },
            )
            .with_default(json!({"styleRules": [], "contentRules": []})),
        )
}

/// Conversation messages held in state, skipping entries that are not messages
pub fn messages(state: &StateSnapshot) -> Vec<Message> {
    state
        .get(MESSAGES)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| serde_json::from_value(item.clone()).ok())
                .collect()
        })
        .unwrap_or_default()
}
