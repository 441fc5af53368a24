// SPDX-License-Identifier: MIT

//! State schema definitions

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;

/// Schema defining the run state structure
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct StateSchema {
    /// Field definitions
    #[serde(flatten)]
    pub fields: HashMap<String, StateFieldDef>,
}

/// Definition of a single state field
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StateFieldDef {
    /// Type of the field
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// How updates to this field are merged
    #[serde(default)]
    pub policy: FieldPolicy,
    /// Default value, falls back to the empty value of `field_type`
    pub default: Option<Value>,
}

/// Supported field types
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    Boolean,
    Array,
    Object,
}

/// Merge policy for a field
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(rename_all = "lowercase", tag = "kind")]
pub enum FieldPolicy {
    /// Replace the value (default)
    #[default]
    Replace,
    /// Append to an ordered sequence
    Append,
    /// Proxy the value to the shared store, partitioned by a run config option
    Shared { partition_by: String },
}

impl FieldType {
    /// The value a field of this type holds before anything is written
    pub fn empty_value(&self) -> Value {
        match self {
            FieldType::String => json!(""),
            FieldType::Number => json!(0),
            FieldType::Boolean => json!(false),
            FieldType::Array => json!([]),
            FieldType::Object => json!({}),
        }
    }
}

impl StateFieldDef {
    pub fn new(field_type: FieldType, policy: FieldPolicy) -> Self {
        Self {
            field_type,
            policy,
            default: None,
        }
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    /// Declared default, or the empty value of the field type
    pub fn default_value(&self) -> Value {
        self.default
            .clone()
            .unwrap_or_else(|| self.field_type.empty_value())
    }

    pub fn is_shared(&self) -> bool {
        matches!(self.policy, FieldPolicy::Shared { .. })
    }
}

impl StateSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a field, builder style
    pub fn field(mut self, name: impl Into<String>, def: StateFieldDef) -> Self {
        self.fields.insert(name.into(), def);
        self
    }

    pub fn get(&self, name: &str) -> Option<&StateFieldDef> {
        self.fields.get(name)
    }

    /// Shared fields with the config option that partitions each of them
    pub fn shared_fields(&self) -> impl Iterator<Item = (&String, &String)> {
        self.fields.iter().filter_map(|(name, def)| match &def.policy {
            FieldPolicy::Shared { partition_by } => Some((name, partition_by)),
            _ => None,
        })
    }
}
