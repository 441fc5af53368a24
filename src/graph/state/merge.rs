// SPDX-License-Identifier: MIT

//! Transient run state and the merge engine

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

use super::schema::{FieldPolicy, StateSchema};
use crate::error::GraphError;

/// Partial state update returned by a node
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateUpdate {
    values: Map<String, Value>,
}

impl StateUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field, builder style
    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(field.into(), value.into());
        self
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.values.get(field)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = &String> {
        self.values.keys()
    }

    pub fn into_json(self) -> Value {
        Value::Object(self.values)
    }
}

impl From<Map<String, Value>> for StateUpdate {
    fn from(values: Map<String, Value>) -> Self {
        Self { values }
    }
}

/// A write to a shared field, to be forwarded to the store
#[derive(Debug, Clone, PartialEq)]
pub struct SharedWrite {
    pub field: String,
    pub value: Value,
}

/// Per-run transient state
///
/// Holds every declared field except shared ones, which live in the store.
#[derive(Debug, Clone, PartialEq)]
pub struct RunState {
    fields: HashMap<String, Value>,
}

impl RunState {
    /// Create a fresh state holding the defaults of every non-shared field
    pub fn new(schema: &StateSchema) -> Self {
        let fields = schema
            .fields
            .iter()
            .filter(|(_, def)| !def.is_shared())
            .filter_map(|(name, def)| match (&def.policy, &def.default) {
                (FieldPolicy::Append, _) => Some((name.clone(), def.default_value())),
                (_, Some(default)) => Some((name.clone(), default.clone())),
                _ => None,
            })
            .collect();

        Self { fields }
    }

    /// Merge an update into a copy of this state
    pub fn merge(
        &self,
        schema: &StateSchema,
        update: &StateUpdate,
    ) -> Result<(RunState, Vec<SharedWrite>), GraphError> {
        let mut next = self.clone();
        let writes = next.apply(schema, update.clone())?;
        Ok((next, writes))
    }

    /// Merge an update in place, returning the writes bound for the shared store
    ///
    /// The whole update is checked against the schema first, so an unknown field
    /// leaves the state untouched.
    pub fn apply(
        &mut self,
        schema: &StateSchema,
        update: StateUpdate,
    ) -> Result<Vec<SharedWrite>, GraphError> {
        if let Some(unknown) = update.fields().find(|f| schema.get(f).is_none()) {
            return Err(GraphError::unknown_field(unknown.as_str()));
        }

        let mut writes = Vec::new();
        for (field, value) in update.values {
            let Some(def) = schema.get(&field) else {
                continue;
            };

            match &def.policy {
                FieldPolicy::Replace => {
                    self.fields.insert(field, value);
                }
                FieldPolicy::Append => {
                    let current = self
                        .fields
                        .entry(field)
                        .or_insert_with(|| Value::Array(vec![]));
                    if !current.is_array() {
                        *current = Value::Array(vec![current.take()]);
                    }
                    if let Value::Array(items) = current {
                        match value {
                            Value::Array(new_items) => items.extend(new_items),
                            other => items.push(other),
                        }
                    }
                }
                FieldPolicy::Shared { .. } => {
                    log::debug!("Forwarding write of shared field '{}'", field);
                    writes.push(SharedWrite { field, value });
                }
            }
        }

        Ok(writes)
    }

    /// Get a field value
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Combine with resolved shared values into a read-only view
    pub fn snapshot(&self, shared: HashMap<String, Value>) -> StateSnapshot {
        let mut values = self.fields.clone();
        values.extend(shared);
        StateSnapshot { values }
    }
}

/// Read-only view of state handed to nodes and routers
///
/// Shared fields hold the value the store returned when the view was taken.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct StateSnapshot {
    values: HashMap<String, Value>,
}

impl StateSnapshot {
    /// Get a field value
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Get a nested field value using dot notation (e.g., "userRules.styleRules")
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        let mut parts = path.split('.');
        let mut current = self.values.get(parts.next()?)?;
        for part in parts {
            current = current.get(part)?;
        }
        Some(current)
    }

    /// Boolean field, absent or non-boolean reads as false
    pub fn get_bool(&self, key: &str) -> bool {
        self.get(key).and_then(Value::as_bool).unwrap_or(false)
    }

    /// Convert state to JSON object
    pub fn to_json(&self) -> Value {
        Value::Object(
            self.values
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }

    /// Get all field names
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.values.keys()
    }
}
