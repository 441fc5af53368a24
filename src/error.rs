// SPDX-License-Identifier: MIT

//! Typed error handling for rulegraph
//!
//! Errors are split by the layer that raises them:
//! - [`TopologyError`] is only ever produced by `GraphBuilder::compile`
//! - [`GraphError`] aborts a single run
//! - [`ModelError`] comes from a model collaborator and is surfaced verbatim
//! - [`StoreError`] comes from a shared value store

use thiserror::Error;

/// Error that aborts a graph run
#[derive(Debug, Error)]
pub enum GraphError {
    /// A node update touched a field the schema does not declare
    #[error("Unknown state field '{field}'")]
    UnknownField { field: String },

    /// A router returned a target outside its declared candidate set
    #[error("Router on '{from}' returned '{target}', expected one of {candidates:?}")]
    InvalidRoute {
        from: String,
        target: String,
        candidates: Vec<String>,
    },

    /// The graph could not be compiled
    #[error("Invalid graph topology: {0}")]
    Topology(#[from] TopologyError),

    /// A shared field is declared but the run configuration has no partition value for it
    #[error("Shared field '{field}' requires run configuration option '{option}'")]
    MissingPartitionKey { field: String, option: String },

    /// Failure surfaced by a model collaborator
    #[error(transparent)]
    Model(#[from] ModelError),

    /// Failure surfaced by the shared value store
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The run executed more node steps than the graph allows
    #[error("Recursion limit of {0} steps reached")]
    RecursionLimit(usize),

    /// The run was cancelled while a node was in flight
    #[error("Run cancelled")]
    Cancelled,

    /// A node failed for a reason of its own
    #[error("Node '{node}' failed: {message}")]
    Node { node: String, message: String },
}

/// Compile-time graph validation failures
#[derive(Debug, Error, PartialEq)]
pub enum TopologyError {
    #[error("Edge from '{from}' references unregistered node '{node}'")]
    UnknownNode { from: String, node: String },

    #[error("Node '{0}' is registered more than once")]
    DuplicateNode(String),

    #[error("Node name '{0}' is reserved")]
    ReservedName(String),

    #[error("Node '{0}' has no outgoing edge")]
    DeadEnd(String),

    #[error("Node '{0}' has more than one outgoing edge")]
    ConflictingEdges(String),

    #[error("Conditional edge from '{0}' declares no candidates")]
    EmptyCandidates(String),

    #[error("No edge leaves the start of the graph")]
    MissingEntry,

    #[error("No path to the end of the graph from {0:?}")]
    NoPathToEnd(Vec<String>),

    #[error("Shared field '{field}' has an empty partition option")]
    InvalidSharedField { field: String },

    #[error("Recursion limit must be at least 1")]
    ZeroRecursionLimit,
}

/// Model/LLM collaborator errors
#[derive(Debug, Error)]
pub enum ModelError {
    /// API key not configured
    #[error("API key not configured for provider: {0}")]
    ApiKeyMissing(String),

    /// Provider not supported
    #[error("Model provider not supported: {0}")]
    UnsupportedProvider(String),

    /// Non-success response from the provider
    #[error("API error from {provider}: {message}")]
    Api { provider: String, message: String },

    /// Transport failure
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    /// Response did not have the expected shape
    #[error("Invalid response from model: {0}")]
    InvalidResponse(String),

    /// Structured output could not be coerced into the requested schema
    #[error("Output does not match schema '{schema}': {message}")]
    SchemaValidation { schema: String, message: String },
}

/// Shared value store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("Invalid partition key: {0}")]
    InvalidKey(String),
}

/// Errors raised while loading settings
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid base URL '{value}': {source}")]
    InvalidUrl {
        value: String,
        source: url::ParseError,
    },

    #[error("Configuration error: {0}")]
    Invalid(String),
}

impl ModelError {
    /// Create an API error
    pub fn api(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Api {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create a schema validation error
    pub fn schema(schema: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SchemaValidation {
            schema: schema.into(),
            message: message.into(),
        }
    }
}

impl GraphError {
    /// Create an unknown field error
    pub fn unknown_field(field: impl Into<String>) -> Self {
        Self::UnknownField {
            field: field.into(),
        }
    }

    /// Create a node failure
    pub fn node(node: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Node {
            node: node.into(),
            message: message.into(),
        }
    }
}
