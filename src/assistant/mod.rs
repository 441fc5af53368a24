// SPDX-License-Identifier: MIT

//! Rule-learning writing assistant
//!
//! The graph answers a conversation with `callModel`, learns style and
//! content rules from accepted text with `generateInsights`, and returns the
//! learned rules with `getRules`. Rules are a shared field, partitioned by
//! the `assistant_id` run option, so they outlive any single run.

pub mod nodes;
pub mod prompts;
pub mod routes;
pub mod state;

use std::sync::Arc;

use crate::adk::model::{ChatModel, GenerationConfig};
use crate::error::{StoreError, TopologyError};
use crate::graph::{CompiledGraph, GraphBuilder, PartitionKey, SharedStore, END, START};

use nodes::{CallModel, GenerateInsights, GetRules, WasContentGenerated};
use routes::{route_after_model, route_start};
pub use state::{ContentCheck, UserRules};
use state::{
    CALL_MODEL, GENERATE_INSIGHTS, GET_RULES, USER_RULES, WAS_CONTENT_GENERATED,
};

pub const GRAPH_NAME: &str = "assistant";

/// Uncompiled assistant graph, for callers that tune limits before compiling
pub fn builder(model: Arc<dyn ChatModel>, generation: GenerationConfig) -> GraphBuilder {
    let mut graph = GraphBuilder::new(GRAPH_NAME, state::schema());
    graph
        .add_node(CALL_MODEL, CallModel::new(model.clone(), generation.clone()))
        .add_node(
            WAS_CONTENT_GENERATED,
            WasContentGenerated::new(model.clone(), generation.clone()),
        )
        .add_node(GENERATE_INSIGHTS, GenerateInsights::new(model, generation))
        .add_node(GET_RULES, GetRules)
        .add_conditional_edges(
            START,
            route_start,
            [CALL_MODEL, GENERATE_INSIGHTS, GET_RULES],
        )
        .add_conditional_edges(CALL_MODEL, route_after_model, [WAS_CONTENT_GENERATED, END])
        .add_edge(WAS_CONTENT_GENERATED, END)
        .add_edge(GENERATE_INSIGHTS, END)
        .add_edge(GET_RULES, END);
    graph
}

/// Compile the assistant graph over `store`
pub fn build_graph(
    model: Arc<dyn ChatModel>,
    store: Arc<dyn SharedStore>,
) -> Result<CompiledGraph, TopologyError> {
    builder(model, GenerationConfig::default()).compile_with_store(store)
}

/// Rules stored for an assistant, empty when none were learned yet
pub async fn load_rules(
    store: &dyn SharedStore,
    assistant_id: &str,
) -> Result<UserRules, StoreError> {
    let key = PartitionKey::new(USER_RULES, assistant_id);
    match store.get(&key).await? {
        Some(value) => Ok(serde_json::from_value(value)?),
        None => Ok(UserRules::default()),
    }
}
