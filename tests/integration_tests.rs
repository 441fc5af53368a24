//! Integration tests for the assistant graph
//!
//! These tests run the compiled graph end to end against mock models and
//! both shared store implementations.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use rulegraph::adk::model::factory::LazyModel;
use rulegraph::adk::model::{ChatModel, GenerationConfig, Message, OutputSchema};
use rulegraph::assistant::{self, state, UserRules};
use rulegraph::error::{GraphError, ModelError, TopologyError};
use rulegraph::graph::{
    FileStore, GraphBuilder, InMemoryStore, PartitionKey, RunConfig, RunEvent, SharedStore,
    StateSnapshot, StateUpdate, Target, END, START,
};
use rulegraph::settings::{ModelSettings, StoreKind, StoreSettings};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;

// ============================================================================
// Mock Components
// ============================================================================

/// Mock model that answers free-form calls with `reply` and structured calls
/// with the next entry of `structured`
struct MockModel {
    reply: String,
    structured: Vec<Value>,
    calls: AtomicUsize,
    structured_index: AtomicUsize,
}

impl MockModel {
    fn new(reply: &str, structured: Vec<Value>) -> Self {
        Self {
            reply: reply.to_string(),
            structured,
            calls: AtomicUsize::new(0),
            structured_index: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatModel for MockModel {
    async fn invoke(
        &self,
        _messages: &[Message],
        _config: Option<&GenerationConfig>,
    ) -> Result<Message, ModelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Message::assistant(self.reply.clone()))
    }

    async fn invoke_json(
        &self,
        _messages: &[Message],
        schema: &OutputSchema,
        _config: Option<&GenerationConfig>,
    ) -> Result<Value, ModelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let idx = self.structured_index.fetch_add(1, Ordering::SeqCst);
        self.structured.get(idx).cloned().ok_or_else(|| {
            ModelError::InvalidResponse(format!("no scripted output for {}", schema.name))
        })
    }
}

/// Mock model that never answers
struct StalledModel;

#[async_trait]
impl ChatModel for StalledModel {
    async fn invoke(
        &self,
        _messages: &[Message],
        _config: Option<&GenerationConfig>,
    ) -> Result<Message, ModelError> {
        std::future::pending().await
    }

    async fn invoke_json(
        &self,
        _messages: &[Message],
        _schema: &OutputSchema,
        _config: Option<&GenerationConfig>,
    ) -> Result<Value, ModelError> {
        std::future::pending().await
    }
}

static STORED_RULES: Lazy<Value> =
    Lazy::new(|| json!({"styleRules": ["be concise"], "contentRules": []}));

fn rules_key(assistant_id: &str) -> PartitionKey {
    PartitionKey::new(state::USER_RULES, assistant_id)
}

fn config(assistant_id: &str) -> RunConfig {
    RunConfig::new().with(state::ASSISTANT_ID, assistant_id)
}

fn user_input(text: &str) -> StateUpdate {
    StateUpdate::new().set(state::MESSAGES, json!([Message::user(text)]))
}

fn temp_root() -> std::path::PathBuf {
    std::env::temp_dir().join(format!("rulegraph-it-{}", uuid::Uuid::new_v4()))
}

// ============================================================================
// Assistant Scenarios
// ============================================================================

#[tokio::test]
async fn test_only_get_rules_skips_model() {
    let store = Arc::new(InMemoryStore::new());
    store
        .put(&rules_key("a1"), STORED_RULES.clone())
        .await
        .unwrap();

    let model = Arc::new(MockModel::new("unused", vec![]));
    let graph = assistant::build_graph(model.clone(), store).unwrap();

    let result = graph
        .invoke(
            StateUpdate::new(),
            &config("a1").with(state::ONLY_GET_RULES, true),
        )
        .await
        .unwrap();

    assert_eq!(result.get(state::RULES), Some(&*STORED_RULES));
    assert_eq!(model.calls(), 0);
}

#[tokio::test]
async fn test_only_get_rules_never_creates_model_client() {
    let store = Arc::new(InMemoryStore::new());
    store
        .put(&rules_key("a1"), STORED_RULES.clone())
        .await
        .unwrap();

    let settings = ModelSettings {
        provider: Some("OpenAI".to_string()),
        ..ModelSettings::default()
    };
    let model = Arc::new(LazyModel::new(settings).unwrap());
    let graph = assistant::build_graph(model.clone(), store).unwrap();

    let result = graph
        .invoke(
            StateUpdate::new(),
            &config("a1").with(state::ONLY_GET_RULES, true),
        )
        .await
        .unwrap();

    assert_eq!(result.get(state::RULES), Some(&*STORED_RULES));
    assert!(!model.is_initialized());
}

#[tokio::test]
async fn test_accepted_text_learns_rules() {
    let store = Arc::new(InMemoryStore::new());
    let model = Arc::new(MockModel::new(
        "unused",
        vec![json!({"styleRules": ["use short sentences"], "contentRules": ["no hashtags"]})],
    ));
    let graph = assistant::build_graph(model.clone(), store.clone()).unwrap();

    let result = graph
        .invoke(
            user_input("Write a post about Rust"),
            &config("a1").with(state::HAS_ACCEPTED_TEXT, true),
        )
        .await
        .unwrap();

    let expected = json!({"styleRules": ["use short sentences"], "contentRules": ["no hashtags"]});
    assert_eq!(store.get(&rules_key("a1")).await.unwrap(), Some(expected.clone()));
    assert_eq!(result.get(state::USER_RULES), Some(&expected));
    assert_eq!(model.calls(), 1);

    // other partitions are untouched
    assert_eq!(store.get(&rules_key("a2")).await.unwrap(), None);
}

#[tokio::test]
async fn test_default_run_checks_generated_content() {
    let store = Arc::new(InMemoryStore::new());
    let model = Arc::new(MockModel::new(
        "Here is your post",
        vec![json!({"contentGenerated": true})],
    ));
    let graph = Arc::new(assistant::build_graph(model.clone(), store).unwrap());

    let events: Vec<RunEvent> = graph
        .stream(user_input("Write a post"), config("a1"))
        .collect()
        .await;

    let visited: Vec<&str> = events
        .iter()
        .filter_map(|e| match e {
            RunEvent::NodeStarted { node } => Some(node.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(visited, vec![state::CALL_MODEL, state::WAS_CONTENT_GENERATED]);

    match events.last() {
        Some(RunEvent::Finished { state: final_state }) => {
            assert_eq!(final_state[state::CONTENT_GENERATED], json!(true));
            assert_eq!(
                final_state[state::MESSAGES],
                json!([
                    {"role": "user", "content": "Write a post"},
                    {"role": "assistant", "content": "Here is your post"}
                ])
            );
        }
        other => panic!("expected Finished, got {:?}", other),
    }
    assert_eq!(model.calls(), 2);
}

#[tokio::test]
async fn test_schema_validation_error_aborts_run() {
    let store = Arc::new(InMemoryStore::new());
    let model = Arc::new(MockModel::new("", vec![json!({"styleRules": 3})]));
    let graph = assistant::build_graph(model, store.clone()).unwrap();

    let err = graph
        .invoke(
            user_input("hi"),
            &config("a1").with(state::HAS_ACCEPTED_TEXT, true),
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        GraphError::Model(ModelError::SchemaValidation { .. })
    ));
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn test_missing_assistant_id_is_rejected() {
    let model = Arc::new(MockModel::new("", vec![]));
    let graph = assistant::build_graph(model.clone(), Arc::new(InMemoryStore::new())).unwrap();

    let err = graph
        .invoke(StateUpdate::new(), &RunConfig::new())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        GraphError::MissingPartitionKey { ref option, .. } if option == state::ASSISTANT_ID
    ));
    assert_eq!(model.calls(), 0);
}

// ============================================================================
// Shared Store
// ============================================================================

#[tokio::test]
async fn test_file_store_persists_across_graphs() {
    let root = temp_root();

    let learner = Arc::new(MockModel::new(
        "",
        vec![json!({"styleRules": ["be formal"], "contentRules": []})],
    ));
    let graph = assistant::build_graph(learner, Arc::new(FileStore::new(&root))).unwrap();
    graph
        .invoke(
            user_input("Draft a letter"),
            &config("team").with(state::HAS_ACCEPTED_TEXT, true),
        )
        .await
        .unwrap();
    drop(graph);

    // a fresh graph over the same directory sees the learned rules
    let reader = Arc::new(MockModel::new("", vec![]));
    let store = Arc::new(FileStore::new(&root));
    let graph = assistant::build_graph(reader.clone(), store.clone()).unwrap();
    let result = graph
        .invoke(
            StateUpdate::new(),
            &config("team").with(state::ONLY_GET_RULES, true),
        )
        .await
        .unwrap();

    assert_eq!(
        result.get(state::RULES),
        Some(&json!({"styleRules": ["be formal"], "contentRules": []}))
    );
    assert_eq!(
        assistant::load_rules(store.as_ref(), "team").await.unwrap(),
        UserRules {
            style_rules: vec!["be formal".to_string()],
            content_rules: vec![],
        }
    );
    assert_eq!(reader.calls(), 0);

    let _ = std::fs::remove_dir_all(&root);
}

#[tokio::test]
async fn test_default_store_keeps_rules_between_processes() {
    let settings = StoreSettings {
        path: temp_root(),
        ..StoreSettings::default()
    };
    assert_eq!(settings.kind, StoreKind::File);

    let model = Arc::new(MockModel::new(
        "",
        vec![json!({"styleRules": ["be concise"], "contentRules": []})],
    ));
    let graph = assistant::build_graph(model, settings.open()).unwrap();
    graph
        .invoke(
            user_input("Shorter please"),
            &config("demo").with(state::HAS_ACCEPTED_TEXT, true),
        )
        .await
        .unwrap();

    // a second open of the same settings, as a later CLI invocation would do
    let rules = assistant::load_rules(settings.open().as_ref(), "demo")
        .await
        .unwrap();
    assert_eq!(rules.style_rules, vec!["be concise"]);

    let _ = std::fs::remove_dir_all(&settings.path);
}

#[tokio::test]
async fn test_concurrent_runs_on_distinct_partitions() {
    let store = Arc::new(InMemoryStore::new());
    let model = Arc::new(MockModel::new(
        "",
        vec![
            json!({"styleRules": ["x"], "contentRules": []}),
            json!({"styleRules": ["x"], "contentRules": []}),
            json!({"styleRules": ["x"], "contentRules": []}),
        ],
    ));
    let graph = Arc::new(assistant::build_graph(model, store.clone()).unwrap());

    let handles: Vec<_> = ["a", "b", "c"]
        .into_iter()
        .map(|id| {
            let graph = graph.clone();
            tokio::spawn(async move {
                graph
                    .invoke(
                        user_input("ok"),
                        &config(id).with(state::HAS_ACCEPTED_TEXT, true),
                    )
                    .await
            })
        })
        .collect();

    for handle in handles {
        handle.await.unwrap().unwrap();
    }
    assert_eq!(store.len().await, 3);
}

// ============================================================================
// Engine
// ============================================================================

#[test]
fn test_router_omitting_end_is_rejected() {
    let mut builder = GraphBuilder::new("loop", state::schema());
    builder
        .add_node("a", assistant::nodes::GetRules)
        .add_conditional_edges(
            START,
            |_: &StateSnapshot, _: &RunConfig| Target::node("a"),
            ["a"],
        )
        .add_conditional_edges("a", |_: &StateSnapshot, _: &RunConfig| Target::node("a"), ["a"]);

    assert!(matches!(
        builder.compile(),
        Err(TopologyError::NoPathToEnd(_))
    ));
}

#[test]
fn test_edge_to_unknown_node_is_rejected() {
    let mut builder = GraphBuilder::new("broken", state::schema());
    builder
        .add_node("a", assistant::nodes::GetRules)
        .add_edge(START, "a")
        .add_edge("a", "missing");

    assert_eq!(
        builder.compile().err(),
        Some(TopologyError::UnknownNode {
            from: "a".to_string(),
            node: "missing".to_string(),
        })
    );
}

#[test]
fn test_end_only_graph_compiles() {
    let mut builder = GraphBuilder::new("noop", state::schema());
    builder.add_edge(START, END);
    assert!(builder.compile().is_ok());
}

#[tokio::test]
async fn test_cancellation_stops_inflight_node() {
    let store = Arc::new(InMemoryStore::new());
    let graph = assistant::build_graph(Arc::new(StalledModel), store.clone()).unwrap();

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    let err = graph
        .invoke_with_cancel(
            user_input("hi"),
            &config("a1").with(state::HAS_ACCEPTED_TEXT, true),
            &cancel,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, GraphError::Cancelled));
    assert!(store.is_empty().await);
}
