//! Graph executor

use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::builder::Edge;
use super::config::RunConfig;
use super::node::Node;
use super::router::{Target, START};
use super::shared::{PartitionKey, SharedStore};
use super::state::{RunState, SharedWrite, StateSchema, StateSnapshot, StateUpdate};
use crate::error::GraphError;

/// Node steps a run may take unless the builder says otherwise
pub const DEFAULT_RECURSION_LIMIT: usize = 25;

const EVENT_BUFFER: usize = 32;

/// Progress of a streamed run
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RunEvent {
    /// An edge was followed
    Routed { from: String, to: String },
    /// A node is about to run
    NodeStarted { node: String },
    /// A node returned and its update was merged
    NodeCompleted { node: String, update: Value },
    /// The run reached the end
    Finished { state: Value },
    /// The run was aborted
    Failed { error: String },
}

/// Immutable, executable graph
///
/// Holds no per-run state, so one instance can serve concurrent runs.
pub struct CompiledGraph {
    name: String,
    schema: Arc<StateSchema>,
    nodes: HashMap<String, Arc<dyn Node>>,
    edges: HashMap<String, Edge>,
    store: Arc<dyn SharedStore>,
    recursion_limit: usize,
}

impl CompiledGraph {
    pub(crate) fn new(
        name: String,
        schema: Arc<StateSchema>,
        nodes: HashMap<String, Arc<dyn Node>>,
        edges: HashMap<String, Edge>,
        store: Arc<dyn SharedStore>,
        recursion_limit: usize,
    ) -> Self {
        Self {
            name,
            schema,
            nodes,
            edges,
            store,
            recursion_limit,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &StateSchema {
        &self.schema
    }

    pub fn store(&self) -> &Arc<dyn SharedStore> {
        &self.store
    }

    /// Registered node names, sorted
    pub fn node_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.nodes.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Run the graph to completion
    pub async fn invoke(
        &self,
        input: StateUpdate,
        config: &RunConfig,
    ) -> Result<StateSnapshot, GraphError> {
        self.execute(input, config, None, None).await
    }

    /// Run the graph, aborting as soon as `cancel` fires
    ///
    /// An in-flight node is dropped and nothing it would have returned is
    /// merged.
    pub async fn invoke_with_cancel(
        &self,
        input: StateUpdate,
        config: &RunConfig,
        cancel: &CancellationToken,
    ) -> Result<StateSnapshot, GraphError> {
        self.execute(input, config, Some(cancel), None).await
    }

    /// Run the graph on a background task, streaming progress events
    ///
    /// The stream ends after a `Finished` or `Failed` event. Dropping the
    /// stream cancels the run: an in-flight node is dropped and no further
    /// node runs.
    pub fn stream(
        self: &Arc<Self>,
        input: StateUpdate,
        config: RunConfig,
    ) -> ReceiverStream<RunEvent> {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let graph = Arc::clone(self);

        tokio::spawn(async move {
            let cancel = CancellationToken::new();
            let run = graph.execute(input, &config, Some(&cancel), Some(&tx));
            tokio::pin!(run);

            let result = tokio::select! {
                result = &mut run => result,
                _ = tx.closed() => {
                    log::warn!("Stream of graph '{}' dropped, cancelling run", graph.name);
                    cancel.cancel();
                    run.await
                }
            };

            let event = match result {
                Ok(state) => RunEvent::Finished {
                    state: state.to_json(),
                },
                Err(e) => RunEvent::Failed {
                    error: e.to_string(),
                },
            };
            let _ = tx.send(event).await;
        });

        ReceiverStream::new(rx)
    }

    async fn execute(
        &self,
        input: StateUpdate,
        config: &RunConfig,
        cancel: Option<&CancellationToken>,
        events: Option<&mpsc::Sender<RunEvent>>,
    ) -> Result<StateSnapshot, GraphError> {
        let run_id = Uuid::new_v4();
        log::info!("Starting run {} of graph '{}'", run_id, self.name);

        let result = self.drive(run_id, input, config, cancel, events).await;
        match &result {
            Ok(_) => log::info!("Run {} of graph '{}' finished", run_id, self.name),
            Err(e) => log::error!("Run {} of graph '{}' aborted: {}", run_id, self.name, e),
        }
        result
    }

    async fn drive(
        &self,
        run_id: Uuid,
        input: StateUpdate,
        config: &RunConfig,
        cancel: Option<&CancellationToken>,
        events: Option<&mpsc::Sender<RunEvent>>,
    ) -> Result<StateSnapshot, GraphError> {
        let partitions = self.partition_keys(config)?;

        let mut state = RunState::new(&self.schema);
        let writes = state.apply(&self.schema, input)?;
        self.forward(&partitions, writes).await?;

        let mut current = START.to_string();
        let mut steps = 0;

        loop {
            // shared fields are re-read at every node boundary
            let snapshot = self.resolve(&state, &partitions).await?;

            let next = self.next_target(&current, &snapshot, config)?;
            log::info!("Run {}: {} -> {}", run_id, current, next);
            emit(
                events,
                RunEvent::Routed {
                    from: current.clone(),
                    to: next.to_string(),
                },
            )
            .await;

            let node_name = match next {
                Target::End => return Ok(snapshot),
                Target::Node(name) => name,
            };

            if cancel.is_some_and(|token| token.is_cancelled()) {
                log::warn!("Run {} cancelled before node '{}'", run_id, node_name);
                return Err(GraphError::Cancelled);
            }

            steps += 1;
            if steps > self.recursion_limit {
                return Err(GraphError::RecursionLimit(self.recursion_limit));
            }

            let node = self
                .nodes
                .get(&node_name)
                .ok_or_else(|| GraphError::node(node_name.as_str(), "node is not registered"))?;

            emit(
                events,
                RunEvent::NodeStarted {
                    node: node_name.clone(),
                },
            )
            .await;

            let update = match cancel {
                Some(token) => {
                    tokio::select! {
                        biased;
                        _ = token.cancelled() => {
                            log::warn!("Run {} cancelled during node '{}'", run_id, node_name);
                            return Err(GraphError::Cancelled);
                        }
                        result = node.call(&snapshot, config) => result?,
                    }
                }
                None => node.call(&snapshot, config).await?,
            };

            log::debug!(
                "Run {}: merging update from '{}': {:?}",
                run_id,
                node_name,
                update
            );
            let completed = events.map(|_| update.clone().into_json());

            let writes = state.apply(&self.schema, update)?;
            self.forward(&partitions, writes).await?;

            if let Some(update) = completed {
                emit(
                    events,
                    RunEvent::NodeCompleted {
                        node: node_name.clone(),
                        update,
                    },
                )
                .await;
            }

            current = node_name;
        }
    }

    /// Partition key of every shared field for this run
    fn partition_keys(
        &self,
        config: &RunConfig,
    ) -> Result<HashMap<String, PartitionKey>, GraphError> {
        let mut keys = HashMap::new();
        for (field, option) in self.schema.shared_fields() {
            let id = config
                .partition_value(option)
                .ok_or_else(|| GraphError::MissingPartitionKey {
                    field: field.clone(),
                    option: option.clone(),
                })?;
            keys.insert(field.clone(), PartitionKey::new(field.as_str(), id));
        }
        Ok(keys)
    }

    /// Read every shared field from the store into a snapshot
    async fn resolve(
        &self,
        state: &RunState,
        partitions: &HashMap<String, PartitionKey>,
    ) -> Result<StateSnapshot, GraphError> {
        let mut shared = HashMap::with_capacity(partitions.len());
        for (field, key) in partitions {
            let value = match self.store.get(key).await? {
                Some(value) => value,
                None => self
                    .schema
                    .get(field)
                    .map(|def| def.default_value())
                    .unwrap_or(Value::Null),
            };
            shared.insert(field.clone(), value);
        }
        Ok(state.snapshot(shared))
    }

    /// Send shared writes to the store, one put per field
    async fn forward(
        &self,
        partitions: &HashMap<String, PartitionKey>,
        writes: Vec<SharedWrite>,
    ) -> Result<(), GraphError> {
        for write in writes {
            let key = partitions.get(&write.field).ok_or_else(|| {
                GraphError::MissingPartitionKey {
                    field: write.field.clone(),
                    option: String::new(),
                }
            })?;
            log::debug!("Writing shared field '{}' to {}", write.field, key);
            self.store.put(key, write.value).await?;
        }
        Ok(())
    }

    fn next_target(
        &self,
        from: &str,
        state: &StateSnapshot,
        config: &RunConfig,
    ) -> Result<Target, GraphError> {
        let edge = self
            .edges
            .get(from)
            .ok_or_else(|| GraphError::node(from, "node has no outgoing edge"))?;

        match edge {
            Edge::Direct(target) => Ok(target.clone()),
            Edge::Conditional { router, candidates } => {
                let target = router.route(state, config);
                if candidates.contains(&target) {
                    Ok(target)
                } else {
                    Err(GraphError::InvalidRoute {
                        from: from.to_string(),
                        target: target.to_string(),
                        candidates: candidates.iter().map(Target::to_string).collect(),
                    })
                }
            }
        }
    }
}

async fn emit(events: Option<&mpsc::Sender<RunEvent>>, event: RunEvent) {
    if let Some(tx) = events {
        let _ = tx.send(event).await;
    }
}
