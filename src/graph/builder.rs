// SPDX-License-Identifier: MIT

//! Graph definition and compilation
//!
//! Build a graph with [`GraphBuilder`], then `compile` it into an immutable
//! [`CompiledGraph`]. Every topology check happens here, so a compiled graph
//! can only fail at run time because of its nodes, routers or store.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use super::executor::{CompiledGraph, DEFAULT_RECURSION_LIMIT};
use super::node::Node;
use super::router::{Router, Target, END, START};
use super::shared::{InMemoryStore, SharedStore};
use super::state::StateSchema;
use crate::error::TopologyError;

/// Outgoing edge of a node
pub(crate) enum Edge {
    /// Always proceed to the target
    Direct(Target),
    /// Ask the router, which must answer with one of the candidates
    Conditional {
        router: Arc<dyn Router>,
        candidates: Vec<Target>,
    },
}

impl Edge {
    /// Every target this edge can lead to
    pub(crate) fn targets(&self) -> Vec<&Target> {
        match self {
            Edge::Direct(target) => vec![target],
            Edge::Conditional { candidates, .. } => candidates.iter().collect(),
        }
    }
}

/// Mutable graph definition
pub struct GraphBuilder {
    name: String,
    schema: StateSchema,
    nodes: Vec<(String, Arc<dyn Node>)>,
    edges: Vec<(String, Edge)>,
    recursion_limit: usize,
}

impl GraphBuilder {
    /// Create an empty graph over the given state schema
    pub fn new(name: impl Into<String>, schema: StateSchema) -> Self {
        Self {
            name: name.into(),
            schema,
            nodes: Vec::new(),
            edges: Vec::new(),
            recursion_limit: DEFAULT_RECURSION_LIMIT,
        }
    }

    /// Register a node under a unique name
    pub fn add_node(&mut self, name: impl Into<String>, node: impl Node + 'static) -> &mut Self {
        self.nodes.push((name.into(), Arc::new(node)));
        self
    }

    /// Register an already shared node
    pub fn add_node_arc(&mut self, name: impl Into<String>, node: Arc<dyn Node>) -> &mut Self {
        self.nodes.push((name.into(), node));
        self
    }

    /// Add an unconditional edge. Use [`START`] for the entry edge and [`END`]
    /// to terminate.
    pub fn add_edge(&mut self, from: impl Into<String>, to: &str) -> &mut Self {
        self.edges
            .push((from.into(), Edge::Direct(Target::from_name(to))));
        self
    }

    /// Add a conditional edge whose router may only return one of `candidates`
    ///
    /// ```rust,ignore
    /// builder.add_conditional_edges(
    ///     "callModel",
    ///     |state: &StateSnapshot, _: &RunConfig| {
    ///         if state.get_bool("contentGenerated") { Target::End } else { Target::node("check") }
    ///     },
    ///     ["check", END],
    /// );
    /// ```
    pub fn add_conditional_edges<R, I, T>(
        &mut self,
        from: impl Into<String>,
        router: R,
        candidates: I,
    ) -> &mut Self
    where
        R: Router + 'static,
        I: IntoIterator<Item = T>,
        T: Into<Target>,
    {
        let candidates = candidates.into_iter().map(Into::into).collect();
        self.edges.push((
            from.into(),
            Edge::Conditional {
                router: Arc::new(router),
                candidates,
            },
        ));
        self
    }

    /// Maximum node steps per run
    pub fn set_recursion_limit(&mut self, limit: usize) -> &mut Self {
        self.recursion_limit = limit;
        self
    }

    /// Validate the topology and produce an executable graph backed by a
    /// fresh in-memory store
    pub fn compile(self) -> Result<CompiledGraph, TopologyError> {
        self.compile_with_store(Arc::new(InMemoryStore::new()))
    }

    /// Validate the topology and produce an executable graph whose shared
    /// fields live in `store`
    pub fn compile_with_store(
        self,
        store: Arc<dyn SharedStore>,
    ) -> Result<CompiledGraph, TopologyError> {
        log::info!("Compiling graph '{}'", self.name);

        if self.recursion_limit == 0 {
            return Err(TopologyError::ZeroRecursionLimit);
        }

        let mut nodes: HashMap<String, Arc<dyn Node>> = HashMap::new();
        for (name, node) in self.nodes {
            if name == START || name == END {
                return Err(TopologyError::ReservedName(name));
            }
            if nodes.insert(name.clone(), node).is_some() {
                return Err(TopologyError::DuplicateNode(name));
            }
        }

        for (field, partition_by) in self.schema.shared_fields() {
            if partition_by.is_empty() {
                return Err(TopologyError::InvalidSharedField {
                    field: field.clone(),
                });
            }
        }

        let mut edges: HashMap<String, Edge> = HashMap::new();
        for (from, edge) in self.edges {
            if from != START && !nodes.contains_key(&from) {
                return Err(TopologyError::UnknownNode {
                    from: from.clone(),
                    node: from,
                });
            }
            if let Edge::Conditional { candidates, .. } = &edge {
                if candidates.is_empty() {
                    return Err(TopologyError::EmptyCandidates(from));
                }
            }
            for target in edge.targets() {
                if let Target::Node(name) = target {
                    if !nodes.contains_key(name) {
                        return Err(TopologyError::UnknownNode {
                            from: from.clone(),
                            node: name.clone(),
                        });
                    }
                }
            }
            if edges.contains_key(&from) {
                return Err(TopologyError::ConflictingEdges(from));
            }
            edges.insert(from, edge);
        }

        if !edges.contains_key(START) {
            return Err(TopologyError::MissingEntry);
        }

        let mut dead_ends: Vec<&String> =
            nodes.keys().filter(|n| !edges.contains_key(*n)).collect();
        dead_ends.sort();
        if let Some(name) = dead_ends.first() {
            return Err(TopologyError::DeadEnd((*name).clone()));
        }

        let reachable = reachable_from_start(&edges);
        let mut unreachable: Vec<&String> =
            nodes.keys().filter(|n| !reachable.contains(*n)).collect();
        unreachable.sort();
        for name in unreachable {
            log::warn!(
                "Node '{}' in graph '{}' is not reachable from the start",
                name,
                self.name
            );
        }

        let can_end = nodes_reaching_end(&edges);
        let mut stuck: Vec<String> = reachable
            .iter()
            .filter(|n| !can_end.contains(*n))
            .cloned()
            .collect();
        if !stuck.is_empty() {
            stuck.sort();
            return Err(TopologyError::NoPathToEnd(stuck));
        }

        Ok(CompiledGraph::new(
            self.name,
            Arc::new(self.schema),
            nodes,
            edges,
            store,
            self.recursion_limit,
        ))
    }
}

/// Names reachable from START, START included
fn reachable_from_start(edges: &HashMap<String, Edge>) -> HashSet<String> {
    let mut seen = HashSet::from([START.to_string()]);
    let mut queue = VecDeque::from([START.to_string()]);

    while let Some(current) = queue.pop_front() {
        let Some(edge) = edges.get(&current) else {
            continue;
        };
        for target in edge.targets() {
            if let Target::Node(name) = target {
                if seen.insert(name.clone()) {
                    queue.push_back(name.clone());
                }
            }
        }
    }

    seen
}

/// Names with at least one path to END
fn nodes_reaching_end(edges: &HashMap<String, Edge>) -> HashSet<String> {
    let mut can_end: HashSet<String> = HashSet::new();

    loop {
        let mut changed = false;
        for (from, edge) in edges {
            if can_end.contains(from) {
                continue;
            }
            let reaches = edge.targets().into_iter().any(|t| match t {
                Target::End => true,
                Target::Node(name) => can_end.contains(name),
            });
            if reaches {
                can_end.insert(from.clone());
                changed = true;
            }
        }
        if !changed {
            return can_end;
        }
    }
}
