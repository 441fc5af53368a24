// SPDX-License-Identifier: MIT

//! Node computation trait

use async_trait::async_trait;
use futures::future::BoxFuture;

use super::config::RunConfig;
use super::state::{StateSnapshot, StateUpdate};
use crate::error::GraphError;

/// A unit of computation in the graph
///
/// A node reads the current state and configuration and returns a partial
/// update. It never mutates state directly; the executor merges the update.
#[async_trait]
pub trait Node: Send + Sync {
    async fn call(
        &self,
        state: &StateSnapshot,
        config: &RunConfig,
    ) -> Result<StateUpdate, GraphError>;
}

/// Future returned by a closure wrapped in [`FnNode`]
pub type NodeFuture<'a> = BoxFuture<'a, Result<StateUpdate, GraphError>>;

/// Adapter turning an async closure into a [`Node`]
///
/// ```rust,ignore
/// let node = FnNode::new(|state, _config| {
///     let count = state.get("count").and_then(|v| v.as_i64()).unwrap_or(0);
///     Box::pin(async move { Ok(StateUpdate::new().set("count", count + 1)) })
/// });
/// ```
pub struct FnNode<F> {
    func: F,
}

impl<F> FnNode<F>
where
    F: for<'a> Fn(&'a StateSnapshot, &'a RunConfig) -> NodeFuture<'a> + Send + Sync,
{
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

#[async_trait]
impl<F> Node for FnNode<F>
where
    F: for<'a> Fn(&'a StateSnapshot, &'a RunConfig) -> NodeFuture<'a> + Send + Sync,
{
    async fn call(
        &self,
        state: &StateSnapshot,
        config: &RunConfig,
    ) -> Result<StateUpdate, GraphError> {
        (self.func)(state, config).await
    }
}
