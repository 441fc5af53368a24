// SPDX-License-Identifier: MIT

//! Graph-based execution engine
//!
//! A graph is a set of named nodes joined by unconditional and conditional
//! edges, run over a schema-typed state. Build it with [`GraphBuilder`],
//! compile it once, then invoke the [`CompiledGraph`] as often as needed.

pub mod builder;
pub mod config;
pub mod executor;
pub mod node;
pub mod router;
pub mod shared;
pub mod state;

pub use builder::GraphBuilder;
pub use config::RunConfig;
pub use executor::{CompiledGraph, RunEvent, DEFAULT_RECURSION_LIMIT};
pub use node::{FnNode, Node, NodeFuture};
pub use router::{Router, Target, END, START};
pub use shared::{FileStore, InMemoryStore, PartitionKey, SharedStore};
pub use state::{
    FieldPolicy, FieldType, StateFieldDef, StateSchema, StateSnapshot, StateUpdate,
};
