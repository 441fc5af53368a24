// SPDX-License-Identifier: MIT

//! rulegraph - stateful graph orchestration for model-driven assistants
//!
//! - [`graph`]: schema-typed state, merge policies, routers, compile-time
//!   topology checks, the executor and the shared value store
//! - [`adk`]: chat model collaborators
//! - [`assistant`]: the rule-learning assistant graph

pub mod adk;
pub mod assistant;
pub mod error;
pub mod graph;
pub mod server;
pub mod settings;
