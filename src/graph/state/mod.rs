// SPDX-License-Identifier: MIT

//! State management for graph runs
//!
//! This module provides:
//! - `StateSchema` - declares each field's type and merge policy
//! - `RunState` - transient per-run state and the merge engine
//! - `StateSnapshot` - the read-only view nodes and routers receive

mod merge;
mod schema;

pub use merge::{RunState, SharedWrite, StateSnapshot, StateUpdate};
pub use schema::{FieldPolicy, FieldType, StateFieldDef, StateSchema};
