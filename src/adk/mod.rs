// SPDX-License-Identifier: MIT

//! Model inference collaborators used inside graph nodes

pub mod model;
