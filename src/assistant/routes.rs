// SPDX-License-Identifier: MIT

//! Routers of the assistant graph

use super::state::{
    CALL_MODEL, CONTENT_GENERATED, GENERATE_INSIGHTS, GET_RULES, HAS_ACCEPTED_TEXT,
    ONLY_GET_RULES, WAS_CONTENT_GENERATED,
};
use crate::graph::{RunConfig, StateSnapshot, Target};

/// Entry route, chosen from run configuration
pub fn route_start(_state: &StateSnapshot, config: &RunConfig) -> Target {
    if config.get_bool(ONLY_GET_RULES) {
        Target::node(GET_RULES)
    } else if config.get_bool(HAS_ACCEPTED_TEXT) {
        Target::node(GENERATE_INSIGHTS)
    } else {
        Target::node(CALL_MODEL)
    }
}

/// After `callModel`: stop once content is known to be generated
pub fn route_after_model(state: &StateSnapshot, _config: &RunConfig) -> Target {
    if state.get_bool(CONTENT_GENERATED) {
        Target::End
    } else {
        Target::node(WAS_CONTENT_GENERATED)
    }
}
