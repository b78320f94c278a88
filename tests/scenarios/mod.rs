//! Scenario-based tests for brick-runtime

mod control_flow;
mod documents;
mod error_boundary;
mod for_each;
mod mod_state;
mod registry_lookup;
mod rendering;
mod sequencing;
mod skip_semantics;
mod validation;
