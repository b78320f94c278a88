//! Pipeline model: an ordered list of steps

use crate::core::step::{is_valid_output_key, BrickConfig};
use crate::errors::{PipelineConfigurationError, PipelineError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

/// Ordered sequence of steps
pub type Pipeline = Vec<BrickConfig>;

/// Either a single step or an ordered list of steps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PipelineInput {
    Many(Vec<BrickConfig>),
    Single(Box<BrickConfig>),
}

impl PipelineInput {
    /// Normalize to an ordered step list
    pub fn into_steps(self) -> Vec<BrickConfig> {
        match self {
            PipelineInput::Many(steps) => steps,
            PipelineInput::Single(step) => vec![*step],
        }
    }

    pub fn len(&self) -> usize {
        match self {
            PipelineInput::Many(steps) => steps.len(),
            PipelineInput::Single(_) => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<BrickConfig> for PipelineInput {
    fn from(step: BrickConfig) -> Self {
        PipelineInput::Single(Box::new(step))
    }
}

impl From<Vec<BrickConfig>> for PipelineInput {
    fn from(steps: Vec<BrickConfig>) -> Self {
        PipelineInput::Many(steps)
    }
}

impl From<&[BrickConfig]> for PipelineInput {
    fn from(steps: &[BrickConfig]) -> Self {
        PipelineInput::Many(steps.to_vec())
    }
}

/// Statically check a pipeline, including nested pipelines
///
/// Checks output keys are usable variable names and that instance ids are
/// unique across the whole tree.
pub fn validate_pipeline(steps: &[BrickConfig]) -> Result<(), PipelineError> {
    let mut seen = HashSet::new();
    validate_steps(steps, &mut seen)
}

fn validate_steps(steps: &[BrickConfig], seen: &mut HashSet<Uuid>) -> Result<(), PipelineError> {
    for step in steps {
        if let Some(key) = &step.output_key {
            if !is_valid_output_key(key) {
                return Err(PipelineConfigurationError::with_config(
                    format!("Invalid output key '{}' for brick {}", key, step.id),
                    serde_json::to_value(step).unwrap_or_default(),
                )
                .into());
            }
        }

        if let Some(instance_id) = step.instance_id {
            if !seen.insert(instance_id) {
                return Err(PipelineConfigurationError::new(format!(
                    "Duplicate instance id: {}",
                    instance_id
                ))
                .into());
            }
        }

        for (_, nested) in step.nested_pipelines() {
            validate_steps(&nested, seen)?;
        }
    }

    Ok(())
}

/// Assign fresh instance ids to every step that lacks one, recursively
pub fn with_instance_ids(steps: Vec<BrickConfig>) -> Vec<BrickConfig> {
    steps
        .into_iter()
        .map(|mut step| {
            if step.instance_id.is_none() {
                step.instance_id = Some(Uuid::new_v4());
            }
            let nested = step
                .nested_pipelines()
                .into_iter()
                .map(|(key, pipeline)| (key.to_string(), pipeline))
                .collect::<Vec<_>>();
            for (key, pipeline) in nested {
                let assigned = with_instance_ids(pipeline);
                step.config.insert(
                    key,
                    crate::core::expression::Expression::pipeline(assigned).to_value(),
                );
            }
            step
        })
        .collect()
}
