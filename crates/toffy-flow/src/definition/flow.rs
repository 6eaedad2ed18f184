use std::fs;
use std::path::Path;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::definition::step::{Step, StepType};

const BUILTIN_FLOW: &str = include_str!("../../flows/onboarding.json");

#[derive(Debug, Error)]
pub enum FlowError {
    #[error("failed to read flow definition {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse flow definition: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Static, ordered catalogue of onboarding steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct OnboardingFlow {
    pub id: String,
    #[serde(default)]
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub steps: Vec<Step>,
}

impl OnboardingFlow {
    /// The flow shipped with the crate.
    pub fn builtin() -> Result<Self, FlowError> {
        Self::from_json_str(BUILTIN_FLOW)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, FlowError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn from_path(path: &Path) -> Result<Self, FlowError> {
        let raw = fs::read_to_string(path).map_err(|source| FlowError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn step(&self, index: usize) -> Option<&Step> {
        self.steps.get(index)
    }

    pub fn position(&self, step_id: &str) -> Option<usize> {
        self.steps.iter().position(|step| step.id == step_id)
    }

    pub fn find(&self, step_id: &str) -> Option<&Step> {
        self.steps.iter().find(|step| step.id == step_id)
    }

    /// Steps the user actually answers (everything but `complete`).
    pub fn answerable_steps(&self) -> impl Iterator<Item = &Step> {
        self.steps
            .iter()
            .filter(|step| step.step_type() != StepType::Complete)
    }
}
