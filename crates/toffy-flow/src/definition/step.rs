use std::collections::BTreeMap;
use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::definition::rule::{Derivation, ThinkingLine};

/// One node of the onboarding flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Step {
    pub id: String,
    #[serde(flatten)]
    pub kind: StepKind,
    /// Turns the completion value into the echoed user message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<Derivation>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub acknowledgement_map: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dynamic_acknowledgement: Option<Derivation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acknowledgement: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
    /// Non-empty for steps that close a section and trigger the thinking interstitial.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub thinking: Vec<ThinkingLine>,
}

impl Step {
    pub fn step_type(&self) -> StepType {
        self.kind.step_type()
    }

    pub fn triggers_thinking(&self) -> bool {
        !self.thinking.is_empty()
    }

    /// Main prompt text shown in the bot bubble, before `{name}` substitution.
    pub fn prompt(&self) -> &str {
        match &self.kind {
            StepKind::Intro(step) => &step.message,
            StepKind::Grid(step) => &step.question,
            StepKind::SpeedRound(step) => &step.title,
            StepKind::Slider(step) => &step.question,
            StepKind::Chips(step) => &step.question,
            StepKind::Matrix(step) => &step.question,
            StepKind::Notification(step) => &step.message,
            StepKind::Complete(step) => &step.message,
        }
    }
}

/// Type-specific prompt fields, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepKind {
    Intro(IntroStep),
    Grid(GridStep),
    #[serde(rename = "speedround")]
    SpeedRound(SpeedRoundStep),
    Slider(SliderStep),
    Chips(ChipsStep),
    Matrix(MatrixStep),
    Notification(NotificationStep),
    Complete(CompleteStep),
}

impl StepKind {
    pub fn step_type(&self) -> StepType {
        match self {
            StepKind::Intro(_) => StepType::Intro,
            StepKind::Grid(_) => StepType::Grid,
            StepKind::SpeedRound(_) => StepType::SpeedRound,
            StepKind::Slider(_) => StepType::Slider,
            StepKind::Chips(_) => StepType::Chips,
            StepKind::Matrix(_) => StepType::Matrix,
            StepKind::Notification(_) => StepType::Notification,
            StepKind::Complete(_) => StepType::Complete,
        }
    }
}

/// Dispatch key for step handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StepType {
    Intro,
    Grid,
    SpeedRound,
    Slider,
    Chips,
    Matrix,
    Notification,
    Complete,
}

impl StepType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepType::Intro => "intro",
            StepType::Grid => "grid",
            StepType::SpeedRound => "speedround",
            StepType::Slider => "slider",
            StepType::Chips => "chips",
            StepType::Matrix => "matrix",
            StepType::Notification => "notification",
            StepType::Complete => "complete",
        }
    }
}

impl fmt::Display for StepType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct IntroStep {
    pub message: String,
    pub button_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary_button_text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GridOption {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emoji: Option<String>,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sublabel: Option<String>,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GridStep {
    pub question: String,
    #[serde(default = "default_columns")]
    pub columns: u8,
    pub options: Vec<GridOption>,
}

fn default_columns() -> u8 {
    3
}

impl GridStep {
    pub fn option(&self, value: &str) -> Option<&GridOption> {
        self.options.iter().find(|option| option.value == value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SubQuestion {
    pub id: String,
    pub question: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SpeedRoundStep {
    pub title: String,
    pub questions: Vec<SubQuestion>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SliderStep {
    pub question: String,
    pub left_label: String,
    pub right_label: String,
    #[serde(default)]
    pub min: f64,
    #[serde(default = "default_slider_max")]
    pub max: f64,
    #[serde(default = "default_slider_value")]
    pub default_value: f64,
}

fn default_slider_max() -> f64 {
    100.0
}

fn default_slider_value() -> f64 {
    50.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ChipOption {
    pub label: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ChipsStep {
    pub question: String,
    pub options: Vec<ChipOption>,
    #[serde(default)]
    pub min_select: usize,
    #[serde(default)]
    pub allow_none: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MatrixItem {
    pub id: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sublabel: Option<String>,
    #[serde(default = "default_matrix_value")]
    pub default_value: f64,
}

fn default_matrix_value() -> f64 {
    20.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MatrixStep {
    pub question: String,
    pub items: Vec<MatrixItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct NotificationStep {
    pub message: String,
    pub button_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary_button_text: Option<String>,
    #[serde(default = "default_reminder_time")]
    pub default_time: String,
}

fn default_reminder_time() -> String {
    "19:00".into()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CompleteStep {
    pub message: String,
}
