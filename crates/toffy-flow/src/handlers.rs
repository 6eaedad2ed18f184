//! Per-step-type behaviour: submit gating and the echoed display text.
//!
//! Presentation layers render a widget per [`StepType`] and hand the raw
//! widget value to the [`HandlerRegistry`] before calling the engine.

use std::collections::HashMap;

use serde_json::{Value, json};
use thiserror::Error;
use tracing::warn;

use crate::derive::DerivationInput;
use crate::definition::step::{Step, StepKind, StepType};
use crate::subject::Subject;
use crate::template::{TemplateEngine, substitute_name};

const NONE_CHIP: &str = "none";

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SubmitError {
    #[error("step '{step}' expects {expected}")]
    WrongShape { step: String, expected: &'static str },
    #[error("step '{step}' has no option '{value}'")]
    UnknownOption { step: String, value: String },
    #[error("step '{step}' is missing an answer for '{key}'")]
    MissingAnswer { step: String, key: String },
    #[error("step '{step}' value {value} is outside {min}..={max}")]
    OutOfRange {
        step: String,
        value: f64,
        min: f64,
        max: f64,
    },
    #[error("step '{step}' needs at least {min} selections, got {got}")]
    TooFewSelections { step: String, min: usize, got: usize },
    #[error("step '{0}' is not answered by the user")]
    NotAnswerable(String),
    #[error("no handler registered for step type {0}")]
    NoHandler(StepType),
}

fn wrong_shape(step: &Step, expected: &'static str) -> SubmitError {
    SubmitError::WrongShape {
        step: step.id.clone(),
        expected,
    }
}

/// Behaviour attached to one step type.
pub trait StepHandler: Send + Sync {
    fn step_type(&self) -> StepType;

    /// Gate that keeps malformed values away from the engine.
    fn can_submit(&self, step: &Step, value: &Value) -> Result<(), SubmitError>;

    /// Label used when the step has no summary rule.
    fn fallback_label(&self, step: &Step, value: &Value, subject: &Subject) -> Option<String>;
}

struct IntroHandler;

impl StepHandler for IntroHandler {
    fn step_type(&self) -> StepType {
        StepType::Intro
    }

    fn can_submit(&self, step: &Step, value: &Value) -> Result<(), SubmitError> {
        let StepKind::Intro(intro) = &step.kind else {
            return Err(wrong_shape(step, "an intro step"));
        };
        match value.as_bool() {
            Some(true) => Ok(()),
            Some(false) if intro.secondary_button_text.is_some() => Ok(()),
            _ => Err(wrong_shape(step, "a button press")),
        }
    }

    fn fallback_label(&self, step: &Step, value: &Value, _subject: &Subject) -> Option<String> {
        let StepKind::Intro(intro) = &step.kind else {
            return None;
        };
        if value.as_bool() == Some(false) {
            intro.secondary_button_text.clone()
        } else {
            Some(intro.button_text.clone())
        }
    }
}

struct GridHandler;

impl StepHandler for GridHandler {
    fn step_type(&self) -> StepType {
        StepType::Grid
    }

    fn can_submit(&self, step: &Step, value: &Value) -> Result<(), SubmitError> {
        let StepKind::Grid(grid) = &step.kind else {
            return Err(wrong_shape(step, "a grid step"));
        };
        let selected = value
            .as_str()
            .ok_or_else(|| wrong_shape(step, "an option value"))?;
        grid.option(selected)
            .map(|_| ())
            .ok_or_else(|| SubmitError::UnknownOption {
                step: step.id.clone(),
                value: selected.to_string(),
            })
    }

    fn fallback_label(&self, step: &Step, value: &Value, _subject: &Subject) -> Option<String> {
        let StepKind::Grid(grid) = &step.kind else {
            return None;
        };
        value
            .as_str()
            .and_then(|selected| grid.option(selected))
            .map(|option| option.label.clone())
    }
}

struct SpeedRoundHandler;

impl StepHandler for SpeedRoundHandler {
    fn step_type(&self) -> StepType {
        StepType::SpeedRound
    }

    fn can_submit(&self, step: &Step, value: &Value) -> Result<(), SubmitError> {
        let StepKind::SpeedRound(round) = &step.kind else {
            return Err(wrong_shape(step, "a speed round"));
        };
        let answers = value
            .as_object()
            .ok_or_else(|| wrong_shape(step, "a mapping of yes/no answers"))?;
        for question in &round.questions {
            if answers.get(&question.id).and_then(Value::as_bool).is_none() {
                return Err(SubmitError::MissingAnswer {
                    step: step.id.clone(),
                    key: question.id.clone(),
                });
            }
        }
        Ok(())
    }

    fn fallback_label(&self, _step: &Step, _value: &Value, _subject: &Subject) -> Option<String> {
        Some("Answered all questions".to_string())
    }
}

struct SliderHandler;

impl SliderHandler {
    fn position_label(left: &str, right: &str, percentage: f64) -> String {
        if percentage <= 20.0 {
            left.to_string()
        } else if percentage <= 40.0 {
            format!("Somewhat {}", left.to_lowercase())
        } else if percentage <= 60.0 {
            "Moderate".to_string()
        } else if percentage <= 80.0 {
            format!("Somewhat {}", right.to_lowercase())
        } else {
            right.to_string()
        }
    }
}

impl StepHandler for SliderHandler {
    fn step_type(&self) -> StepType {
        StepType::Slider
    }

    fn can_submit(&self, step: &Step, value: &Value) -> Result<(), SubmitError> {
        let StepKind::Slider(slider) = &step.kind else {
            return Err(wrong_shape(step, "a slider"));
        };
        let reading = value
            .as_f64()
            .ok_or_else(|| wrong_shape(step, "a number"))?;
        if reading < slider.min || reading > slider.max {
            return Err(SubmitError::OutOfRange {
                step: step.id.clone(),
                value: reading,
                min: slider.min,
                max: slider.max,
            });
        }
        Ok(())
    }

    fn fallback_label(&self, step: &Step, value: &Value, _subject: &Subject) -> Option<String> {
        let StepKind::Slider(slider) = &step.kind else {
            return None;
        };
        let reading = value.as_f64()?;
        let span = slider.max - slider.min;
        let percentage = if span > 0.0 {
            (reading - slider.min) / span * 100.0
        } else {
            0.0
        };
        Some(Self::position_label(
            &slider.left_label,
            &slider.right_label,
            percentage,
        ))
    }
}

struct ChipsHandler;

impl StepHandler for ChipsHandler {
    fn step_type(&self) -> StepType {
        StepType::Chips
    }

    fn can_submit(&self, step: &Step, value: &Value) -> Result<(), SubmitError> {
        let StepKind::Chips(chips) = &step.kind else {
            return Err(wrong_shape(step, "a chips step"));
        };
        let selected = value
            .as_array()
            .ok_or_else(|| wrong_shape(step, "a list of selections"))?;
        let mut real = 0;
        for entry in selected {
            let chosen = entry
                .as_str()
                .ok_or_else(|| wrong_shape(step, "a list of option values"))?;
            if chips.allow_none && chosen == NONE_CHIP {
                continue;
            }
            if !chips.options.iter().any(|option| option.value == chosen) {
                return Err(SubmitError::UnknownOption {
                    step: step.id.clone(),
                    value: chosen.to_string(),
                });
            }
            real += 1;
        }
        let picked_none = chips.allow_none && selected.iter().any(|entry| entry == NONE_CHIP);
        if picked_none && real > 0 {
            return Err(wrong_shape(step, "'none' on its own"));
        }
        if selected.len() < chips.min_select {
            return Err(SubmitError::TooFewSelections {
                step: step.id.clone(),
                min: chips.min_select,
                got: selected.len(),
            });
        }
        Ok(())
    }

    fn fallback_label(&self, step: &Step, value: &Value, _subject: &Subject) -> Option<String> {
        let StepKind::Chips(chips) = &step.kind else {
            return None;
        };
        let labels: Vec<&str> = value
            .as_array()?
            .iter()
            .filter_map(Value::as_str)
            .map(|chosen| {
                chips
                    .options
                    .iter()
                    .find(|option| option.value == chosen)
                    .map(|option| option.label.as_str())
                    .unwrap_or(chosen)
            })
            .collect();
        Some(labels.join(", "))
    }
}

struct MatrixHandler;

impl StepHandler for MatrixHandler {
    fn step_type(&self) -> StepType {
        StepType::Matrix
    }

    fn can_submit(&self, step: &Step, value: &Value) -> Result<(), SubmitError> {
        let StepKind::Matrix(matrix) = &step.kind else {
            return Err(wrong_shape(step, "a matrix step"));
        };
        let readings = value
            .as_object()
            .ok_or_else(|| wrong_shape(step, "a mapping of ratings"))?;
        for item in &matrix.items {
            let reading = readings
                .get(&item.id)
                .and_then(Value::as_f64)
                .ok_or_else(|| SubmitError::MissingAnswer {
                    step: step.id.clone(),
                    key: item.id.clone(),
                })?;
            if !(0.0..=100.0).contains(&reading) {
                return Err(SubmitError::OutOfRange {
                    step: step.id.clone(),
                    value: reading,
                    min: 0.0,
                    max: 100.0,
                });
            }
        }
        Ok(())
    }

    fn fallback_label(&self, step: &Step, value: &Value, subject: &Subject) -> Option<String> {
        let StepKind::Matrix(matrix) = &step.kind else {
            return None;
        };
        let reactive: Vec<&str> = matrix
            .items
            .iter()
            .filter(|item| {
                value
                    .get(&item.id)
                    .and_then(Value::as_f64)
                    .is_some_and(|reading| reading > 50.0)
            })
            .map(|item| item.label.as_str())
            .collect();
        let name = subject.display_name();
        Some(match reactive.as_slice() {
            [] => format!("{name} is generally calm in most situations"),
            [only] => format!(
                "{name} shows some reactivity around {}",
                only.to_lowercase()
            ),
            many => format!("{name} shows reactivity in {} areas", many.len()),
        })
    }
}

/// Outcome of asking the platform for notification permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionState {
    Granted,
    Denied,
    Default,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("notification permission request failed: {0}")]
pub struct PermissionError(pub String);

/// Platform hook for the reminder prompt.
pub trait NotificationPermission {
    fn request_permission(&mut self) -> Result<PermissionState, PermissionError>;
}

struct NotificationHandler;

impl NotificationHandler {
    fn reminder_label(time: &str) -> String {
        format!("Yes, remind me at {time}")
    }
}

/// Accepts the reminder prompt. Permission failures are logged and ignored;
/// the flow always proceeds with reminders enabled.
pub fn accept_reminders(
    permission: &mut dyn NotificationPermission,
    time: &str,
) -> (Value, String) {
    match permission.request_permission() {
        Ok(state) => tracing::debug!(?state, "notification permission resolved"),
        Err(err) => warn!(error = %err, "ignoring notification permission failure"),
    }
    (
        json!({ "enabled": true, "time": time }),
        NotificationHandler::reminder_label(time),
    )
}

/// Declines the reminder prompt with the step's secondary button.
pub fn decline_reminders(step: &Step) -> (Value, String) {
    let label = match &step.kind {
        StepKind::Notification(prompt) => prompt
            .secondary_button_text
            .clone()
            .unwrap_or_else(|| "Maybe later".to_string()),
        _ => "Maybe later".to_string(),
    };
    (json!({ "enabled": false, "time": null }), label)
}

impl StepHandler for NotificationHandler {
    fn step_type(&self) -> StepType {
        StepType::Notification
    }

    fn can_submit(&self, step: &Step, value: &Value) -> Result<(), SubmitError> {
        match value.get("enabled").and_then(Value::as_bool) {
            Some(_) => Ok(()),
            None => Err(wrong_shape(step, "an {enabled, time} choice")),
        }
    }

    fn fallback_label(&self, step: &Step, value: &Value, _subject: &Subject) -> Option<String> {
        if value.get("enabled").and_then(Value::as_bool) == Some(true) {
            let time = value
                .get("time")
                .and_then(Value::as_str)
                .map(str::to_string)
                .or_else(|| match &step.kind {
                    StepKind::Notification(prompt) => Some(prompt.default_time.clone()),
                    _ => None,
                })?;
            Some(Self::reminder_label(&time))
        } else {
            Some(decline_reminders(step).1)
        }
    }
}

struct CompleteHandler;

impl StepHandler for CompleteHandler {
    fn step_type(&self) -> StepType {
        StepType::Complete
    }

    fn can_submit(&self, step: &Step, _value: &Value) -> Result<(), SubmitError> {
        Err(SubmitError::NotAnswerable(step.id.clone()))
    }

    fn fallback_label(&self, _step: &Step, _value: &Value, _subject: &Subject) -> Option<String> {
        None
    }
}

/// Handlers keyed by step type.
pub struct HandlerRegistry {
    handlers: HashMap<StepType, Box<dyn StepHandler>>,
    templates: TemplateEngine,
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl HandlerRegistry {
    pub fn empty() -> Self {
        Self {
            handlers: HashMap::new(),
            templates: TemplateEngine::new(),
        }
    }

    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register(Box::new(IntroHandler));
        registry.register(Box::new(GridHandler));
        registry.register(Box::new(SpeedRoundHandler));
        registry.register(Box::new(SliderHandler));
        registry.register(Box::new(ChipsHandler));
        registry.register(Box::new(MatrixHandler));
        registry.register(Box::new(NotificationHandler));
        registry.register(Box::new(CompleteHandler));
        registry
    }

    /// Replaces any handler already registered for the same type.
    pub fn register(&mut self, handler: Box<dyn StepHandler>) {
        self.handlers.insert(handler.step_type(), handler);
    }

    pub fn get(&self, step_type: StepType) -> Option<&dyn StepHandler> {
        self.handlers.get(&step_type).map(|handler| handler.as_ref())
    }

    pub fn can_submit(&self, step: &Step, value: &Value) -> Result<(), SubmitError> {
        let step_type = step.step_type();
        self.get(step_type)
            .ok_or(SubmitError::NoHandler(step_type))?
            .can_submit(step, value)
    }

    /// Text echoed as the user's message: the step summary, else the widget
    /// label, else the handler's fallback, with `{name}` substituted.
    pub fn display_text(
        &self,
        step: &Step,
        value: &Value,
        label: Option<&str>,
        subject: &Subject,
    ) -> String {
        let from_summary = step.summary.as_ref().and_then(|rule| {
            rule.evaluate(
                &self.templates,
                &DerivationInput::new(value).with_label(label),
            )
            .unwrap_or_else(|err| {
                warn!(step = %step.id, error = %err, "summary rule failed");
                None
            })
        });
        let text = from_summary
            .or_else(|| label.map(str::to_string).filter(|text| !text.is_empty()))
            .or_else(|| {
                self.get(step.step_type())
                    .and_then(|handler| handler.fallback_label(step, value, subject))
            })
            .unwrap_or_default();
        substitute_name(&text, subject)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::OnboardingFlow;

    fn flow() -> OnboardingFlow {
        OnboardingFlow::builtin().expect("builtin flow")
    }

    fn step<'a>(flow: &'a OnboardingFlow, id: &str) -> &'a Step {
        flow.find(id).expect("step exists")
    }

    struct FailingPermission;

    impl NotificationPermission for FailingPermission {
        fn request_permission(&mut self) -> Result<PermissionState, PermissionError> {
            Err(PermissionError("blocked by browser".into()))
        }
    }

    #[test]
    fn grid_rejects_unknown_option() {
        let flow = flow();
        let registry = HandlerRegistry::with_defaults();
        let living = step(&flow, "living");
        assert!(registry.can_submit(living, &json!("house_yard")).is_ok());
        assert!(matches!(
            registry.can_submit(living, &json!("castle")),
            Err(SubmitError::UnknownOption { .. })
        ));
    }

    #[test]
    fn speedround_requires_every_answer() {
        let flow = flow();
        let registry = HandlerRegistry::with_defaults();
        let round = step(&flow, "five_things");
        let partial = json!({ "sensory": true, "walks": false });
        assert!(matches!(
            registry.can_submit(round, &partial),
            Err(SubmitError::MissingAnswer { key, .. }) if key == "training"
        ));
        let full = json!({
            "sensory": true, "walks": true, "training": false, "diet": true, "bonding": true
        });
        assert!(registry.can_submit(round, &full).is_ok());
    }

    #[test]
    fn slider_and_matrix_enforce_ranges() {
        let flow = flow();
        let registry = HandlerRegistry::with_defaults();
        assert!(registry.can_submit(step(&flow, "severity"), &json!(101)).is_err());
        assert!(registry.can_submit(step(&flow, "severity"), &json!(40)).is_ok());
        let ratings = json!({
            "resource_guarding": 10, "sound": 80, "movement": 20, "touch": 20, "food": 120
        });
        assert!(matches!(
            registry.can_submit(step(&flow, "sensitivities"), &ratings),
            Err(SubmitError::OutOfRange { .. })
        ));
    }

    #[test]
    fn complete_step_is_never_submittable() {
        let flow = flow();
        let registry = HandlerRegistry::with_defaults();
        assert!(matches!(
            registry.can_submit(step(&flow, "complete"), &json!(true)),
            Err(SubmitError::NotAnswerable(_))
        ));
    }

    #[test]
    fn display_text_uses_summary_then_substitutes_name() {
        let flow = flow();
        let registry = HandlerRegistry::with_defaults();
        let subject = Subject::named("Buddy");
        let text = registry.display_text(
            step(&flow, "five_things"),
            &json!({ "sensory": true, "walks": true, "training": true, "diet": false, "bonding": false }),
            None,
            &subject,
        );
        assert_eq!(text, "Buddy is getting 3/5 essentials");
    }

    #[test]
    fn display_text_falls_back_to_slider_position_label() {
        let mut slider = flow().find("severity").cloned().expect("severity");
        slider.summary = None;
        let registry = HandlerRegistry::with_defaults();
        let text = registry.display_text(&slider, &json!(70), None, &Subject::default());
        assert_eq!(text, "Somewhat severe & constant");
    }

    #[test]
    fn permission_failure_still_enables_reminders() {
        let (value, label) = accept_reminders(&mut FailingPermission, "07:30");
        assert_eq!(value["enabled"], true);
        assert_eq!(value["time"], "07:30");
        assert_eq!(label, "Yes, remind me at 07:30");
    }

    #[test]
    fn intro_secondary_button_needs_secondary_text() {
        let flow = flow();
        let registry = HandlerRegistry::with_defaults();
        assert!(registry.can_submit(step(&flow, "intro"), &json!(false)).is_err());
        assert!(registry.can_submit(step(&flow, "intro"), &json!(true)).is_ok());
    }
}
