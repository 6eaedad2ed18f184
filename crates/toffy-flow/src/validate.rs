//! Static checks over a flow definition.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::definition::rule::Derivation;
use crate::definition::step::{Step, StepKind, StepType};
use crate::definition::OnboardingFlow;
use crate::template::TemplateEngine;

const MAX_THINKING_LINES: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowIssue {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_id: Option<String>,
    pub path: String,
    pub message: String,
    pub code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FlowValidation {
    pub valid: bool,
    pub issues: Vec<FlowIssue>,
}

impl FlowValidation {
    pub fn codes(&self) -> Vec<&str> {
        self.issues.iter().map(|issue| issue.code.as_str()).collect()
    }
}

struct Collector {
    issues: Vec<FlowIssue>,
}

impl Collector {
    fn flow(&mut self, message: &str, code: &str) {
        self.issues.push(FlowIssue {
            step_id: None,
            path: "/steps".into(),
            message: message.into(),
            code: code.into(),
        });
    }

    fn step(&mut self, index: usize, step: &Step, field: &str, message: String, code: &str) {
        let path = if field.is_empty() {
            format!("/steps/{index}")
        } else {
            format!("/steps/{index}/{field}")
        };
        self.issues.push(FlowIssue {
            step_id: Some(step.id.clone()),
            path,
            message,
            code: code.into(),
        });
    }
}

pub fn validate_flow(flow: &OnboardingFlow) -> FlowValidation {
    let mut collector = Collector { issues: Vec::new() };

    if flow.is_empty() {
        collector.flow("flow has no steps", "empty_flow");
    }

    let mut seen = BTreeSet::new();
    let last = flow.len().saturating_sub(1);
    for (index, step) in flow.steps.iter().enumerate() {
        if step.id.trim().is_empty() {
            collector.step(index, step, "id", "step id is empty".into(), "missing_id");
        } else if !seen.insert(step.id.as_str()) {
            collector.step(
                index,
                step,
                "id",
                format!("duplicate step id '{}'", step.id),
                "duplicate_step_id",
            );
        }
        if step.step_type() == StepType::Complete && index != last {
            collector.step(
                index,
                step,
                "",
                "complete step must be the last step".into(),
                "complete_not_last",
            );
        }
        check_kind(&mut collector, index, step);
        check_rules(&mut collector, index, step);
    }

    FlowValidation {
        valid: collector.issues.is_empty(),
        issues: collector.issues,
    }
}

fn check_ids<'a>(
    collector: &mut Collector,
    index: usize,
    step: &Step,
    field: &str,
    ids: impl Iterator<Item = &'a str>,
    what: &str,
) {
    let mut seen = BTreeSet::new();
    for (position, id) in ids.enumerate() {
        if id.trim().is_empty() {
            collector.step(
                index,
                step,
                &format!("{field}/{position}"),
                format!("{what} is empty"),
                "missing_id",
            );
        } else if !seen.insert(id) {
            collector.step(
                index,
                step,
                &format!("{field}/{position}"),
                format!("duplicate {what} '{id}'"),
                "duplicate_value",
            );
        }
    }
}

fn check_kind(collector: &mut Collector, index: usize, step: &Step) {
    match &step.kind {
        StepKind::Grid(grid) => {
            if grid.options.is_empty() {
                collector.step(index, step, "options", "grid has no options".into(), "no_options");
            }
            check_ids(
                collector,
                index,
                step,
                "options",
                grid.options.iter().map(|option| option.value.as_str()),
                "option value",
            );
            for key in step.acknowledgement_map.keys() {
                if grid.option(key).is_none() {
                    collector.step(
                        index,
                        step,
                        "acknowledgement_map",
                        format!("acknowledgement for unknown option '{key}'"),
                        "unknown_option",
                    );
                }
            }
        }
        StepKind::SpeedRound(round) => {
            if round.questions.is_empty() {
                collector.step(
                    index,
                    step,
                    "questions",
                    "speed round has no questions".into(),
                    "no_options",
                );
            }
            check_ids(
                collector,
                index,
                step,
                "questions",
                round.questions.iter().map(|question| question.id.as_str()),
                "question id",
            );
        }
        StepKind::Slider(slider) => {
            if slider.min >= slider.max {
                collector.step(
                    index,
                    step,
                    "min",
                    format!("slider min {} must be below max {}", slider.min, slider.max),
                    "slider_bounds",
                );
            } else if slider.default_value < slider.min || slider.default_value > slider.max {
                collector.step(
                    index,
                    step,
                    "default_value",
                    format!(
                        "default {} outside {}..={}",
                        slider.default_value, slider.min, slider.max
                    ),
                    "slider_default",
                );
            }
        }
        StepKind::Chips(chips) => {
            check_ids(
                collector,
                index,
                step,
                "options",
                chips.options.iter().map(|option| option.value.as_str()),
                "option value",
            );
            if chips.min_select > chips.options.len() {
                collector.step(
                    index,
                    step,
                    "min_select",
                    format!(
                        "min_select {} exceeds {} options",
                        chips.min_select,
                        chips.options.len()
                    ),
                    "min_select",
                );
            }
        }
        StepKind::Matrix(matrix) => {
            check_ids(
                collector,
                index,
                step,
                "items",
                matrix.items.iter().map(|item| item.id.as_str()),
                "item id",
            );
            for (position, item) in matrix.items.iter().enumerate() {
                if !(0.0..=100.0).contains(&item.default_value) {
                    collector.step(
                        index,
                        step,
                        &format!("items/{position}/default_value"),
                        format!("default {} outside 0..=100", item.default_value),
                        "matrix_default",
                    );
                }
            }
        }
        StepKind::Intro(_) | StepKind::Notification(_) | StepKind::Complete(_) => {}
    }
}

fn templates(rule: &Derivation) -> Vec<&str> {
    match rule {
        Derivation::Lookup { fallback, .. } => fallback.iter().map(String::as_str).collect(),
        Derivation::Template { template } => vec![template.as_str()],
        Derivation::Bands { bands, .. } => bands.iter().map(|band| band.text.as_str()).collect(),
        Derivation::Flags { .. } => Vec::new(),
    }
}

fn check_rule(collector: &mut Collector, index: usize, step: &Step, field: &str, rule: &Derivation) {
    for template in templates(rule) {
        if let Err(err) = TemplateEngine::check(template) {
            collector.step(index, step, field, err.to_string(), "template");
        }
    }
}

fn check_rules(collector: &mut Collector, index: usize, step: &Step) {
    if let Some(rule) = &step.summary {
        check_rule(collector, index, step, "summary", rule);
    }
    if let Some(rule) = &step.dynamic_acknowledgement {
        check_rule(collector, index, step, "dynamic_acknowledgement", rule);
    }
    if step.thinking.len() > MAX_THINKING_LINES {
        collector.step(
            index,
            step,
            "thinking",
            format!(
                "{} thinking lines, at most {MAX_THINKING_LINES} are shown",
                step.thinking.len()
            ),
            "thinking_lines",
        );
    }
    for (position, line) in step.thinking.iter().enumerate() {
        check_rule(
            collector,
            index,
            step,
            &format!("thinking/{position}"),
            &line.text,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn flow(steps: serde_json::Value) -> OnboardingFlow {
        serde_json::from_value(json!({ "id": "t", "version": "1", "steps": steps }))
            .expect("flow")
    }

    #[test]
    fn builtin_flow_is_clean() {
        let report = validate_flow(&OnboardingFlow::builtin().unwrap());
        assert!(report.valid, "{:?}", report.issues);
    }

    #[test]
    fn empty_flow_is_reported() {
        let report = validate_flow(&flow(json!([])));
        assert_eq!(report.codes(), vec!["empty_flow"]);
    }

    #[test]
    fn reports_structural_problems() {
        let report = validate_flow(&flow(json!([
            { "id": "done", "type": "complete", "message": "bye" },
            {
                "id": "pick",
                "type": "grid",
                "question": "?",
                "options": [
                    { "emoji": "a", "label": "A", "value": "a" },
                    { "emoji": "b", "label": "B", "value": "a" }
                ],
                "acknowledgement_map": { "z": "nope" }
            },
            {
                "id": "pick",
                "type": "slider",
                "question": "?",
                "left_label": "l",
                "right_label": "r",
                "min": 10,
                "max": 10
            }
        ])));
        assert!(!report.valid);
        assert_eq!(
            report.codes(),
            vec![
                "complete_not_last",
                "duplicate_value",
                "unknown_option",
                "duplicate_step_id",
                "slider_bounds"
            ]
        );
        assert_eq!(report.issues[1].path, "/steps/1/options/1");
    }

    #[test]
    fn reports_bad_templates_and_long_thinking() {
        let line = json!({ "icon": "x", "text": { "kind": "template", "template": "ok" } });
        let report = validate_flow(&flow(json!([
            {
                "id": "q",
                "type": "speedround",
                "title": "t",
                "questions": [{ "id": "a", "question": "?" }],
                "summary": { "kind": "template", "template": "{{#if value}}" },
                "thinking": [line, line, line, line, line]
            }
        ])));
        assert_eq!(report.codes(), vec!["template", "thinking_lines"]);
    }
}
