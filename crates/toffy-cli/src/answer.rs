//! Turning typed lines into step values.
//!
//! Multi-part steps (speed rounds, matrices) are asked one line per part; the
//! wizard collects the parts and hands them to [`assemble`].

use serde_json::{Map, Number, Value, json};

use toffy_flow::handlers::{
    NotificationPermission, PermissionError, PermissionState, accept_reminders, decline_reminders,
};
use toffy_flow::definition::{ChipsStep, GridStep, NotificationStep, SliderStep, StepKind};
use toffy_flow::Step;

/// Error produced when parsing answers from the user.
#[derive(Debug)]
pub struct AnswerParseError {
    pub user_message: String,
    pub debug_message: Option<String>,
}

impl AnswerParseError {
    pub fn new(user_message: impl Into<String>, debug_message: Option<String>) -> Self {
        Self {
            user_message: user_message.into(),
            debug_message,
        }
    }
}

/// Value for the engine plus the widget label echoed back.
#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    pub value: Value,
    pub label: Option<String>,
}

impl Answer {
    fn new(value: Value, label: Option<String>) -> Self {
        Self { value, label }
    }
}

/// One line to ask. `key` is set for the parts of multi-part steps.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub key: Option<String>,
    pub prompt: String,
    pub hint: String,
    pub default: Option<String>,
}

/// Terminal stand-in for the browser permission prompt; there is nothing to
/// ask, so it always grants.
pub struct TerminalPermission;

impl NotificationPermission for TerminalPermission {
    fn request_permission(&mut self) -> Result<PermissionState, PermissionError> {
        Ok(PermissionState::Granted)
    }
}

fn number_value(reading: f64) -> Value {
    if reading.fract() == 0.0 {
        Value::Number(Number::from(reading as i64))
    } else {
        Number::from_f64(reading)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

fn format_number(reading: f64) -> String {
    if reading.fract() == 0.0 {
        format!("{}", reading as i64)
    } else {
        reading.to_string()
    }
}

/// Lines the wizard asks for a step, in order.
pub fn fields(step: &Step) -> Vec<Field> {
    let single = |hint: String, default: Option<String>| {
        vec![Field {
            key: None,
            prompt: String::new(),
            hint,
            default,
        }]
    };
    match &step.kind {
        StepKind::Intro(intro) => match &intro.secondary_button_text {
            Some(secondary) => single(
                format!("(y = {}, n = {})", intro.button_text, secondary),
                Some("y".into()),
            ),
            None => single(format!("(press Enter: {})", intro.button_text), Some("y".into())),
        },
        StepKind::Grid(grid) => single(format!("(1-{} or option value)", grid.options.len()), None),
        StepKind::SpeedRound(round) => round
            .questions
            .iter()
            .map(|question| Field {
                key: Some(question.id.clone()),
                prompt: question.question.clone(),
                hint: "(y/n)".into(),
                default: None,
            })
            .collect(),
        StepKind::Slider(slider) => single(
            format!(
                "({} {} … {} {})",
                format_number(slider.min),
                slider.left_label,
                format_number(slider.max),
                slider.right_label
            ),
            Some(format_number(slider.default_value)),
        ),
        StepKind::Chips(chips) => {
            let none = if chips.allow_none { ", or none" } else { "" };
            single(format!("(comma-separated numbers or values{none})"), None)
        }
        StepKind::Matrix(matrix) => matrix
            .items
            .iter()
            .map(|item| Field {
                key: Some(item.id.clone()),
                prompt: item.label.clone(),
                hint: "(0-100)".into(),
                default: Some(format_number(item.default_value)),
            })
            .collect(),
        StepKind::Notification(notification) => single(
            format!(
                "(y = {} at {}, HH:MM = another time, n = {})",
                notification.button_text,
                notification.default_time,
                notification
                    .secondary_button_text
                    .as_deref()
                    .unwrap_or("Maybe later")
            ),
            None,
        ),
        StepKind::Complete(_) => Vec::new(),
    }
}

/// Parses a single part. Returns the part's value.
pub fn parse_field(step: &Step, field: &Field, raw: &str) -> Result<Value, AnswerParseError> {
    let raw = raw.trim();
    let raw = if raw.is_empty() {
        field.default.as_deref().unwrap_or("")
    } else {
        raw
    };
    if raw.is_empty() {
        return Err(AnswerParseError::new("This question needs an answer.", None));
    }
    match &step.kind {
        StepKind::SpeedRound(_) => parse_yes_no(raw),
        StepKind::Matrix(_) => parse_rating(raw, 0.0, 100.0),
        _ => Ok(Value::String(raw.to_string())),
    }
}

/// Builds the step answer from the parsed parts, in [`fields`] order.
pub fn assemble(
    step: &Step,
    parts: Vec<(Option<String>, Value)>,
    permission: &mut dyn NotificationPermission,
) -> Result<Answer, AnswerParseError> {
    match &step.kind {
        StepKind::SpeedRound(_) | StepKind::Matrix(_) => {
            let mapping: Map<String, Value> = parts
                .into_iter()
                .filter_map(|(key, value)| key.map(|key| (key, value)))
                .collect();
            Ok(Answer::new(Value::Object(mapping), None))
        }
        _ => {
            let raw = parts
                .into_iter()
                .next()
                .and_then(|(_, value)| value.as_str().map(str::to_string))
                .unwrap_or_default();
            parse_single(step, &raw, permission)
        }
    }
}

fn parse_single(
    step: &Step,
    raw: &str,
    permission: &mut dyn NotificationPermission,
) -> Result<Answer, AnswerParseError> {
    match &step.kind {
        StepKind::Intro(intro) => {
            let pressed = parse_yes_no(raw)?.as_bool().unwrap_or(true);
            let label = if pressed {
                Some(intro.button_text.clone())
            } else {
                intro.secondary_button_text.clone()
            };
            Ok(Answer::new(Value::Bool(pressed), label))
        }
        StepKind::Grid(grid) => parse_grid(grid, raw),
        StepKind::Slider(slider) => parse_slider(slider, raw),
        StepKind::Chips(chips) => parse_chips(chips, raw),
        StepKind::Notification(notification) => {
            parse_reminder(step, notification, raw, permission)
        }
        StepKind::SpeedRound(_) | StepKind::Matrix(_) | StepKind::Complete(_) => Err(
            AnswerParseError::new("This step cannot be answered with one line.", None),
        ),
    }
}

pub fn parse_yes_no(raw: &str) -> Result<Value, AnswerParseError> {
    match raw.to_lowercase().as_str() {
        "true" | "t" | "yes" | "y" | "1" => Ok(Value::Bool(true)),
        "false" | "f" | "no" | "n" | "0" => Ok(Value::Bool(false)),
        _ => Err(AnswerParseError::new(
            "Please enter yes or no.",
            Some("expected boolean (y/n/true/false)".to_string()),
        )),
    }
}

fn parse_rating(raw: &str, min: f64, max: f64) -> Result<Value, AnswerParseError> {
    let reading = raw.parse::<f64>().map_err(|_| {
        AnswerParseError::new("Please enter a number.", Some("expected number".to_string()))
    })?;
    if !reading.is_finite() || reading < min || reading > max {
        return Err(AnswerParseError::new(
            format!(
                "Please enter a number between {} and {}.",
                format_number(min),
                format_number(max)
            ),
            None,
        ));
    }
    Ok(number_value(reading))
}

fn pick<'a, T>(
    options: &'a [T],
    raw: &str,
    value_of: impl Fn(&T) -> &str,
    label_of: impl Fn(&T) -> &str,
) -> Option<&'a T> {
    if let Ok(position) = raw.parse::<usize>()
        && position >= 1
        && position <= options.len()
    {
        return options.get(position - 1);
    }
    options.iter().find(|option| {
        value_of(option).eq_ignore_ascii_case(raw) || label_of(option).eq_ignore_ascii_case(raw)
    })
}

fn parse_grid(grid: &GridStep, raw: &str) -> Result<Answer, AnswerParseError> {
    let option = pick(
        &grid.options,
        raw,
        |option| option.value.as_str(),
        |option| option.label.as_str(),
    )
    .ok_or_else(|| {
        let allowed: Vec<&str> = grid.options.iter().map(|option| option.value.as_str()).collect();
        AnswerParseError::new(
            format!("Choose 1-{} or one of: {}.", grid.options.len(), allowed.join(", ")),
            Some(format!("allowed values: {}", allowed.join(", "))),
        )
    })?;
    Ok(Answer::new(
        Value::String(option.value.clone()),
        Some(option.label.clone()),
    ))
}

fn parse_slider(slider: &SliderStep, raw: &str) -> Result<Answer, AnswerParseError> {
    let value = parse_rating(raw, slider.min, slider.max)?;
    Ok(Answer::new(value, None))
}

fn parse_chips(chips: &ChipsStep, raw: &str) -> Result<Answer, AnswerParseError> {
    if chips.allow_none && raw.eq_ignore_ascii_case("none") {
        return Ok(Answer::new(json!(["none"]), Some("None of these".into())));
    }
    let mut values = Vec::new();
    let mut labels = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|part| !part.is_empty()) {
        let option = pick(
            &chips.options,
            part,
            |option| option.value.as_str(),
            |option| option.label.as_str(),
        )
        .ok_or_else(|| AnswerParseError::new(format!("Unknown option '{part}'."), None))?;
        if !values.contains(&option.value) {
            values.push(option.value.clone());
            labels.push(option.label.clone());
        }
    }
    if values.len() < chips.min_select.max(1) {
        return Err(AnswerParseError::new(
            format!("Pick at least {}.", chips.min_select.max(1)),
            None,
        ));
    }
    Ok(Answer::new(json!(values), Some(labels.join(", "))))
}

fn valid_time(raw: &str) -> bool {
    let Some((hours, minutes)) = raw.split_once(':') else {
        return false;
    };
    let in_range = |part: &str, limit: u8| {
        part.len() == 2 && part.parse::<u8>().is_ok_and(|number| number < limit)
    };
    in_range(hours, 24) && in_range(minutes, 60)
}

fn parse_reminder(
    step: &Step,
    notification: &NotificationStep,
    raw: &str,
    permission: &mut dyn NotificationPermission,
) -> Result<Answer, AnswerParseError> {
    if valid_time(raw) {
        let (value, label) = accept_reminders(permission, raw);
        return Ok(Answer::new(value, Some(label)));
    }
    let accepted = parse_yes_no(raw).map_err(|_| {
        AnswerParseError::new(
            "Please enter y, n, or a time like 19:00.",
            Some("expected y/n or HH:MM".to_string()),
        )
    })?;
    let (value, label) = if accepted.as_bool() == Some(true) {
        accept_reminders(permission, &notification.default_time)
    } else {
        decline_reminders(step)
    };
    Ok(Answer::new(value, Some(label)))
}
