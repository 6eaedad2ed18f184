use serde_json::{Map, Number, Value, json};

use crate::definition::rule::{Derivation, ListStyle, Measure, Signal};
use crate::template::{TemplateEngine, TemplateError, format_list};

/// Inputs visible to a derivation.
#[derive(Debug, Clone, Copy)]
pub struct DerivationInput<'a> {
    pub value: &'a Value,
    pub label: Option<&'a str>,
    pub summary: Option<&'a str>,
}

impl<'a> DerivationInput<'a> {
    pub fn new(value: &'a Value) -> Self {
        Self {
            value,
            label: None,
            summary: None,
        }
    }

    pub fn with_label(mut self, label: Option<&'a str>) -> Self {
        self.label = label;
        self
    }

    pub fn with_summary(mut self, summary: Option<&'a str>) -> Self {
        self.summary = summary;
        self
    }
}

/// String form used for exact-match lookups; only scalars have one.
pub fn lookup_key(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

impl Measure {
    pub fn read(&self, value: &Value) -> Option<f64> {
        match self {
            Measure::Value => value.as_f64(),
            Measure::CountTrue => Some(
                entries(value)
                    .filter(|entry| entry.as_bool() == Some(true))
                    .count() as f64,
            ),
            Measure::Signals { signals } => {
                let answers = value.as_object();
                Some(signals.iter().filter(|signal| signal.holds(answers)).count() as f64)
            }
            Measure::CountAbove { threshold } => Some(
                entries(value)
                    .filter_map(Value::as_f64)
                    .filter(|reading| reading > threshold)
                    .count() as f64,
            ),
            Measure::Mean => Some(rounded_mean(value) as f64),
        }
    }
}

fn entries(value: &Value) -> impl Iterator<Item = &Value> {
    value.as_object().into_iter().flat_map(Map::values)
}

/// Rounded mean of the numeric entries of a mapping answer; 0 when there are none.
pub fn rounded_mean(value: &Value) -> i64 {
    let readings: Vec<f64> = entries(value).filter_map(Value::as_f64).collect();
    if readings.is_empty() {
        return 0;
    }
    js_round(readings.iter().sum::<f64>() / readings.len() as f64)
}

/// Rounds half up, matching how percentages are rounded everywhere in the flow.
pub fn js_round(reading: f64) -> i64 {
    (reading + 0.5).floor() as i64
}

fn number_value(reading: f64) -> Value {
    if reading.fract() == 0.0 && reading.abs() < i64::MAX as f64 {
        Value::Number(Number::from(reading as i64))
    } else {
        Number::from_f64(reading)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

fn base_context(input: &DerivationInput<'_>) -> Value {
    json!({
        "value": input.value,
        "label": input.label,
        "summary": input.summary,
        "mean": rounded_mean(input.value),
    })
}

fn render(
    engine: &TemplateEngine,
    template: &str,
    ctx: &Value,
) -> Result<Option<String>, TemplateError> {
    let text = engine.render(template, ctx)?;
    Ok(Some(text).filter(|text| !text.trim().is_empty()))
}

impl Derivation {
    /// Produces display text, or `None` when the rule yields nothing.
    pub fn evaluate(
        &self,
        engine: &TemplateEngine,
        input: &DerivationInput<'_>,
    ) -> Result<Option<String>, TemplateError> {
        let mut ctx = base_context(input);
        match self {
            Derivation::Lookup { entries, fallback } => {
                if let Some(text) = lookup_key(input.value).and_then(|key| entries.get(&key)) {
                    return Ok(Some(text.clone()));
                }
                match fallback {
                    Some(template) => render(engine, template, &ctx),
                    None => Ok(None),
                }
            }
            Derivation::Template { template } => render(engine, template, &ctx),
            Derivation::Bands { measure, bands } => {
                let Some(reading) = measure.read(input.value) else {
                    return Ok(None);
                };
                let Some(band) = bands.iter().find(|band| band.contains(reading)) else {
                    return Ok(None);
                };
                if let Some(map) = ctx.as_object_mut() {
                    map.insert("count".into(), number_value(reading));
                }
                render(engine, &band.text, &ctx)
            }
            Derivation::Flags {
                signals,
                prefix,
                suffix,
                empty,
                limit,
                style,
            } => Ok(Some(flag_text(
                signals,
                input.value,
                prefix,
                suffix,
                empty,
                *limit,
                *style,
            ))),
        }
    }
}

fn flag_text(
    signals: &[Signal],
    value: &Value,
    prefix: &str,
    suffix: &str,
    empty: &str,
    limit: Option<usize>,
    style: ListStyle,
) -> String {
    let answers = value.as_object();
    let mut flagged: Vec<&str> = signals
        .iter()
        .filter(|signal| signal.holds(answers))
        .map(|signal| signal.label.as_deref().unwrap_or(signal.key.as_str()))
        .collect();
    if flagged.is_empty() {
        return empty.to_string();
    }
    if let Some(limit) = limit {
        flagged.truncate(limit);
    }
    let joined = match style {
        ListStyle::Natural => format_list(&flagged),
        ListStyle::Comma => flagged.join(", "),
    };
    format!("{prefix}{joined}{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::rule::Bracket;
    use std::collections::BTreeMap;

    fn bands(measure: Measure, bands: &[(Option<f64>, Option<f64>, &str)]) -> Derivation {
        Derivation::Bands {
            measure,
            bands: bands
                .iter()
                .map(|(min, max, text)| Bracket {
                    min: *min,
                    max: *max,
                    text: text.to_string(),
                })
                .collect(),
        }
    }

    #[test]
    fn lookup_prefers_entry_then_fallback() {
        let engine = TemplateEngine::new();
        let rule = Derivation::Lookup {
            entries: BTreeMap::from([("potty".to_string(), "Potty first".to_string())]),
            fallback: Some("My main goal is {{lower label}}".into()),
        };
        let hit = rule
            .evaluate(&engine, &DerivationInput::new(&json!("potty")))
            .expect("render");
        assert_eq!(hit.as_deref(), Some("Potty first"));

        let value = json!("agility");
        let miss = rule
            .evaluate(&engine, &DerivationInput::new(&value).with_label(Some("Agility")))
            .expect("render");
        assert_eq!(miss.as_deref(), Some("My main goal is agility"));
    }

    #[test]
    fn bands_pick_first_matching_range_inclusive() {
        let engine = TemplateEngine::new();
        let rule = bands(
            Measure::Value,
            &[(None, Some(25.0), "mild"), (None, Some(50.0), "moderate"), (None, None, "severe")],
        );
        let eval = |reading: Value| {
            rule.evaluate(&engine, &DerivationInput::new(&reading))
                .expect("render")
        };
        assert_eq!(eval(json!(25)).as_deref(), Some("mild"));
        assert_eq!(eval(json!(25.5)).as_deref(), Some("moderate"));
        assert_eq!(eval(json!(90)).as_deref(), Some("severe"));
        assert_eq!(eval(json!("loud")), None);
    }

    #[test]
    fn count_true_exposes_count_to_template() {
        let engine = TemplateEngine::new();
        let rule = bands(
            Measure::CountTrue,
            &[(Some(5.0), None, "all"), (None, None, "{{count}}/5")],
        );
        let value = json!({ "walks": true, "diet": true, "sensory": false });
        let text = rule
            .evaluate(&engine, &DerivationInput::new(&value))
            .expect("render");
        assert_eq!(text.as_deref(), Some("2/5"));
    }

    #[test]
    fn flags_respect_explicit_signals() {
        let engine = TemplateEngine::new();
        let mut walks = Signal::new("walks", false);
        walks.explicit = true;
        walks.label = Some("regular walks".into());
        let mut diet = Signal::new("diet", false);
        diet.explicit = true;
        let rule = Derivation::Flags {
            signals: vec![walks, diet],
            prefix: "Focusing next on ".into(),
            suffix: ".".into(),
            empty: "Everything covered.".into(),
            limit: None,
            style: ListStyle::Natural,
        };
        let only_walks = json!({ "walks": false });
        assert_eq!(
            rule.evaluate(&engine, &DerivationInput::new(&only_walks))
                .expect("render")
                .as_deref(),
            Some("Focusing next on regular walks.")
        );
        let none = json!({});
        assert_eq!(
            rule.evaluate(&engine, &DerivationInput::new(&none))
                .expect("render")
                .as_deref(),
            Some("Everything covered.")
        );
    }

    #[test]
    fn mean_ignores_non_numeric_entries() {
        assert_eq!(rounded_mean(&json!({ "a": 10, "b": 21, "c": "x" })), 16);
        assert_eq!(rounded_mean(&json!({})), 0);
        assert_eq!(js_round(49.5), 50);
    }

    #[test]
    fn empty_render_is_none() {
        let engine = TemplateEngine::new();
        let rule = Derivation::Template {
            template: "{{label}}".into(),
        };
        let value = json!(1);
        assert_eq!(
            rule.evaluate(&engine, &DerivationInput::new(&value))
                .expect("render"),
            None
        );
    }
}
