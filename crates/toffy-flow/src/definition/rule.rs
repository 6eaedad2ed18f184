use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A yes/no sub-answer condition inside a mapping answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Signal {
    pub key: String,
    #[serde(default = "default_expect")]
    pub expect: bool,
    /// When set, a missing sub-answer never matches.
    #[serde(default, skip_serializing_if = "is_false")]
    pub explicit: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

fn default_expect() -> bool {
    true
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl Signal {
    pub fn new(key: impl Into<String>, expect: bool) -> Self {
        Self {
            key: key.into(),
            expect,
            explicit: false,
            label: None,
        }
    }

    /// Missing or non-boolean sub-answers read as `false` unless the signal is explicit.
    pub fn holds(&self, answers: Option<&Map<String, Value>>) -> bool {
        match answers
            .and_then(|answers| answers.get(&self.key))
            .and_then(Value::as_bool)
        {
            Some(answer) => answer == self.expect,
            None => !self.explicit && !self.expect,
        }
    }
}

/// Numeric reading taken from a submitted value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Measure {
    /// The value itself, when numeric.
    Value,
    /// Number of `true` entries in a mapping answer.
    CountTrue,
    /// Number of signals that hold.
    Signals { signals: Vec<Signal> },
    /// Number of numeric entries strictly above the threshold.
    CountAbove { threshold: f64 },
    /// Rounded mean of numeric entries, 0 when there are none.
    Mean,
}

/// Inclusive numeric range with the text it selects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Bracket {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    pub text: String,
}

impl Bracket {
    pub fn contains(&self, reading: f64) -> bool {
        self.min.is_none_or(|min| reading >= min) && self.max.is_none_or(|max| reading <= max)
    }
}

/// How flagged labels are joined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ListStyle {
    /// "a, b & c"
    #[default]
    Natural,
    /// "a, b, c"
    Comma,
}

/// Data rule that turns a submitted value into display text.
///
/// Templates are handlebars strings; they see `value`, `label`, `count`,
/// `mean` and `summary`. The `{name}` placeholder is substituted afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Derivation {
    Lookup {
        entries: BTreeMap<String, String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        fallback: Option<String>,
    },
    Template {
        template: String,
    },
    Bands {
        measure: Measure,
        bands: Vec<Bracket>,
    },
    Flags {
        signals: Vec<Signal>,
        #[serde(default)]
        prefix: String,
        #[serde(default)]
        suffix: String,
        empty: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        limit: Option<usize>,
        #[serde(default)]
        style: ListStyle,
    },
}

/// Where a thinking line reads its value from.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "from", rename_all = "snake_case")]
pub enum ThinkingSource {
    /// The value just submitted for the step.
    #[default]
    Value,
    /// A response recorded earlier in the flow.
    Response { step: String },
}

/// One synthesized status line of the thinking interstitial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ThinkingLine {
    pub icon: String,
    #[serde(default)]
    pub source: ThinkingSource,
    pub text: Derivation,
}
