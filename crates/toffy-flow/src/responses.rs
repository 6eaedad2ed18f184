use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Answers keyed by step id, in the order the steps were visited.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResponseMap {
    entries: Map<String, Value>,
}

impl ResponseMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a map from a JSON object; anything else yields an empty map.
    pub fn from_value(value: &Value) -> Self {
        Self {
            entries: value.as_object().cloned().unwrap_or_default(),
        }
    }

    /// Last write wins.
    pub fn record(&mut self, step_id: &str, value: Value) {
        self.entries.insert(step_id.to_string(), value);
    }

    pub fn get(&self, step_id: &str) -> Option<&Value> {
        self.entries.get(step_id)
    }

    pub fn contains(&self, step_id: &str) -> bool {
        self.entries.contains_key(step_id)
    }

    /// Sub-answers of a mapping step (speedround, matrix).
    pub fn mapping(&self, step_id: &str) -> Option<&Map<String, Value>> {
        self.get(step_id).and_then(Value::as_object)
    }

    pub fn text(&self, step_id: &str) -> Option<&str> {
        self.get(step_id).and_then(Value::as_str)
    }

    pub fn number(&self, step_id: &str) -> Option<f64> {
        self.get(step_id).and_then(Value::as_f64)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn step_ids(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.entries.clone())
    }
}

impl From<Map<String, Value>> for ResponseMap {
    fn from(entries: Map<String, Value>) -> Self {
        Self { entries }
    }
}
