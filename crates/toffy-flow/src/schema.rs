use serde_json::Value;

use crate::definition::OnboardingFlow;

/// JSON schema of the flow definition document.
pub fn flow_schema() -> Value {
    serde_json::to_value(schemars::schema_for!(OnboardingFlow)).unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_describes_steps() {
        let schema = flow_schema();
        assert_eq!(schema["title"], "OnboardingFlow");
        assert!(schema["properties"]["steps"].is_object());
        assert!(schema["required"]
            .as_array()
            .unwrap()
            .iter()
            .any(|field| field == "steps"));
    }
}
