//! String-in/string-out responders for hosts that speak JSON only.
//!
//! Every function returns a JSON document; failures come back as
//! `{"error": "..."}` instead of panicking or returning `Err`.

use serde::Deserialize;
use serde_json::{Map, Value, json};
use thiserror::Error;

use toffy_flow::{FlowError, ResponseMap, Subject, validate_flow};

use crate::config::{ConfigError, ToffyConfig};
use crate::diagnosis::DiagnosisReport;
use crate::plan::{PlanProgress, PlanTotals, plan_days};

#[derive(Debug, Error)]
enum ComponentError {
    #[error("config: {0}")]
    Config(#[from] ConfigError),
    #[error("flow: {0}")]
    Flow(#[from] FlowError),
    #[error("failed to parse {what}: {source}")]
    Parse {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("json encode error: {0}")]
    JsonEncode(#[source] serde_json::Error),
}

fn respond(result: Result<Value, ComponentError>) -> String {
    match result {
        Ok(value) => serde_json::to_string(&value).unwrap_or_else(|error| {
            json!({"error": format!("json encode: {}", error)}).to_string()
        }),
        Err(err) => json!({ "error": err.to_string() }).to_string(),
    }
}

fn parse_or_default<T>(raw: &str, what: &'static str) -> Result<T, ComponentError>
where
    T: Default + for<'de> Deserialize<'de>,
{
    if raw.trim().is_empty() {
        return Ok(T::default());
    }
    serde_json::from_str(raw).map_err(|source| ComponentError::Parse { what, source })
}

fn flow_description(config_json: &str) -> Result<Value, ComponentError> {
    let config = ToffyConfig::from_json_str(config_json)?;
    let flow = config.load_flow()?;
    let validation = validate_flow(&flow);
    Ok(json!({
        "flow": serde_json::to_value(&flow).map_err(ComponentError::JsonEncode)?,
        "validation": serde_json::to_value(validation).map_err(ComponentError::JsonEncode)?,
    }))
}

/// The flow definition plus its validation report.
pub fn describe_flow(config_json: &str) -> String {
    respond(flow_description(config_json))
}

fn diagnosis_report(subject_json: &str, responses_json: &str) -> Result<Value, ComponentError> {
    let subject: Subject = parse_or_default(subject_json, "subject")?;
    let responses: Map<String, Value> = parse_or_default(responses_json, "responses")?;
    let report = DiagnosisReport::build(&subject, &ResponseMap::from(responses));
    serde_json::to_value(report).map_err(ComponentError::JsonEncode)
}

/// Diagnosis report for a subject (`{name, breed, age}`) and its responses.
pub fn diagnose(subject_json: &str, responses_json: &str) -> String {
    respond(diagnosis_report(subject_json, responses_json))
}

fn gated_plan(goal: &str, subject_json: &str, config_json: &str) -> Result<Value, ComponentError> {
    let subject: Subject = parse_or_default(subject_json, "subject")?;
    let config = ToffyConfig::from_json_str(config_json)?;
    let days = plan_days(goal, subject.display_name());
    let progress = PlanProgress::new(config.trial_days);
    let gating: Vec<Value> = days
        .iter()
        .map(|day| json!({ "day": day.day, "state": progress.day_state(day.day) }))
        .collect();
    Ok(json!({
        "goal": goal,
        "totals": PlanTotals::of(&days),
        "trial_days": config.trial_days,
        "days": days,
        "gating": gating,
    }))
}

/// The 7-day plan for a goal, with the gating state of a fresh trial.
pub fn plan(goal: &str, subject_json: &str, config_json: &str) -> String {
    respond(gated_plan(goal, subject_json, config_json))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> Value {
        serde_json::from_str(raw).expect("responder output is json")
    }

    #[test]
    fn describe_flow_reports_builtin_flow() {
        let out = parse(&describe_flow(""));
        assert_eq!(out["flow"]["id"], "toffy-onboarding");
        assert_eq!(out["validation"]["valid"], true);
    }

    #[test]
    fn describe_flow_surfaces_config_errors() {
        let out = parse(&describe_flow("{ broken"));
        assert!(out["error"].as_str().unwrap().starts_with("config:"));
    }

    #[test]
    fn diagnose_builds_report() {
        let out = parse(&diagnose(
            r#"{ "name": "Buddy", "age": "puppy" }"#,
            r#"{ "goal": "potty", "severity": 80 }"#,
        ));
        assert_eq!(out["name"], "Buddy");
        assert_eq!(out["scores"]["reactivity"], 20);
        assert!(
            out["escalation"]
                .as_str()
                .unwrap()
                .starts_with("At Buddy's age")
        );
        assert_eq!(out["narrative"]["kind"], "weak_areas");
    }

    #[test]
    fn diagnose_rejects_bad_responses() {
        let out = parse(&diagnose("", "[1, 2]"));
        assert!(
            out["error"]
                .as_str()
                .unwrap()
                .starts_with("failed to parse responses")
        );
    }

    #[test]
    fn plan_includes_gating() {
        let out = parse(&plan("potty", r#"{ "name": "Rex" }"#, ""));
        assert_eq!(out["totals"]["lessons"], 16);
        assert_eq!(out["gating"][0]["state"]["state"], "available");
        assert_eq!(out["gating"][3]["state"]["state"], "locked");
        assert_eq!(out["days"][1]["description"], "Teach Rex to communicate their needs");
    }
}
