use serde_json::{Value, json};

use toffy_flow::engine::CLOSING_ECHO;
use toffy_flow::{
    EngineState, FlowEngine, HandlerRegistry, Message, OnboardingFlow, Pacing, StepOutcome,
    StepType, Subject, validate_flow,
};

fn answer_for(step_type: StepType, step_id: &str) -> (Value, Option<&'static str>) {
    match (step_type, step_id) {
        (StepType::Intro, _) => (json!(true), None),
        (_, "living") => (json!("house_yard"), Some("House with yard")),
        (_, "goal") => (json!("leash"), Some("Leash pulling")),
        (_, "training_time") => (json!("15-30"), Some("15-30 min")),
        (_, "leadership_1") => (
            json!({
                "table_scraps": true,
                "door_wait": false,
                "raise_voice": false,
                "leash_pull": true,
                "approach_signal": true,
                "playtime_signal": true
            }),
            None,
        ),
        (_, "leadership_2") => (
            json!({
                "recall_repeat": true,
                "earn_treats": true,
                "furniture_invite": false,
                "move_around": false,
                "designated_spot": false
            }),
            None,
        ),
        (_, "five_things") => (
            json!({ "sensory": true, "walks": true, "training": false, "diet": true, "bonding": true }),
            None,
        ),
        (_, "sensitivities") => (
            json!({ "resource_guarding": 20, "sound": 75, "movement": 40, "touch": 20, "food": 10 }),
            None,
        ),
        (StepType::Slider, _) => (json!(55), None),
        (StepType::Notification, _) => (json!({ "enabled": false, "time": null }), Some("Maybe later")),
        other => panic!("no scripted answer for {other:?}"),
    }
}

#[test]
fn builtin_flow_walks_to_terminal() {
    let flow = OnboardingFlow::builtin().expect("builtin flow");
    assert!(validate_flow(&flow).valid);

    let registry = HandlerRegistry::with_defaults();
    let mut engine = FlowEngine::new(flow, Subject::named("Buddy"), Pacing::instant());
    let mut steps_answered = 0;

    loop {
        engine.run_until_idle();
        match engine.state() {
            EngineState::Thinking(_) => {
                assert!(engine.thinking_complete());
            }
            EngineState::AwaitingCompletion(_) => {
                let step = engine.awaiting_step().expect("step on screen").clone();
                let (value, label) = answer_for(step.step_type(), &step.id);
                let outcome = engine
                    .submit(&registry, &step.id, value, label)
                    .expect("valid answer");
                assert_eq!(outcome, StepOutcome::Accepted);
                steps_answered += 1;
            }
            EngineState::Terminal => break,
            other => panic!("engine stuck in {other}"),
        }
    }

    assert_eq!(steps_answered, 13);
    assert_eq!(engine.responses().len(), 13);
    assert_eq!(engine.selected_goal(), Some("leash"));
    assert_eq!(engine.thinking_count(), 4);

    let transcript = engine.transcript();
    assert!(transcript.contains(&Message::UserEcho {
        text: "We live in a house with a yard".into()
    }));
    assert!(transcript.contains(&Message::UserEcho {
        text: "Buddy is getting 4/5 essentials".into()
    }));
    assert!(
        transcript
            .iter()
            .all(|message| !message.text().contains("{name}"))
    );
    let thinking_ids: Vec<&str> = transcript
        .iter()
        .filter_map(|message| match message {
            Message::Thinking { step_id, .. } => Some(step_id.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(
        thinking_ids,
        vec!["leadership_2", "five_things", "sensitivities", "severity"]
    );
    let closing = transcript
        .iter()
        .position(|message| message == &Message::UserEcho { text: CLOSING_ECHO.into() })
        .expect("closing echo");
    assert!(matches!(transcript[closing + 1], Message::Diagnosis { .. }));
}

#[test]
fn rejected_answers_leave_engine_untouched() {
    let flow = OnboardingFlow::builtin().expect("builtin flow");
    let registry = HandlerRegistry::with_defaults();
    let mut engine = FlowEngine::new(flow, Subject::named("Buddy"), Pacing::instant());
    engine.run_until_idle();
    engine.complete_step("intro", json!(true), None);
    engine.run_until_idle();

    let before = engine.transcript().len();
    assert!(
        engine
            .submit(&registry, "living", json!("castle"), None)
            .is_err()
    );
    assert_eq!(engine.transcript().len(), before);
    assert!(engine.responses().get("living").is_none());
}
