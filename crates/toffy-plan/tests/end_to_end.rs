use std::cell::RefCell;
use std::rc::Rc;

use serde_json::{Value, json};

use toffy_flow::{EngineState, FlowEngine, HandlerRegistry, ResponseMap, StepType, Subject};
use toffy_plan::backend::PetUpdate;
use toffy_plan::{
    DayAction, DayState, DiagnosisReport, MockBackend, MockDelays, PlanProgress, ToffyConfig,
};

fn scripted(step_type: StepType, step_id: &str) -> Value {
    match (step_type, step_id) {
        (StepType::Intro, _) => json!(true),
        (_, "living") => json!("apt_no_outdoor"),
        (_, "goal") => json!("potty"),
        (_, "training_time") => json!("5-10"),
        (_, "leadership_1") => json!({
            "table_scraps": true, "door_wait": false, "raise_voice": true,
            "leash_pull": false, "approach_signal": true, "playtime_signal": false
        }),
        (_, "leadership_2") => json!({
            "recall_repeat": true, "earn_treats": false, "furniture_invite": true,
            "move_around": false, "designated_spot": true
        }),
        (_, "five_things") => json!({
            "sensory": true, "walks": true, "training": true, "diet": true, "bonding": false
        }),
        (_, "sensitivities") => json!({
            "resource_guarding": 30, "sound": 40, "movement": 20, "touch": 10, "food": 25
        }),
        (StepType::Slider, _) => json!(70),
        (StepType::Notification, _) => json!({ "enabled": true, "time": "08:00" }),
        other => panic!("no scripted answer for {other:?}"),
    }
}

fn run_chat(subject: &Subject) -> ResponseMap {
    let config = ToffyConfig::default().with_env(|key| {
        (key == "TOFFY_INSTANT").then(|| "1".to_string())
    });
    let flow = config.load_flow().expect("flow");
    let registry = HandlerRegistry::with_defaults();
    let mut engine = FlowEngine::new(flow, subject.clone(), config.pacing());

    let finished = Rc::new(RefCell::new(None));
    let sink = Rc::clone(&finished);
    engine.on_terminal(move |responses| *sink.borrow_mut() = Some(responses.clone()));

    loop {
        engine.run_until_idle();
        match engine.state() {
            EngineState::Thinking(_) => {
                engine.thinking_complete();
            }
            EngineState::AwaitingCompletion(_) => {
                let step = engine.awaiting_step().expect("step").clone();
                let value = scripted(step.step_type(), &step.id);
                engine
                    .submit(&registry, &step.id, value, None)
                    .expect("scripted answers are valid");
            }
            EngineState::Terminal => break,
            other => panic!("unexpected state {other}"),
        }
    }
    let responses = finished.borrow().clone();
    responses.expect("terminal handler ran")
}

#[test]
fn chat_results_feed_the_diagnosis() {
    let subject = Subject {
        name: "Milo".into(),
        breed: "Beagle".into(),
        age: "young".into(),
    };
    let responses = run_chat(&subject);
    let report = DiagnosisReport::build(&subject, &responses);

    assert_eq!(report.scores.leadership, 33);
    assert_eq!(report.scores.boundaries, 40);
    assert_eq!(report.scores.essentials, 80);
    assert_eq!(report.scores.reactivity, 25);
    assert!(
        report
            .narrative
            .headline
            .contains("leadership structure and boundary consistency need attention")
    );
    assert!(report.narrative.body.contains("potty training"));
    assert!(report.escalation.starts_with("At Milo's age, house training issues"));
    assert_eq!(
        report.mirror,
        vec![
            "Lives in an apartment without outdoor space",
            "Main goal: potty training",
            "Missing essentials: bonding time",
            "Low reactivity across all areas",
            "Issue severity: high",
        ]
    );
    assert!(report.has_sensitivity_data);
}

#[tokio::test(start_paused = true)]
async fn backend_plan_respects_trial_gating() {
    let mut backend = MockBackend::new()
        .expect("catalog")
        .with_delays(MockDelays::none());
    let pet = backend
        .create_pet(PetUpdate {
            name: Some("Milo".into()),
            ..PetUpdate::default()
        })
        .await;
    backend.set_problem(&pet.id, "leash").await;
    let plan = backend.get_plan(&pet.id).await;

    let mut progress = PlanProgress::new(plan.trial_days);
    let last = plan.days.last().expect("seven days").day;
    assert_eq!(progress.day_state(last), DayState::Locked);
    for day in plan.days.iter().take(plan.trial_days as usize) {
        assert_eq!(progress.start_day(day.day), DayAction::Started);
    }
    assert_eq!(progress.day_state(last), DayState::Paywalled);
    assert_eq!(progress.start_day(last), DayAction::PaywallShown);
}
