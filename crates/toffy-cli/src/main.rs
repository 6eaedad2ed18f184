mod answer;
mod wizard;

use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::thread;

use answer::{Answer, TerminalPermission, assemble, fields, parse_field};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::{Map, Value};
use toffy_flow::{
    EngineState, FlowEngine, HandlerRegistry, OnboardingFlow, ResponseMap, Step, StepOutcome,
    Subject, flow_schema, validate_flow,
};
use toffy_plan::component;
use toffy_plan::{DiagnosisReport, PlanProgress, ToffyConfig, plan_days};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;
use wizard::{Verbosity, WizardPresenter, render_plan, render_report};

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Toffy onboarding chat in the terminal",
    long_about = "Runs the onboarding chat, scores saved answers, prints training plans and checks flow definitions"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the onboarding chat in a text shell.
    Wizard {
        /// Flow definition JSON (defaults to TOFFY_FLOW or the built-in flow).
        #[arg(long, value_name = "FLOW")]
        flow: Option<PathBuf>,
        /// The dog's name.
        #[arg(long, default_value = "")]
        name: String,
        #[arg(long, default_value = "")]
        breed: String,
        /// Age bucket: puppy, young, adolescent, adult or senior.
        #[arg(long, default_value = "adult")]
        age: String,
        /// Optional JSON config file.
        #[arg(long, value_name = "CONFIG")]
        config: Option<PathBuf>,
        /// Show step ids, option values and parse expectations.
        #[arg(long, alias = "debug")]
        verbose: bool,
        /// Also emit the subject and responses as JSON when done.
        #[arg(long)]
        answers_json: bool,
        /// Skip every delay.
        #[arg(long)]
        instant: bool,
    },
    /// Score a saved responses file.
    Score {
        /// JSON object mapping step ids to answers.
        #[arg(long, value_name = "ANSWERS")]
        answers: PathBuf,
        #[arg(long, default_value = "")]
        name: String,
        #[arg(long, default_value = "adult")]
        age: String,
        /// Print the full report as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Print the 7-day plan for a training goal.
    Plan {
        #[arg(long, default_value = "obedience")]
        goal: String,
        #[arg(long, default_value = "")]
        name: String,
        /// Optional JSON config file.
        #[arg(long, value_name = "CONFIG")]
        config: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },
    /// Inspect flow definitions.
    Flow {
        #[command(subcommand)]
        command: FlowCommand,
    },
}

#[derive(Subcommand)]
enum FlowCommand {
    /// Print a flow with its validation report.
    Describe {
        #[arg(long, value_name = "FLOW")]
        flow: Option<PathBuf>,
    },
    /// Print the JSON schema for flow definitions.
    Schema,
    /// Check a flow definition; exits non-zero when it has issues.
    Validate {
        #[arg(long, value_name = "FLOW")]
        flow: Option<PathBuf>,
    },
}

struct WizardArgs {
    flow: Option<PathBuf>,
    subject: Subject,
    config: Option<PathBuf>,
    verbose: bool,
    answers_json: bool,
    instant: bool,
}

#[derive(Serialize)]
struct WizardOutput<'a> {
    subject: &'a Subject,
    responses: &'a ResponseMap,
}

fn main() -> CliResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Wizard {
            flow,
            name,
            breed,
            age,
            config,
            verbose,
            answers_json,
            instant,
        } => run_wizard(WizardArgs {
            flow,
            subject: Subject { name, breed, age },
            config,
            verbose,
            answers_json,
            instant,
        }),
        Command::Score {
            answers,
            name,
            age,
            json,
        } => run_score(&answers, Subject { name, breed: String::new(), age }, json),
        Command::Plan {
            goal,
            name,
            config,
            json,
        } => run_plan(&goal, &name, config.as_deref(), json),
        Command::Flow { command } => match command {
            FlowCommand::Describe { flow } => run_describe(flow),
            FlowCommand::Schema => {
                println!("{}", serde_json::to_string_pretty(&flow_schema())?);
                Ok(())
            }
            FlowCommand::Validate { flow } => run_validate(flow),
        },
    }
}

fn load_flow(path: Option<PathBuf>) -> CliResult<OnboardingFlow> {
    let mut config = ToffyConfig::load(None)?;
    if path.is_some() {
        config.flow_path = path;
    }
    Ok(config.load_flow()?)
}

fn run_wizard(args: WizardArgs) -> CliResult<()> {
    let mut config = ToffyConfig::load(args.config.as_deref())?;
    if args.flow.is_some() {
        config.flow_path = args.flow;
    }
    if args.instant {
        config.instant = true;
    }
    let flow = config.load_flow()?;
    let validation = validate_flow(&flow);
    if !validation.valid {
        for issue in &validation.issues {
            eprintln!("{}: {}", issue.path, issue.message);
        }
        return Err("flow definition is invalid".into());
    }

    let pacing = config.pacing();
    let registry = HandlerRegistry::with_defaults();
    let mut presenter =
        WizardPresenter::new(Verbosity::from_verbose(args.verbose), pacing.thinking_line);
    presenter.show_header(flow.title.as_deref().unwrap_or(&flow.id), flow.len());

    let mut engine = FlowEngine::new(flow, args.subject, pacing);
    let stdin = io::stdin();
    let mut input = stdin.lock();

    loop {
        drive(&mut engine, &mut presenter);
        match engine.state() {
            EngineState::AwaitingCompletion(_) => {
                let Some(step) = engine.awaiting_step().cloned() else {
                    continue;
                };
                let answer = match ask_step(&step, &presenter, &mut input) {
                    Ok(answer) => answer,
                    Err(err) => {
                        engine.cancel();
                        return Err(err);
                    }
                };
                match engine.submit(&registry, &step.id, answer.value, answer.label.as_deref()) {
                    Ok(StepOutcome::Accepted) => {}
                    Ok(StepOutcome::Ignored(reason)) => {
                        warn!(step = %step.id, %reason, "answer ignored")
                    }
                    Err(err) => presenter.show_submit_error(&err),
                }
            }
            EngineState::Thinking(_) => {
                let settle = engine.pacing().thinking_settle;
                if !settle.is_zero() {
                    thread::sleep(settle);
                }
                engine.thinking_complete();
            }
            EngineState::Terminal => break,
            state => {
                debug!(%state, "engine stalled with nothing scheduled");
                return Err(format!("wizard stalled in state {state}").into());
            }
        }
    }

    let report = DiagnosisReport::build(engine.subject(), engine.responses());
    let goal = engine.selected_goal().unwrap_or("obedience").to_string();
    let days = plan_days(&goal, engine.subject().display_name());
    presenter.show_completion(&report, &days, &PlanProgress::new(config.trial_days));
    if args.answers_json {
        let output = WizardOutput {
            subject: engine.subject(),
            responses: engine.responses(),
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    }
    Ok(())
}

/// Prints what the engine has produced, then waits out each scheduled beat.
fn drive(engine: &mut FlowEngine, presenter: &mut WizardPresenter) {
    presenter.flush(engine.transcript());
    while let Some(wait) = engine.next_due() {
        if !wait.is_zero() {
            thread::sleep(wait);
        }
        engine.advance_by(wait);
        presenter.flush(engine.transcript());
    }
}

fn ask_step(
    step: &Step,
    presenter: &WizardPresenter,
    input: &mut impl BufRead,
) -> CliResult<Answer> {
    presenter.show_widget(step);
    loop {
        let mut parts = Vec::new();
        for field in fields(step) {
            let value = loop {
                presenter.show_field(&field);
                let raw = read_answer(input)?;
                match parse_field(step, &field, &raw) {
                    Ok(value) => break value,
                    Err(err) => presenter.show_parse_error(&err),
                }
            };
            parts.push((field.key.clone(), value));
        }
        match assemble(step, parts, &mut TerminalPermission) {
            Ok(answer) => return Ok(answer),
            Err(err) => presenter.show_parse_error(&err),
        }
    }
}

fn read_answer(input: &mut impl BufRead) -> CliResult<String> {
    print!("> ");
    io::stdout().flush()?;
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Err("input closed before the wizard finished".into());
    }
    let trimmed = line.trim();
    if trimmed.eq_ignore_ascii_case("exit") {
        return Err("wizard aborted by user".into());
    }
    Ok(trimmed.to_string())
}

fn run_score(answers: &Path, subject: Subject, as_json: bool) -> CliResult<()> {
    let raw = fs::read_to_string(answers)?;
    let value: Value = serde_json::from_str(&raw)?;
    let responses: Map<String, Value> = match value {
        Value::Object(map) => map,
        _ => return Err("answers file must contain a JSON object".into()),
    };
    if as_json {
        let subject_json = serde_json::to_string(&subject)?;
        let responses_json = Value::Object(responses).to_string();
        let output = component_output(&component::diagnose(&subject_json, &responses_json))?;
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }
    let report = DiagnosisReport::build(&subject, &ResponseMap::from(responses));
    println!("{}", report.narrative.headline);
    println!("{}", report.narrative.body);
    print!("{}", render_report(&report));
    Ok(())
}

fn run_plan(goal: &str, name: &str, config: Option<&Path>, as_json: bool) -> CliResult<()> {
    let config = ToffyConfig::load(config)?;
    if as_json {
        let subject_json = serde_json::to_string(&Subject::named(name))?;
        let config_json = serde_json::to_string(&config)?;
        let output = component_output(&component::plan(goal, &subject_json, &config_json))?;
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }
    let subject = Subject::named(name);
    let days = plan_days(goal, subject.display_name());
    print!("{}", render_plan(&days, &PlanProgress::new(config.trial_days)));
    Ok(())
}

fn run_describe(flow: Option<PathBuf>) -> CliResult<()> {
    let mut config = ToffyConfig::load(None)?;
    if flow.is_some() {
        config.flow_path = flow;
    }
    let config_json = serde_json::to_string(&config)?;
    let output = component_output(&component::describe_flow(&config_json))?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn run_validate(flow: Option<PathBuf>) -> CliResult<()> {
    let flow = load_flow(flow)?;
    let validation = validate_flow(&flow);
    if validation.valid {
        println!("Flow '{}' is valid ({} steps).", flow.id, flow.len());
        return Ok(());
    }
    for issue in &validation.issues {
        println!("- [{}] {}: {}", issue.code, issue.path, issue.message);
    }
    Err(format!("flow '{}' has {} issue(s)", flow.id, validation.issues.len()).into())
}

/// Unwraps a responder document, turning `{"error": ..}` into an error.
fn component_output(raw: &str) -> CliResult<Value> {
    let value: Value = serde_json::from_str(raw)?;
    if let Some(error) = value.get("error").and_then(Value::as_str) {
        return Err(error.to_string().into());
    }
    Ok(value)
}
