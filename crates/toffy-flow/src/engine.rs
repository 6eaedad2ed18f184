//! The onboarding flow engine.
//!
//! [`FlowEngine`] walks an [`OnboardingFlow`] once, records every completion
//! into a [`ResponseMap`] and writes the chat transcript. All pacing goes
//! through a virtual [`Timeline`], so presenters decide how real time maps
//! onto it: the CLI sleeps between [`FlowEngine::advance_by`] calls, tests
//! simply call [`FlowEngine::run_until_idle`].

use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

use crate::derive::{DerivationInput, lookup_key};
use crate::handlers::{HandlerRegistry, SubmitError};
use crate::responses::ResponseMap;
use crate::scoring::{GOAL_STEP, compute_scores, narrative};
use crate::definition::rule::ThinkingSource;
use crate::definition::{OnboardingFlow, Step, StepType};
use crate::subject::Subject;
use crate::template::{TemplateEngine, substitute_name};
use crate::timeline::{Scheduled, Timeline};
use crate::transcript::{Message, ThinkingStatus};

/// Echo appended on the user's behalf when the flow reaches its end.
pub const CLOSING_ECHO: &str = "Let's see my plan!";

const MAX_THINKING_LINES: usize = 4;

/// Delays between the chat beats.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pacing {
    pub typing: Duration,
    pub acknowledgement: Duration,
    pub credential: Duration,
    pub credential_after_ack: Duration,
    /// Extra wait added to the next beat when an acknowledgement was shown.
    pub ack_hold: Duration,
    pub thinking: Duration,
    pub advance: Duration,
    pub next_step: Duration,
    pub closing: Duration,
    pub closing_after_thinking: Duration,
    pub terminal: Duration,
    pub thinking_line: Duration,
    pub thinking_settle: Duration,
}

impl Default for Pacing {
    fn default() -> Self {
        let ms = Duration::from_millis;
        Self {
            typing: ms(800),
            acknowledgement: ms(400),
            credential: ms(400),
            credential_after_ack: ms(1000),
            ack_hold: ms(800),
            thinking: ms(1000),
            advance: ms(600),
            next_step: ms(400),
            closing: ms(600),
            closing_after_thinking: ms(500),
            terminal: ms(1000),
            thinking_line: ms(1200),
            thinking_settle: ms(800),
        }
    }
}

impl Pacing {
    /// Every delay zero; beats still happen in the same order.
    pub fn instant() -> Self {
        Self::scaled(0.0)
    }

    /// Default pacing multiplied by `factor`. Negative factors count as zero;
    /// delays too long to represent saturate at `Duration::MAX`.
    pub fn scaled(factor: f64) -> Self {
        let base = Self::default();
        let factor = factor.max(0.0);
        let scale = |delay: Duration| {
            Duration::try_from_secs_f64(delay.as_secs_f64() * factor).unwrap_or(Duration::MAX)
        };
        Self {
            typing: scale(base.typing),
            acknowledgement: scale(base.acknowledgement),
            credential: scale(base.credential),
            credential_after_ack: scale(base.credential_after_ack),
            ack_hold: scale(base.ack_hold),
            thinking: scale(base.thinking),
            advance: scale(base.advance),
            next_step: scale(base.next_step),
            closing: scale(base.closing),
            closing_after_thinking: scale(base.closing_after_thinking),
            terminal: scale(base.terminal),
            thinking_line: scale(base.thinking_line),
            thinking_settle: scale(base.thinking_settle),
        }
    }

    /// How long a presenter should play an interstitial of `lines` lines
    /// before reporting it complete.
    pub fn thinking_playback(&self, lines: usize) -> Duration {
        let lines = u32::try_from(lines).unwrap_or(u32::MAX);
        self.thinking_line
            .saturating_mul(lines)
            .saturating_add(self.thinking_settle)
    }
}

/// Where the engine is. Indices point into the flow's step list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Cancelled; nothing further happens.
    Idle,
    /// Typing indicator shown; the step's widget is not on screen yet.
    Presenting(usize),
    AwaitingCompletion(usize),
    Acknowledging(usize),
    /// Waiting for the presenter to finish the thinking interstitial.
    Thinking(usize),
    Advancing(usize),
    Terminal,
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineState::Idle => f.write_str("idle"),
            EngineState::Presenting(index) => write!(f, "presenting #{index}"),
            EngineState::AwaitingCompletion(index) => write!(f, "awaiting #{index}"),
            EngineState::Acknowledging(index) => write!(f, "acknowledging #{index}"),
            EngineState::Thinking(index) => write!(f, "thinking #{index}"),
            EngineState::Advancing(index) => write!(f, "advancing #{index}"),
            EngineState::Terminal => f.write_str("terminal"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IgnoreReason {
    Idle,
    Terminal,
    /// The id names a step other than the one on screen.
    StaleStep { expected: String, received: String },
    AlreadyCompleted(String),
    /// The step has not been presented yet.
    NotPresented(String),
}

impl fmt::Display for IgnoreReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IgnoreReason::Idle => f.write_str("engine was cancelled"),
            IgnoreReason::Terminal => f.write_str("flow already finished"),
            IgnoreReason::StaleStep { expected, received } => {
                write!(f, "expected step '{expected}', got '{received}'")
            }
            IgnoreReason::AlreadyCompleted(step) => write!(f, "step '{step}' already completed"),
            IgnoreReason::NotPresented(step) => write!(f, "step '{step}' not presented yet"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Accepted,
    Ignored(IgnoreReason),
}

impl StepOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, StepOutcome::Accepted)
    }
}

/// Sources of the follow-up text, tried in order until one yields text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckStrategy {
    Map,
    Dynamic,
    Static,
}

impl AckStrategy {
    pub const ORDER: [AckStrategy; 3] = [AckStrategy::Map, AckStrategy::Dynamic, AckStrategy::Static];

    pub fn resolve(
        &self,
        step: &Step,
        value: &Value,
        summary: Option<&str>,
        templates: &TemplateEngine,
    ) -> Option<String> {
        let text = match self {
            AckStrategy::Map => {
                lookup_key(value).and_then(|key| step.acknowledgement_map.get(&key).cloned())
            }
            AckStrategy::Dynamic => step.dynamic_acknowledgement.as_ref().and_then(|rule| {
                rule.evaluate(templates, &DerivationInput::new(value).with_summary(summary))
                    .unwrap_or_else(|err| {
                        warn!(step = %step.id, error = %err, "acknowledgement rule failed");
                        None
                    })
            }),
            AckStrategy::Static => step.acknowledgement.clone(),
        };
        text.filter(|text| !text.trim().is_empty())
    }
}

/// First acknowledgement the strategies produce, with the strategy that won.
pub fn resolve_acknowledgement(
    step: &Step,
    value: &Value,
    summary: Option<&str>,
    templates: &TemplateEngine,
) -> Option<(AckStrategy, String)> {
    AckStrategy::ORDER.iter().find_map(|strategy| {
        strategy
            .resolve(step, value, summary, templates)
            .map(|text| (*strategy, text))
    })
}

#[derive(Debug, Clone, PartialEq)]
enum Action {
    ShowStep(usize),
    Acknowledge(String),
    Credential(String),
    StartThinking {
        index: usize,
        lines: Vec<ThinkingStatus>,
    },
    Advance(usize),
    BeginTyping(usize),
    ClosingEcho,
    Finish,
}

type TerminalHandler = Box<dyn FnMut(&ResponseMap)>;

pub struct FlowEngine {
    flow: OnboardingFlow,
    subject: Subject,
    pacing: Pacing,
    templates: TemplateEngine,
    responses: ResponseMap,
    transcript: Vec<Message>,
    pointer: usize,
    state: EngineState,
    completed: BTreeSet<usize>,
    generation: u64,
    thinking_count: usize,
    selected_goal: Option<String>,
    timeline: Timeline<Action>,
    on_terminal: Option<TerminalHandler>,
    terminal_reported: bool,
}

impl fmt::Debug for FlowEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlowEngine")
            .field("flow", &self.flow.id)
            .field("state", &self.state)
            .field("pointer", &self.pointer)
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

impl FlowEngine {
    /// Starts presenting the first step. An empty flow is terminal at once.
    pub fn new(flow: OnboardingFlow, subject: Subject, pacing: Pacing) -> Self {
        let mut engine = Self {
            flow,
            subject,
            pacing,
            templates: TemplateEngine::new(),
            responses: ResponseMap::new(),
            transcript: Vec::new(),
            pointer: 0,
            state: EngineState::Idle,
            completed: BTreeSet::new(),
            generation: 0,
            thinking_count: 0,
            selected_goal: None,
            timeline: Timeline::new(),
            on_terminal: None,
            terminal_reported: false,
        };
        match engine.flow.step(0).map(Step::step_type) {
            None => engine.state = EngineState::Terminal,
            Some(StepType::Complete) => engine.enter_terminal(),
            Some(_) => engine.begin_typing(0),
        }
        engine
    }

    /// Registers the callback receiving the final responses. If the flow
    /// already finished, it runs immediately.
    pub fn on_terminal(&mut self, handler: impl FnMut(&ResponseMap) + 'static) {
        self.on_terminal = Some(Box::new(handler));
        if self.state == EngineState::Terminal {
            self.report_terminal();
        }
    }

    pub fn flow(&self) -> &OnboardingFlow {
        &self.flow
    }

    pub fn subject(&self) -> &Subject {
        &self.subject
    }

    pub fn pacing(&self) -> &Pacing {
        &self.pacing
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn responses(&self) -> &ResponseMap {
        &self.responses
    }

    pub fn transcript(&self) -> &[Message] {
        &self.transcript
    }

    pub fn pointer(&self) -> usize {
        self.pointer
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn thinking_count(&self) -> usize {
        self.thinking_count
    }

    pub fn selected_goal(&self) -> Option<&str> {
        self.selected_goal.as_deref()
    }

    pub fn is_terminal(&self) -> bool {
        self.state == EngineState::Terminal
    }

    /// The step whose widget is on screen, if any.
    pub fn awaiting_step(&self) -> Option<&Step> {
        match self.state {
            EngineState::AwaitingCompletion(index) => self.flow.step(index),
            _ => None,
        }
    }

    /// Time until the next scheduled beat; `None` when the engine waits on input.
    pub fn next_due(&self) -> Option<Duration> {
        self.timeline.next_due()
    }

    pub fn elapsed(&self) -> Duration {
        self.timeline.now()
    }

    /// Appends a free-form bot note, e.g. the escalation warning.
    pub fn push_consequence(&mut self, text: impl Into<String>) {
        let text = substitute_name(&text.into(), &self.subject);
        self.transcript.push(Message::Consequence { text });
    }

    /// Validates `value` with the registered handler, builds the echo text and
    /// completes the step.
    pub fn submit(
        &mut self,
        registry: &HandlerRegistry,
        step_id: &str,
        value: Value,
        label: Option<&str>,
    ) -> Result<StepOutcome, SubmitError> {
        let Some(step) = self.flow.find(step_id) else {
            return Ok(StepOutcome::Ignored(IgnoreReason::StaleStep {
                expected: self.current_step_id(),
                received: step_id.to_string(),
            }));
        };
        registry.can_submit(step, &value)?;
        let display = registry.display_text(step, &value, label, &self.subject);
        Ok(self.complete_step(step_id, value, Some(&display)))
    }

    /// Records a completion for the step on screen and schedules what follows.
    pub fn complete_step(
        &mut self,
        step_id: &str,
        value: Value,
        display_text: Option<&str>,
    ) -> StepOutcome {
        let index = match self.check_completion(step_id) {
            Ok(index) => index,
            Err(reason) => {
                debug!(step = step_id, %reason, "completion ignored");
                return StepOutcome::Ignored(reason);
            }
        };
        let Some(step) = self.flow.step(index).cloned() else {
            return StepOutcome::Ignored(IgnoreReason::Terminal);
        };

        if self.state == EngineState::Presenting(index) {
            // Widget answered before the typing indicator finished.
            self.timeline.cancel_all();
            self.show_step(index);
        }
        self.generation += 1;
        self.completed.insert(index);

        self.responses.record(&step.id, value.clone());
        if step.id == GOAL_STEP {
            self.selected_goal = lookup_key(&value);
        }

        let echo = display_text
            .filter(|text| !text.is_empty())
            .map(|text| substitute_name(text, &self.subject));
        if let Some(text) = &echo {
            self.transcript.push(Message::UserEcho { text: text.clone() });
        }

        let acknowledgement =
            resolve_acknowledgement(&step, &value, echo.as_deref(), &self.templates);
        let hold = if acknowledgement.is_some() {
            self.pacing.ack_hold
        } else {
            Duration::ZERO
        };
        if let Some((strategy, text)) = &acknowledgement {
            debug!(step = %step.id, ?strategy, "acknowledgement resolved");
            let text = substitute_name(text, &self.subject);
            self.schedule(self.pacing.acknowledgement, Action::Acknowledge(text));
        }
        if let Some(credential) = &step.credential {
            let delay = if acknowledgement.is_some() {
                self.pacing.credential_after_ack
            } else {
                self.pacing.credential
            };
            let text = substitute_name(credential, &self.subject);
            self.schedule(delay, Action::Credential(text));
        }

        if step.triggers_thinking() {
            self.thinking_count += 1;
            let lines = self.synthesize_thinking(&step, &value, echo.as_deref());
            self.schedule(
                self.pacing.thinking + hold,
                Action::StartThinking { index, lines },
            );
        } else {
            self.schedule(self.pacing.advance + hold, Action::Advance(index));
        }

        self.state = EngineState::Acknowledging(index);
        debug!(step = %step.id, index, generation = self.generation, "step completed");
        StepOutcome::Accepted
    }

    /// Called by the presenter once the thinking interstitial has played.
    /// Returns false when no interstitial was running.
    pub fn thinking_complete(&mut self) -> bool {
        let EngineState::Thinking(index) = self.state else {
            return false;
        };
        self.proceed(index, true);
        true
    }

    /// Moves the virtual clock forward, running every beat that falls due,
    /// including beats scheduled by earlier beats within the same window.
    pub fn advance_by(&mut self, by: Duration) {
        let target = self.timeline.now() + by;
        while let Some(wait) = self.timeline.next_due() {
            if self.timeline.now() + wait > target {
                break;
            }
            if let Some(scheduled) = self.timeline.pop_next() {
                self.dispatch(scheduled);
            }
        }
        let rest = target.saturating_sub(self.timeline.now());
        for scheduled in self.timeline.advance(rest) {
            self.dispatch(scheduled);
        }
    }

    /// Runs beats until the engine waits for input, thinking or is done.
    pub fn run_until_idle(&mut self) {
        while let Some(scheduled) = self.timeline.pop_next() {
            self.dispatch(scheduled);
        }
    }

    /// Drops every pending beat; nothing scheduled so far will run.
    pub fn cancel(&mut self) {
        self.generation += 1;
        let dropped = self.timeline.cancel_all();
        debug!(dropped, generation = self.generation, "engine cancelled");
        self.state = EngineState::Idle;
    }

    fn current_step_id(&self) -> String {
        self.flow
            .step(self.pointer)
            .map(|step| step.id.clone())
            .unwrap_or_default()
    }

    fn check_completion(&self, step_id: &str) -> Result<usize, IgnoreReason> {
        let index = match self.state {
            EngineState::Idle => return Err(IgnoreReason::Idle),
            EngineState::Terminal => return Err(IgnoreReason::Terminal),
            EngineState::Presenting(index)
            | EngineState::AwaitingCompletion(index)
            | EngineState::Acknowledging(index)
            | EngineState::Thinking(index)
            | EngineState::Advancing(index) => index,
        };
        let current = self.flow.step(index).map(|step| step.id.as_str());
        if current != Some(step_id) {
            return Err(IgnoreReason::StaleStep {
                expected: current.unwrap_or_default().to_string(),
                received: step_id.to_string(),
            });
        }
        if self.completed.contains(&index) {
            return Err(IgnoreReason::AlreadyCompleted(step_id.to_string()));
        }
        if matches!(self.state, EngineState::Advancing(_)) {
            return Err(IgnoreReason::NotPresented(step_id.to_string()));
        }
        Ok(index)
    }

    fn schedule(&mut self, delay: Duration, action: Action) {
        self.timeline.schedule(delay, self.generation, action);
    }

    fn dispatch(&mut self, scheduled: Scheduled<Action>) {
        if scheduled.generation != self.generation {
            debug!(
                stale = scheduled.generation,
                current = self.generation,
                "dropping superseded beat"
            );
            return;
        }
        match scheduled.action {
            Action::ShowStep(index) => self.show_step(index),
            Action::Acknowledge(text) => self.transcript.push(Message::Acknowledgement { text }),
            Action::Credential(text) => self.transcript.push(Message::Credential { text }),
            Action::StartThinking { index, lines } => {
                let step_id = self
                    .flow
                    .step(index)
                    .map(|step| step.id.clone())
                    .unwrap_or_default();
                self.transcript.push(Message::Thinking { step_id, lines });
                self.state = EngineState::Thinking(index);
            }
            Action::Advance(index) => self.proceed(index, false),
            Action::BeginTyping(index) => self.begin_typing(index),
            Action::ClosingEcho => {
                self.transcript.push(Message::UserEcho {
                    text: CLOSING_ECHO.to_string(),
                });
                self.schedule(self.pacing.terminal, Action::Finish);
            }
            Action::Finish => self.enter_terminal(),
        }
    }

    fn begin_typing(&mut self, index: usize) {
        self.state = EngineState::Presenting(index);
        self.schedule(self.pacing.typing, Action::ShowStep(index));
    }

    fn show_step(&mut self, index: usize) {
        let Some(step) = self.flow.step(index) else {
            return;
        };
        let prompt = substitute_name(step.prompt(), &self.subject);
        self.transcript.push(Message::BotStep {
            step_id: step.id.clone(),
            index,
            prompt,
        });
        self.state = EngineState::AwaitingCompletion(index);
        debug!(step = %step.id, index, "step presented");
    }

    fn proceed(&mut self, from: usize, after_thinking: bool) {
        let next = from + 1;
        self.pointer = self.pointer.max(next);
        match self.flow.step(next).map(Step::step_type) {
            None => self.enter_terminal(),
            Some(StepType::Complete) => {
                let delay = if after_thinking {
                    self.pacing.closing_after_thinking
                } else {
                    self.pacing.closing
                };
                self.state = EngineState::Advancing(next);
                self.schedule(delay, Action::ClosingEcho);
            }
            Some(_) => {
                self.state = EngineState::Advancing(next);
                self.schedule(self.pacing.next_step, Action::BeginTyping(next));
            }
        }
    }

    fn enter_terminal(&mut self) {
        self.state = EngineState::Terminal;
        let scores = compute_scores(&self.responses);
        let story = narrative(
            &self.subject.heading_name(),
            &scores,
            self.selected_goal.as_deref(),
            &self.responses,
        );
        self.transcript.push(Message::Diagnosis {
            headline: story.headline,
            body: story.body,
        });
        debug!(responses = self.responses.len(), "flow finished");
        self.report_terminal();
    }

    fn report_terminal(&mut self) {
        if self.terminal_reported {
            return;
        }
        if let Some(handler) = self.on_terminal.as_mut() {
            handler(&self.responses);
            self.terminal_reported = true;
        }
    }

    fn synthesize_thinking(
        &self,
        step: &Step,
        value: &Value,
        summary: Option<&str>,
    ) -> Vec<ThinkingStatus> {
        let mut lines = Vec::new();
        for line in step.thinking.iter().take(MAX_THINKING_LINES) {
            let source = match &line.source {
                ThinkingSource::Value => value,
                ThinkingSource::Response { step } => {
                    self.responses.get(step).unwrap_or(&Value::Null)
                }
            };
            let input = DerivationInput::new(source).with_summary(summary);
            match line.text.evaluate(&self.templates, &input) {
                Ok(Some(text)) => lines.push((line.icon.clone(), text)),
                Ok(None) => {}
                Err(err) => warn!(step = %step.id, error = %err, "thinking line failed"),
            }
        }
        if lines.is_empty() {
            lines = vec![
                ("cpu".to_string(), "Processing your responses.".to_string()),
                ("sparkles".to_string(), "Mapping next best actions.".to_string()),
            ];
        }
        lines
            .into_iter()
            .enumerate()
            .map(|(position, (icon, text))| ThinkingStatus {
                id: format!("{}-{}-{}", step.id, self.thinking_count, position + 1),
                label: substitute_name(&text, &self.subject),
                icon,
            })
            .collect()
    }
}
