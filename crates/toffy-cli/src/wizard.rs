use std::fmt::Write;
use std::thread;
use std::time::Duration;

use toffy_flow::definition::StepKind;
use toffy_flow::{Message, Step, SubmitError};
use toffy_plan::{DayState, DiagnosisReport, PlanDay, PlanProgress, PlanTotals};

use crate::answer::{AnswerParseError, Field};

/// Controls which bits of state the wizard prints.
#[derive(Copy, Clone, Eq, PartialEq)]
pub enum Verbosity {
    /// Chat bubbles and prompts only.
    Clean,
    /// Adds step ids, option values and error details.
    Verbose,
}

impl Verbosity {
    pub fn from_verbose(verbose: bool) -> Self {
        if verbose {
            Verbosity::Verbose
        } else {
            Verbosity::Clean
        }
    }

    pub fn is_verbose(&self) -> bool {
        matches!(self, Verbosity::Verbose)
    }
}

/// Prints the transcript as the engine grows it and the widgets for the step
/// awaiting an answer.
pub struct WizardPresenter {
    verbosity: Verbosity,
    header_printed: bool,
    printed: usize,
    thinking_line: Duration,
}

impl WizardPresenter {
    pub fn new(verbosity: Verbosity, thinking_line: Duration) -> Self {
        Self {
            verbosity,
            header_printed: false,
            printed: 0,
            thinking_line,
        }
    }

    pub fn show_header(&mut self, title: &str, steps: usize) {
        if self.header_printed {
            return;
        }
        println!("{title}");
        if self.verbosity.is_verbose() {
            println!("Steps: {steps} (type 'exit' to quit)");
        }
        self.header_printed = true;
    }

    /// Prints messages appended since the last call.
    pub fn flush(&mut self, transcript: &[Message]) {
        for message in transcript.iter().skip(self.printed) {
            self.show_message(message);
        }
        self.printed = self.printed.max(transcript.len());
    }

    fn show_message(&self, message: &Message) {
        match message {
            Message::BotStep { step_id, prompt, .. } => {
                if self.verbosity.is_verbose() {
                    println!("\nToffy [{step_id}]: {prompt}");
                } else {
                    println!("\nToffy: {prompt}");
                }
            }
            Message::UserEcho { text } => println!("You: {text}"),
            Message::Acknowledgement { text } => println!("Toffy: {text}"),
            Message::Credential { text } => println!("  💡 {text}"),
            Message::Thinking { lines, .. } => {
                for line in lines {
                    println!("  {} {}", line.icon, line.label);
                    if !self.thinking_line.is_zero() {
                        thread::sleep(self.thinking_line);
                    }
                }
            }
            Message::Diagnosis { headline, body } => {
                println!("\n{headline}");
                println!("{body}");
            }
            Message::Consequence { text } => println!("Toffy: {text}"),
        }
    }

    /// Shows the widget the user answers with.
    pub fn show_widget(&self, step: &Step) {
        for line in widget_lines(step, self.verbosity) {
            println!("{line}");
        }
    }

    pub fn show_field(&self, field: &Field) {
        let mut line = String::new();
        if !field.prompt.is_empty() {
            line.push_str(&field.prompt);
            line.push(' ');
        }
        line.push_str(&field.hint);
        if let Some(default) = &field.default {
            let _ = write!(line, " [{default}]");
        }
        println!("{line}");
    }

    pub fn show_parse_error(&self, error: &AnswerParseError) {
        eprintln!("Invalid answer: {}", error.user_message);
        if self.verbosity.is_verbose()
            && let Some(debug) = &error.debug_message
        {
            eprintln!("  Expected: {}", debug);
        }
    }

    pub fn show_submit_error(&self, error: &SubmitError) {
        eprintln!("Answer rejected: {error}");
    }

    pub fn show_completion(&self, report: &DiagnosisReport, plan: &[PlanDay], progress: &PlanProgress) {
        println!("\nDone ✅");
        print!("{}", render_report(report));
        print!("{}", render_plan(plan, progress));
    }
}

fn widget_lines(step: &Step, verbosity: Verbosity) -> Vec<String> {
    let mut lines = Vec::new();
    match &step.kind {
        StepKind::Grid(grid) => {
            for (position, option) in grid.options.iter().enumerate() {
                let mut line = format!("  {}.", position + 1);
                if let Some(emoji) = &option.emoji {
                    let _ = write!(line, " {emoji}");
                }
                let _ = write!(line, " {}", option.label);
                if let Some(sublabel) = &option.sublabel {
                    let _ = write!(line, " ({sublabel})");
                }
                if verbosity.is_verbose() {
                    let _ = write!(line, " = {}", option.value);
                }
                lines.push(line);
            }
        }
        StepKind::Chips(chips) => {
            for (position, option) in chips.options.iter().enumerate() {
                let mut line = format!("  {}. {}", position + 1, option.label);
                if verbosity.is_verbose() {
                    let _ = write!(line, " = {}", option.value);
                }
                lines.push(line);
            }
        }
        StepKind::Matrix(matrix) if verbosity.is_verbose() => {
            for item in &matrix.items {
                if let Some(sublabel) = &item.sublabel {
                    lines.push(format!("  {}: {sublabel}", item.label));
                }
            }
        }
        _ => {}
    }
    lines
}

fn day_marker(state: DayState) -> String {
    match state {
        DayState::Available => "open".to_string(),
        DayState::LockedUntil(day) => format!("locked until day {day} is started"),
        DayState::Paywalled => "subscribe to unlock".to_string(),
        DayState::Locked => "locked".to_string(),
    }
}

/// Score cards, mirror bullets, the escalation note and the roadmap.
pub fn render_report(report: &DiagnosisReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "\n{}'s profile", report.name);
    for card in &report.cards {
        let suffix = if card.inverted { " (lower is better)" } else { "" };
        let _ = writeln!(
            out,
            "  {} {:<12} {:>3}  {}{suffix}",
            card.icon, card.label, card.score, card.band
        );
    }
    if !report.has_sensitivity_data {
        let _ = writeln!(out, "  (no sensitivity ratings given)");
    }
    if !report.mirror.is_empty() {
        let _ = writeln!(out, "\nHere's what you told us:");
        for bullet in &report.mirror {
            let _ = writeln!(out, "  • {bullet}");
        }
    }
    let _ = writeln!(out, "\n⚠️  {}", report.escalation);
    let _ = writeln!(out, "\nRoadmap:");
    for milestone in &report.roadmap {
        let _ = writeln!(
            out,
            "  Week {}: {} - {}",
            milestone.week, milestone.title, milestone.description
        );
    }
    out
}

/// Plan days with their gating state and the totals line.
pub fn render_plan(days: &[PlanDay], progress: &PlanProgress) -> String {
    let mut out = String::new();
    let totals = PlanTotals::of(days);
    let _ = writeln!(
        out,
        "\nYour {}-day plan ({} lessons, {} min, {} free days):",
        days.len(),
        totals.lessons,
        totals.minutes,
        progress.trial_days()
    );
    for day in days {
        let _ = writeln!(
            out,
            "  Day {}: {} [{}] ({})",
            day.day,
            day.title,
            day.duration_label(),
            day_marker(progress.day_state(day.day))
        );
        let _ = writeln!(out, "         {}", day.description);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use toffy_flow::{OnboardingFlow, ResponseMap, Subject};
    use toffy_plan::plan_days;

    #[test]
    fn plan_rendering_marks_gated_days() {
        let days = plan_days("potty", "Buddy");
        let rendered = render_plan(&days, &PlanProgress::new(3));
        assert!(rendered.contains("16 lessons, 73 min, 3 free days"));
        assert!(rendered.contains("Day 1: "));
        assert!(rendered.contains("locked until day 1 is started"));
        assert!(rendered.contains("(locked)"));
    }

    #[test]
    fn report_rendering_lists_every_card() {
        let report = DiagnosisReport::build(&Subject::named("Buddy"), &ResponseMap::new());
        let rendered = render_report(&report);
        assert!(rendered.contains("Buddy's profile"));
        assert_eq!(rendered.matches("  👑").count(), 1);
        assert!(rendered.contains("(no sensitivity ratings given)"));
        assert!(rendered.contains("Week 1:"));
    }

    #[test]
    fn grid_widget_numbers_options() {
        let flow = OnboardingFlow::builtin().unwrap();
        let living = flow.find("living").unwrap();
        let lines = widget_lines(living, Verbosity::Verbose);
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("  1. 🏠 House"));
        assert!(lines[0].ends_with("= house_yard"));
    }
}
