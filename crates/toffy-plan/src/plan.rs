//! The 7-day plan and its trial gating.

use serde::Serialize;

use toffy_flow::{Subject, substitute_name};

/// Days open without a subscription.
pub const DEFAULT_TRIAL_DAYS: u8 = 3;

/// Status lines shown while the plan is "generated".
pub const GENERATION_STEPS: [&str; 5] = [
    "Analyzing {dogName}'s profile",
    "Calculating leadership & boundaries scores",
    "Evaluating daily essentials",
    "Matching with expert techniques",
    "Building your custom plan",
];

pub fn generation_steps(subject: &Subject) -> Vec<String> {
    GENERATION_STEPS
        .iter()
        .map(|label| substitute_name(label, subject))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanDay {
    pub day: u8,
    pub title: String,
    pub description: String,
    pub lessons: u32,
    pub minutes: u32,
}

impl PlanDay {
    fn new(day: u8, title: &str, description: &str, lessons: u32, minutes: u32) -> Self {
        Self {
            day,
            title: title.to_string(),
            description: description.to_string(),
            lessons,
            minutes,
        }
    }

    pub fn duration_label(&self) -> String {
        format!("{} min", self.minutes)
    }
}

/// The week for a problem. Only potty training has its own plan so far.
pub fn plan_days(problem: &str, name: &str) -> Vec<PlanDay> {
    match problem {
        "potty" => vec![
            PlanDay::new(
                1,
                "Foundation",
                "Establish a consistent schedule and identify patterns",
                3,
                15,
            ),
            PlanDay::new(
                2,
                "Signal Training",
                &format!("Teach {name} to communicate their needs"),
                2,
                10,
            ),
            PlanDay::new(
                3,
                "Routine Building",
                "Reinforce good habits with positive association",
                3,
                12,
            ),
            PlanDay::new(4, "Handling Accidents", "What to do when mistakes happen", 2, 8),
            PlanDay::new(
                5,
                "Extending Duration",
                "Gradually increase time between breaks",
                2,
                10,
            ),
            PlanDay::new(
                6,
                "Independence",
                "Building reliable habits without constant supervision",
                2,
                10,
            ),
            PlanDay::new(7, "Maintenance", "Long-term success strategies", 2, 8),
        ],
        _ => vec![
            PlanDay::new(1, "Getting Started", "Foundation exercises", 3, 15),
            PlanDay::new(2, "Building Skills", "Core technique practice", 3, 12),
            PlanDay::new(3, "Consistency", "Reinforcement and repetition", 2, 10),
            PlanDay::new(4, "Challenges", "Handling setbacks", 2, 10),
            PlanDay::new(5, "Progress", "Advancing to next level", 3, 12),
            PlanDay::new(6, "Real World", "Applying skills in daily life", 2, 10),
            PlanDay::new(7, "Mastery", "Long-term success plan", 2, 8),
        ],
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct PlanTotals {
    pub lessons: u32,
    pub minutes: u32,
}

impl PlanTotals {
    pub fn of(days: &[PlanDay]) -> Self {
        days.iter().fold(Self::default(), |totals, day| Self {
            lessons: totals.lessons + day.lessons,
            minutes: totals.minutes + day.minutes,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "day", rename_all = "snake_case")]
pub enum DayState {
    /// Trial day that can be started.
    Available,
    /// Trial day waiting on the previous one.
    LockedUntil(u8),
    /// Past the trial, offering the subscription.
    Paywalled,
    /// Past the trial while the trial itself is unfinished.
    Locked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DayAction {
    Started,
    PaywallShown,
    Ignored,
}

/// Which days are open. `unlocked_day` only moves forward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanProgress {
    trial_days: u8,
    unlocked_day: u8,
    paywall_open: bool,
}

impl Default for PlanProgress {
    fn default() -> Self {
        Self::new(DEFAULT_TRIAL_DAYS)
    }
}

impl PlanProgress {
    pub fn new(trial_days: u8) -> Self {
        Self {
            trial_days,
            unlocked_day: 1,
            paywall_open: false,
        }
    }

    pub fn trial_days(&self) -> u8 {
        self.trial_days
    }

    pub fn unlocked_day(&self) -> u8 {
        self.unlocked_day
    }

    pub fn paywall_open(&self) -> bool {
        self.paywall_open
    }

    fn is_trial_day(&self, day: u8) -> bool {
        day <= self.trial_days
    }

    fn trial_finished(&self) -> bool {
        self.unlocked_day > self.trial_days
    }

    pub fn day_state(&self, day: u8) -> DayState {
        let unlocked = day <= self.unlocked_day;
        match (self.is_trial_day(day), unlocked) {
            (true, true) => DayState::Available,
            (true, false) => DayState::LockedUntil(day.saturating_sub(1)),
            (false, _) if self.trial_finished() => DayState::Paywalled,
            (false, _) => DayState::Locked,
        }
    }

    /// Starting trial day `n` opens day `n + 1`. Days past the trial open the
    /// paywall once the whole trial has been started.
    pub fn start_day(&mut self, day: u8) -> DayAction {
        if self.is_trial_day(day) {
            if day > self.unlocked_day {
                return DayAction::Ignored;
            }
            self.unlocked_day = self.unlocked_day.max(day.saturating_add(1));
            return DayAction::Started;
        }
        if self.trial_finished() {
            self.paywall_open = true;
            return DayAction::PaywallShown;
        }
        DayAction::Ignored
    }

    pub fn close_paywall(&mut self) {
        self.paywall_open = false;
    }
}
