//! Everything downstream of the chat: diagnosis, the 7-day plan and the mock
//! backend the screens talk to.

pub mod backend;
pub mod catalog;
pub mod component;
pub mod config;
pub mod diagnosis;
pub mod plan;

pub use backend::{MockBackend, MockDelays, MockSession};
pub use catalog::{CatalogError, Problem, ProblemCatalog, ProblemQuestion};
pub use config::{ConfigError, ToffyConfig};
pub use diagnosis::{
    DiagnosisReport, MILESTONE_ROADMAP, Milestone, ScoreCard, escalation_warning, mirror_summary,
};
pub use plan::{
    DayAction, DayState, GENERATION_STEPS, PlanDay, PlanProgress, PlanTotals, generation_steps,
    plan_days,
};
