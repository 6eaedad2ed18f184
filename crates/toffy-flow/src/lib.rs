#![allow(missing_docs)]

pub mod definition;
pub mod derive;
pub mod engine;
pub mod handlers;
pub mod responses;
pub mod schema;
pub mod scoring;
pub mod subject;
pub mod template;
pub mod timeline;
pub mod transcript;
pub mod validate;

pub use definition::{
    Derivation, FlowError, Measure, OnboardingFlow, Signal, Step, StepKind, StepType,
};
pub use derive::DerivationInput;
pub use engine::{EngineState, FlowEngine, IgnoreReason, Pacing, StepOutcome};
pub use handlers::{
    HandlerRegistry, NotificationPermission, PermissionError, StepHandler, SubmitError,
};
pub use responses::ResponseMap;
pub use schema::flow_schema;
pub use scoring::{
    Band, CategoryScores, Narrative, NarrativeKind, WeakArea, boundaries_score, compute_scores,
    essentials_score, leadership_score, narrative, reactivity_score,
};
pub use subject::Subject;
pub use template::{TemplateEngine, TemplateError, format_list, substitute_name};
pub use timeline::Timeline;
pub use transcript::{Message, ThinkingStatus};
pub use validate::{FlowIssue, FlowValidation, validate_flow};
