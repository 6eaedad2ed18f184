pub mod flow;
pub mod rule;
pub mod step;

pub use flow::{FlowError, OnboardingFlow};
pub use rule::{Bracket, Derivation, ListStyle, Measure, Signal, ThinkingLine, ThinkingSource};
pub use step::{
    ChipOption, ChipsStep, CompleteStep, GridOption, GridStep, IntroStep, MatrixItem, MatrixStep,
    NotificationStep, SliderStep, SpeedRoundStep, Step, StepKind, StepType, SubQuestion,
};
