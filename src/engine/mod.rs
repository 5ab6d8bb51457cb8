//! Process engine: generation, advancement and progress

pub mod controller;
pub mod criteria;
pub mod events;
pub mod generator;
pub mod progress;

pub use controller::{current_activity, Controller, SKIP_REASON_KEY};
pub use criteria::{AlwaysMet, CriteriaEvaluator};
pub use events::{ProcessEvent, Transition};
pub use generator::{
    instantiate, CollectionFailure, CollectionOutcome, GenerateRequest, Generator,
};
pub use progress::{overall_progress, phase_progress, progress_report, PhaseProgress, ProgressReport};
