// Lifecycle Engine - process state machines for regulated engineering lifecycles
// Generates per-item process trees from standard templates and advances them
// one activity at a time, persisting each step with optimistic concurrency.

pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod models;
pub mod state;
pub mod templates;

pub use anyhow::{Context, Result};

// Re-export commonly used types
pub use config::EngineConfig;
pub use engine::{
    AlwaysMet, Controller, CriteriaEvaluator, GenerateRequest, Generator, ProcessEvent, Transition,
};
pub use error::{CriteriaGate, EngineError, EngineResult};
pub use models::{
    ActivityInstance, ActivityStatus, AssuranceLevel, CiCategory, DataMap, PhaseInstance,
    PhaseStatus, ProcessTemplate, StateTree,
};
pub use state::{
    from_snapshot, to_snapshot, FileStore, MemoryStore, ProcessSession, Snapshot, SnapshotStore,
};
pub use templates::TemplateRepository;
