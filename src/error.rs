//! Engine error taxonomy
//!
//! Every engine operation reports failure through [`EngineError`]. Two helper
//! predicates tell callers what to do next:
//! - [`EngineError::is_retryable`] - reload the snapshot and re-apply
//! - [`EngineError::records_state`] - the tree was still changed and must be persisted

use crate::models::CiCategory;

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Which phase gate rejected a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CriteriaGate {
    Entry,
    Exit,
}

impl std::fmt::Display for CriteriaGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CriteriaGate::Entry => write!(f, "entry"),
            CriteriaGate::Exit => write!(f, "exit"),
        }
    }
}

/// Errors that can occur while generating, advancing or persisting a process
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Template not found: {0}")]
    TemplateNotFound(String),

    #[error("No template mapped for category {0}")]
    NoTemplateForCategory(CiCategory),

    #[error("Invalid template '{template_id}': {reason}")]
    TemplateInvalid { template_id: String, reason: String },

    #[error("Activity '{requested}' is not current (current: {current})")]
    ActivityMismatch { requested: String, current: String },

    #[error("Activity '{0}' is not in progress")]
    ActivityNotActive(String),

    #[error("Process has no current activity")]
    ProcessExhausted,

    #[error("Activity '{0}' is required and cannot be skipped")]
    SkipRequiredActivity(String),

    #[error("Phase index {index} out of range ({count} phases)")]
    PhaseOutOfRange { index: usize, count: usize },

    #[error("Phase {requested} is not the current phase ({current})")]
    PhaseNotCurrent { requested: usize, current: usize },

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Entry criteria not met for phase '{0}'")]
    EntryCriteriaNotMet(String),

    #[error("Exit criteria not met for phase '{0}'")]
    ExitCriteriaNotMet(String),

    #[error("Internal invariant violated: {0}")]
    InvariantViolation(String),

    #[error("Version conflict for '{ci}': expected {expected}, store has {actual}")]
    VersionConflict {
        ci: String,
        expected: u64,
        actual: u64,
    },

    #[error("No snapshot stored for '{0}'")]
    SnapshotNotFound(String),

    #[error("Snapshot store busy for '{0}'")]
    StoreBusy(String),

    #[error("Malformed snapshot: {0}")]
    MalformedSnapshot(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Transient failures: reload, re-apply and retry
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EngineError::VersionConflict { .. } | EngineError::StoreBusy(_)
        )
    }

    /// Criteria outcomes leave the phase `blocked`; the tree changed and must be saved
    pub fn records_state(&self) -> bool {
        matches!(
            self,
            EngineError::EntryCriteriaNotMet(_) | EngineError::ExitCriteriaNotMet(_)
        )
    }

    /// The gate that rejected the transition, if this is a criteria outcome
    pub fn gate(&self) -> Option<CriteriaGate> {
        match self {
            EngineError::EntryCriteriaNotMet(_) => Some(CriteriaGate::Entry),
            EngineError::ExitCriteriaNotMet(_) => Some(CriteriaGate::Exit),
            _ => None,
        }
    }
}
