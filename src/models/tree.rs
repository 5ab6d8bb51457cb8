//! Runtime state tree for one configuration item's process

use super::{AssuranceLevel, CiCategory, DeliverableDef, ReviewDef};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Opaque caller-supplied data (completion notes, skip reasons, context)
pub type DataMap = BTreeMap<String, serde_json::Value>;

/// Status of a phase or sub-phase
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PhaseStatus {
    #[default]
    NotStarted,
    InProgress,
    Completed,
    Blocked,
}

impl PhaseStatus {
    pub fn name(&self) -> &'static str {
        match self {
            PhaseStatus::NotStarted => "not_started",
            PhaseStatus::InProgress => "in_progress",
            PhaseStatus::Completed => "completed",
            PhaseStatus::Blocked => "blocked",
        }
    }
}

/// Status of an activity
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActivityStatus {
    #[default]
    NotStarted,
    InProgress,
    Completed,
    Skipped,
    Blocked,
}

impl ActivityStatus {
    pub fn name(&self) -> &'static str {
        match self {
            ActivityStatus::NotStarted => "not_started",
            ActivityStatus::InProgress => "in_progress",
            ActivityStatus::Completed => "completed",
            ActivityStatus::Skipped => "skipped",
            ActivityStatus::Blocked => "blocked",
        }
    }

    /// Completed or skipped; counts toward progress and exit criteria
    pub fn is_done(&self) -> bool {
        matches!(self, ActivityStatus::Completed | ActivityStatus::Skipped)
    }
}

/// Runtime instance of an activity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActivityInstance {
    pub activity_id: String,
    pub name: String,
    pub activity_type: String,
    #[serde(default)]
    pub status: ActivityStatus,
    /// Copied from the template at generation time
    pub required: bool,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub output_artifacts: Vec<String>,
    #[serde(default)]
    pub completion_data: DataMap,
}

/// Runtime instance of a sub-phase
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubPhaseInstance {
    pub sub_phase_id: String,
    pub name: String,
    pub order: u32,
    #[serde(default)]
    pub status: PhaseStatus,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub activities: Vec<ActivityInstance>,
    #[serde(default)]
    pub current_activity_index: usize,
}

impl SubPhaseInstance {
    pub fn all_activities_done(&self) -> bool {
        self.activities.iter().all(|a| a.status.is_done())
    }
}

/// Runtime instance of a phase
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PhaseInstance {
    pub phase_id: String,
    pub name: String,
    pub order: u32,
    #[serde(default)]
    pub status: PhaseStatus,
    #[serde(default)]
    pub entry_criteria_met: bool,
    #[serde(default)]
    pub exit_criteria_met: bool,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub sub_phases: Vec<SubPhaseInstance>,
    #[serde(default)]
    pub current_sub_phase_index: usize,
    #[serde(default)]
    pub deliverables: Vec<DeliverableDef>,
    #[serde(default)]
    pub reviews: Vec<ReviewDef>,
}

impl PhaseInstance {
    pub fn current_sub_phase(&self) -> Option<&SubPhaseInstance> {
        self.sub_phases.get(self.current_sub_phase_index)
    }

    pub fn activities(&self) -> impl Iterator<Item = &ActivityInstance> {
        self.sub_phases.iter().flat_map(|sp| sp.activities.iter())
    }

    pub fn all_activities_done(&self) -> bool {
        self.sub_phases.iter().all(|sp| sp.all_activities_done())
    }
}

/// The runtime status record for one configuration item's process
///
/// Only the controller mutates a tree. The snapshot revision is carried
/// alongside the tree rather than inside its serialized body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StateTree {
    pub instance_id: Uuid,
    pub ci_reference: String,
    pub ci_category: CiCategory,
    pub template_id: String,
    pub template_name: String,
    pub template_version: String,
    #[serde(default)]
    pub assurance_level: Option<AssuranceLevel>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub context: DataMap,
    pub phases: Vec<PhaseInstance>,
    #[serde(default)]
    pub current_phase_index: usize,

    /// Snapshot revision this tree was decoded from (or last encoded at)
    #[serde(skip)]
    pub(crate) revision: u64,

    /// Changed since the last snapshot
    #[serde(skip)]
    pub(crate) dirty: bool,
}

impl StateTree {
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Record a mutation: bump `updated_at` and flag for the next snapshot
    pub(crate) fn touch(&mut self) {
        self.updated_at = Utc::now();
        self.dirty = true;
    }

    /// Set a context entry; the change is picked up by the next snapshot
    pub fn set_context(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.context.insert(key.into(), value);
        self.touch();
    }

    pub fn current_phase(&self) -> Option<&PhaseInstance> {
        self.phases.get(self.current_phase_index)
    }

    /// True once the last phase has completed
    pub fn is_exhausted(&self) -> bool {
        self.phases
            .iter()
            .all(|p| p.status == PhaseStatus::Completed)
    }

    pub fn activity_count(&self) -> usize {
        self.phases.iter().map(|p| p.activities().count()).sum()
    }

    pub fn find_activity(&self, activity_id: &str) -> Option<&ActivityInstance> {
        self.phases
            .iter()
            .flat_map(|p| p.activities())
            .find(|a| a.activity_id == activity_id)
    }

    /// Structural checks applied to every decoded snapshot
    pub fn validate(&self) -> Result<(), String> {
        if !self.phases.is_empty() && self.current_phase_index >= self.phases.len() {
            return Err(format!(
                "current_phase_index {} out of range ({} phases)",
                self.current_phase_index,
                self.phases.len()
            ));
        }

        for phase in &self.phases {
            if !phase.sub_phases.is_empty()
                && phase.current_sub_phase_index >= phase.sub_phases.len()
            {
                return Err(format!(
                    "phase '{}': current_sub_phase_index {} out of range",
                    phase.phase_id, phase.current_sub_phase_index
                ));
            }

            for sub_phase in &phase.sub_phases {
                if !sub_phase.activities.is_empty()
                    && sub_phase.current_activity_index >= sub_phase.activities.len()
                {
                    return Err(format!(
                        "sub-phase '{}': current_activity_index {} out of range",
                        sub_phase.sub_phase_id, sub_phase.current_activity_index
                    ));
                }

                for activity in &sub_phase.activities {
                    if activity.required && activity.status == ActivityStatus::Skipped {
                        return Err(format!(
                            "required activity '{}' is marked skipped",
                            activity.activity_id
                        ));
                    }
                }

                if sub_phase.status == PhaseStatus::Completed && !sub_phase.all_activities_done() {
                    return Err(format!(
                        "sub-phase '{}' is completed with unfinished activities",
                        sub_phase.sub_phase_id
                    ));
                }
            }

            if phase.status == PhaseStatus::Completed && !phase.all_activities_done() {
                return Err(format!(
                    "phase '{}' is completed with unfinished activities",
                    phase.phase_id
                ));
            }
        }

        Ok(())
    }
}
