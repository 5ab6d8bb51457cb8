//! Progress reporting
//!
//! Progress is always derived from the tree's status fields and never stored.

use crate::error::{EngineError, EngineResult};
use crate::models::{PhaseStatus, StateTree};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Progress of a single phase
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseProgress {
    pub phase_id: String,
    pub phase_name: String,
    pub status: PhaseStatus,
    /// Completed plus skipped activities
    pub completed_activities: usize,
    pub total_activities: usize,
    pub percent_complete: f64,
    pub current_sub_phase_name: Option<String>,
}

/// Progress of the whole process
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressReport {
    pub instance_id: Uuid,
    pub ci_reference: String,
    pub template_name: String,
    pub current_phase_index: usize,
    pub overall_progress: f64,
    pub phases: Vec<PhaseProgress>,
}

pub fn phase_progress(tree: &StateTree, phase_index: usize) -> EngineResult<PhaseProgress> {
    let phase = tree
        .phases
        .get(phase_index)
        .ok_or(EngineError::PhaseOutOfRange {
            index: phase_index,
            count: tree.phases.len(),
        })?;

    let total_activities = phase.activities().count();
    let completed_activities = phase.activities().filter(|a| a.status.is_done()).count();
    let percent_complete = if total_activities == 0 {
        0.0
    } else {
        completed_activities as f64 / total_activities as f64 * 100.0
    };

    Ok(PhaseProgress {
        phase_id: phase.phase_id.clone(),
        phase_name: phase.name.clone(),
        status: phase.status,
        completed_activities,
        total_activities,
        percent_complete,
        current_sub_phase_name: phase.current_sub_phase().map(|sp| sp.name.clone()),
    })
}

/// Percentage of phases that are completed
pub fn overall_progress(tree: &StateTree) -> f64 {
    if tree.phases.is_empty() {
        return 0.0;
    }
    let completed = tree
        .phases
        .iter()
        .filter(|p| p.status == PhaseStatus::Completed)
        .count();
    completed as f64 / tree.phases.len() as f64 * 100.0
}

pub fn progress_report(tree: &StateTree) -> ProgressReport {
    let phases = (0..tree.phases.len())
        .filter_map(|i| phase_progress(tree, i).ok())
        .collect();

    ProgressReport {
        instance_id: tree.instance_id,
        ci_reference: tree.ci_reference.clone(),
        template_name: tree.template_name.clone(),
        current_phase_index: tree.current_phase_index,
        overall_progress: overall_progress(tree),
        phases,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::generator::instantiate;
    use crate::models::{ActivityStatus, CiCategory, ProcessTemplate};

    const TEMPLATE: &str = r#"
template_id: progress
name: Progress
standard: TEST
version: 1.0.0
phases:
  - phase_id: P1
    name: One
    order: 1
    sub_phases:
      - sub_phase_id: S1
        name: First sub-phase
        order: 1
        activities:
          - { activity_id: A1, name: A1, type: task }
          - { activity_id: A2, name: A2, type: task, required: false }
          - { activity_id: A3, name: A3, type: task }
          - { activity_id: A4, name: A4, type: task }
  - phase_id: P2
    name: Empty
    order: 2
"#;

    fn tree() -> StateTree {
        let template = ProcessTemplate::from_yaml(TEMPLATE).unwrap();
        instantiate(&template, "CI-1", CiCategory::Software, None)
    }

    #[test]
    fn test_phase_progress_counts_skipped() {
        let mut tree = tree();
        let activities = &mut tree.phases[0].sub_phases[0].activities;
        activities[0].status = ActivityStatus::Completed;
        activities[1].status = ActivityStatus::Skipped;

        let progress = phase_progress(&tree, 0).unwrap();
        assert_eq!(progress.completed_activities, 2);
        assert_eq!(progress.total_activities, 4);
        assert_eq!(progress.percent_complete, 50.0);
        assert_eq!(progress.current_sub_phase_name.as_deref(), Some("First sub-phase"));
    }

    #[test]
    fn test_empty_phase_is_zero_percent() {
        let progress = phase_progress(&tree(), 1).unwrap();
        assert_eq!(progress.total_activities, 0);
        assert_eq!(progress.percent_complete, 0.0);
        assert_eq!(progress.current_sub_phase_name, None);
    }

    #[test]
    fn test_out_of_range() {
        assert!(matches!(
            phase_progress(&tree(), 5),
            Err(EngineError::PhaseOutOfRange { index: 5, count: 2 })
        ));
    }

    #[test]
    fn test_overall_progress() {
        let mut tree = tree();
        assert_eq!(overall_progress(&tree), 0.0);
        tree.phases[1].status = PhaseStatus::Completed;
        assert_eq!(overall_progress(&tree), 50.0);

        let report = progress_report(&tree);
        assert_eq!(report.phases.len(), 2);
        assert_eq!(report.overall_progress, 50.0);
        assert_eq!(report.ci_reference, "CI-1");
    }
}
