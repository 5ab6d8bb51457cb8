//! Controller - the only component that mutates a state tree
//!
//! Every mutating operation runs against a working copy of the tree. The copy
//! replaces the caller's tree when the operation succeeds or ends in a
//! criteria outcome (the phase is recorded as `blocked`); any other error
//! leaves the caller's tree exactly as it was.

use super::criteria::{AlwaysMet, CriteriaEvaluator};
use super::events::{ProcessEvent, Transition};
use super::progress::{self, PhaseProgress, ProgressReport};
use crate::error::{CriteriaGate, EngineError, EngineResult};
use crate::models::{ActivityInstance, ActivityStatus, DataMap, PhaseInstance, PhaseStatus, StateTree};
use chrono::Utc;

/// Key under which a skip reason is recorded in completion data
pub const SKIP_REASON_KEY: &str = "skip_reason";

/// Position of the current activity: (phase, sub-phase, activity)
type Cursor = (usize, usize, usize);

/// Drives a state tree through its phases, sub-phases and activities
#[derive(Debug, Clone, Default)]
pub struct Controller<E = AlwaysMet> {
    evaluator: E,
}

impl Controller<AlwaysMet> {
    pub fn new() -> Self {
        Self { evaluator: AlwaysMet }
    }
}

impl<E: CriteriaEvaluator> Controller<E> {
    pub fn with_evaluator(evaluator: E) -> Self {
        Self { evaluator }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn current_activity<'t>(&self, tree: &'t StateTree) -> Option<&'t ActivityInstance> {
        current_activity(tree)
    }

    pub fn phase_progress(&self, tree: &StateTree, phase_index: usize) -> EngineResult<PhaseProgress> {
        progress::phase_progress(tree, phase_index)
    }

    pub fn overall_progress(&self, tree: &StateTree) -> f64 {
        progress::overall_progress(tree)
    }

    pub fn progress_report(&self, tree: &StateTree) -> ProgressReport {
        progress::progress_report(tree)
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Start (or resume a blocked) phase; defaults to the current phase
    ///
    /// Entering the phase also starts its first sub-phase and activity.
    pub fn start_phase(
        &self,
        tree: &mut StateTree,
        phase_index: Option<usize>,
    ) -> EngineResult<Transition> {
        let index = phase_index.unwrap_or(tree.current_phase_index);
        self.transact(tree, |working, events| self.open_phase(working, index, events))
    }

    /// Complete the current activity and advance
    pub fn complete_activity(
        &self,
        tree: &mut StateTree,
        activity_id: &str,
        completion_data: Option<DataMap>,
    ) -> EngineResult<Transition> {
        self.transact(tree, |working, events| {
            let (p, s, a) = locate_active(working, activity_id)?;
            let activity = &mut working.phases[p].sub_phases[s].activities[a];

            activity.status = ActivityStatus::Completed;
            activity.completed_at = Some(Utc::now());
            if let Some(data) = completion_data {
                activity.completion_data = data;
            }
            events.push(ProcessEvent::ActivityCompleted {
                activity_id: activity.activity_id.clone(),
            });
            tracing::debug!(activity_id, "activity completed");

            self.settle(working, events)
        })
    }

    /// Skip the current activity, which must not be required
    pub fn skip_activity(
        &self,
        tree: &mut StateTree,
        activity_id: &str,
        reason: &str,
    ) -> EngineResult<Transition> {
        self.transact(tree, |working, events| {
            let (p, s, a) = locate_active(working, activity_id)?;
            let activity = &mut working.phases[p].sub_phases[s].activities[a];

            if activity.required {
                return Err(EngineError::SkipRequiredActivity(activity.activity_id.clone()));
            }

            activity.status = ActivityStatus::Skipped;
            activity.completed_at = Some(Utc::now());
            activity.completion_data = DataMap::from([(
                SKIP_REASON_KEY.to_string(),
                serde_json::Value::String(reason.to_string()),
            )]);
            events.push(ProcessEvent::ActivitySkipped {
                activity_id: activity.activity_id.clone(),
                reason: reason.to_string(),
            });
            tracing::debug!(activity_id, reason, "activity skipped");

            self.settle(working, events)
        })
    }

    // =========================================================================
    // Internal helpers
    // =========================================================================

    fn transact<F>(&self, tree: &mut StateTree, op: F) -> EngineResult<Transition>
    where
        F: FnOnce(&mut StateTree, &mut Vec<ProcessEvent>) -> EngineResult<()>,
    {
        let mut working = tree.clone();
        let mut events = Vec::new();

        match op(&mut working, &mut events) {
            Ok(()) => {
                working.touch();
                let progress = progress::overall_progress(&working);
                *tree = working;
                Ok(Transition { events, progress })
            }
            Err(err) if err.records_state() => {
                working.touch();
                *tree = working;
                Err(err)
            }
            Err(err) => {
                if matches!(err, EngineError::InvariantViolation(_)) {
                    tracing::error!(ci = %tree.ci_reference, error = %err, "operation aborted");
                }
                Err(err)
            }
        }
    }

    fn open_phase(
        &self,
        tree: &mut StateTree,
        index: usize,
        events: &mut Vec<ProcessEvent>,
    ) -> EngineResult<()> {
        let count = tree.phases.len();
        if index >= count {
            return Err(EngineError::PhaseOutOfRange { index, count });
        }
        if index != tree.current_phase_index {
            return Err(EngineError::PhaseNotCurrent {
                requested: index,
                current: tree.current_phase_index,
            });
        }

        let phase = &mut tree.phases[index];
        match phase.status {
            PhaseStatus::NotStarted | PhaseStatus::Blocked => {}
            status => {
                return Err(EngineError::InvalidTransition(format!(
                    "phase '{}' is already {}",
                    phase.phase_id,
                    status.name()
                )))
            }
        }

        // A phase blocked at exit has already passed its entry gate
        if !phase.entry_criteria_met && !self.evaluator.check_entry(phase) {
            block(phase, CriteriaGate::Entry, events);
            return Err(EngineError::EntryCriteriaNotMet(phase.phase_id.clone()));
        }

        phase.status = PhaseStatus::InProgress;
        phase.entry_criteria_met = true;
        if phase.started_at.is_none() {
            phase.started_at = Some(Utc::now());
            events.push(ProcessEvent::PhaseStarted {
                phase_id: phase.phase_id.clone(),
            });
            tracing::info!(phase_id = %phase.phase_id, "phase started");
        }

        self.settle(tree, events)
    }

    /// Move the cursor forward until an activity is in progress or the tree is exhausted
    fn settle(&self, tree: &mut StateTree, events: &mut Vec<ProcessEvent>) -> EngineResult<()> {
        loop {
            let p = tree.current_phase_index;
            let phase_count = tree.phases.len();
            let Some(phase) = tree.phases.get_mut(p) else {
                return Ok(());
            };
            if phase.status != PhaseStatus::InProgress {
                return Ok(());
            }

            let sub_count = phase.sub_phases.len();
            let s = phase.current_sub_phase_index;

            if let Some(sub) = phase.sub_phases.get_mut(s) {
                if sub.status == PhaseStatus::NotStarted {
                    sub.status = PhaseStatus::InProgress;
                    sub.started_at = Some(Utc::now());
                    sub.current_activity_index = 0;
                    events.push(ProcessEvent::SubPhaseStarted {
                        sub_phase_id: sub.sub_phase_id.clone(),
                    });
                }

                let activity_count = sub.activities.len();
                let a = sub.current_activity_index;

                if let Some(activity) = sub.activities.get_mut(a) {
                    match activity.status {
                        ActivityStatus::NotStarted => {
                            activity.status = ActivityStatus::InProgress;
                            activity.started_at = Some(Utc::now());
                            events.push(ProcessEvent::ActivityStarted {
                                activity_id: activity.activity_id.clone(),
                                name: activity.name.clone(),
                            });
                            tracing::debug!(activity_id = %activity.activity_id, "activity started");
                            return Ok(());
                        }
                        ActivityStatus::InProgress | ActivityStatus::Blocked => return Ok(()),
                        ActivityStatus::Completed | ActivityStatus::Skipped => {}
                    }

                    if a + 1 < activity_count {
                        sub.current_activity_index = a + 1;
                        continue;
                    }
                }

                if sub.status != PhaseStatus::Completed {
                    if !sub.all_activities_done() {
                        return Err(EngineError::InvariantViolation(format!(
                            "sub-phase '{}' exhausted with unfinished activities",
                            sub.sub_phase_id
                        )));
                    }
                    sub.status = PhaseStatus::Completed;
                    sub.completed_at = Some(Utc::now());
                    events.push(ProcessEvent::SubPhaseCompleted {
                        sub_phase_id: sub.sub_phase_id.clone(),
                    });
                }

                if s + 1 < sub_count {
                    phase.current_sub_phase_index = s + 1;
                    continue;
                }
            }

            self.close_phase(phase, events)?;

            if p + 1 < phase_count {
                tree.current_phase_index = p + 1;
                return self.open_phase(tree, p + 1, events);
            }

            events.push(ProcessEvent::ProcessCompleted);
            tracing::info!(ci = %tree.ci_reference, "process completed");
            return Ok(());
        }
    }

    fn close_phase(
        &self,
        phase: &mut PhaseInstance,
        events: &mut Vec<ProcessEvent>,
    ) -> EngineResult<()> {
        if !phase.all_activities_done() {
            return Err(EngineError::InvariantViolation(format!(
                "phase '{}' exhausted with unfinished activities",
                phase.phase_id
            )));
        }

        if !self.evaluator.check_exit(phase) {
            block(phase, CriteriaGate::Exit, events);
            return Err(EngineError::ExitCriteriaNotMet(phase.phase_id.clone()));
        }

        phase.status = PhaseStatus::Completed;
        phase.completed_at = Some(Utc::now());
        phase.exit_criteria_met = true;
        events.push(ProcessEvent::PhaseCompleted {
            phase_id: phase.phase_id.clone(),
        });
        tracing::info!(phase_id = %phase.phase_id, "phase completed");

        Ok(())
    }
}

fn block(phase: &mut PhaseInstance, gate: CriteriaGate, events: &mut Vec<ProcessEvent>) {
    phase.status = PhaseStatus::Blocked;
    events.push(ProcessEvent::PhaseBlocked {
        phase_id: phase.phase_id.clone(),
        gate,
    });
    tracing::warn!(phase_id = %phase.phase_id, %gate, "phase blocked");
}

fn cursor(tree: &StateTree) -> Option<Cursor> {
    let p = tree.current_phase_index;
    let phase = tree.phases.get(p)?;
    if matches!(phase.status, PhaseStatus::Completed | PhaseStatus::Blocked) {
        return None;
    }

    let s = phase.current_sub_phase_index;
    let sub = phase.sub_phases.get(s)?;
    let a = sub.current_activity_index;
    let activity = sub.activities.get(a)?;
    if activity.status.is_done() {
        return None;
    }

    Some((p, s, a))
}

/// The activity work should happen on next, if any
pub fn current_activity(tree: &StateTree) -> Option<&ActivityInstance> {
    let (p, s, a) = cursor(tree)?;
    Some(&tree.phases[p].sub_phases[s].activities[a])
}

/// Cursor of the current activity, which must match `activity_id` and be in progress
fn locate_active(tree: &StateTree, activity_id: &str) -> EngineResult<Cursor> {
    let (p, s, a) = cursor(tree).ok_or(EngineError::ProcessExhausted)?;
    let activity = &tree.phases[p].sub_phases[s].activities[a];

    if activity.activity_id != activity_id {
        return Err(EngineError::ActivityMismatch {
            requested: activity_id.to_string(),
            current: activity.activity_id.clone(),
        });
    }
    if activity.status != ActivityStatus::InProgress {
        return Err(EngineError::ActivityNotActive(activity.activity_id.clone()));
    }

    Ok((p, s, a))
}

// =============================================================================
// Tests
// =============================================================================
