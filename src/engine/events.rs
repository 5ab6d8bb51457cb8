use crate::error::CriteriaGate;
use serde::{Deserialize, Serialize};

/// Something that happened to a state tree during one controller operation
///
/// Events are returned to the caller for notification fan-out; the engine
/// does not deliver them anywhere itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProcessEvent {
    PhaseStarted { phase_id: String },
    PhaseCompleted { phase_id: String },
    PhaseBlocked { phase_id: String, gate: CriteriaGate },
    SubPhaseStarted { sub_phase_id: String },
    SubPhaseCompleted { sub_phase_id: String },
    ActivityStarted { activity_id: String, name: String },
    ActivityCompleted { activity_id: String },
    ActivitySkipped { activity_id: String, reason: String },
    ProcessCompleted,
}

/// Result of a successful controller operation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub events: Vec<ProcessEvent>,
    /// Overall progress after the operation, in percent
    pub progress: f64,
}

impl Transition {
    /// The activity that became current, if any
    pub fn started_activity(&self) -> Option<&str> {
        self.events.iter().rev().find_map(|e| match e {
            ProcessEvent::ActivityStarted { activity_id, .. } => Some(activity_id.as_str()),
            _ => None,
        })
    }

    pub fn completed_phases(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|e| match e {
                ProcessEvent::PhaseCompleted { phase_id } => Some(phase_id.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn process_completed(&self) -> bool {
        self.events
            .iter()
            .any(|e| matches!(e, ProcessEvent::ProcessCompleted))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_wire_format() {
        let event = ProcessEvent::PhaseBlocked {
            phase_id: "SW-PLAN".to_string(),
            gate: CriteriaGate::Entry,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "phase_blocked");
        assert_eq!(json["gate"], "entry");
    }

    #[test]
    fn test_transition_queries() {
        let transition = Transition {
            events: vec![
                ProcessEvent::ActivityCompleted {
                    activity_id: "A1".to_string(),
                },
                ProcessEvent::PhaseCompleted {
                    phase_id: "P1".to_string(),
                },
                ProcessEvent::ActivityStarted {
                    activity_id: "A3".to_string(),
                    name: "Third".to_string(),
                },
            ],
            progress: 50.0,
        };

        assert_eq!(transition.started_activity(), Some("A3"));
        assert_eq!(transition.completed_phases(), vec!["P1"]);
        assert!(!transition.process_completed());
    }
}
