//! Process Template Types
//!
//! Defines the immutable definition documents for:
//! - process templates (one per governing standard)
//! - phases, sub-phases and activities
//! - phase deliverables and reviews

use super::{AssuranceLevel, CiCategory};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Items that can be restricted to a set of assurance levels
pub trait AssuranceScoped {
    /// Levels for which the item is required; `None` or empty means always
    fn required_levels(&self) -> Option<&[AssuranceLevel]>;
}

/// Inclusion rule shared by activities, deliverables and reviews
///
/// True when the item declares no restriction, when no level is supplied,
/// or when the supplied level is one of the declared levels.
pub fn is_required_for_assurance<T: AssuranceScoped + ?Sized>(
    item: &T,
    level: Option<&AssuranceLevel>,
) -> bool {
    let Some(required) = item.required_levels().filter(|levels| !levels.is_empty()) else {
        return true;
    };

    match level {
        None => true,
        Some(level) => required.contains(level),
    }
}

// =============================================================================
// Template
// =============================================================================

/// A standard-derived process definition
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProcessTemplate {
    /// Stable identifier (e.g. "do178c-software")
    pub template_id: String,

    /// Display name
    pub name: String,

    /// Governing standard (e.g. "DO-178C")
    pub standard: String,

    /// Semantic version of the definition
    pub version: String,

    #[serde(default)]
    pub description: Option<String>,

    /// Categories this template is written for
    #[serde(default)]
    pub applicable_categories: Vec<CiCategory>,

    pub phases: Vec<PhaseDef>,
}

/// Phase definition
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PhaseDef {
    pub phase_id: String,
    pub name: String,
    pub order: u32,

    #[serde(default)]
    pub sub_phases: Vec<SubPhaseDef>,

    #[serde(default)]
    pub deliverables: Vec<DeliverableDef>,

    #[serde(default)]
    pub reviews: Vec<ReviewDef>,
}

/// Sub-phase definition
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubPhaseDef {
    pub sub_phase_id: String,
    pub name: String,
    pub order: u32,

    #[serde(default)]
    pub activities: Vec<ActivityDef>,
}

/// Activity definition
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActivityDef {
    pub activity_id: String,
    pub name: String,

    /// Activity type tag (e.g. "document", "review", "analysis")
    #[serde(rename = "type")]
    pub activity_type: String,

    /// Whether the activity may not be skipped
    #[serde(default = "default_required")]
    pub required: bool,

    #[serde(default)]
    pub required_levels: Option<Vec<AssuranceLevel>>,

    #[serde(default)]
    pub output_artifacts: Vec<String>,
}

fn default_required() -> bool {
    true
}

/// Deliverable produced by a phase
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeliverableDef {
    pub deliverable_id: String,
    pub name: String,

    #[serde(default)]
    pub document_type: Option<String>,

    #[serde(default)]
    pub required_levels: Option<Vec<AssuranceLevel>>,
}

/// Review held at the end of a phase
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReviewDef {
    pub review_id: String,
    pub name: String,

    #[serde(default)]
    pub review_type: Option<String>,

    #[serde(default)]
    pub required_levels: Option<Vec<AssuranceLevel>>,
}

impl AssuranceScoped for ActivityDef {
    fn required_levels(&self) -> Option<&[AssuranceLevel]> {
        self.required_levels.as_deref()
    }
}

impl AssuranceScoped for DeliverableDef {
    fn required_levels(&self) -> Option<&[AssuranceLevel]> {
        self.required_levels.as_deref()
    }
}

impl AssuranceScoped for ReviewDef {
    fn required_levels(&self) -> Option<&[AssuranceLevel]> {
        self.required_levels.as_deref()
    }
}

impl ProcessTemplate {
    /// Parse a YAML (or JSON) definition document
    pub fn from_yaml(content: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(content)
    }

    /// Check structural validity; returns the first problem found
    pub fn validate(&self) -> Result<(), String> {
        if self.template_id.trim().is_empty() {
            return Err("template_id is empty".to_string());
        }
        if self.name.trim().is_empty() {
            return Err("name is empty".to_string());
        }
        if let Err(e) = semver::Version::parse(&self.version) {
            return Err(format!("version '{}' is not a semantic version: {}", self.version, e));
        }
        if self.phases.is_empty() {
            return Err("template defines no phases".to_string());
        }

        let mut phase_ids = HashSet::new();
        let mut sub_phase_ids = HashSet::new();
        let mut activity_ids = HashSet::new();

        for phase in &self.phases {
            if !phase_ids.insert(phase.phase_id.as_str()) {
                return Err(format!("duplicate phase id '{}'", phase.phase_id));
            }
            for sub_phase in &phase.sub_phases {
                if !sub_phase_ids.insert(sub_phase.sub_phase_id.as_str()) {
                    return Err(format!("duplicate sub-phase id '{}'", sub_phase.sub_phase_id));
                }
                for activity in &sub_phase.activities {
                    if !activity_ids.insert(activity.activity_id.as_str()) {
                        return Err(format!("duplicate activity id '{}'", activity.activity_id));
                    }
                }
            }
        }

        Ok(())
    }

    /// Total number of activity definitions, before any assurance filtering
    pub fn activity_count(&self) -> usize {
        self.phases
            .iter()
            .flat_map(|p| &p.sub_phases)
            .map(|sp| sp.activities.len())
            .sum()
    }

    pub fn summary(&self) -> TemplateSummary {
        TemplateSummary {
            template_id: self.template_id.clone(),
            name: self.name.clone(),
            standard: self.standard.clone(),
            version: self.version.clone(),
            applicable_categories: self.applicable_categories.clone(),
            phase_count: self.phases.len(),
        }
    }
}

/// Listing entry for a template
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TemplateSummary {
    pub template_id: String,
    pub name: String,
    pub standard: String,
    pub version: String,
    pub applicable_categories: Vec<CiCategory>,
    pub phase_count: usize,
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const TEMPLATE: &str = r#"
template_id: demo
name: Demo Process
standard: DEMO-1
version: 1.0.0
applicable_categories: [SOFTWARE]
phases:
  - phase_id: P1
    name: Planning
    order: 1
    sub_phases:
      - sub_phase_id: P1-S1
        name: Plans
        order: 1
        activities:
          - activity_id: A1
            name: Write plan
            type: document
            output_artifacts: [PLAN]
          - activity_id: A2
            name: Independent review
            type: review
            required: false
            required_levels: [DAL_A]
    deliverables:
      - deliverable_id: D1
        name: Plan
      - deliverable_id: D2
        name: Independence record
        required_levels: [DAL_A, DAL_B]
"#;

    #[test]
    fn test_parse_template_defaults() {
        let template = ProcessTemplate::from_yaml(TEMPLATE).unwrap();

        assert_eq!(template.template_id, "demo");
        assert_eq!(template.applicable_categories, vec![CiCategory::Software]);

        let activities = &template.phases[0].sub_phases[0].activities;
        assert!(activities[0].required);
        assert!(activities[0].required_levels.is_none());
        assert_eq!(activities[0].output_artifacts, vec!["PLAN".to_string()]);
        assert!(!activities[1].required);
        assert!(template.validate().is_ok());
        assert_eq!(template.activity_count(), 2);
    }

    #[test]
    fn test_assurance_predicate() {
        let template = ProcessTemplate::from_yaml(TEMPLATE).unwrap();
        let activities = &template.phases[0].sub_phases[0].activities;
        let dal_a = AssuranceLevel::new("DAL_A");
        let dal_d = AssuranceLevel::new("DAL_D");

        // Unrestricted item
        assert!(is_required_for_assurance(&activities[0], Some(&dal_d)));
        // No level supplied
        assert!(is_required_for_assurance(&activities[1], None));
        // Membership
        assert!(is_required_for_assurance(&activities[1], Some(&dal_a)));
        assert!(!is_required_for_assurance(&activities[1], Some(&dal_d)));

        let deliverable = &template.phases[0].deliverables[1];
        assert!(!is_required_for_assurance(deliverable, Some(&dal_d)));
    }

    #[test]
    fn test_quoted_levels_are_trimmed() {
        let template = ProcessTemplate::from_yaml(&TEMPLATE.replace("[DAL_A]", "['DAL_A ']")).unwrap();
        let activity = &template.phases[0].sub_phases[0].activities[1];
        assert!(is_required_for_assurance(activity, Some(&AssuranceLevel::new("DAL_A"))));
    }

    #[test]
    fn test_empty_level_list_means_always() {
        let activity = ActivityDef {
            activity_id: "X".to_string(),
            name: "X".to_string(),
            activity_type: "task".to_string(),
            required: true,
            required_levels: Some(vec![]),
            output_artifacts: vec![],
        };
        assert!(is_required_for_assurance(
            &activity,
            Some(&AssuranceLevel::new("DAL_E"))
        ));
    }

    #[test]
    fn test_validate_rejects_duplicates_and_bad_version() {
        let mut template = ProcessTemplate::from_yaml(TEMPLATE).unwrap();
        template.version = "one".to_string();
        assert!(template.validate().unwrap_err().contains("semantic version"));

        let mut template = ProcessTemplate::from_yaml(TEMPLATE).unwrap();
        let duplicate = template.phases[0].sub_phases[0].activities[0].clone();
        template.phases[0].sub_phases[0].activities.push(duplicate);
        assert!(template.validate().unwrap_err().contains("duplicate activity id"));
    }

    #[test]
    fn test_summary() {
        let template = ProcessTemplate::from_yaml(TEMPLATE).unwrap();
        let summary = template.summary();
        assert_eq!(summary.phase_count, 1);
        assert_eq!(summary.standard, "DEMO-1");
    }
}
