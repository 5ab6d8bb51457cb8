//! Generator - instantiates state trees from process templates

use crate::error::{EngineError, EngineResult};
use crate::models::{
    is_required_for_assurance, ActivityDef, ActivityInstance, AssuranceLevel, CiCategory,
    DataMap, PhaseDef, PhaseInstance, ProcessTemplate, StateTree, SubPhaseDef, SubPhaseInstance,
};
use crate::templates::TemplateRepository;
use chrono::Utc;
use uuid::Uuid;

/// Inputs for generating one configuration item's process
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub ci_reference: String,
    pub category: CiCategory,
    pub assurance_level: Option<AssuranceLevel>,
    /// Overrides the category's default template
    pub template_id: Option<String>,
    /// Initial entries for the tree's context map
    pub context: DataMap,
}

impl GenerateRequest {
    pub fn new(ci_reference: impl Into<String>, category: CiCategory) -> Self {
        Self {
            ci_reference: ci_reference.into(),
            category,
            assurance_level: None,
            template_id: None,
            context: DataMap::new(),
        }
    }

    pub fn with_assurance(mut self, level: impl Into<AssuranceLevel>) -> Self {
        self.assurance_level = Some(level.into());
        self
    }

    pub fn with_template(mut self, template_id: impl Into<String>) -> Self {
        self.template_id = Some(template_id.into());
        self
    }

    pub fn with_context(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.context.insert(key.into(), value);
        self
    }
}

/// Per-item failure from a collection run
#[derive(Debug)]
pub struct CollectionFailure {
    pub ci_reference: String,
    pub error: EngineError,
}

/// Successes and failures of [`Generator::generate_for_collection`]
#[derive(Debug, Default)]
pub struct CollectionOutcome {
    pub generated: Vec<StateTree>,
    pub failures: Vec<CollectionFailure>,
}

impl CollectionOutcome {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Builds new state trees; never mutates existing ones
pub struct Generator<'a> {
    repository: &'a TemplateRepository,
}

impl<'a> Generator<'a> {
    pub fn new(repository: &'a TemplateRepository) -> Self {
        Self { repository }
    }

    /// Resolve the template for a request and instantiate it
    ///
    /// An explicit `template_id` takes precedence over the category mapping.
    pub fn generate(&self, request: &GenerateRequest) -> EngineResult<StateTree> {
        let template = match &request.template_id {
            Some(template_id) => self.repository.load(template_id)?,
            None => self.repository.load_for_category(request.category)?,
        };

        let mut tree = instantiate(
            &template,
            &request.ci_reference,
            request.category,
            request.assurance_level.as_ref(),
        );
        tree.context = request.context.clone();

        tracing::info!(
            ci = %request.ci_reference,
            template_id = %tree.template_id,
            assurance = ?request.assurance_level.as_ref().map(AssuranceLevel::as_str),
            phases = tree.phases.len(),
            activities = tree.activity_count(),
            "generated process state tree"
        );

        Ok(tree)
    }

    /// Generate one tree per item; a failing item never aborts the others
    pub fn generate_for_collection(&self, items: &[GenerateRequest]) -> CollectionOutcome {
        let mut outcome = CollectionOutcome::default();

        for item in items {
            match self.generate(item) {
                Ok(tree) => outcome.generated.push(tree),
                Err(error) => {
                    tracing::warn!(ci = %item.ci_reference, %error, "process generation failed");
                    outcome.failures.push(CollectionFailure {
                        ci_reference: item.ci_reference.clone(),
                        error,
                    });
                }
            }
        }

        outcome
    }
}

/// Deep-copy a template into a fresh, unstarted state tree
///
/// Phases and sub-phases are kept one-to-one (ordered by `order`); only
/// activities, deliverables and reviews are filtered by assurance level.
pub fn instantiate(
    template: &ProcessTemplate,
    ci_reference: &str,
    category: CiCategory,
    assurance_level: Option<&AssuranceLevel>,
) -> StateTree {
    let now = Utc::now();

    let mut phase_defs: Vec<&PhaseDef> = template.phases.iter().collect();
    phase_defs.sort_by_key(|p| p.order);

    StateTree {
        instance_id: Uuid::new_v4(),
        ci_reference: ci_reference.to_string(),
        ci_category: category,
        template_id: template.template_id.clone(),
        template_name: template.name.clone(),
        template_version: template.version.clone(),
        assurance_level: assurance_level.cloned(),
        created_at: now,
        updated_at: now,
        context: DataMap::new(),
        phases: phase_defs
            .into_iter()
            .map(|def| instantiate_phase(def, assurance_level))
            .collect(),
        current_phase_index: 0,
        revision: 0,
        dirty: true,
    }
}

fn instantiate_phase(def: &PhaseDef, level: Option<&AssuranceLevel>) -> PhaseInstance {
    let mut sub_phase_defs: Vec<&SubPhaseDef> = def.sub_phases.iter().collect();
    sub_phase_defs.sort_by_key(|sp| sp.order);

    PhaseInstance {
        phase_id: def.phase_id.clone(),
        name: def.name.clone(),
        order: def.order,
        status: Default::default(),
        entry_criteria_met: false,
        exit_criteria_met: false,
        started_at: None,
        completed_at: None,
        sub_phases: sub_phase_defs
            .into_iter()
            .map(|sp| instantiate_sub_phase(sp, level))
            .collect(),
        current_sub_phase_index: 0,
        deliverables: def
            .deliverables
            .iter()
            .filter(|d| is_required_for_assurance(*d, level))
            .cloned()
            .collect(),
        reviews: def
            .reviews
            .iter()
            .filter(|r| is_required_for_assurance(*r, level))
            .cloned()
            .collect(),
    }
}

fn instantiate_sub_phase(def: &SubPhaseDef, level: Option<&AssuranceLevel>) -> SubPhaseInstance {
    SubPhaseInstance {
        sub_phase_id: def.sub_phase_id.clone(),
        name: def.name.clone(),
        order: def.order,
        status: Default::default(),
        started_at: None,
        completed_at: None,
        activities: def
            .activities
            .iter()
            .filter(|a| is_required_for_assurance(*a, level))
            .map(instantiate_activity)
            .collect(),
        current_activity_index: 0,
    }
}

fn instantiate_activity(def: &ActivityDef) -> ActivityInstance {
    ActivityInstance {
        activity_id: def.activity_id.clone(),
        name: def.name.clone(),
        activity_type: def.activity_type.clone(),
        status: Default::default(),
        required: def.required,
        started_at: None,
        completed_at: None,
        output_artifacts: def.output_artifacts.clone(),
        completion_data: DataMap::new(),
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ActivityStatus, PhaseStatus};
    use crate::templates::{BuiltinSource, CategoryMapping, InlineSource};

    const UNORDERED: &str = r#"
template_id: unordered
name: Unordered
standard: TEST
version: 0.1.0
phases:
  - phase_id: SECOND
    name: Second
    order: 2
    sub_phases:
      - sub_phase_id: S2-B
        name: B
        order: 2
        activities:
          - { activity_id: B1, name: B1, type: task }
      - sub_phase_id: S2-A
        name: A
        order: 1
        activities:
          - { activity_id: A1, name: A1, type: task, required_levels: [DAL_A] }
  - phase_id: FIRST
    name: First
    order: 1
    sub_phases:
      - sub_phase_id: S1
        name: S1
        order: 1
        activities:
          - { activity_id: F1, name: F1, type: task, required: false }
"#;

    fn repository() -> TemplateRepository {
        let mut mapping = CategoryMapping::default();
        mapping.set(CiCategory::Document, "unordered");
        TemplateRepository::new(mapping)
            .with_source(InlineSource::new().with_document("unordered", UNORDERED))
            .with_source(BuiltinSource)
    }

    #[test]
    fn test_generate_orders_and_starts_nothing() {
        let repo = repository();
        let tree = Generator::new(&repo)
            .generate(&GenerateRequest::new("DOC-1", CiCategory::Document))
            .unwrap();

        assert_eq!(tree.template_id, "unordered");
        assert_eq!(tree.phases[0].phase_id, "FIRST");
        assert_eq!(tree.phases[1].sub_phases[0].sub_phase_id, "S2-A");
        assert!(tree.phases.iter().all(|p| p.status == PhaseStatus::NotStarted));
        assert!(tree
            .phases
            .iter()
            .flat_map(|p| p.activities())
            .all(|a| a.status == ActivityStatus::NotStarted));
        assert!(tree.is_dirty());
        assert_eq!(tree.revision(), 0);
    }

    #[test]
    fn test_filtered_sub_phase_is_kept_empty() {
        let repo = repository();
        let tree = Generator::new(&repo)
            .generate(&GenerateRequest::new("DOC-1", CiCategory::Document).with_assurance("DAL_C"))
            .unwrap();

        let second = &tree.phases[1];
        assert_eq!(second.sub_phases.len(), 2);
        assert!(second.sub_phases[0].activities.is_empty());
        assert_eq!(second.sub_phases[1].activities[0].activity_id, "B1");
    }

    #[test]
    fn test_required_flag_copied_verbatim() {
        let repo = repository();
        let tree = Generator::new(&repo)
            .generate(&GenerateRequest::new("DOC-1", CiCategory::Document))
            .unwrap();
        assert!(!tree.find_activity("F1").unwrap().required);
        assert!(tree.find_activity("B1").unwrap().required);
    }

    #[test]
    fn test_explicit_template_wins() {
        let repo = repository();
        let tree = Generator::new(&repo)
            .generate(
                &GenerateRequest::new("SW-1", CiCategory::Software).with_template("do254-hardware"),
            )
            .unwrap();
        assert_eq!(tree.template_id, "do254-hardware");
        assert_eq!(tree.ci_category, CiCategory::Software);
    }

    #[test]
    fn test_deliverables_filtered_by_assurance() {
        let repo = TemplateRepository::builtin();
        let generator = Generator::new(&repo);

        let dal_a = generator
            .generate(&GenerateRequest::new("SW-1", CiCategory::Software).with_assurance("DAL_A"))
            .unwrap();
        let dal_d = generator
            .generate(&GenerateRequest::new("SW-2", CiCategory::Software).with_assurance("DAL_D"))
            .unwrap();

        assert_eq!(dal_a.phases[0].deliverables.len(), 2);
        assert_eq!(dal_d.phases[0].deliverables.len(), 1);
        assert!(dal_a.activity_count() > dal_d.activity_count());
        assert_ne!(dal_a.instance_id, dal_d.instance_id);
    }

    #[test]
    fn test_context_copied() {
        let repo = TemplateRepository::builtin();
        let tree = Generator::new(&repo)
            .generate(
                &GenerateRequest::new("HW-7", CiCategory::Hardware)
                    .with_context("project", serde_json::json!("FCS")),
            )
            .unwrap();
        assert_eq!(tree.context["project"], "FCS");
    }

    #[test]
    fn test_collection_reports_partial_failures() {
        let repo = TemplateRepository::builtin();
        let items = vec![
            GenerateRequest::new("SW-1", CiCategory::Software).with_assurance("DAL_B"),
            GenerateRequest::new("DOC-1", CiCategory::Document),
            GenerateRequest::new("PART-1", CiCategory::Part),
        ];

        let outcome = Generator::new(&repo).generate_for_collection(&items);

        assert_eq!(outcome.generated.len(), 2);
        assert_eq!(outcome.failures.len(), 1);
        assert!(!outcome.is_complete());
        assert_eq!(outcome.failures[0].ci_reference, "DOC-1");
        assert!(matches!(
            outcome.failures[0].error,
            EngineError::NoTemplateForCategory(CiCategory::Document)
        ));
    }
}
