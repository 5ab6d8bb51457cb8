//! TemplateRepository - lookup and caching of process templates

use super::mapping::CategoryMapping;
use super::source::{BuiltinSource, TemplateSource};
use crate::error::{EngineError, EngineResult};
use crate::models::{CiCategory, ProcessTemplate, TemplateSummary};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Outcome of parsing one definition document
enum Parsed {
    Valid(ProcessTemplate),
    Invalid { template_id: String, reason: String },
    Unreadable,
}

/// Read-only template lookup shared by generators
///
/// Sources are consulted in the order they were added; when two sources
/// define the same template id, the earlier one wins. Parsed templates are
/// cached for the lifetime of the repository.
pub struct TemplateRepository {
    sources: Vec<Box<dyn TemplateSource>>,
    mapping: CategoryMapping,
    cache: RwLock<HashMap<String, Arc<ProcessTemplate>>>,
}

impl TemplateRepository {
    /// Repository with no sources and the given category mapping
    pub fn new(mapping: CategoryMapping) -> Self {
        Self {
            sources: Vec::new(),
            mapping,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Built-in standard templates with the default category mapping
    pub fn builtin() -> Self {
        Self::new(CategoryMapping::default()).with_source(BuiltinSource)
    }

    /// Append a definition source (lower precedence than those already added)
    pub fn with_source(mut self, source: impl TemplateSource + 'static) -> Self {
        self.sources.push(Box::new(source));
        self
    }

    pub fn mapping(&self) -> &CategoryMapping {
        &self.mapping
    }

    /// Load a template by identifier
    pub fn load(&self, template_id: &str) -> EngineResult<Arc<ProcessTemplate>> {
        if let Some(template) = self.cache.read().get(template_id) {
            tracing::debug!(template_id, "template cache hit");
            return Ok(Arc::clone(template));
        }

        let mut invalid_reason = None;

        for source in &self.sources {
            for parsed in self.parse_source(source.as_ref()) {
                match parsed {
                    Parsed::Valid(template) => {
                        let mut cache = self.cache.write();
                        cache
                            .entry(template.template_id.clone())
                            .or_insert_with(|| Arc::new(template));
                    }
                    Parsed::Invalid {
                        template_id: id,
                        reason,
                    } if id == template_id && invalid_reason.is_none() => {
                        invalid_reason = Some(reason);
                    }
                    _ => {}
                }
            }

            if let Some(template) = self.cache.read().get(template_id) {
                tracing::debug!(template_id, source = source.name(), "template loaded");
                return Ok(Arc::clone(template));
            }
        }

        match invalid_reason {
            Some(reason) => Err(EngineError::TemplateInvalid {
                template_id: template_id.to_string(),
                reason,
            }),
            None => Err(EngineError::TemplateNotFound(template_id.to_string())),
        }
    }

    /// Load the template mapped to a configuration item category
    pub fn load_for_category(&self, category: CiCategory) -> EngineResult<Arc<ProcessTemplate>> {
        let template_id = self
            .mapping
            .template_for(category)
            .ok_or(EngineError::NoTemplateForCategory(category))?;
        self.load(template_id)
    }

    /// Summaries of every valid template, sorted by id
    pub fn list(&self) -> Vec<TemplateSummary> {
        let mut seen: HashMap<String, TemplateSummary> = HashMap::new();

        for source in &self.sources {
            for parsed in self.parse_source(source.as_ref()) {
                if let Parsed::Valid(template) = parsed {
                    seen.entry(template.template_id.clone())
                        .or_insert_with(|| template.summary());
                }
            }
        }

        let mut summaries: Vec<TemplateSummary> = seen.into_values().collect();
        summaries.sort_by(|a, b| a.template_id.cmp(&b.template_id));
        summaries
    }

    fn parse_source(&self, source: &dyn TemplateSource) -> Vec<Parsed> {
        let documents = match source.documents() {
            Ok(docs) => docs,
            Err(e) => {
                tracing::warn!(source = source.name(), error = %e, "template source unavailable");
                return Vec::new();
            }
        };

        documents
            .into_iter()
            .map(|doc| match ProcessTemplate::from_yaml(&doc.content) {
                Ok(template) => match template.validate() {
                    Ok(()) => Parsed::Valid(template),
                    Err(reason) => {
                        tracing::warn!(origin = %doc.origin, %reason, "skipping invalid template");
                        Parsed::Invalid {
                            template_id: template.template_id,
                            reason,
                        }
                    }
                },
                Err(e) => {
                    tracing::warn!(origin = %doc.origin, error = %e, "skipping unparseable template");
                    Parsed::Unreadable
                }
            })
            .collect()
    }
}

impl Default for TemplateRepository {
    fn default() -> Self {
        Self::builtin()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::templates::source::{DirectorySource, InlineSource};
    use tempfile::TempDir;

    const OVERRIDE: &str = r#"
template_id: do178c-software
name: Lightweight Software Process
standard: DO-178C
version: 2.0.0
phases:
  - phase_id: ONLY
    name: Only phase
    order: 1
"#;

    #[test]
    fn test_builtin_templates_are_valid() {
        let repo = TemplateRepository::builtin();
        let summaries = repo.list();

        assert_eq!(summaries.len(), 5);
        for summary in &summaries {
            let template = repo.load(&summary.template_id).unwrap();
            assert!(template.validate().is_ok());
            assert!(template.activity_count() > 0);
        }
    }

    #[test]
    fn test_every_mapped_category_resolves() {
        let repo = TemplateRepository::builtin();
        for category in CiCategory::ALL {
            match repo.mapping().template_for(category) {
                Some(_) => {
                    let template = repo.load_for_category(category).unwrap();
                    assert!(template.applicable_categories.contains(&category));
                }
                None => assert!(matches!(
                    repo.load_for_category(category),
                    Err(EngineError::NoTemplateForCategory(c)) if c == category
                )),
            }
        }
    }

    #[test]
    fn test_unknown_template() {
        let repo = TemplateRepository::builtin();
        assert!(matches!(
            repo.load("no-such-process"),
            Err(EngineError::TemplateNotFound(id)) if id == "no-such-process"
        ));
    }

    #[test]
    fn test_cache_returns_shared_instance() {
        let repo = TemplateRepository::builtin();
        let first = repo.load("do254-hardware").unwrap();
        let second = repo.load("do254-hardware").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_earlier_source_wins() {
        let repo = TemplateRepository::new(CategoryMapping::default())
            .with_source(InlineSource::new().with_document("override", OVERRIDE))
            .with_source(BuiltinSource);

        let template = repo.load("do178c-software").unwrap();
        assert_eq!(template.name, "Lightweight Software Process");

        let listed = repo
            .list()
            .into_iter()
            .find(|s| s.template_id == "do178c-software")
            .unwrap();
        assert_eq!(listed.version, "2.0.0");
    }

    #[test]
    fn test_broken_documents_are_skipped() {
        let repo = TemplateRepository::new(CategoryMapping::empty())
            .with_source(
                InlineSource::new()
                    .with_document("garbage", "phases: [this is: not valid")
                    .with_document(
                        "bad-version",
                        "template_id: broken\nname: Broken\nstandard: X\nversion: latest\nphases: []\n",
                    ),
            )
            .with_source(BuiltinSource);

        assert_eq!(repo.list().len(), 5);
        assert!(matches!(
            repo.load("broken"),
            Err(EngineError::TemplateInvalid { template_id, .. }) if template_id == "broken"
        ));
    }

    #[test]
    fn test_unreadable_file_keeps_directory_templates() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join("mine.yaml"),
            OVERRIDE.replace("do178c-software", "mine"),
        )
        .unwrap();
        std::fs::write(temp.path().join("zz_broken.yaml"), [0xff, 0xfe, 0x00, 0x41]).unwrap();

        let repo = TemplateRepository::new(CategoryMapping::empty())
            .with_source(DirectorySource::new(temp.path()));
        assert_eq!(repo.load("mine").unwrap().name, "Lightweight Software Process");
        assert_eq!(repo.list().len(), 1);
    }

    #[test]
    fn test_empty_repository_lists_nothing() {
        let repo = TemplateRepository::new(CategoryMapping::default());
        assert!(repo.list().is_empty());
        assert!(matches!(
            repo.load_for_category(CiCategory::Software),
            Err(EngineError::TemplateNotFound(_))
        ));
    }
}
