//! Template definition sources
//!
//! A source yields raw definition documents; parsing and validation happen in
//! the repository so every source is treated the same way.

use crate::error::EngineResult;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const ARP4754A_SYSTEM: &str = include_str!("../../templates/processes/arp4754a_system_process.yaml");
const DO178C_SOFTWARE: &str = include_str!("../../templates/processes/do178c_software_process.yaml");
const DO254_HARDWARE: &str = include_str!("../../templates/processes/do254_hardware_process.yaml");
const PRODUCT_DEVELOPMENT: &str =
    include_str!("../../templates/processes/product_development_process.yaml");
const COMPONENT_PART: &str = include_str!("../../templates/processes/component_part_process.yaml");

/// A raw definition document and where it came from
#[derive(Debug, Clone)]
pub struct TemplateDocument {
    /// File path or logical name, used in diagnostics
    pub origin: String,
    pub content: String,
}

impl TemplateDocument {
    pub fn new(origin: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            content: content.into(),
        }
    }
}

/// Somewhere process template definitions can be read from
pub trait TemplateSource: Send + Sync {
    /// Short name for logging
    fn name(&self) -> &str;

    /// All documents currently available from this source
    fn documents(&self) -> EngineResult<Vec<TemplateDocument>>;
}

/// Standard templates compiled into the binary
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinSource;

impl TemplateSource for BuiltinSource {
    fn name(&self) -> &str {
        "builtin"
    }

    fn documents(&self) -> EngineResult<Vec<TemplateDocument>> {
        Ok(vec![
            TemplateDocument::new("builtin:arp4754a_system_process.yaml", ARP4754A_SYSTEM),
            TemplateDocument::new("builtin:do178c_software_process.yaml", DO178C_SOFTWARE),
            TemplateDocument::new("builtin:do254_hardware_process.yaml", DO254_HARDWARE),
            TemplateDocument::new(
                "builtin:product_development_process.yaml",
                PRODUCT_DEVELOPMENT,
            ),
            TemplateDocument::new("builtin:component_part_process.yaml", COMPONENT_PART),
        ])
    }
}

/// Every `*.yaml`, `*.yml` and `*.json` file below a directory
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
    label: String,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let label = format!("dir:{}", root.display());
        Self { root, label }
    }

    fn is_definition(path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map_or(false, |ext| matches!(ext, "yaml" | "yml" | "json"))
    }
}

impl TemplateSource for DirectorySource {
    fn name(&self) -> &str {
        &self.label
    }

    fn documents(&self) -> EngineResult<Vec<TemplateDocument>> {
        if !self.root.exists() {
            tracing::debug!(dir = %self.root.display(), "template directory does not exist");
            return Ok(Vec::new());
        }

        let mut paths: Vec<PathBuf> = WalkDir::new(&self.root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file() && Self::is_definition(e.path()))
            .map(|e| e.into_path())
            .collect();
        paths.sort();

        let mut documents = Vec::with_capacity(paths.len());
        for path in paths {
            match std::fs::read_to_string(&path) {
                Ok(content) => {
                    documents.push(TemplateDocument::new(path.display().to_string(), content))
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping unreadable template file");
                }
            }
        }

        Ok(documents)
    }
}

/// Documents supplied directly by the caller
#[derive(Debug, Clone, Default)]
pub struct InlineSource {
    documents: Vec<TemplateDocument>,
}

impl InlineSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(mut self, origin: impl Into<String>, content: impl Into<String>) -> Self {
        self.documents.push(TemplateDocument::new(origin, content));
        self
    }
}

impl TemplateSource for InlineSource {
    fn name(&self) -> &str {
        "inline"
    }

    fn documents(&self) -> EngineResult<Vec<TemplateDocument>> {
        Ok(self.documents.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_builtin_documents() {
        let docs = BuiltinSource.documents().unwrap();
        assert_eq!(docs.len(), 5);
        assert!(docs.iter().all(|d| d.content.contains("template_id")));
    }

    #[test]
    fn test_directory_source_filters_extensions() {
        let temp = TempDir::new().unwrap();
        let nested = temp.path().join("nested");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(temp.path().join("a.yaml"), "template_id: a").unwrap();
        std::fs::write(nested.join("b.json"), "{\"template_id\": \"b\"}").unwrap();
        std::fs::write(temp.path().join("notes.md"), "# not a template").unwrap();

        let source = DirectorySource::new(temp.path());
        let docs = source.documents().unwrap();

        assert_eq!(docs.len(), 2);
        assert!(docs.iter().any(|d| d.origin.ends_with("a.yaml")));
        assert!(docs.iter().any(|d| d.origin.ends_with("b.json")));
    }

    #[test]
    fn test_unreadable_file_is_skipped() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("mine.yaml"), "template_id: mine").unwrap();
        std::fs::write(temp.path().join("zz_broken.yaml"), [0xff, 0xfe, 0x00, 0x41]).unwrap();

        let docs = DirectorySource::new(temp.path()).documents().unwrap();
        assert_eq!(docs.len(), 1);
        assert!(docs[0].origin.ends_with("mine.yaml"));
    }

    #[test]
    fn test_missing_directory_is_empty() {
        let temp = TempDir::new().unwrap();
        let source = DirectorySource::new(temp.path().join("missing"));
        assert!(source.documents().unwrap().is_empty());
    }
}
