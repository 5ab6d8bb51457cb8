//! Engine configuration (`lifecycle.toml`)

use crate::models::CiCategory;
use crate::state::DEFAULT_MAX_ATTEMPTS;
use crate::templates::{BuiltinSource, CategoryMapping, DirectorySource, TemplateRepository};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Config file looked up in the working directory
pub const CONFIG_FILE: &str = "lifecycle.toml";

/// Lifecycle engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Template directories, searched in order before the built-ins
    pub template_dirs: Vec<PathBuf>,

    /// Include the templates compiled into the binary
    pub builtin_templates: bool,

    /// Where snapshots are stored
    pub state_dir: PathBuf,

    /// Start the first phase as soon as a process is generated
    pub auto_start: bool,

    /// Load/apply/save attempts per operation
    pub max_attempts: u32,

    /// Category -> template id overrides; an empty id unmaps the category
    pub categories: BTreeMap<String, String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            template_dirs: Vec::new(),
            builtin_templates: true,
            state_dir: PathBuf::from(".lifecycle/state"),
            auto_start: true,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            categories: BTreeMap::new(),
        }
    }
}

impl EngineConfig {
    /// Load from an explicit path, or `lifecycle.toml` in `dir` if present
    ///
    /// A missing default file yields the defaults; a missing explicit file is an error.
    pub fn load(explicit: Option<&Path>, dir: &Path) -> Result<Self> {
        let config_path = match explicit {
            Some(path) => path.to_path_buf(),
            None => {
                let path = dir.join(CONFIG_FILE);
                if !path.exists() {
                    return Ok(Self::default());
                }
                path
            }
        };

        let content = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;
        Self::from_toml(&content)
            .with_context(|| format!("Failed to parse {}", config_path.display()))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(content)?;
        config.category_mapping()?;
        Ok(config)
    }

    /// Default mapping with the `[categories]` overrides applied
    pub fn category_mapping(&self) -> Result<CategoryMapping> {
        let mut mapping = CategoryMapping::default();
        for (key, template_id) in &self.categories {
            let category: CiCategory = key
                .parse()
                .map_err(|e: String| anyhow::anyhow!(e))
                .context("Invalid [categories] entry")?;
            if template_id.trim().is_empty() {
                mapping.remove(category);
            } else {
                mapping.set(category, template_id.trim());
            }
        }
        Ok(mapping)
    }

    /// Template repository: configured directories first, then the built-ins
    pub fn repository(&self) -> Result<TemplateRepository> {
        let mut repository = TemplateRepository::new(self.category_mapping()?);
        for dir in &self.template_dirs {
            repository = repository.with_source(DirectorySource::new(dir));
        }
        if self.builtin_templates {
            repository = repository.with_source(BuiltinSource);
        }
        Ok(repository)
    }
}
