use super::{engine_failure, print_transition, Workspace};
use crate::engine::{GenerateRequest, Generator};
use crate::models::CiCategory;
use crate::Result;
use anyhow::Context;
use colored::Colorize;

/// Options for `lifecycle generate`
#[derive(Debug, Clone)]
pub struct GenerateOptions {
    pub ci_reference: String,
    pub category: String,
    pub assurance_level: Option<String>,
    pub template_id: Option<String>,
    pub no_start: bool,
}

pub fn run(workspace: &Workspace, options: GenerateOptions) -> Result<()> {
    let category: CiCategory = options
        .category
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))?;

    let mut request = GenerateRequest::new(&options.ci_reference, category);
    if let Some(level) = &options.assurance_level {
        request = request.with_assurance(level.as_str());
    }
    if let Some(template_id) = &options.template_id {
        request = request.with_template(template_id);
    }

    let repository = workspace.config.repository()?;
    let tree = Generator::new(&repository)
        .generate(&request)
        .with_context(|| format!("Failed to generate process for '{}'", options.ci_reference))?;

    println!(
        "{}",
        format!(
            "🚀 Generated {} for {} ({} phases, {} activities)",
            tree.template_name,
            options.ci_reference,
            tree.phases.len(),
            tree.activity_count()
        )
        .cyan()
    );

    let session = workspace.session().auto_start(workspace.config.auto_start && !options.no_start);
    let applied = session
        .create(tree)
        .map_err(|e| engine_failure(e, &options.ci_reference))?;

    print_transition(&applied.transition);
    println!(
        "   Saved to {}",
        session
            .store()
            .snapshot_path(&options.ci_reference)
            .display()
            .to_string()
            .bright_black()
    );

    Ok(())
}
