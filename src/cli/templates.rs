use super::Workspace;
use crate::Result;
use colored::Colorize;

pub fn run(workspace: &Workspace, json: bool) -> Result<()> {
    let repository = workspace.config.repository()?;
    let summaries = repository.list();

    if json {
        println!("{}", serde_json::to_string_pretty(&summaries)?);
        return Ok(());
    }

    if summaries.is_empty() {
        println!("{}", "No process templates found.".yellow());
        return Ok(());
    }

    println!("{}", "📋 Process templates:".cyan().bold());
    for summary in &summaries {
        println!();
        println!(
            "   {} {} (v{})",
            summary.template_id.green().bold(),
            summary.name,
            summary.version
        );
        println!("      Standard:   {}", summary.standard);
        println!("      Phases:     {}", summary.phase_count);
        if !summary.applicable_categories.is_empty() {
            let categories: Vec<&str> = summary
                .applicable_categories
                .iter()
                .map(|c| c.as_str())
                .collect();
            println!("      Categories: {}", categories.join(", "));
        }
    }

    println!();
    println!("{}", "Category mapping:".cyan());
    for (category, template_id) in repository.mapping().entries() {
        println!("   {:<17} → {}", category.as_str(), template_id);
    }

    Ok(())
}
