//! `start`, `complete` and `skip`

use super::{engine_failure, parse_data, print_transition, Workspace};
use crate::Result;
use colored::Colorize;

pub fn start(workspace: &Workspace, ci_reference: &str, phase_index: Option<usize>) -> Result<()> {
    println!("{}", format!("▶ Starting phase for {}", ci_reference).cyan());
    let applied = workspace
        .session()
        .start_phase(ci_reference, phase_index)
        .map_err(|e| engine_failure(e, ci_reference))?;
    print_transition(&applied.transition);
    Ok(())
}

pub fn complete(
    workspace: &Workspace,
    ci_reference: &str,
    activity_id: &str,
    data: &[String],
) -> Result<()> {
    let completion_data = parse_data(data)?;
    println!(
        "{}",
        format!("✓ Completing {} for {}", activity_id, ci_reference).cyan()
    );
    let applied = workspace
        .session()
        .complete_activity(ci_reference, activity_id, completion_data)
        .map_err(|e| engine_failure(e, ci_reference))?;
    print_transition(&applied.transition);
    Ok(())
}

pub fn skip(workspace: &Workspace, ci_reference: &str, activity_id: &str, reason: &str) -> Result<()> {
    println!(
        "{}",
        format!("↷ Skipping {} for {}", activity_id, ci_reference).cyan()
    );
    let applied = workspace
        .session()
        .skip_activity(ci_reference, activity_id, reason)
        .map_err(|e| engine_failure(e, ci_reference))?;
    print_transition(&applied.transition);
    Ok(())
}
