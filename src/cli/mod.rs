//! Command implementations for the `lifecycle` binary

pub mod advance;
pub mod generate;
pub mod status;
pub mod templates;

use crate::config::EngineConfig;
use crate::engine::{ProcessEvent, Transition};
use crate::error::EngineError;
use crate::models::DataMap;
use crate::state::{FileStore, ProcessSession};
use crate::Result;
use anyhow::{bail, Context};
use colored::Colorize;
use std::path::{Path, PathBuf};

/// Configuration plus resolved state directory for one invocation
#[derive(Debug, Clone)]
pub struct Workspace {
    pub config: EngineConfig,
    pub state_dir: PathBuf,
}

impl Workspace {
    /// Load config from `--config` or the project root; `--state-dir` wins over the file
    pub fn load(
        project_root: &Path,
        config_path: Option<&Path>,
        state_dir: Option<PathBuf>,
    ) -> Result<Self> {
        let config = EngineConfig::load(config_path, project_root)?;
        let state_dir = state_dir.unwrap_or_else(|| {
            if config.state_dir.is_absolute() {
                config.state_dir.clone()
            } else {
                project_root.join(&config.state_dir)
            }
        });
        Ok(Self { config, state_dir })
    }

    pub fn session(&self) -> ProcessSession<FileStore> {
        ProcessSession::new(FileStore::new(&self.state_dir))
            .max_attempts(self.config.max_attempts)
            .auto_start(self.config.auto_start)
    }
}

/// Parse `key=value` pairs; values that parse as JSON keep their type
pub fn parse_data(pairs: &[String]) -> Result<Option<DataMap>> {
    if pairs.is_empty() {
        return Ok(None);
    }

    let mut data = DataMap::new();
    for pair in pairs {
        let Some((key, value)) = pair.split_once('=') else {
            bail!("Invalid --data '{}': expected key=value", pair);
        };
        let key = key.trim();
        if key.is_empty() {
            bail!("Invalid --data '{}': empty key", pair);
        }
        let value = serde_json::from_str(value)
            .unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
        data.insert(key.to_string(), value);
    }
    Ok(Some(data))
}

/// Print the events of a transition, one per line
pub fn print_transition(transition: &Transition) {
    for event in &transition.events {
        match event {
            ProcessEvent::PhaseStarted { phase_id } => {
                println!("   {} Phase started: {}", "▶".cyan(), phase_id.cyan().bold())
            }
            ProcessEvent::PhaseCompleted { phase_id } => {
                println!("   {} Phase completed: {}", "✓".green(), phase_id.green().bold())
            }
            ProcessEvent::PhaseBlocked { phase_id, gate } => {
                println!("   {} Phase blocked at {} gate: {}", "⛔".red(), gate, phase_id.red())
            }
            ProcessEvent::SubPhaseStarted { sub_phase_id } => {
                println!("   {} Sub-phase started: {}", "▸".cyan(), sub_phase_id)
            }
            ProcessEvent::SubPhaseCompleted { sub_phase_id } => {
                println!("   {} Sub-phase completed: {}", "✓".green(), sub_phase_id)
            }
            ProcessEvent::ActivityStarted { activity_id, name } => {
                println!("   {} Now: {} {}", "→".yellow(), activity_id.yellow().bold(), name)
            }
            ProcessEvent::ActivityCompleted { activity_id } => {
                println!("   {} Completed: {}", "✓".green(), activity_id)
            }
            ProcessEvent::ActivitySkipped { activity_id, reason } => {
                println!("   {} Skipped: {} ({})", "↷".bright_black(), activity_id, reason)
            }
            ProcessEvent::ProcessCompleted => {
                println!("   {}", "✅ Process completed".green().bold())
            }
        }
    }
    println!("   Progress: {:.1}%", transition.progress);
}

/// Report an engine failure, noting when the blocked state was still saved
pub fn engine_failure(err: EngineError, ci_reference: &str) -> anyhow::Error {
    if let Some(gate) = err.gate() {
        println!(
            "{}",
            format!("⚠ {} blocked at {} gate; state saved", ci_reference, gate).yellow()
        );
    }
    anyhow::Error::new(err).context(format!("Operation failed for '{}'", ci_reference))
}
