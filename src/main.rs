use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use colored::Colorize;
use lifecycle_engine::cli::{generate::GenerateOptions, Workspace};
use lifecycle_engine::Result;
use std::io;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "lifecycle")]
#[command(author = "Chris Cheng <chris.cheng@shopee.com>")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Process state machines for regulated engineering lifecycles", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Config file (default: ./lifecycle.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Snapshot directory (overrides the config file)
    #[arg(long, global = true)]
    state_dir: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List available process templates
    Templates {
        /// Output in JSON format
        #[arg(short, long)]
        json: bool,
    },

    /// Generate and save the process for a configuration item
    Generate {
        /// Configuration item reference
        ci: String,

        /// Item category (e.g. SOFTWARE, hardware, physical-product)
        #[arg(short, long)]
        category: String,

        /// Assurance level (e.g. DAL_A)
        #[arg(short, long)]
        assurance: Option<String>,

        /// Use this template instead of the category default
        #[arg(short, long)]
        template: Option<String>,

        /// Do not start the first phase
        #[arg(long)]
        no_start: bool,
    },

    /// Show current activity and progress
    Status {
        /// Configuration item reference
        ci: String,

        /// Output in JSON format
        #[arg(short, long)]
        json: bool,
    },

    /// Start the current phase, or resume a blocked one
    Start {
        /// Configuration item reference
        ci: String,

        /// Phase index (must be the current phase)
        #[arg(short, long)]
        phase: Option<usize>,
    },

    /// Complete the current activity
    Complete {
        /// Configuration item reference
        ci: String,

        /// Activity id
        activity: String,

        /// Completion data as key=value (repeatable)
        #[arg(short, long = "data")]
        data: Vec<String>,
    },

    /// Skip the current (optional) activity
    Skip {
        /// Configuration item reference
        ci: String,

        /// Activity id
        activity: String,

        /// Why the activity is skipped
        #[arg(short, long)]
        reason: String,
    },

    /// Generate shell completions
    Completions {
        /// Shell type (bash, zsh, fish, powershell)
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("{}", format!("Error: {:#}", e).red());
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .without_time()
                .with_writer(io::stderr),
        )
        .init();
}

fn run(cli: Cli) -> Result<()> {
    if let Commands::Completions { shell } = cli.command {
        generate(shell, &mut Cli::command(), "lifecycle", &mut io::stdout());
        return Ok(());
    }

    let project_root = std::env::current_dir()?;
    let workspace = Workspace::load(&project_root, cli.config.as_deref(), cli.state_dir)?;

    match cli.command {
        Commands::Templates { json } => {
            lifecycle_engine::cli::templates::run(&workspace, json)?;
        }

        Commands::Generate {
            ci,
            category,
            assurance,
            template,
            no_start,
        } => {
            lifecycle_engine::cli::generate::run(
                &workspace,
                GenerateOptions {
                    ci_reference: ci,
                    category,
                    assurance_level: assurance,
                    template_id: template,
                    no_start,
                },
            )?;
        }

        Commands::Status { ci, json } => {
            lifecycle_engine::cli::status::run(&workspace, &ci, json)?;
        }

        Commands::Start { ci, phase } => {
            lifecycle_engine::cli::advance::start(&workspace, &ci, phase)?;
        }

        Commands::Complete { ci, activity, data } => {
            lifecycle_engine::cli::advance::complete(&workspace, &ci, &activity, &data)?;
        }

        Commands::Skip {
            ci,
            activity,
            reason,
        } => {
            lifecycle_engine::cli::advance::skip(&workspace, &ci, &activity, &reason)?;
        }

        // Handled before the workspace is loaded
        Commands::Completions { .. } => {}
    }

    Ok(())
}
