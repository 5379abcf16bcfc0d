//! Main CLI application structure

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use super::output::{Output, OutputFormat};
use super::{project, query, task};
use crate::domain::{ProjectId, TieBreak};
use crate::storage::{Config, Workspace};

#[derive(Parser)]
#[command(name = "taskorder")]
#[command(author, version, about = "Dependency-aware task ordering for multi-project task lists")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output format (defaults to the global config, then text)
    #[arg(long, short = 'f', global = true)]
    pub format: Option<OutputFormat>,

    /// Enable debug logging on stderr
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new taskorder workspace
    Init {
        /// Path to initialize (defaults to current directory)
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Default tie-break policy to record in the workspace config
        #[arg(long)]
        tie_break: Option<TieBreak>,
    },

    /// Manage projects
    #[command(subcommand)]
    Project(project::ProjectCommands),

    /// Manage tasks
    #[command(subcommand)]
    Task(task::TaskCommands),

    /// Show a project's tasks in execution order
    Sorted {
        /// Project ID
        project: ProjectId,

        /// How independent tasks are ranked (priority_override or stable)
        #[arg(long)]
        tie_break: Option<TieBreak>,
    },

    /// Show tasks ready to work on
    Ready {
        /// Project ID
        project: ProjectId,
    },

    /// Show blocked tasks
    Blocked {
        /// Project ID
        project: ProjectId,
    },

    /// Order a JSON task snapshot without a workspace
    ///
    /// The file holds an array of task records from a single project.
    /// Use '-' to read from stdin.
    Order {
        /// Snapshot file
        file: PathBuf,

        /// How independent tasks are ranked (priority_override or stable)
        #[arg(long)]
        tie_break: Option<TieBreak>,
    },
}

/// Installs the stderr log subscriber
///
/// `RUST_LOG` wins when set; otherwise `--verbose` enables debug output for
/// this crate and everything else stays at warn.
fn init_tracing(verbose: bool) {
    let default_directive = if verbose { "task_order=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    // A second init (e.g. from tests) keeps the first subscriber
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Main entry point for the CLI
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let format = match cli.format {
        Some(format) => format,
        None => Config::load()?.global.default_format.into(),
    };
    let output = Output::new(format);

    output.verbose_ctx("main", "taskorder starting");

    match cli.command {
        Commands::Init { path, tie_break } => {
            output.verbose_ctx("init", &format!("Initializing workspace at: {}", path.display()));
            let mut workspace = Workspace::init(&path)?;
            if let Some(tie_break) = tie_break {
                workspace.set_tie_break(tie_break)?;
            }
            output.success(&format!(
                "Initialized taskorder workspace at {}",
                workspace.root().display()
            ));
        }

        Commands::Project(cmd) => project::run(cmd, &output)?,
        Commands::Task(cmd) => task::run(cmd, &output)?,

        Commands::Sorted { project, tie_break } => query::sorted(&output, &project, tie_break)?,
        Commands::Ready { project } => query::ready(&output, &project)?,
        Commands::Blocked { project } => query::blocked(&output, &project)?,
        Commands::Order { file, tie_break } => query::order_file(&output, &file, tie_break)?,
    }

    output.verbose_ctx("main", "Command completed successfully");
    Ok(())
}
