//! Project CLI commands

use anyhow::Result;
use clap::Subcommand;

use super::output::Output;
use crate::storage::Workspace;

#[derive(Subcommand)]
pub enum ProjectCommands {
    /// Create a project
    New {
        /// Project name
        name: String,
    },

    /// List projects
    List,
}

pub fn run(cmd: ProjectCommands, output: &Output) -> Result<()> {
    match cmd {
        ProjectCommands::New { name } => new_project(output, &name),
        ProjectCommands::List => list_projects(output),
    }
}

fn new_project(output: &Output, name: &str) -> Result<()> {
    let workspace = Workspace::open_current()?;
    let project = workspace.create_project(name)?;

    if output.is_json() {
        output.data(&project);
    } else {
        output.success(&format!("Created project: {} - {}", project.id, project.name));
    }

    Ok(())
}

fn list_projects(output: &Output) -> Result<()> {
    let workspace = Workspace::open_current()?;
    let projects = workspace.projects()?;
    let tasks = workspace.task_store().read_all()?;

    if output.is_json() {
        let items: Vec<_> = projects
            .iter()
            .map(|p| {
                serde_json::json!({
                    "id": p.id,
                    "name": p.name,
                    "created_at": p.created_at,
                    "tasks": tasks.iter().filter(|t| t.project_id == p.id).count(),
                })
            })
            .collect();
        output.data(&items);
    } else if projects.is_empty() {
        println!("No projects");
    } else {
        println!("{:<12} {:<6} NAME", "ID", "TASKS");
        println!("{}", "-".repeat(60));
        for project in &projects {
            let count = tasks.iter().filter(|t| t.project_id == project.id).count();
            println!("{:<12} {:<6} {}", project.id, count, project.name);
        }
    }

    Ok(())
}
