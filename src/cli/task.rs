//! Task CLI commands

use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::Subcommand;

use super::output::Output;
use crate::domain::{Priority, ProjectId, Task, TaskId};
use crate::storage::{NewTask, Workspace};

#[derive(Subcommand)]
pub enum TaskCommands {
    /// Add a task to a project
    ///
    /// Examples:
    ///   taskorder task add p-1a2b3c4 "Design schema" --priority HIGH
    ///   taskorder task add p-1a2b3c4 "Build API" --depends-on t-5d6e7f8
    Add {
        /// Project ID
        project: ProjectId,

        /// Task title
        title: String,

        /// Priority level (LOW, MEDIUM, HIGH)
        #[arg(long, short)]
        priority: Option<Priority>,

        /// Raw priority value; higher runs earlier
        #[arg(long, conflicts_with = "priority", allow_negative_numbers = true)]
        priority_value: Option<i32>,

        /// Task that must be completed first (repeatable)
        #[arg(long = "depends-on", short = 'd')]
        depends_on: Vec<TaskId>,

        /// Longer description
        #[arg(long)]
        description: Option<String>,

        /// Due date (RFC 3339, e.g. 2026-01-31T17:00:00Z)
        #[arg(long)]
        due: Option<DateTime<Utc>>,
    },

    /// List tasks in stored order
    List {
        /// Only tasks of this project
        #[arg(long)]
        project: Option<ProjectId>,
    },

    /// Show task details
    Show {
        /// Task ID
        id: TaskId,
    },

    /// Mark task as in progress
    Start {
        /// Task ID
        id: TaskId,
    },

    /// Mark task as done
    Done {
        /// Task ID
        id: TaskId,
    },

    /// Change a task's priority
    Priority {
        /// Task ID
        id: TaskId,

        /// LOW, MEDIUM, HIGH, or an integer value
        #[arg(allow_negative_numbers = true)]
        level: String,
    },

    /// Add a dependency between tasks
    Dep {
        /// Task that will be blocked
        task: TaskId,

        /// Task that must be completed first
        depends_on: TaskId,
    },

    /// Remove a dependency
    Undep {
        /// Task to unblock
        task: TaskId,

        /// Dependency to remove
        depends_on: TaskId,
    },

    /// Delete a task nothing depends on
    Remove {
        /// Task ID
        id: TaskId,
    },
}

pub fn run(cmd: TaskCommands, output: &Output) -> Result<()> {
    match cmd {
        TaskCommands::Add {
            project,
            title,
            priority,
            priority_value,
            depends_on,
            description,
            due,
        } => {
            let new = NewTask {
                title,
                description,
                priority,
                priority_value,
                depends_on,
                due_date: due,
            };
            add_task(output, &project, new)
        }
        TaskCommands::List { project } => list_tasks(output, project.as_ref()),
        TaskCommands::Show { id } => show_task(output, &id),
        TaskCommands::Start { id } => start_task(output, &id),
        TaskCommands::Done { id } => complete_task(output, &id),
        TaskCommands::Priority { id, level } => set_priority(output, &id, &level),
        TaskCommands::Dep { task, depends_on } => add_dependency(output, &task, &depends_on),
        TaskCommands::Undep { task, depends_on } => remove_dependency(output, &task, &depends_on),
        TaskCommands::Remove { id } => remove_task(output, &id),
    }
}

/// JSON shape shared by the task commands
pub(crate) fn task_json(task: &Task) -> serde_json::Value {
    serde_json::json!({
        "id": task.id,
        "project_id": task.project_id,
        "title": task.title,
        "priority": task.priority.as_str(),
        "priority_value": task.priority_value,
        "status": task.status,
        "depends_on": task.depends_on,
    })
}

fn add_task(output: &Output, project: &ProjectId, new: NewTask) -> Result<()> {
    let workspace = Workspace::open_current()?;
    output.verbose_ctx("task add", &format!("Adding task to project {}", project));

    let task = workspace.add_task(project, new)?;

    if output.is_json() {
        output.data(&task_json(&task));
    } else {
        output.success(&format!("Created task: {} - {}", task.id, task.title));
    }

    Ok(())
}

fn list_tasks(output: &Output, project: Option<&ProjectId>) -> Result<()> {
    let workspace = Workspace::open_current()?;
    let tasks = workspace.tasks(project)?;

    if output.is_json() {
        let items: Vec<_> = tasks.iter().map(task_json).collect();
        output.data(&items);
    } else if tasks.is_empty() {
        match project {
            Some(project) => println!("No tasks for project {}", project),
            None => println!("No tasks"),
        }
    } else {
        println!("{:<12} {:<12} {:<8} TITLE", "ID", "STATUS", "PRIORITY");
        println!("{}", "-".repeat(60));
        for task in &tasks {
            println!(
                "{:<12} {:<12} {:<8} {}",
                task.id,
                task.status.as_str(),
                task.priority,
                task.title
            );
        }
    }

    Ok(())
}

fn show_task(output: &Output, id: &TaskId) -> Result<()> {
    let workspace = Workspace::open_current()?;
    let task = workspace.require_task(id)?;
    let siblings = workspace.task_store().read_for_project(&task.project_id)?;

    let dependents: Vec<&TaskId> = siblings
        .iter()
        .filter(|t| t.depends_on(id))
        .map(|t| &t.id)
        .collect();
    let waiting_on: Vec<&TaskId> = task
        .depends_on
        .iter()
        .filter(|dep| {
            siblings
                .iter()
                .find(|t| &&t.id == dep)
                .map_or(true, |t| !t.status.is_complete())
        })
        .collect();
    let is_ready = !task.status.is_complete() && waiting_on.is_empty();

    if output.is_json() {
        let mut value = task_json(&task);
        value["description"] = serde_json::json!(task.description);
        value["due_date"] = serde_json::json!(task.due_date);
        value["created_at"] = serde_json::json!(task.created_at);
        value["updated_at"] = serde_json::json!(task.updated_at);
        value["dependents"] = serde_json::json!(dependents);
        value["is_ready"] = serde_json::json!(is_ready);
        output.data(&value);
    } else {
        println!("Task: {}", task.id);
        println!("Title: {}", task.title);
        println!("Project: {}", task.project_id);
        println!("Status: {}", task.status.as_str());
        println!("Priority: {} ({})", task.priority, task.priority_value);
        if let Some(due) = task.due_date {
            println!("Due: {}", due.format("%Y-%m-%d %H:%M"));
        }
        println!("Created: {}", task.created_at.format("%Y-%m-%d %H:%M"));
        println!("Updated: {}", task.updated_at.format("%Y-%m-%d %H:%M"));

        if !task.depends_on.is_empty() {
            println!("\nDepends on:");
            for dep in &task.depends_on {
                let dep_status = siblings
                    .iter()
                    .find(|t| &t.id == dep)
                    .map(|t| t.status.as_str())
                    .unwrap_or("?");
                println!("  {} ({})", dep, dep_status);
            }
        }

        if !dependents.is_empty() {
            println!("\nRequired by:");
            for dependent in &dependents {
                println!("  {}", dependent);
            }
        }

        if let Some(desc) = &task.description {
            println!("\nDescription:");
            println!("{}", desc);
        }

        println!();
        if is_ready {
            println!("Status: READY (all dependencies complete)");
        } else if !waiting_on.is_empty() {
            println!("Status: BLOCKED (waiting on dependencies)");
        }
    }

    Ok(())
}

fn start_task(output: &Output, id: &TaskId) -> Result<()> {
    let workspace = Workspace::open_current()?;
    let task = workspace.start_task(id)?;

    if output.is_json() {
        output.data(&serde_json::json!({
            "id": task.id,
            "status": task.status,
        }));
    } else {
        output.success(&format!("Started task: {}", task.id));
    }

    Ok(())
}

fn complete_task(output: &Output, id: &TaskId) -> Result<()> {
    let workspace = Workspace::open_current()?;
    let task = workspace.complete_task(id)?;

    if output.is_json() {
        output.data(&serde_json::json!({
            "id": task.id,
            "status": task.status,
        }));
    } else {
        output.success(&format!("Completed task: {}", task.id));
    }

    Ok(())
}

fn set_priority(output: &Output, id: &TaskId, level: &str) -> Result<()> {
    let workspace = Workspace::open_current()?;

    // Integers set the raw value; anything else must name a level
    let task = match level.trim().parse::<i32>() {
        Ok(value) => workspace.set_priority_value(id, value)?,
        Err(_) => workspace.set_priority(id, level.parse::<Priority>()?)?,
    };

    if output.is_json() {
        output.data(&task_json(&task));
    } else {
        output.success(&format!(
            "Set priority of {} to {} ({})",
            task.id, task.priority, task.priority_value
        ));
    }

    Ok(())
}

fn add_dependency(output: &Output, task_id: &TaskId, depends_on: &TaskId) -> Result<()> {
    let workspace = Workspace::open_current()?;
    let added = workspace.add_dependency(task_id, depends_on)?;

    if output.is_json() {
        output.data(&serde_json::json!({
            "task": task_id,
            "depends_on": depends_on,
            "added": added,
        }));
    } else if added {
        output.success(&format!("{} now depends on {}", task_id, depends_on));
    } else {
        output.success(&format!("{} already depends on {}", task_id, depends_on));
    }

    Ok(())
}

fn remove_dependency(output: &Output, task_id: &TaskId, depends_on: &TaskId) -> Result<()> {
    let workspace = Workspace::open_current()?;
    let removed = workspace.remove_dependency(task_id, depends_on)?;

    if output.is_json() {
        output.data(&serde_json::json!({
            "task": task_id,
            "depends_on": depends_on,
            "removed": removed,
        }));
    } else if removed {
        output.success(&format!("{} no longer depends on {}", task_id, depends_on));
    } else {
        output.success(&format!("{} did not depend on {}", task_id, depends_on));
    }

    Ok(())
}

fn remove_task(output: &Output, id: &TaskId) -> Result<()> {
    let workspace = Workspace::open_current()?;
    let task = workspace.remove_task(id)?;

    if output.is_json() {
        output.data(&serde_json::json!({
            "id": task.id,
            "removed": true,
        }));
    } else {
        output.success(&format!("Removed task: {} - {}", task.id, task.title));
    }

    Ok(())
}
