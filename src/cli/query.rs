//! Query commands (sorted, ready, blocked, order)

use std::fs;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};

use super::output::Output;
use super::task::task_json;
use crate::domain::{order_tasks, ProjectId, Task, TieBreak};
use crate::storage::{Config, Workspace};

/// Show a project's tasks in execution order
pub fn sorted(output: &Output, project: &ProjectId, tie_break: Option<TieBreak>) -> Result<()> {
    let workspace = Workspace::open_current()?;
    let tie_break = tie_break.unwrap_or_else(|| workspace.config().tie_break());
    output.verbose_ctx(
        "sorted",
        &format!("Ordering project {} with tie-break {}", project, tie_break),
    );

    let tasks = workspace.sorted_tasks(project, Some(tie_break))?;
    print_order(output, &tasks.iter().collect::<Vec<_>>());

    Ok(())
}

/// Order a task snapshot read from a JSON file (or stdin for `-`)
pub fn order_file(output: &Output, file: &Path, tie_break: Option<TieBreak>) -> Result<()> {
    let content = if file == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read snapshot from stdin")?;
        buf
    } else {
        fs::read_to_string(file)
            .with_context(|| format!("Failed to read snapshot: {}", file.display()))?
    };

    let tasks: Vec<Task> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse snapshot: {}", file.display()))?;

    // Outside a workspace the built-in default applies
    let tie_break = match tie_break {
        Some(tie_break) => tie_break,
        None => Config::load()?.tie_break(),
    };
    output.verbose_ctx(
        "order",
        &format!("Ordering {} tasks with tie-break {}", tasks.len(), tie_break),
    );

    let ordered = order_tasks(&tasks, tie_break)?;
    print_order(output, &ordered);

    Ok(())
}

fn print_order(output: &Output, tasks: &[&Task]) {
    if output.is_json() {
        let items: Vec<_> = tasks
            .iter()
            .enumerate()
            .map(|(pos, task)| {
                let mut value = task_json(task);
                value["position"] = serde_json::json!(pos + 1);
                value
            })
            .collect();
        output.data(&items);
    } else if tasks.is_empty() {
        println!("No tasks to order.");
    } else {
        println!("{:<4} {:<12} {:<8} TITLE", "#", "ID", "PRIORITY");
        println!("{}", "-".repeat(60));
        for (pos, task) in tasks.iter().enumerate() {
            println!(
                "{:<4} {:<12} {:<8} {}",
                pos + 1,
                task.id,
                task.priority,
                task.title
            );
        }
    }
}

/// Show tasks ready to work on
pub fn ready(output: &Output, project: &ProjectId) -> Result<()> {
    let workspace = Workspace::open_current()?;
    output.verbose_ctx(
        "ready",
        &format!("Opened workspace at: {}", workspace.root().display()),
    );

    let ready_tasks = workspace.ready_tasks(project)?;
    output.verbose_ctx("ready", &format!("Found {} ready tasks", ready_tasks.len()));

    if output.is_json() {
        let items: Vec<_> = ready_tasks.iter().map(task_json).collect();
        output.data(&items);
    } else if ready_tasks.is_empty() {
        println!("No tasks ready to work on.");
    } else {
        println!("Ready tasks ({}):", ready_tasks.len());
        println!("{:<12} {:<8} TITLE", "ID", "PRIORITY");
        println!("{}", "-".repeat(60));
        for task in &ready_tasks {
            println!("{:<12} {:<8} {}", task.id, task.priority, task.title);
        }
    }

    Ok(())
}

/// Show blocked tasks
pub fn blocked(output: &Output, project: &ProjectId) -> Result<()> {
    let workspace = Workspace::open_current()?;
    output.verbose_ctx(
        "blocked",
        &format!("Opened workspace at: {}", workspace.root().display()),
    );

    let blocked_tasks = workspace.blocked_tasks(project)?;
    output.verbose_ctx(
        "blocked",
        &format!("Found {} blocked tasks", blocked_tasks.len()),
    );

    if output.is_json() {
        let items: Vec<_> = blocked_tasks
            .iter()
            .map(|(task, blockers)| {
                serde_json::json!({
                    "id": task.id,
                    "title": task.title,
                    "blocked_by": blockers,
                })
            })
            .collect();
        output.data(&items);
    } else if blocked_tasks.is_empty() {
        println!("No blocked tasks.");
    } else {
        println!("Blocked tasks ({}):", blocked_tasks.len());
        println!("{:<12} {:<30} BLOCKED BY", "ID", "TITLE");
        println!("{}", "-".repeat(80));
        for (task, blockers) in &blocked_tasks {
            let blockers: Vec<&str> = blockers.iter().map(|b| b.as_str()).collect();
            println!("{:<12} {:<30} {}", task.id, task.title, blockers.join(", "));
        }
    }

    Ok(())
}
