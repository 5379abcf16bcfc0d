//! Workspace management
//!
//! Handles workspace initialization and provides the project and task
//! operations the CLI is built on. Every write is validated against the
//! project's current snapshot before it reaches disk.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, info};

use super::{Config, ProjectStore, TaskStore};
use crate::domain::{
    order_graph, DependencyGraph, Priority, Project, ProjectId, Task, TaskId, TieBreak,
};

/// Name of the directory that marks a workspace root
pub const WORKSPACE_DIR: &str = ".taskorder";

#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("Not in a taskorder workspace. Run 'taskorder init' first.")]
    NotInWorkspace,

    #[error("Project not found: {0}")]
    ProjectNotFound(ProjectId),

    #[error("Task not found: {0}")]
    TaskNotFound(TaskId),

    #[error("Some dependent tasks not found: {}", join_ids(.0))]
    MissingDependencies(Vec<TaskId>),

    #[error("Task {task} is a prerequisite of {}", join_ids(.dependents))]
    HasDependents { task: TaskId, dependents: Vec<TaskId> },
}

fn join_ids(ids: &[TaskId]) -> String {
    ids.iter()
        .map(|id| id.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Input for [`Workspace::add_task`]
#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    /// Overrides the value implied by `priority`
    pub priority_value: Option<i32>,
    pub depends_on: Vec<TaskId>,
    pub due_date: Option<DateTime<Utc>>,
}

impl NewTask {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }
}

/// A taskorder workspace
pub struct Workspace {
    root: PathBuf,
    config: Config,
}

impl Workspace {
    /// Opens an existing workspace at the given path
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();

        if !root.join(WORKSPACE_DIR).is_dir() {
            return Err(WorkspaceError::NotInWorkspace.into());
        }

        let config = Config::for_workspace(&root)?;

        Ok(Self { root, config })
    }

    /// Opens the workspace at the current directory or a parent
    pub fn open_current() -> Result<Self> {
        let root = Config::find_workspace_root().ok_or(WorkspaceError::NotInWorkspace)?;

        Self::open(root)
    }

    /// Initializes a new workspace at the given path
    ///
    /// Existing files are left untouched, so running it twice is harmless.
    pub fn init(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let dir = root.join(WORKSPACE_DIR);

        fs::create_dir_all(&dir).with_context(|| {
            format!("Failed to create {} directory: {}", WORKSPACE_DIR, dir.display())
        })?;

        let config_path = dir.join("config.toml");
        if !config_path.exists() {
            let default_config = r#"# taskorder workspace configuration

[ordering]
# How tasks without a dependency between them are ranked:
#   "priority_override"  sort the whole order by priority (a high-priority
#                        task may move ahead of its prerequisite)
#   "stable"             sort by priority only where no dependency is crossed
tie_break = "priority_override"
"#;
            fs::write(&config_path, default_config)
                .with_context(|| format!("Failed to write config: {}", config_path.display()))?;
        }

        let gitignore_path = dir.join(".gitignore");
        if !gitignore_path.exists() {
            let gitignore = r#"# Ignore interrupted atomic writes
*.tmp
"#;
            fs::write(&gitignore_path, gitignore).with_context(|| {
                format!("Failed to write .gitignore: {}", gitignore_path.display())
            })?;
        }

        info!(root = %root.display(), "initialized workspace");

        Self::open(root)
    }

    /// Returns the workspace root path
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the .taskorder directory path
    pub fn dir(&self) -> PathBuf {
        self.root.join(WORKSPACE_DIR)
    }

    /// Returns the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Persists a new default tie-break policy for this workspace
    pub fn set_tie_break(&mut self, tie_break: TieBreak) -> Result<()> {
        self.config.workspace.ordering.tie_break = tie_break;
        self.config.save_workspace()?;
        info!(tie_break = %tie_break, "updated workspace tie-break");
        Ok(())
    }

    /// Returns the task store
    pub fn task_store(&self) -> TaskStore {
        TaskStore::for_workspace(&self.root)
    }

    /// Returns the project store
    pub fn project_store(&self) -> ProjectStore {
        ProjectStore::for_workspace(&self.root)
    }

    // ---- projects ----

    /// Creates and stores a new project
    pub fn create_project(&self, name: &str) -> Result<Project> {
        let name = name.trim();
        if name.is_empty() {
            anyhow::bail!("Project name must not be empty");
        }

        let project = Project::new(name);
        self.project_store().append(&project)?;
        info!(project = %project.id, "created project");
        Ok(project)
    }

    /// Lists all projects in creation order
    pub fn projects(&self) -> Result<Vec<Project>> {
        self.project_store().read_all()
    }

    /// Looks up a project, failing if it does not exist
    pub fn require_project(&self, id: &ProjectId) -> Result<Project> {
        self.project_store()
            .get(id)?
            .ok_or_else(|| WorkspaceError::ProjectNotFound(id.clone()).into())
    }

    // ---- tasks ----

    /// Returns the task snapshot of a project in stored order
    pub fn project_tasks(&self, project_id: &ProjectId) -> Result<Vec<Task>> {
        self.require_project(project_id)?;
        self.task_store().read_for_project(project_id)
    }

    /// Returns every task, optionally restricted to one project
    pub fn tasks(&self, project_id: Option<&ProjectId>) -> Result<Vec<Task>> {
        match project_id {
            Some(id) => self.project_tasks(id),
            None => self.task_store().read_all(),
        }
    }

    /// Looks up a task, failing if it does not exist
    pub fn require_task(&self, id: &TaskId) -> Result<Task> {
        self.task_store()
            .get(id)?
            .ok_or_else(|| WorkspaceError::TaskNotFound(id.clone()).into())
    }

    /// Validates and stores a new task in `project_id`
    ///
    /// Every prerequisite must already exist in the same project.
    pub fn add_task(&self, project_id: &ProjectId, new: NewTask) -> Result<Task> {
        let mut tasks = self.project_tasks(project_id)?;

        let missing: Vec<TaskId> = new
            .depends_on
            .iter()
            .filter(|dep| !tasks.iter().any(|t| &t.id == *dep))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(WorkspaceError::MissingDependencies(missing).into());
        }

        let mut task = Task::new(project_id.clone(), new.title.trim())
            .with_priority(new.priority.unwrap_or_default())
            .with_dependencies(new.depends_on);
        if let Some(value) = new.priority_value {
            task.set_priority_value(value);
        }
        if let Some(description) = new.description {
            task.set_description(description);
        }
        task.due_date = new.due_date;
        task.validate()?;

        // A fresh task has no dependents, but the snapshot itself must stay orderable
        tasks.push(task.clone());
        let graph = DependencyGraph::from_tasks(&tasks)?;
        if graph.has_cycle() {
            anyhow::bail!("Project {} already contains a circular dependency", project_id);
        }

        self.task_store().append(&task)?;
        debug!(task = %task.id, project = %project_id, "added task");
        Ok(task)
    }

    /// Applies `change` to a stored task and writes it back
    fn modify_task(&self, id: &TaskId, change: impl FnOnce(&mut Task)) -> Result<Task> {
        let mut task = self.require_task(id)?;
        change(&mut task);
        self.task_store().update(&task)?;
        Ok(task)
    }

    /// Sets a task's named priority
    pub fn set_priority(&self, id: &TaskId, priority: Priority) -> Result<Task> {
        self.modify_task(id, |task| task.set_priority(priority))
    }

    /// Sets a task's raw priority value
    pub fn set_priority_value(&self, id: &TaskId, value: i32) -> Result<Task> {
        self.modify_task(id, |task| task.set_priority_value(value))
    }

    /// Marks a task in progress
    pub fn start_task(&self, id: &TaskId) -> Result<Task> {
        self.modify_task(id, Task::start)
    }

    /// Marks a task done
    pub fn complete_task(&self, id: &TaskId) -> Result<Task> {
        self.modify_task(id, Task::complete)
    }

    /// Makes `task` wait on `depends_on`
    ///
    /// Rejects self-dependencies, prerequisites outside the task's project,
    /// and edges that would close a cycle. Returns false if the dependency
    /// already existed.
    pub fn add_dependency(&self, task_id: &TaskId, depends_on: &TaskId) -> Result<bool> {
        let mut task = self.require_task(task_id)?;
        let tasks = self.task_store().read_for_project(&task.project_id)?;

        if !tasks.iter().any(|t| &t.id == depends_on) {
            return Err(WorkspaceError::MissingDependencies(vec![depends_on.clone()]).into());
        }

        DependencyGraph::from_tasks(&tasks)?.check_dependency(task_id, depends_on)?;

        let added = task.add_dependency(depends_on.clone());
        if added {
            self.task_store().update(&task)?;
            debug!(task = %task_id, depends_on = %depends_on, "added dependency");
        }
        Ok(added)
    }

    /// Removes a dependency. Returns false if it did not exist.
    pub fn remove_dependency(&self, task_id: &TaskId, depends_on: &TaskId) -> Result<bool> {
        let mut task = self.require_task(task_id)?;
        let removed = task.remove_dependency(depends_on);
        if removed {
            self.task_store().update(&task)?;
            debug!(task = %task_id, depends_on = %depends_on, "removed dependency");
        }
        Ok(removed)
    }

    /// Deletes a task that no other task depends on
    pub fn remove_task(&self, id: &TaskId) -> Result<Task> {
        let task = self.require_task(id)?;

        let tasks = self.task_store().read_for_project(&task.project_id)?;
        let dependents: Vec<TaskId> = DependencyGraph::from_tasks(&tasks)?
            .dependents(id)
            .into_iter()
            .cloned()
            .collect();
        if !dependents.is_empty() {
            return Err(WorkspaceError::HasDependents {
                task: id.clone(),
                dependents,
            }
            .into());
        }

        self.task_store().remove(id)?;
        info!(task = %id, "removed task");
        Ok(task)
    }

    // ---- ordering ----

    /// Orders a project's tasks, falling back to the configured policy
    pub fn sorted_tasks(
        &self,
        project_id: &ProjectId,
        tie_break: Option<TieBreak>,
    ) -> Result<Vec<Task>> {
        let tasks = self.project_tasks(project_id)?;
        let tie_break = tie_break.unwrap_or_else(|| self.config.tie_break());

        let graph = DependencyGraph::from_tasks(&tasks)?;
        let ordered = order_graph(&graph, tie_break)?;
        Ok(ordered.into_iter().cloned().collect())
    }

    /// Returns the open tasks whose prerequisites are all done
    pub fn ready_tasks(&self, project_id: &ProjectId) -> Result<Vec<Task>> {
        let tasks = self.project_tasks(project_id)?;
        let graph = DependencyGraph::from_tasks(&tasks)?;
        Ok(graph.ready_tasks().into_iter().cloned().collect())
    }

    /// Returns the open tasks still waiting, with their unfinished prerequisites
    pub fn blocked_tasks(&self, project_id: &ProjectId) -> Result<Vec<(Task, Vec<TaskId>)>> {
        let tasks = self.project_tasks(project_id)?;
        let graph = DependencyGraph::from_tasks(&tasks)?;
        Ok(graph
            .blocked_tasks()
            .into_iter()
            .map(|(task, waiting)| (task.clone(), waiting.into_iter().cloned().collect()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{GraphError, OrderError, TaskStatus};
    use tempfile::TempDir;

    fn setup() -> (TempDir, Workspace, Project) {
        let dir = TempDir::new().unwrap();
        let ws = Workspace::init(dir.path()).unwrap();
        let project = ws.create_project("Website").unwrap();
        (dir, ws, project)
    }

    fn add(ws: &Workspace, project: &Project, title: &str, priority: Priority, deps: &[&Task]) -> Task {
        let new = NewTask {
            priority: Some(priority),
            depends_on: deps.iter().map(|t| t.id.clone()).collect(),
            ..NewTask::new(title)
        };
        ws.add_task(&project.id, new).unwrap()
    }

    fn titles(tasks: &[Task]) -> Vec<&str> {
        tasks.iter().map(|t| t.title.as_str()).collect()
    }

    #[test]
    fn init_creates_structure() {
        let dir = TempDir::new().unwrap();
        let ws = Workspace::init(dir.path()).unwrap();

        assert!(ws.dir().is_dir());
        assert!(ws.dir().join("config.toml").exists());
        assert!(ws.dir().join(".gitignore").exists());
        assert_eq!(ws.config().tie_break(), TieBreak::PriorityOverride);
    }

    #[test]
    fn init_twice_keeps_config() {
        let dir = TempDir::new().unwrap();
        Workspace::init(dir.path()).unwrap();
        let config_path = dir.path().join(WORKSPACE_DIR).join("config.toml");
        fs::write(&config_path, "[ordering]\ntie_break = \"stable\"\n").unwrap();

        let ws = Workspace::init(dir.path()).unwrap();
        assert_eq!(ws.config().tie_break(), TieBreak::Stable);
    }

    #[test]
    fn set_tie_break_persists() {
        let dir = TempDir::new().unwrap();
        let mut ws = Workspace::init(dir.path()).unwrap();
        ws.set_tie_break(TieBreak::Stable).unwrap();

        let reopened = Workspace::open(dir.path()).unwrap();
        assert_eq!(reopened.config().tie_break(), TieBreak::Stable);
    }

    #[test]
    fn open_fails_outside_workspace() {
        let dir = TempDir::new().unwrap();
        let err = Workspace::open(dir.path()).err().unwrap();
        assert!(err.to_string().contains("taskorder init"));
    }

    #[test]
    fn create_and_list_projects() {
        let (_dir, ws, project) = setup();
        let second = ws.create_project("Backend").unwrap();

        let projects = ws.projects().unwrap();
        assert_eq!(projects, vec![project, second]);
        assert!(ws.create_project("   ").is_err());
    }

    #[test]
    fn add_task_to_unknown_project() {
        let (_dir, ws, _project) = setup();
        let err = ws
            .add_task(&"p-missing".parse().unwrap(), NewTask::new("orphan"))
            .unwrap_err();
        assert!(err.to_string().contains("Project not found"));
    }

    #[test]
    fn add_task_with_missing_dependency() {
        let (_dir, ws, project) = setup();
        let new = NewTask {
            depends_on: vec!["t-nothere".parse().unwrap()],
            ..NewTask::new("task")
        };

        let err = ws.add_task(&project.id, new).unwrap_err();
        assert!(err.to_string().contains("Some dependent tasks not found"));
        assert!(ws.project_tasks(&project.id).unwrap().is_empty());
    }

    #[test]
    fn add_task_rejects_dependency_in_other_project() {
        let (_dir, ws, project) = setup();
        let other = ws.create_project("Other").unwrap();
        let foreign = add(&ws, &other, "foreign", Priority::Medium, &[]);

        let new = NewTask {
            depends_on: vec![foreign.id.clone()],
            ..NewTask::new("task")
        };
        assert!(ws.add_task(&project.id, new).is_err());
    }

    #[test]
    fn add_task_validates_title() {
        let (_dir, ws, project) = setup();
        assert!(ws.add_task(&project.id, NewTask::new("")).is_err());
        assert!(ws.add_task(&project.id, NewTask::new("x".repeat(151))).is_err());
    }

    #[test]
    fn add_task_with_priority_value() {
        let (_dir, ws, project) = setup();
        let new = NewTask {
            priority_value: Some(7),
            ..NewTask::new("urgent")
        };

        let task = ws.add_task(&project.id, new).unwrap();
        assert_eq!(task.priority_value, 7);
        assert_eq!(task.priority, Priority::High);
    }

    #[test]
    fn sorted_tasks_default_policy() {
        let (_dir, ws, project) = setup();
        let a = add(&ws, &project, "A", Priority::Low, &[]);
        add(&ws, &project, "B", Priority::Medium, &[&a]);
        add(&ws, &project, "C", Priority::High, &[&a]);

        let sorted = ws.sorted_tasks(&project.id, None).unwrap();
        assert_eq!(titles(&sorted), vec!["C", "B", "A"]);
    }

    #[test]
    fn sorted_tasks_stable_policy() {
        let (_dir, ws, project) = setup();
        let y = add(&ws, &project, "Y", Priority::Low, &[]);
        add(&ws, &project, "X", Priority::High, &[&y]);

        let sorted = ws.sorted_tasks(&project.id, Some(TieBreak::Stable)).unwrap();
        assert_eq!(titles(&sorted), vec!["Y", "X"]);

        let sorted = ws.sorted_tasks(&project.id, None).unwrap();
        assert_eq!(titles(&sorted), vec!["X", "Y"]);
    }

    #[test]
    fn sorted_tasks_empty_project() {
        let (_dir, ws, project) = setup();
        assert!(ws.sorted_tasks(&project.id, None).unwrap().is_empty());
    }

    #[test]
    fn sorted_tasks_only_include_project() {
        let (_dir, ws, project) = setup();
        let other = ws.create_project("Other").unwrap();
        add(&ws, &project, "mine", Priority::Medium, &[]);
        add(&ws, &other, "theirs", Priority::High, &[]);

        let sorted = ws.sorted_tasks(&project.id, None).unwrap();
        assert_eq!(titles(&sorted), vec!["mine"]);
    }

    #[test]
    fn sorted_tasks_reports_hand_edited_cycle() {
        let (_dir, ws, project) = setup();
        let a = add(&ws, &project, "A", Priority::Medium, &[]);
        let b = add(&ws, &project, "B", Priority::Medium, &[&a]);

        // Bypass write-time checks the way a hand edit would
        let mut a_cycle = a.clone();
        a_cycle.add_dependency(b.id.clone());
        ws.task_store().update(&a_cycle).unwrap();

        let err = ws.sorted_tasks(&project.id, None).unwrap_err();
        let order_err = err.downcast_ref::<OrderError>().unwrap();
        assert_eq!(order_err.task_id(), Some(&a.id));
    }

    #[test]
    fn sorted_tasks_reports_hand_edited_dangling() {
        let (_dir, ws, project) = setup();
        let mut a = add(&ws, &project, "A", Priority::Medium, &[]);
        a.add_dependency("t-ghost".parse().unwrap());
        ws.task_store().update(&a).unwrap();

        let err = ws.sorted_tasks(&project.id, None).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<GraphError>(),
            Some(GraphError::DanglingDependency { .. })
        ));
    }

    #[test]
    fn add_dependency_rejects_cycle() {
        let (_dir, ws, project) = setup();
        let a = add(&ws, &project, "A", Priority::Medium, &[]);
        let b = add(&ws, &project, "B", Priority::Medium, &[&a]);

        let err = ws.add_dependency(&a.id, &b.id).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<GraphError>(),
            Some(GraphError::CycleDetected(_, _))
        ));
        assert!(ws.require_task(&a.id).unwrap().depends_on.is_empty());
    }

    #[test]
    fn add_dependency_rejects_self() {
        let (_dir, ws, project) = setup();
        let a = add(&ws, &project, "A", Priority::Medium, &[]);

        let err = ws.add_dependency(&a.id, &a.id).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<GraphError>(),
            Some(GraphError::SelfDependency(_))
        ));
    }

    #[test]
    fn add_and_remove_dependency() {
        let (_dir, ws, project) = setup();
        let a = add(&ws, &project, "A", Priority::Medium, &[]);
        let b = add(&ws, &project, "B", Priority::Medium, &[]);

        assert!(ws.add_dependency(&b.id, &a.id).unwrap());
        assert!(!ws.add_dependency(&b.id, &a.id).unwrap());
        assert_eq!(ws.require_task(&b.id).unwrap().depends_on, vec![a.id.clone()]);

        assert!(ws.remove_dependency(&b.id, &a.id).unwrap());
        assert!(!ws.remove_dependency(&b.id, &a.id).unwrap());
    }

    #[test]
    fn remove_task_with_dependents_fails() {
        let (_dir, ws, project) = setup();
        let a = add(&ws, &project, "A", Priority::Medium, &[]);
        let b = add(&ws, &project, "B", Priority::Medium, &[&a]);

        let err = ws.remove_task(&a.id).unwrap_err();
        assert!(err.to_string().contains(b.id.as_str()));

        ws.remove_task(&b.id).unwrap();
        ws.remove_task(&a.id).unwrap();
        assert!(ws.project_tasks(&project.id).unwrap().is_empty());
    }

    #[test]
    fn remove_task_lists_every_dependent() {
        let (_dir, ws, project) = setup();
        let a = add(&ws, &project, "A", Priority::Medium, &[]);
        let b = add(&ws, &project, "B", Priority::Medium, &[&a]);
        let c = add(&ws, &project, "C", Priority::Medium, &[&a]);

        let err = ws.remove_task(&a.id).unwrap_err();
        assert_eq!(
            err.to_string(),
            format!("Task {} is a prerequisite of {}, {}", a.id, b.id, c.id)
        );
    }

    #[test]
    fn status_and_priority_updates() {
        let (_dir, ws, project) = setup();
        let a = add(&ws, &project, "A", Priority::Low, &[]);

        assert_eq!(ws.start_task(&a.id).unwrap().status, TaskStatus::InProgress);
        assert_eq!(ws.complete_task(&a.id).unwrap().status, TaskStatus::Done);

        let updated = ws.set_priority(&a.id, Priority::High).unwrap();
        assert_eq!(updated.priority_value, 3);

        let updated = ws.set_priority_value(&a.id, 10).unwrap();
        assert_eq!(updated.priority_value, 10);
        assert_eq!(ws.require_task(&a.id).unwrap().priority_value, 10);
    }

    #[test]
    fn ready_and_blocked() {
        let (_dir, ws, project) = setup();
        let a = add(&ws, &project, "A", Priority::Medium, &[]);
        let b = add(&ws, &project, "B", Priority::Medium, &[&a]);

        let ready = ws.ready_tasks(&project.id).unwrap();
        assert_eq!(titles(&ready), vec!["A"]);

        let blocked = ws.blocked_tasks(&project.id).unwrap();
        assert_eq!(blocked.len(), 1);
        assert_eq!(blocked[0].0.id, b.id);
        assert_eq!(blocked[0].1, vec![a.id.clone()]);

        ws.complete_task(&a.id).unwrap();
        let ready = ws.ready_tasks(&project.id).unwrap();
        assert_eq!(titles(&ready), vec!["B"]);
        assert!(ws.blocked_tasks(&project.id).unwrap().is_empty());
    }
}
