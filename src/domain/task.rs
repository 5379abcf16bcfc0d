//! Task and project domain models
//!
//! Tasks are the units of work within a project. Each task carries a named
//! priority level and the integer value the ordering engine ranks by, plus
//! an ordered list of prerequisite tasks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use super::id::{ProjectId, TaskId};

/// Maximum title length accepted for new tasks
pub const MAX_TITLE_LEN: usize = 150;

/// Maximum description length accepted for new tasks
pub const MAX_DESCRIPTION_LEN: usize = 1000;

#[derive(Debug, Error, PartialEq)]
pub enum TaskError {
    #[error("Task title must not be empty")]
    EmptyTitle,

    #[error("Task title is {0} characters, maximum is 150")]
    TitleTooLong(usize),

    #[error("Task description is {0} characters, maximum is 1000")]
    DescriptionTooLong(usize),

    #[error("Unknown priority '{0}': expected LOW, MEDIUM or HIGH")]
    UnknownPriority(String),

    #[error("Unknown status '{0}': expected TODO, IN_PROGRESS or DONE")]
    UnknownStatus(String),
}

/// Named priority level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    #[serde(alias = "LOW")]
    Low,
    #[default]
    #[serde(alias = "MEDIUM")]
    Medium,
    #[serde(alias = "HIGH")]
    High,
}

impl Priority {
    /// Returns the integer value the ordering engine ranks by
    pub fn value(&self) -> i32 {
        match self {
            Priority::Low => 1,
            Priority::Medium => 2,
            Priority::High => 3,
        }
    }

    /// Returns the named level closest to an arbitrary priority value
    pub fn from_value(value: i32) -> Self {
        match value {
            i32::MIN..=1 => Priority::Low,
            2 => Priority::Medium,
            _ => Priority::High,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "LOW",
            Priority::Medium => "MEDIUM",
            Priority::High => "HIGH",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = TaskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LOW" => Ok(Priority::Low),
            "MEDIUM" => Ok(Priority::Medium),
            "HIGH" => Ok(Priority::High),
            _ => Err(TaskError::UnknownPriority(s.to_string())),
        }
    }
}

/// Status of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    #[serde(alias = "TODO")]
    Todo,
    #[serde(alias = "IN_PROGRESS")]
    InProgress,
    #[serde(alias = "DONE")]
    Done,
}

impl TaskStatus {
    /// Returns true if this status represents completion
    pub fn is_complete(&self) -> bool {
        matches!(self, TaskStatus::Done)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Done => "done",
        }
    }
}

impl FromStr for TaskStatus {
    type Err = TaskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "todo" => Ok(TaskStatus::Todo),
            "in_progress" | "in-progress" => Ok(TaskStatus::InProgress),
            "done" => Ok(TaskStatus::Done),
            _ => Err(TaskError::UnknownStatus(s.to_string())),
        }
    }
}

/// A project: the scope a set of tasks is ordered within
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl Project {
    /// Creates a new project with a generated ID
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let now = Utc::now();
        Self {
            id: ProjectId::generate(&name, now),
            name,
            created_at: now,
        }
    }
}

/// A task within a project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "TaskRecord")]
pub struct Task {
    /// Unique identifier
    pub id: TaskId,

    /// Project this task is scoped to
    pub project_id: ProjectId,

    /// Human-readable title
    pub title: String,

    /// Optional description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Named priority level
    pub priority: Priority,

    /// Ranking value, higher is more urgent. Normally `priority.value()`,
    /// but snapshots may carry any integer.
    pub priority_value: i32,

    /// Current status
    pub status: TaskStatus,

    /// Prerequisites, in the order they are explored when sorting
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<TaskId>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

/// Wire shape accepted when reading tasks.
///
/// Accepts both this crate's snake_case fields and the camelCase fields of
/// snapshots exported from the HTTP API, and fills in whichever of
/// `priority` / `priority_value` is missing from the other.
#[derive(Deserialize)]
struct TaskRecord {
    id: TaskId,
    #[serde(alias = "projectId")]
    project_id: ProjectId,
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    priority: Option<Priority>,
    #[serde(default, alias = "priorityValue")]
    priority_value: Option<i32>,
    #[serde(default)]
    status: TaskStatus,
    #[serde(
        default,
        alias = "dependsOn",
        alias = "dependsOnIds",
        deserialize_with = "dependency_ids"
    )]
    depends_on: Vec<TaskId>,
    #[serde(default, alias = "dueDate")]
    due_date: Option<DateTime<Utc>>,
    #[serde(default = "Utc::now", alias = "createdAt")]
    created_at: DateTime<Utc>,
    #[serde(default = "Utc::now", alias = "updatedAt")]
    updated_at: DateTime<Utc>,
}

/// Reads a dependency list given either as IDs or as related task objects
///
/// ID format: `["t-1", "t-2"]`
/// Object format: `[{"id": "t-1", "title": "..."}, {"id": "t-2"}]`
fn dependency_ids<'de, D>(deserializer: D) -> Result<Vec<TaskId>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::{SeqAccess, Visitor};

    struct DependencyIdsVisitor;

    impl<'de> Visitor<'de> for DependencyIdsVisitor {
        type Value = Vec<TaskId>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a sequence of task IDs or task objects")
        }

        fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
        where
            A: SeqAccess<'de>,
        {
            let mut ids = Vec::new();

            while let Some(value) = seq.next_element::<serde_json::Value>()? {
                let raw = match value {
                    serde_json::Value::String(s) => s,
                    serde_json::Value::Number(n) => n.to_string(),
                    serde_json::Value::Object(mut obj) => match obj.remove("id") {
                        Some(serde_json::Value::String(s)) => s,
                        Some(serde_json::Value::Number(n)) => n.to_string(),
                        _ => {
                            return Err(serde::de::Error::custom(
                                "dependency object is missing an 'id'",
                            ))
                        }
                    },
                    _ => {
                        return Err(serde::de::Error::custom(
                            "expected string or object for dependency",
                        ))
                    }
                };
                ids.push(raw.parse().map_err(serde::de::Error::custom)?);
            }

            Ok(ids)
        }
    }

    deserializer.deserialize_seq(DependencyIdsVisitor)
}

impl From<TaskRecord> for Task {
    fn from(record: TaskRecord) -> Self {
        let priority = record
            .priority
            .or_else(|| record.priority_value.map(Priority::from_value))
            .unwrap_or_default();
        let priority_value = record.priority_value.unwrap_or_else(|| priority.value());

        Self {
            id: record.id,
            project_id: record.project_id,
            title: record.title,
            description: record.description,
            priority,
            priority_value,
            status: record.status,
            depends_on: record.depends_on,
            due_date: record.due_date,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

impl Task {
    /// Creates a new task with a generated ID and MEDIUM priority
    pub fn new(project_id: ProjectId, title: impl Into<String>) -> Self {
        let title = title.into();
        let now = Utc::now();
        Self::with_id(TaskId::generate(&title, now), project_id, title)
    }

    /// Creates a new task with an explicit ID
    pub fn with_id(id: TaskId, project_id: ProjectId, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            project_id,
            title: title.into(),
            description: None,
            priority: Priority::Medium,
            priority_value: Priority::Medium.value(),
            status: TaskStatus::Todo,
            depends_on: Vec::new(),
            due_date: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Builder-style priority setter
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self.priority_value = priority.value();
        self
    }

    /// Builder-style dependency setter
    pub fn with_dependencies(mut self, deps: impl IntoIterator<Item = TaskId>) -> Self {
        for dep in deps {
            self.add_dependency(dep);
        }
        self
    }

    /// Checks title and description limits
    pub fn validate(&self) -> Result<(), TaskError> {
        let title_len = self.title.trim().chars().count();
        if title_len == 0 {
            return Err(TaskError::EmptyTitle);
        }
        if title_len > MAX_TITLE_LEN {
            return Err(TaskError::TitleTooLong(title_len));
        }
        if let Some(desc) = &self.description {
            let desc_len = desc.chars().count();
            if desc_len > MAX_DESCRIPTION_LEN {
                return Err(TaskError::DescriptionTooLong(desc_len));
            }
        }
        Ok(())
    }

    /// Sets the named priority and the matching ranking value
    pub fn set_priority(&mut self, priority: Priority) {
        self.priority = priority;
        self.priority_value = priority.value();
        self.updated_at = Utc::now();
    }

    /// Sets an arbitrary ranking value
    pub fn set_priority_value(&mut self, value: i32) {
        self.priority = Priority::from_value(value);
        self.priority_value = value;
        self.updated_at = Utc::now();
    }

    /// Sets the description
    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = Some(description.into());
        self.updated_at = Utc::now();
    }

    /// Transitions to in_progress status
    pub fn start(&mut self) {
        if self.status == TaskStatus::Todo {
            self.status = TaskStatus::InProgress;
            self.updated_at = Utc::now();
        }
    }

    /// Transitions to done status
    pub fn complete(&mut self) {
        if !self.status.is_complete() {
            self.status = TaskStatus::Done;
            self.updated_at = Utc::now();
        }
    }

    /// Adds a prerequisite. Returns false if it was already present.
    pub fn add_dependency(&mut self, task_id: TaskId) -> bool {
        if self.depends_on.contains(&task_id) {
            return false;
        }
        self.depends_on.push(task_id);
        self.updated_at = Utc::now();
        true
    }

    /// Removes a prerequisite. Returns false if it was not present.
    pub fn remove_dependency(&mut self, task_id: &TaskId) -> bool {
        let len_before = self.depends_on.len();
        self.depends_on.retain(|d| d != task_id);
        let removed = self.depends_on.len() != len_before;
        if removed {
            self.updated_at = Utc::now();
        }
        removed
    }

    /// Returns true if this task lists `task_id` as a prerequisite
    pub fn depends_on(&self, task_id: &TaskId) -> bool {
        self.depends_on.contains(task_id)
    }
}
