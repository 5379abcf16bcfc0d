//! task-order - Dependency-aware task ordering for multi-project task management
//!
//! Given one project's tasks, each with a priority and a list of
//! prerequisite tasks, task-order produces a single deterministic ordering
//! in which prerequisites come first and priority breaks ties. Circular and
//! dangling dependencies are rejected before any order is returned.
//!
//! ```
//! use task_order::{order_task_ids, Priority, Task, TieBreak};
//!
//! let project = "p-demo".parse().unwrap();
//! let schema = Task::with_id("schema".parse().unwrap(), project, "Design schema")
//!     .with_priority(Priority::Low);
//! let api = Task::with_id("api".parse().unwrap(), schema.project_id.clone(), "Build API")
//!     .with_priority(Priority::High)
//!     .with_dependencies([schema.id.clone()]);
//!
//! let tasks = vec![schema, api];
//! let order = order_task_ids(&tasks, TieBreak::Stable).unwrap();
//! assert_eq!(order[0].as_str(), "schema");
//! ```

pub mod domain;
pub mod storage;
pub mod cli;

pub use domain::{
    order_task_ids, order_tasks, DependencyGraph, OrderError, Priority, Project, ProjectId, Task,
    TaskId, TaskStatus, TieBreak,
};
