//! Domain models for task-order
//!
//! Contains the ordering engine and its records without any I/O concerns.

mod id;
mod task;
mod graph;
mod order;

pub use id::{IdError, ProjectId, TaskId};
pub use task::{Priority, Project, Task, TaskError, TaskStatus, MAX_DESCRIPTION_LEN, MAX_TITLE_LEN};
pub use graph::{DependencyGraph, GraphError};
pub use order::{
    order_graph, order_task_ids, order_tasks, topological_order, OrderError, TieBreak,
    UnknownTieBreak,
};
