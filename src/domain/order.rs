//! Dependency-respecting, priority-ranked task ordering
//!
//! The pipeline is: [`DependencyGraph`] (validates the snapshot) ->
//! [`topological_order`] (iterative depth-first traversal with cycle
//! detection) -> [`TieBreak`] (secondary ranking by priority value).
//!
//! ## Traversal
//!
//! Tasks are visited in snapshot order and each task's prerequisites in
//! `depends_on` order. A task is emitted only after all its prerequisites
//! (post-order), so every prerequisite precedes its dependents. The walk
//! uses an explicit stack of frames instead of recursion; each frame is a
//! task on the active path plus a cursor into its prerequisite list.
//! Reaching a task that is still on the active path means a cycle, and the
//! whole call fails without a partial order.
//!
//! ## Tie-break policies
//!
//! | Policy | Behavior | Prerequisite-first guaranteed |
//! |--------|----------|-------------------------------|
//! | [`TieBreak::PriorityOverride`] | Stable sort of the whole sequence by descending priority value | No |
//! | [`TieBreak::Stable`] | Stable sort by descending priority within maximal runs of mutually independent tasks | Yes |

use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, warn};

use super::graph::{DependencyGraph, GraphError};
use super::id::TaskId;
use super::task::Task;

#[derive(Debug, Error, PartialEq)]
pub enum OrderError {
    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("Circular dependency detected at task {task}: {}", format_path(.path))]
    CycleDetected { task: TaskId, path: Vec<TaskId> },
}

impl OrderError {
    /// Returns the task the error is about: the task where a cycle was
    /// found, or the missing prerequisite of a dangling dependency
    pub fn task_id(&self) -> Option<&TaskId> {
        match self {
            OrderError::CycleDetected { task, .. } => Some(task),
            OrderError::Graph(GraphError::DanglingDependency { missing, .. }) => Some(missing),
            OrderError::Graph(GraphError::DuplicateTask(id))
            | OrderError::Graph(GraphError::TaskNotFound(id))
            | OrderError::Graph(GraphError::SelfDependency(id)) => Some(id),
            OrderError::Graph(GraphError::ProjectMismatch { task, .. }) => Some(task),
            OrderError::Graph(GraphError::CycleDetected(task, _)) => Some(task),
        }
    }
}

fn format_path(path: &[TaskId]) -> String {
    path.iter()
        .map(TaskId::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}

#[derive(Debug, Error, PartialEq)]
#[error("Unknown tie-break policy '{0}': expected 'priority_override' or 'stable'")]
pub struct UnknownTieBreak(String);

/// How tasks with no ordering constraint between them are ranked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// Sorts the whole topological sequence by descending priority.
    /// Equal priorities keep their topological order, but a high-priority
    /// task may move ahead of a lower-priority prerequisite.
    #[default]
    PriorityOverride,

    /// Sorts by descending priority only inside maximal runs of the
    /// topological sequence in which no task depends on another task of
    /// the same run. Prerequisites always come first.
    Stable,
}

impl TieBreak {
    pub fn as_str(&self) -> &'static str {
        match self {
            TieBreak::PriorityOverride => "priority_override",
            TieBreak::Stable => "stable",
        }
    }

    /// Returns true if the policy never places a dependent before its prerequisite
    pub fn preserves_dependencies(&self) -> bool {
        matches!(self, TieBreak::Stable)
    }

    fn apply(&self, graph: &DependencyGraph<'_>, mut order: Vec<usize>) -> Vec<usize> {
        match self {
            TieBreak::PriorityOverride => {
                order.sort_by_key(|&i| Reverse(graph.task_at(i).priority_value));
                order
            }
            TieBreak::Stable => rank_within_runs(graph, order),
        }
    }
}

impl fmt::Display for TieBreak {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for TieBreak {
    type Err = UnknownTieBreak;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "priority_override" | "priority" => Ok(TieBreak::PriorityOverride),
            "stable" => Ok(TieBreak::Stable),
            _ => Err(UnknownTieBreak(s.to_string())),
        }
    }
}

/// Traversal state of one task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    /// On the active path (an ancestor of the current frame)
    Active,
    /// Emitted
    Done,
}

/// A task on the active path and the next prerequisite to explore
struct Frame {
    node: usize,
    next: usize,
}

/// Iterative post-order DFS. Returns snapshot indices, prerequisites first.
fn sort_indices(graph: &DependencyGraph<'_>) -> Result<Vec<usize>, OrderError> {
    let mut marks = vec![Mark::Unvisited; graph.len()];
    let mut order = Vec::with_capacity(graph.len());
    let mut stack: Vec<Frame> = Vec::new();

    for root in 0..graph.len() {
        if marks[root] != Mark::Unvisited {
            continue;
        }
        marks[root] = Mark::Active;
        stack.push(Frame { node: root, next: 0 });

        while let Some(frame) = stack.last_mut() {
            let node = frame.node;
            let Some(&dep) = graph.prerequisite_indices(node).get(frame.next) else {
                // All prerequisites emitted
                marks[node] = Mark::Done;
                order.push(node);
                stack.pop();
                continue;
            };
            frame.next += 1;

            match marks[dep] {
                Mark::Done => {}
                Mark::Active => {
                    let start = stack.iter().position(|f| f.node == dep).unwrap_or(0);
                    let mut path: Vec<TaskId> = stack[start..]
                        .iter()
                        .map(|f| graph.task_at(f.node).id.clone())
                        .collect();
                    let task = graph.task_at(dep).id.clone();
                    path.push(task.clone());
                    warn!(task = %task, cycle = %format_path(&path), "circular dependency");
                    return Err(OrderError::CycleDetected { task, path });
                }
                Mark::Unvisited => {
                    marks[dep] = Mark::Active;
                    stack.push(Frame { node: dep, next: 0 });
                }
            }
        }
    }

    Ok(order)
}

/// Splits the sequence into maximal runs with no dependency between members
/// and sorts each run by descending priority value.
///
/// Every edge in a topological sequence points backwards, so a task starts
/// a new run exactly when one of its direct prerequisites is in the current
/// run. A transitive dependency inside a run is impossible: its middle task
/// would sit between the two ends and therefore be in the run as well.
fn rank_within_runs(graph: &DependencyGraph<'_>, order: Vec<usize>) -> Vec<usize> {
    let mut ranked = Vec::with_capacity(order.len());
    let mut in_run = vec![false; graph.len()];
    let mut run: Vec<usize> = Vec::new();

    let mut flush = |run: &mut Vec<usize>, in_run: &mut Vec<bool>| {
        run.sort_by_key(|&i| Reverse(graph.task_at(i).priority_value));
        for i in run.drain(..) {
            in_run[i] = false;
            ranked.push(i);
        }
    };

    for node in order {
        let depends_on_run = graph
            .prerequisite_indices(node)
            .iter()
            .any(|&dep| in_run[dep]);
        if depends_on_run {
            flush(&mut run, &mut in_run);
        }
        in_run[node] = true;
        run.push(node);
    }
    flush(&mut run, &mut in_run);

    ranked
}

/// Returns the tasks in dependency order without any priority ranking
pub fn topological_order<'a>(graph: &DependencyGraph<'a>) -> Result<Vec<&'a Task>, OrderError> {
    Ok(sort_indices(graph)?
        .into_iter()
        .map(|i| graph.task_at(i))
        .collect())
}

/// Orders an already-built graph with the given tie-break policy
pub fn order_graph<'a>(
    graph: &DependencyGraph<'a>,
    tie_break: TieBreak,
) -> Result<Vec<&'a Task>, OrderError> {
    let order = sort_indices(graph)?;
    let ranked = tie_break.apply(graph, order);

    debug!(
        project = graph.project_id().map(|p| p.as_str()).unwrap_or("-"),
        tasks = ranked.len(),
        tie_break = %tie_break,
        "ordered tasks"
    );

    Ok(ranked.into_iter().map(|i| graph.task_at(i)).collect())
}

/// Orders one project's tasks: prerequisites first, then by priority.
///
/// Fails with [`OrderError::CycleDetected`] on a circular dependency and
/// with [`GraphError::DanglingDependency`] when a prerequisite is missing
/// from `tasks`. An empty snapshot yields an empty order.
pub fn order_tasks(tasks: &[Task], tie_break: TieBreak) -> Result<Vec<&Task>, OrderError> {
    let graph = DependencyGraph::from_tasks(tasks)?;
    order_graph(&graph, tie_break)
}

/// Like [`order_tasks`], returning only the IDs
pub fn order_task_ids(tasks: &[Task], tie_break: TieBreak) -> Result<Vec<TaskId>, OrderError> {
    Ok(order_tasks(tasks, tie_break)?
        .into_iter()
        .map(|t| t.id.clone())
        .collect())
}
