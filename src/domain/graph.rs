//! Dependency graph for tasks
//!
//! Builds the adjacency view of one project's task snapshot: each task maps
//! to its own record and its prerequisites in `depends_on` order. The graph
//! borrows the snapshot and is rebuilt on every call; nothing is cached.
//! Uses petgraph for reachability and cycle queries.

use petgraph::algo::{has_path_connecting, is_cyclic_directed};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, warn};

use super::id::{ProjectId, TaskId};
use super::task::Task;

#[derive(Debug, Error, PartialEq)]
pub enum GraphError {
    #[error("Task {task} depends on {missing}, which is not in the snapshot")]
    DanglingDependency { task: TaskId, missing: TaskId },

    #[error("Task appears more than once in the snapshot: {0}")]
    DuplicateTask(TaskId),

    #[error("Task {task} belongs to project {found}, expected {expected}")]
    ProjectMismatch {
        task: TaskId,
        expected: ProjectId,
        found: ProjectId,
    },

    #[error("Task not found: {0}")]
    TaskNotFound(TaskId),

    #[error("Self-dependency not allowed: {0}")]
    SelfDependency(TaskId),

    #[error("Adding dependency would create a cycle: {0} -> {1}")]
    CycleDetected(TaskId, TaskId),
}

/// Dependency graph over a borrowed task snapshot
///
/// Node `i` is the `i`-th task of the snapshot. Edges run prerequisite ->
/// dependent, meaning "prerequisite must come before dependent".
#[derive(Debug)]
pub struct DependencyGraph<'a> {
    /// Tasks in snapshot order
    tasks: Vec<&'a Task>,

    /// Map from TaskId to node index
    node_map: HashMap<&'a TaskId, NodeIndex>,

    /// The underlying directed graph
    graph: DiGraph<&'a TaskId, ()>,

    /// Prerequisites of each node, in `depends_on` order
    prerequisites: Vec<Vec<usize>>,
}

impl<'a> DependencyGraph<'a> {
    /// Builds a graph from one project's tasks
    ///
    /// Fails if a task ID repeats, if tasks span more than one project, or
    /// if any `depends_on` entry names a task outside the snapshot.
    pub fn from_tasks(tasks: impl IntoIterator<Item = &'a Task>) -> Result<Self, GraphError> {
        let tasks: Vec<&'a Task> = tasks.into_iter().collect();
        let mut graph = DiGraph::with_capacity(tasks.len(), 0);
        let mut node_map = HashMap::with_capacity(tasks.len());

        // First pass: add all nodes
        let project = tasks.first().copied().map(|t| &t.project_id);
        for &task in &tasks {
            if let Some(expected) = project {
                if &task.project_id != expected {
                    return Err(GraphError::ProjectMismatch {
                        task: task.id.clone(),
                        expected: expected.clone(),
                        found: task.project_id.clone(),
                    });
                }
            }
            if node_map.contains_key(&task.id) {
                return Err(GraphError::DuplicateTask(task.id.clone()));
            }
            let idx = graph.add_node(&task.id);
            node_map.insert(&task.id, idx);
        }

        // Second pass: add all edges
        let mut prerequisites = Vec::with_capacity(tasks.len());
        for (pos, &task) in tasks.iter().enumerate() {
            let mut deps = Vec::with_capacity(task.depends_on.len());
            for dep_id in &task.depends_on {
                let dep_idx = node_map.get(dep_id).copied().ok_or_else(|| {
                    warn!(task = %task.id, missing = %dep_id, "dangling dependency in snapshot");
                    GraphError::DanglingDependency {
                        task: task.id.clone(),
                        missing: dep_id.clone(),
                    }
                })?;
                graph.update_edge(dep_idx, NodeIndex::new(pos), ());
                deps.push(dep_idx.index());
            }
            prerequisites.push(deps);
        }

        debug!(
            project = project.map(|p| p.as_str()).unwrap_or("-"),
            tasks = tasks.len(),
            edges = graph.edge_count(),
            "built dependency graph"
        );

        Ok(Self {
            tasks,
            node_map,
            graph,
            prerequisites,
        })
    }

    /// Returns the project all tasks belong to, or None if empty
    pub fn project_id(&self) -> Option<&'a ProjectId> {
        self.tasks.first().copied().map(|t| &t.project_id)
    }

    /// Returns the number of tasks in the graph
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Returns true if the graph is empty
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Returns true if the graph contains the task
    pub fn contains(&self, task_id: &TaskId) -> bool {
        self.node_map.contains_key(task_id)
    }

    /// Returns the number of distinct dependency edges
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub(crate) fn task_at(&self, index: usize) -> &'a Task {
        self.tasks[index]
    }

    pub(crate) fn prerequisite_indices(&self, index: usize) -> &[usize] {
        &self.prerequisites[index]
    }

    /// Returns the direct prerequisites of a task, in `depends_on` order
    pub fn dependencies(&self, task_id: &TaskId) -> Vec<&'a TaskId> {
        match self.node_map.get(task_id) {
            Some(idx) => self.prerequisites[idx.index()]
                .iter()
                .map(|&i| &self.task_at(i).id)
                .collect(),
            None => vec![],
        }
    }

    /// Returns the direct dependents of a task (tasks that depend on it),
    /// in snapshot order
    pub fn dependents(&self, task_id: &TaskId) -> Vec<&'a TaskId> {
        let task_idx = match self.node_map.get(task_id) {
            Some(idx) => *idx,
            None => return vec![],
        };

        let mut dependents: Vec<_> = self
            .graph
            .neighbors_directed(task_idx, Direction::Outgoing)
            .collect();
        dependents.sort();
        dependents
            .into_iter()
            .map(|idx| &self.task_at(idx.index()).id)
            .collect()
    }

    /// Returns tasks that are ready (not done, every prerequisite done)
    pub fn ready_tasks(&self) -> Vec<&'a Task> {
        self.tasks
            .iter()
            .enumerate()
            .filter(|(pos, task)| {
                !task.status.is_complete()
                    && self.prerequisites[*pos]
                        .iter()
                        .all(|&dep| self.tasks[dep].status.is_complete())
            })
            .map(|(_, task)| *task)
            .collect()
    }

    /// Returns tasks that are blocked, each with its unfinished prerequisites
    pub fn blocked_tasks(&self) -> Vec<(&'a Task, Vec<&'a TaskId>)> {
        self.tasks
            .iter()
            .enumerate()
            .filter(|(_, task)| !task.status.is_complete())
            .filter_map(|(pos, task)| {
                let blockers: Vec<_> = self.prerequisites[pos]
                    .iter()
                    .map(|&dep| self.tasks[dep])
                    .filter(|dep| !dep.status.is_complete())
                    .map(|dep| &dep.id)
                    .collect();
                (!blockers.is_empty()).then_some((*task, blockers))
            })
            .collect()
    }

    /// Returns true if the dependency edges contain a cycle
    pub fn has_cycle(&self) -> bool {
        is_cyclic_directed(&self.graph)
    }

    /// Checks whether `task` may take `depends_on` as a new prerequisite
    ///
    /// Rejects self-dependencies, unknown tasks, and edges that would close
    /// a cycle (i.e. `depends_on` already transitively depends on `task`).
    pub fn check_dependency(&self, task: &TaskId, depends_on: &TaskId) -> Result<(), GraphError> {
        if task == depends_on {
            return Err(GraphError::SelfDependency(task.clone()));
        }

        let task_idx = self
            .node_map
            .get(task)
            .ok_or_else(|| GraphError::TaskNotFound(task.clone()))?;

        let dep_idx = self
            .node_map
            .get(depends_on)
            .ok_or_else(|| GraphError::TaskNotFound(depends_on.clone()))?;

        // Edges run prerequisite -> dependent, so a path task ~> depends_on
        // means depends_on already waits on task.
        if has_path_connecting(&self.graph, *task_idx, *dep_idx, None) {
            return Err(GraphError::CycleDetected(task.clone(), depends_on.clone()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::task::TaskStatus;

    fn make_task(id: &str, deps: &[&str]) -> Task {
        Task::with_id(id.parse().unwrap(), "p-test".parse().unwrap(), id)
            .with_dependencies(deps.iter().map(|d| d.parse().unwrap()))
    }

    fn id(s: &str) -> TaskId {
        s.parse().unwrap()
    }

    #[test]
    fn empty_graph() {
        let tasks: Vec<Task> = vec![];
        let graph = DependencyGraph::from_tasks(&tasks).unwrap();
        assert!(graph.is_empty());
        assert_eq!(graph.len(), 0);
        assert!(graph.project_id().is_none());
    }

    #[test]
    fn from_tasks() {
        let tasks = vec![make_task("a", &[]), make_task("b", &["a"])];
        let graph = DependencyGraph::from_tasks(&tasks).unwrap();

        assert_eq!(graph.len(), 2);
        assert!(graph.contains(&id("a")));
        assert_eq!(graph.dependencies(&id("b")), vec![&id("a")]);
        assert_eq!(graph.dependents(&id("a")), vec![&id("b")]);
        assert_eq!(graph.project_id().unwrap().as_str(), "p-test");
    }

    #[test]
    fn dependencies_keep_declared_order() {
        let tasks = vec![
            make_task("a", &[]),
            make_task("b", &[]),
            make_task("c", &[]),
            make_task("d", &["c", "a", "b"]),
        ];
        let graph = DependencyGraph::from_tasks(&tasks).unwrap();

        assert_eq!(
            graph.dependencies(&id("d")),
            vec![&id("c"), &id("a"), &id("b")]
        );
    }

    #[test]
    fn dependents_in_snapshot_order() {
        let tasks = vec![
            make_task("root", &[]),
            make_task("x", &["root"]),
            make_task("y", &["root"]),
            make_task("z", &["root"]),
        ];
        let graph = DependencyGraph::from_tasks(&tasks).unwrap();

        assert_eq!(
            graph.dependents(&id("root")),
            vec![&id("x"), &id("y"), &id("z")]
        );
    }

    #[test]
    fn dangling_dependency_is_rejected() {
        let tasks = vec![make_task("a", &["ghost"])];
        let result = DependencyGraph::from_tasks(&tasks);

        assert_eq!(
            result.unwrap_err(),
            GraphError::DanglingDependency {
                task: id("a"),
                missing: id("ghost"),
            }
        );
    }

    #[test]
    fn duplicate_task_is_rejected() {
        let tasks = vec![make_task("a", &[]), make_task("a", &[])];
        let result = DependencyGraph::from_tasks(&tasks);

        assert_eq!(result.unwrap_err(), GraphError::DuplicateTask(id("a")));
    }

    #[test]
    fn mixed_projects_are_rejected() {
        let mut other = make_task("b", &[]);
        other.project_id = "p-other".parse().unwrap();
        let tasks = vec![make_task("a", &[]), other];

        let result = DependencyGraph::from_tasks(&tasks);
        assert!(matches!(result, Err(GraphError::ProjectMismatch { .. })));
    }

    #[test]
    fn repeated_dependency_adds_one_edge() {
        // Snapshot files may repeat a prerequisite; add_dependency would dedupe it
        let mut b = make_task("b", &["a"]);
        b.depends_on.push(id("a"));
        assert_eq!(b.depends_on.len(), 2);

        let tasks = vec![make_task("a", &[]), b];
        let graph = DependencyGraph::from_tasks(&tasks).unwrap();

        assert_eq!(graph.edge_count(), 1);
        assert_eq!(graph.dependencies(&id("b")), vec![&id("a"), &id("a")]);
        assert_eq!(graph.dependents(&id("a")), vec![&id("b")]);
        assert!(!graph.has_cycle());
    }

    #[test]
    fn cycle_is_reported_by_has_cycle() {
        let tasks = vec![make_task("a", &["b"]), make_task("b", &["a"])];
        let graph = DependencyGraph::from_tasks(&tasks).unwrap();
        assert!(graph.has_cycle());

        let tasks = vec![make_task("a", &[]), make_task("b", &["a"])];
        let graph = DependencyGraph::from_tasks(&tasks).unwrap();
        assert!(!graph.has_cycle());
    }

    #[test]
    fn check_dependency_detects_cycle() {
        // c -> b -> a
        let tasks = vec![
            make_task("a", &[]),
            make_task("b", &["a"]),
            make_task("c", &["b"]),
        ];
        let graph = DependencyGraph::from_tasks(&tasks).unwrap();

        // a depending on c would close the loop
        assert_eq!(
            graph.check_dependency(&id("a"), &id("c")),
            Err(GraphError::CycleDetected(id("a"), id("c")))
        );
        // c depending on a directly is redundant but fine
        assert_eq!(graph.check_dependency(&id("c"), &id("a")), Ok(()));
    }

    #[test]
    fn check_dependency_rejects_self_and_unknown() {
        let tasks = vec![make_task("a", &[])];
        let graph = DependencyGraph::from_tasks(&tasks).unwrap();

        assert_eq!(
            graph.check_dependency(&id("a"), &id("a")),
            Err(GraphError::SelfDependency(id("a")))
        );
        assert_eq!(
            graph.check_dependency(&id("a"), &id("b")),
            Err(GraphError::TaskNotFound(id("b")))
        );
    }

    #[test]
    fn ready_and_blocked_tasks() {
        let mut tasks = vec![
            make_task("a", &[]),
            make_task("b", &["a"]),
            make_task("c", &[]),
        ];

        {
            let graph = DependencyGraph::from_tasks(&tasks).unwrap();
            let ready: Vec<_> = graph.ready_tasks().iter().map(|t| t.id.as_str()).collect();
            assert_eq!(ready, vec!["a", "c"]);

            let blocked = graph.blocked_tasks();
            assert_eq!(blocked.len(), 1);
            assert_eq!(blocked[0].0.id, id("b"));
            assert_eq!(blocked[0].1, vec![&id("a")]);
        }

        tasks[0].status = TaskStatus::Done;

        let graph = DependencyGraph::from_tasks(&tasks).unwrap();
        let ready: Vec<_> = graph.ready_tasks().iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ready, vec!["b", "c"]);
        assert!(graph.blocked_tasks().is_empty());
    }

    #[test]
    fn performance_500_tasks() {
        use std::time::Instant;

        let mut tasks = vec![make_task("t0", &[])];
        for i in 1..500 {
            let prev = format!("t{}", i - 1);
            tasks.push(make_task(&format!("t{}", i), &[prev.as_str()]));
        }

        let start = Instant::now();
        let graph = DependencyGraph::from_tasks(&tasks).unwrap();
        let _ready = graph.ready_tasks();
        let duration = start.elapsed();

        assert_eq!(graph.edge_count(), 499);
        assert!(duration.as_millis() < 50, "Build + ready took {:?}", duration);
    }
}
