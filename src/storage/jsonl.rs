//! JSONL storage for projects and tasks
//!
//! Records are stored one JSON object per line in `.taskorder/*.jsonl`.
//! File order is meaningful: tasks are handed to the ordering engine in the
//! order they appear, so rewrites keep it. Uses file locking for concurrent
//! access safety.

use std::collections::HashMap;
use std::fmt::Display;
use std::fs::{self, File, OpenOptions};
use std::hash::Hash;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use fs2::FileExt;
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::workspace::WORKSPACE_DIR;
use crate::domain::{Project, ProjectId, Task, TaskId};

/// A record that can live in a [`JsonlStore`]
pub trait Record: Serialize + DeserializeOwned + Clone {
    type Key: Eq + Hash + Clone + Display;

    /// File name inside the workspace directory
    const FILE_NAME: &'static str;

    fn key(&self) -> &Self::Key;
}

impl Record for Task {
    type Key = TaskId;
    const FILE_NAME: &'static str = "tasks.jsonl";

    fn key(&self) -> &TaskId {
        &self.id
    }
}

impl Record for Project {
    type Key = ProjectId;
    const FILE_NAME: &'static str = "projects.jsonl";

    fn key(&self) -> &ProjectId {
        &self.id
    }
}

/// Store for records in JSONL format
pub struct JsonlStore<T> {
    path: PathBuf,
    _record: PhantomData<T>,
}

pub type TaskStore = JsonlStore<Task>;
pub type ProjectStore = JsonlStore<Project>;

impl<T: Record> JsonlStore<T> {
    /// Creates a new store at the given path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _record: PhantomData,
        }
    }

    /// Creates the default store for a workspace
    pub fn for_workspace(root: &Path) -> Self {
        Self::new(root.join(WORKSPACE_DIR).join(T::FILE_NAME))
    }

    /// Returns the path to the store file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads all records in file order
    ///
    /// A key that appears on several lines keeps its first position and
    /// takes the value of its last line.
    pub fn read_all(&self) -> Result<Vec<T>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.path)
            .with_context(|| format!("Failed to open store: {}", self.path.display()))?;

        // Acquire shared lock for reading
        file.lock_shared()
            .context("Failed to acquire read lock on store")?;

        let reader = BufReader::new(&file);
        let mut records: Vec<T> = Vec::new();
        let mut positions: HashMap<T::Key, usize> = HashMap::new();

        for (line_num, line) in reader.lines().enumerate() {
            let line = line.with_context(|| format!("Failed to read line {}", line_num + 1))?;

            if line.trim().is_empty() {
                continue;
            }

            let record: T = serde_json::from_str(&line).with_context(|| {
                format!(
                    "Failed to parse record at {}:{}",
                    self.path.display(),
                    line_num + 1
                )
            })?;

            match positions.get(record.key()) {
                Some(&pos) => records[pos] = record,
                None => {
                    positions.insert(record.key().clone(), records.len());
                    records.push(record);
                }
            }
        }

        // Lock is released when file is dropped
        Ok(records)
    }

    /// Reads the records matching a predicate, in file order
    pub fn read_where(&self, predicate: impl Fn(&T) -> bool) -> Result<Vec<T>> {
        Ok(self.read_all()?.into_iter().filter(|r| predicate(r)).collect())
    }

    /// Looks up a single record by key
    pub fn get(&self, key: &T::Key) -> Result<Option<T>> {
        Ok(self.read_all()?.into_iter().find(|r| r.key() == key))
    }

    /// Writes all records to the store (full rewrite, order preserved)
    pub fn write_all(&self, records: &[T]) -> Result<()> {
        self.ensure_parent()?;

        // Write to temp file first
        let temp_path = self.path.with_extension("jsonl.tmp");

        {
            let file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&temp_path)
                .with_context(|| format!("Failed to create temp file: {}", temp_path.display()))?;

            // Acquire exclusive lock
            file.lock_exclusive()
                .context("Failed to acquire write lock on store")?;

            let mut writer = BufWriter::new(&file);

            for record in records {
                let line = serde_json::to_string(record).context("Failed to serialize record")?;
                writeln!(writer, "{}", line).context("Failed to write record")?;
            }

            writer.flush().context("Failed to flush store")?;
        }

        // Atomic rename
        fs::rename(&temp_path, &self.path).with_context(|| {
            format!(
                "Failed to rename {} to {}",
                temp_path.display(),
                self.path.display()
            )
        })?;

        Ok(())
    }

    /// Appends a single record (used for quick adds without full rewrite)
    pub fn append(&self, record: &T) -> Result<()> {
        self.ensure_parent()?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open store: {}", self.path.display()))?;

        // Acquire exclusive lock
        file.lock_exclusive()
            .context("Failed to acquire write lock on store")?;

        let mut writer = BufWriter::new(&file);
        let line = serde_json::to_string(record).context("Failed to serialize record")?;
        writeln!(writer, "{}", line).context("Failed to write record")?;

        writer.flush().context("Failed to flush store")?;

        Ok(())
    }

    /// Updates a single record in place, appending it if new
    pub fn update(&self, record: &T) -> Result<()> {
        let mut records = self.read_all()?;
        match records.iter().position(|r| r.key() == record.key()) {
            Some(pos) => records[pos] = record.clone(),
            None => records.push(record.clone()),
        }
        self.write_all(&records)
    }

    /// Removes a record by key
    pub fn remove(&self, key: &T::Key) -> Result<bool> {
        let mut records = self.read_all()?;
        let len_before = records.len();
        records.retain(|r| r.key() != key);
        let removed = records.len() != len_before;
        if removed {
            self.write_all(&records)?;
        }
        Ok(removed)
    }

    fn ensure_parent(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        Ok(())
    }
}

impl TaskStore {
    /// Reads the task snapshot of one project, in file order
    pub fn read_for_project(&self, project_id: &ProjectId) -> Result<Vec<Task>> {
        self.read_where(|task| &task.project_id == project_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TaskStatus;
    use tempfile::TempDir;

    fn make_task(project: &str, title: &str) -> Task {
        Task::with_id(title.parse().unwrap(), project.parse().unwrap(), title)
    }

    #[test]
    fn read_empty_store() {
        let dir = TempDir::new().unwrap();
        let store = TaskStore::new(dir.path().join("tasks.jsonl"));

        let tasks = store.read_all().unwrap();
        assert!(tasks.is_empty());
    }

    #[test]
    fn write_and_read_keep_order() {
        let dir = TempDir::new().unwrap();
        let store = TaskStore::new(dir.path().join("tasks.jsonl"));

        let tasks = vec![
            make_task("p", "zeta"),
            make_task("p", "alpha"),
            make_task("p", "mid"),
        ];
        store.write_all(&tasks).unwrap();

        let loaded = store.read_all().unwrap();
        let titles: Vec<_> = loaded.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn append_task() {
        let dir = TempDir::new().unwrap();
        let store = TaskStore::new(dir.path().join("tasks.jsonl"));

        store.append(&make_task("p", "one")).unwrap();
        store.append(&make_task("p", "two")).unwrap();

        let loaded = store.read_all().unwrap();
        assert_eq!(loaded.len(), 2);
    }

    #[test]
    fn update_keeps_position() {
        let dir = TempDir::new().unwrap();
        let store = TaskStore::new(dir.path().join("tasks.jsonl"));

        let mut first = make_task("p", "first");
        store.append(&first).unwrap();
        store.append(&make_task("p", "second")).unwrap();

        first.start();
        store.update(&first).unwrap();

        let loaded = store.read_all().unwrap();
        assert_eq!(loaded[0].id, first.id);
        assert_eq!(loaded[0].status, TaskStatus::InProgress);
        assert_eq!(loaded.len(), 2);
    }

    #[test]
    fn repeated_lines_take_last_value() {
        let dir = TempDir::new().unwrap();
        let store = TaskStore::new(dir.path().join("tasks.jsonl"));

        let mut task = make_task("p", "task");
        store.append(&task).unwrap();
        store.append(&make_task("p", "other")).unwrap();
        task.complete();
        store.append(&task).unwrap();

        let loaded = store.read_all().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].status, TaskStatus::Done);

        // A rewrite leaves one line per task
        store.write_all(&loaded).unwrap();
        let content = fs::read_to_string(store.path()).unwrap();
        assert_eq!(content.lines().count(), 2);
    }

    #[test]
    fn remove_task() {
        let dir = TempDir::new().unwrap();
        let store = TaskStore::new(dir.path().join("tasks.jsonl"));

        let task1 = make_task("p", "one");
        let task2 = make_task("p", "two");
        store.write_all(&[task1.clone(), task2.clone()]).unwrap();

        assert!(store.remove(&task1.id).unwrap());
        assert!(!store.remove(&task1.id).unwrap());

        let loaded = store.read_all().unwrap();
        assert_eq!(loaded, vec![task2]);
    }

    #[test]
    fn read_for_project_filters() {
        let dir = TempDir::new().unwrap();
        let store = TaskStore::new(dir.path().join("tasks.jsonl"));

        store
            .write_all(&[
                make_task("p-a", "a1"),
                make_task("p-b", "b1"),
                make_task("p-a", "a2"),
            ])
            .unwrap();

        let tasks = store.read_for_project(&"p-a".parse().unwrap()).unwrap();
        let titles: Vec<_> = tasks.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["a1", "a2"]);
    }

    #[test]
    fn project_store_get() {
        let dir = TempDir::new().unwrap();
        let store = ProjectStore::new(dir.path().join("projects.jsonl"));

        let project = Project::new("Website");
        store.append(&project).unwrap();

        assert_eq!(store.get(&project.id).unwrap(), Some(project));
        assert_eq!(store.get(&"p-none".parse().unwrap()).unwrap(), None);
    }

    #[test]
    fn parse_error_names_line() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tasks.jsonl");
        fs::write(&path, "{not json}\n").unwrap();

        let err = TaskStore::new(&path).read_all().unwrap_err();
        assert!(format!("{:#}", err).contains(":1"));
    }

    #[test]
    fn creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let store = TaskStore::new(dir.path().join("nested").join("dir").join("tasks.jsonl"));

        store.append(&make_task("p", "task")).unwrap();

        assert!(store.path().exists());
    }

    #[test]
    fn atomic_write() {
        let dir = TempDir::new().unwrap();
        let store = TaskStore::new(dir.path().join("tasks.jsonl"));

        store.write_all(&[make_task("p", "task")]).unwrap();

        // Temp file should not exist after write
        let temp_path = store.path().with_extension("jsonl.tmp");
        assert!(!temp_path.exists());
    }
}
