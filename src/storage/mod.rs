//! # Storage Layer
//!
//! Persistence layer for task-order with git-friendly file formats.
//!
//! ## Storage Formats
//!
//! | Data | Format | Location |
//! |------|--------|----------|
//! | Projects | JSONL (one JSON per line) | `.taskorder/projects.jsonl` |
//! | Tasks | JSONL (one JSON per line) | `.taskorder/tasks.jsonl` |
//! | Config | TOML | `.taskorder/config.toml` |
//!
//! ## Concurrency Safety
//!
//! - [`JsonlStore`] uses file locking (`fs2`) for concurrent access
//! - All rewrites are atomic (temp file + rename)
//!
//! ## Workspace Structure
//!
//! ```text
//! .taskorder/
//! ├── projects.jsonl        # All projects
//! ├── tasks.jsonl           # All tasks, in snapshot order
//! ├── config.toml           # Workspace configuration
//! └── .gitignore            # Ignores interrupted writes
//! ```
//!
//! ## Key Types
//!
//! - [`Workspace`] - Entry point for reading and changing a workspace
//! - [`TaskStore`] / [`ProjectStore`] - Read/write records as JSONL
//! - [`Config`] - Workspace and global configuration

mod jsonl;
mod config;
mod workspace;

pub use jsonl::{JsonlStore, ProjectStore, Record, TaskStore};
pub use config::{Config, ConfigError, GlobalConfig, OrderingConfig, OutputFormat, WorkspaceConfig};
pub use workspace::{NewTask, Workspace, WorkspaceError, WORKSPACE_DIR};
