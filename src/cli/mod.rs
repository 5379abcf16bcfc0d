//! # Command-Line Interface
//!
//! User-facing CLI commands and output formatting.
//!
//! ## Command Groups
//!
//! | Group | Purpose | Examples |
//! |-------|---------|----------|
//! | Core | Workspace setup | `init` |
//! | Project | Tenant scopes | `project new`, `project list` |
//! | Task | Work item management | `task add`, `task dep`, `task done` |
//! | Query | Ordering and state | `sorted`, `ready`, `blocked`, `order` |
//!
//! ## Output Formats
//!
//! All commands support the `--format` flag:
//! - `text` (default) - Human-readable output
//! - `json` - Machine-parseable JSON
//!
//! ## Verbose Mode
//!
//! Use `--verbose` (or `-v`) for debug logging on stderr. `RUST_LOG`
//! overrides the filter:
//! ```bash
//! taskorder --verbose sorted p-1a2b3c4
//! RUST_LOG=task_order=trace taskorder sorted p-1a2b3c4
//! ```
//!
//! ## Entry Point
//!
//! Call [`run()`] to parse arguments and execute the appropriate command.

mod app;
mod output;
mod project;
mod task;
mod query;

pub use app::{Cli, Commands, run};
pub use output::{Output, OutputFormat};
