//! Configuration handling for task-order
//!
//! Configuration is stored in `.taskorder/config.toml` (workspace) and
//! `~/.config/taskorder/config.toml` (global).

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::workspace::WORKSPACE_DIR;
use crate::domain::TieBreak;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to parse configuration: {0}")]
    Parse(String),
}

/// Settings for the ordering engine
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct OrderingConfig {
    /// How unconstrained tasks are ranked by priority
    pub tie_break: TieBreak,
}

/// Workspace-level configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct WorkspaceConfig {
    /// Ordering settings
    pub ordering: OrderingConfig,
}

/// Global user configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct GlobalConfig {
    /// Default output format (text or json)
    pub default_format: OutputFormat,
}

/// Output format for commands
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Combined configuration (global + workspace)
#[derive(Debug, Clone)]
pub struct Config {
    pub workspace: WorkspaceConfig,
    pub global: GlobalConfig,
    pub workspace_root: Option<PathBuf>,
}

impl Config {
    /// Loads configuration from default locations
    pub fn load() -> Result<Self> {
        let global = Self::load_global()?;
        let workspace_root = Self::find_workspace_root();
        let workspace = match &workspace_root {
            Some(root) => Self::load_workspace_config(root)?,
            None => WorkspaceConfig::default(),
        };

        Ok(Self {
            workspace,
            global,
            workspace_root,
        })
    }

    /// Loads configuration for a specific workspace
    pub fn for_workspace(root: &Path) -> Result<Self> {
        let global = Self::load_global()?;
        let workspace = Self::load_workspace_config(root)?;

        Ok(Self {
            workspace,
            global,
            workspace_root: Some(root.to_path_buf()),
        })
    }

    /// Returns the global config directory
    pub fn global_config_dir() -> Option<PathBuf> {
        ProjectDirs::from("dev", "task-order", "taskorder")
            .map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Loads global configuration
    fn load_global() -> Result<GlobalConfig> {
        let config_dir = match Self::global_config_dir() {
            Some(dir) => dir,
            None => return Ok(GlobalConfig::default()),
        };

        let config_path = config_dir.join("config.toml");
        if !config_path.exists() {
            return Ok(GlobalConfig::default());
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read global config: {}", config_path.display()))?;

        toml::from_str(&content)
            .map_err(|e| ConfigError::Parse(e.to_string()))
            .context("Failed to parse global config")
    }

    /// Loads workspace configuration from a specific root
    fn load_workspace_config(root: &Path) -> Result<WorkspaceConfig> {
        let config_path = root.join(WORKSPACE_DIR).join("config.toml");

        if !config_path.exists() {
            return Ok(WorkspaceConfig::default());
        }

        let content = fs::read_to_string(&config_path).with_context(|| {
            format!("Failed to read workspace config: {}", config_path.display())
        })?;

        toml::from_str(&content)
            .map_err(|e| ConfigError::Parse(e.to_string()))
            .context("Failed to parse workspace config")
    }

    /// Finds the workspace root by looking for `.taskorder/` upwards from
    /// the current directory
    pub fn find_workspace_root() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;
        Self::find_workspace_root_from(&current)
    }

    /// Finds the workspace root by looking for `.taskorder/` upwards from `start`
    pub fn find_workspace_root_from(start: &Path) -> Option<PathBuf> {
        let mut current = start.to_path_buf();

        loop {
            if current.join(WORKSPACE_DIR).is_dir() {
                return Some(current);
            }

            if !current.pop() {
                return None;
            }
        }
    }

    /// Returns true if we're in a workspace
    pub fn is_in_workspace(&self) -> bool {
        self.workspace_root.is_some()
    }

    /// Returns the workspace root, or an error if not in a workspace
    pub fn require_workspace_root(&self) -> Result<&Path> {
        self.workspace_root
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("Not in a taskorder workspace. Run 'taskorder init' first."))
    }

    /// Returns the configured tie-break policy
    pub fn tie_break(&self) -> TieBreak {
        self.workspace.ordering.tie_break
    }

    /// Saves the workspace configuration
    pub fn save_workspace(&self) -> Result<()> {
        let root = self.require_workspace_root()?;
        let config_path = root.join(WORKSPACE_DIR).join("config.toml");

        let content = toml::to_string_pretty(&self.workspace)
            .context("Failed to serialize workspace config")?;

        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write workspace config: {}", config_path.display()))
    }
}
