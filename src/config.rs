//! Import settings: table names, source labels, batch sizes.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::batch::DEFAULT_CHUNK_SIZE;
use crate::error::{ImportError, Result};

/// Names of the tables the importer reads and writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableNames {
    pub metadata_list: String,
    pub tasks: String,
    pub resources: String,
    pub assignments: String,
    pub predecessors: String,
    /// Rows recording which metadata entries other features consume.
    pub usage: String,
}

impl Default for TableNames {
    fn default() -> Self {
        Self {
            metadata_list: "metadata_list".into(),
            tasks: "msp_tasks".into(),
            resources: "msp_resources".into(),
            assignments: "msp_assignments".into(),
            predecessors: "msp_predecessors".into(),
            usage: "metadata_usage".into(),
        }
    }
}

/// Values written to the metadata-list `source` and `type` columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceLabels {
    pub live: String,
    /// Marks a row that is gone from the source file but still referenced.
    pub archived: String,
    pub task_type: String,
    pub resource_type: String,
}

impl Default for SourceLabels {
    fn default() -> Self {
        Self {
            live: "ms project".into(),
            archived: "ms project - old".into(),
            task_type: "task".into(),
            resource_type: "resource".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    pub chunk_size: usize,
    /// Records listed per summary category before eliding the rest.
    pub summary_limit: usize,
    pub tables: TableNames,
    pub labels: SourceLabels,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            summary_limit: 25,
            tables: TableNames::default(),
            labels: SourceLabels::default(),
        }
    }
}

impl ImportConfig {
    /// Load from `path`, or from the platform config directory when `None`.
    /// A missing file yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match Self::default_path() {
                Some(p) => p,
                None => return Ok(Self::default()),
            },
        };
        if !path.exists() {
            tracing::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let json = std::fs::read_to_string(&path)?;
        let config: ImportConfig = serde_json::from_str(&json)
            .map_err(|e| ImportError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// `config.json` in the platform config directory.
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "MspReconcile")
            .map(|dirs| dirs.config_dir().join("config.json"))
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(ImportError::Config("chunk_size must be at least 1".into()));
        }
        if self.labels.live.trim() == self.labels.archived.trim() {
            return Err(ImportError::Config(
                "live and archived source labels must differ".into(),
            ));
        }
        Ok(())
    }
}
