//! Error types for import and reconciliation.
//!
//! Every variant is fatal for the operation that raised it. Per-record
//! problems (missing or duplicate UIDs) never surface here; they are routed
//! into the reconciliation summary instead.

use thiserror::Error;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum ImportError {
    /// Malformed document or missing required structure. Raised before any write.
    #[error("Parse error: {0}")]
    Parse(String),

    /// A snapshot read failed. Raised before any write.
    #[error("Failed to load {table}: {source}")]
    Load { table: String, source: StoreError },

    /// A chunked write failed. Chunks committed before the failure stay committed.
    #[error("Failed to write {table}: {source}")]
    Write { table: String, source: StoreError },

    /// Missing scope context (organization or project).
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ImportError {
    pub(crate) fn load(table: &str, source: StoreError) -> Self {
        ImportError::Load {
            table: table.to_string(),
            source,
        }
    }

    pub(crate) fn write(table: &str, source: StoreError) -> Self {
        ImportError::Write {
            table: table.to_string(),
            source,
        }
    }

    /// True when some rows may already have been committed.
    pub fn is_partial_write(&self) -> bool {
        matches!(self, ImportError::Write { .. })
    }
}

pub type Result<T> = std::result::Result<T, ImportError>;
