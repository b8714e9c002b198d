//! Reading MS Project exports into [`ParsedProject`] records.

pub mod duration;
pub mod grid;
pub mod msp_xml;
pub mod tabular;
pub mod xml;

use std::path::Path;

use tracing::debug;

use crate::error::{ImportError, Result};
use crate::model::ParsedProject;

pub use duration::normalize_duration;
pub use msp_xml::parse_project_xml;
pub use tabular::{parse_predecessor_list, parse_task_grid};

/// Parse an export file, choosing the reader by extension.
pub fn parse_file(path: &Path) -> Result<ParsedProject> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    let project = match ext.as_str() {
        "xml" => parse_project_xml(&std::fs::read_to_string(path)?)?,
        "txt" | "csv" | "tsv" => {
            let grid = grid::read_delimited_grid(&std::fs::read_to_string(path)?)?;
            parse_task_grid(&grid)?
        }
        "xlsx" | "xlsm" | "xls" | "ods" => parse_task_grid(&grid::read_workbook_grid(path)?)?,
        _ => {
            return Err(ImportError::Parse(format!(
                "unsupported file type: {}",
                path.display()
            )))
        }
    };

    let counts = project.counts();
    debug!(
        file = %path.display(),
        tasks = counts.tasks,
        resources = counts.resources,
        assignments = counts.assignments,
        "parsed export"
    );
    Ok(project)
}
