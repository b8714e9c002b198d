use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ImportError, Result};
use crate::store::{Filter, Row};

/// The organization/project (and optional project type) a reconciliation
/// is confined to. Only constructible with both required ids present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scope {
    organization_id: String,
    project_id: String,
    project_type_id: Option<String>,
}

impl Scope {
    pub fn new(
        organization_id: &str,
        project_id: &str,
        project_type_id: Option<&str>,
    ) -> Result<Self> {
        let organization_id = organization_id.trim();
        let project_id = project_id.trim();
        if organization_id.is_empty() {
            return Err(ImportError::Validation(
                "an organization must be selected".into(),
            ));
        }
        if project_id.is_empty() {
            return Err(ImportError::Validation("a project must be selected".into()));
        }
        Ok(Self {
            organization_id: organization_id.to_string(),
            project_id: project_id.to_string(),
            project_type_id: project_type_id
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
        })
    }

    pub fn organization_id(&self) -> &str {
        &self.organization_id
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn project_type_id(&self) -> Option<&str> {
        self.project_type_id.as_deref()
    }

    /// Filters restricting a read to this organization and project.
    pub fn filters(&self) -> Vec<Filter> {
        vec![
            Filter::eq("organization_id", self.organization_id.as_str()),
            Filter::eq("project_id", self.project_id.as_str()),
        ]
    }

    /// Write the scope columns onto a row about to be inserted.
    pub fn stamp(&self, row: &mut Row) {
        row.insert("organization_id".into(), Value::from(self.organization_id.as_str()));
        row.insert("project_id".into(), Value::from(self.project_id.as_str()));
        row.insert(
            "project_type_id".into(),
            self.project_type_id
                .as_deref()
                .map_or(Value::Null, Value::from),
        );
    }
}
