use serde::{Deserialize, Serialize};

use super::value::text_value;
use super::Tracked;
use crate::store::Row;

/// Links a resource to a task. Carries no attributes of its own.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    /// Absent on rows written by older importers.
    pub uid: Option<String>,
    pub task_uid: Option<String>,
    pub resource_uid: Option<String>,
}

impl Assignment {
    pub fn new(
        uid: impl Into<String>,
        task_uid: impl Into<String>,
        resource_uid: impl Into<String>,
    ) -> Self {
        Self {
            uid: Some(uid.into()),
            task_uid: Some(task_uid.into()),
            resource_uid: Some(resource_uid.into()),
        }
    }
}

impl Tracked for Assignment {
    fn uid(&self) -> Option<&str> {
        self.uid.as_deref()
    }

    fn display_label(&self) -> Option<&str> {
        None
    }

    fn field_values(&self) -> Row {
        let mut row = Row::new();
        row.insert("task_uid".into(), text_value(&self.task_uid));
        row.insert("resource_uid".into(), text_value(&self.resource_uid));
        row
    }
}
