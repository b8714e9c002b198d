use serde::{Deserialize, Serialize};

use super::value::{float_value, int_value, text_value};
use super::Tracked;
use crate::store::Row;

/// A resource (person, material, cost) from an MS Project export.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub uid: Option<String>,
    /// The export's positional `ID`, distinct from the UID.
    pub row_id: Option<String>,
    pub name: Option<String>,
    pub type_code: Option<String>,
    pub max_units: Option<i64>,
    pub standard_rate: Option<f64>,
}

impl Resource {
    pub fn new(uid: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            uid: Some(uid.into()),
            name: Some(name.into()),
            ..Default::default()
        }
    }
}

impl Tracked for Resource {
    fn uid(&self) -> Option<&str> {
        self.uid.as_deref()
    }

    fn display_label(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn field_values(&self) -> Row {
        let mut row = Row::new();
        row.insert("row_id".into(), text_value(&self.row_id));
        row.insert("name".into(), text_value(&self.name));
        row.insert("type".into(), text_value(&self.type_code));
        row.insert("max_units".into(), int_value(self.max_units));
        row.insert("standard_rate".into(), float_value(self.standard_rate));
        row
    }
}
