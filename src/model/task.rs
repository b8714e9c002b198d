use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::value::{float_value, int_value, text_value, timestamp_value};
use super::Tracked;
use crate::store::Row;

/// The type of dependency between two tasks, keyed by its MS Project code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DependencyKind {
    FinishToFinish,
    FinishToStart,
    StartToFinish,
    StartToStart,
}

impl DependencyKind {
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(DependencyKind::FinishToFinish),
            1 => Some(DependencyKind::FinishToStart),
            2 => Some(DependencyKind::StartToFinish),
            3 => Some(DependencyKind::StartToStart),
            _ => None,
        }
    }

    pub fn code(self) -> i64 {
        match self {
            DependencyKind::FinishToFinish => 0,
            DependencyKind::FinishToStart => 1,
            DependencyKind::StartToFinish => 2,
            DependencyKind::StartToStart => 3,
        }
    }

    /// Parse the two-letter abbreviation used in tabular exports.
    pub fn from_abbrev(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "FF" => Some(DependencyKind::FinishToFinish),
            "FS" => Some(DependencyKind::FinishToStart),
            "SF" => Some(DependencyKind::StartToFinish),
            "SS" => Some(DependencyKind::StartToStart),
            _ => None,
        }
    }
}

/// A link from a task to one of its predecessors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredecessorLink {
    pub predecessor_uid: String,
    /// Raw link-type code; unknown codes are kept as-is.
    pub link_type: Option<i64>,
}

impl PredecessorLink {
    pub fn kind(&self) -> Option<DependencyKind> {
        self.link_type.and_then(DependencyKind::from_code)
    }
}

/// A task as read from an MS Project export.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub uid: Option<String>,
    pub name: Option<String>,
    /// Hierarchical position code, e.g. `2.1.3`.
    pub wbs: Option<String>,
    pub parent_wbs: Option<String>,
    pub outline_level: Option<i64>,
    pub start: Option<NaiveDateTime>,
    pub finish: Option<NaiveDateTime>,
    /// Interval phrase such as `2 days 3 hours`.
    pub duration: Option<String>,
    pub percent_complete: Option<f64>,
    pub actual_start: Option<NaiveDateTime>,
    pub actual_finish: Option<NaiveDateTime>,
    pub fixed_cost: Option<f64>,
    pub notes: Option<String>,
    pub has_predecessors: bool,
    /// Taken from baseline number 0 only.
    pub baseline_start: Option<NaiveDateTime>,
    pub baseline_finish: Option<NaiveDateTime>,
    pub predecessors: Vec<PredecessorLink>,
}

impl Task {
    /// Create a task with a UID and name; everything else empty.
    pub fn new(uid: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            uid: Some(uid.into()),
            name: Some(name.into()),
            ..Default::default()
        }
    }

    /// Set the WBS code and the parent derived from it.
    pub fn set_wbs(&mut self, wbs: Option<String>) {
        self.parent_wbs = wbs.as_deref().and_then(parent_wbs);
        self.wbs = wbs;
    }

    /// Replace the predecessor links, keeping `has_predecessors` in step.
    pub fn set_predecessors(&mut self, links: Vec<PredecessorLink>) {
        self.has_predecessors = !links.is_empty();
        self.predecessors = links;
    }
}

/// WBS with its last dot-segment removed; `None` for a single segment.
pub fn parent_wbs(wbs: &str) -> Option<String> {
    let wbs = wbs.trim();
    wbs.rfind('.')
        .map(|pos| wbs[..pos].to_string())
        .filter(|p| !p.is_empty())
}

impl Tracked for Task {
    const TIMESTAMP_FIELDS: &'static [&'static str] = &[
        "start",
        "finish",
        "actual_start",
        "actual_finish",
        "baseline_start",
        "baseline_finish",
    ];

    fn uid(&self) -> Option<&str> {
        self.uid.as_deref()
    }

    fn display_label(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn field_values(&self) -> Row {
        let mut row = Row::new();
        row.insert("name".into(), text_value(&self.name));
        row.insert("wbs".into(), text_value(&self.wbs));
        row.insert("parent_wbs".into(), text_value(&self.parent_wbs));
        row.insert("outline_level".into(), int_value(self.outline_level));
        row.insert("start".into(), timestamp_value(&self.start));
        row.insert("finish".into(), timestamp_value(&self.finish));
        row.insert("duration".into(), text_value(&self.duration));
        row.insert("percent_complete".into(), float_value(self.percent_complete));
        row.insert("actual_start".into(), timestamp_value(&self.actual_start));
        row.insert("actual_finish".into(), timestamp_value(&self.actual_finish));
        row.insert("fixed_cost".into(), float_value(self.fixed_cost));
        row.insert("notes".into(), text_value(&self.notes));
        row.insert("has_predecessors".into(), Value::Bool(self.has_predecessors));
        row.insert("baseline_start".into(), timestamp_value(&self.baseline_start));
        row.insert("baseline_finish".into(), timestamp_value(&self.baseline_finish));
        row
    }
}
