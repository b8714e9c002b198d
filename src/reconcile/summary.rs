use std::fmt;

use serde::{Deserialize, Serialize};

use super::plan::SkippedRecord;
use super::EntityKind;

/// A record named in the summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordRef {
    pub uid: String,
    pub label: Option<String>,
}

impl RecordRef {
    pub fn new(uid: impl Into<String>, label: Option<String>) -> Self {
        Self {
            uid: uid.into(),
            label,
        }
    }
}

impl fmt::Display for RecordRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.label {
            Some(label) => write!(f, "{} ({})", self.uid, label),
            None => write!(f, "{}", self.uid),
        }
    }
}

/// A matched record and the names of what changed on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatedRecord {
    #[serde(flatten)]
    pub record: RecordRef,
    pub changes: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntitySummary {
    pub updated: Vec<UpdatedRecord>,
    pub inserted: Vec<RecordRef>,
    pub deleted: Vec<RecordRef>,
    /// Gone from the file but still referenced, so archived instead of deleted.
    pub kept_old: Vec<RecordRef>,
    pub skipped: Vec<SkippedRecord>,
}

impl EntitySummary {
    /// Updates, inserts and deletes. Archival is not counted.
    pub fn change_count(&self) -> usize {
        self.updated.len() + self.inserted.len() + self.deleted.len()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileSummary {
    pub tasks: EntitySummary,
    pub resources: EntitySummary,
    pub assignments: EntitySummary,
    pub notes: Vec<String>,
}

impl ReconcileSummary {
    pub fn get(&self, kind: EntityKind) -> &EntitySummary {
        match kind {
            EntityKind::Task => &self.tasks,
            EntityKind::Resource => &self.resources,
            EntityKind::Assignment => &self.assignments,
        }
    }

    pub fn change_count(&self) -> usize {
        EntityKind::ALL
            .iter()
            .map(|k| self.get(*k).change_count())
            .sum()
    }

    /// The human-readable report: tasks, resources, assignments, then notes.
    /// Each category lists at most `limit` records.
    pub fn lines(&self, limit: usize) -> Vec<String> {
        let mut lines = Vec::new();
        for kind in EntityKind::ALL {
            let s = self.get(kind);
            lines.push(format!(
                "{}: {} updated, {} inserted, {} deleted, {} kept (old), {} skipped",
                kind.title(),
                s.updated.len(),
                s.inserted.len(),
                s.deleted.len(),
                s.kept_old.len(),
                s.skipped.len()
            ));

            let updated: Vec<String> = s
                .updated
                .iter()
                .map(|u| format!("{}: {}", u.record, u.changes.join(", ")))
                .collect();
            push_section(&mut lines, "Updated", kind, &updated, limit);
            push_section(&mut lines, "Inserted", kind, &to_strings(&s.inserted), limit);
            push_section(&mut lines, "Deleted", kind, &to_strings(&s.deleted), limit);
            push_section(&mut lines, "Kept (old)", kind, &to_strings(&s.kept_old), limit);

            let skipped: Vec<String> = s
                .skipped
                .iter()
                .map(|r| {
                    let who = match (&r.uid, &r.label) {
                        (Some(uid), Some(label)) => format!("{} ({})", uid, label),
                        (Some(uid), None) => uid.clone(),
                        (None, Some(label)) => format!("no uid ({})", label),
                        (None, None) => "no uid".to_string(),
                    };
                    format!("{}: {}", who, r.reason)
                })
                .collect();
            push_section(&mut lines, "Skipped", kind, &skipped, limit);
        }

        if !self.notes.is_empty() {
            lines.push("Notes:".to_string());
            for note in &self.notes {
                lines.push(format!("  - {}", note));
            }
        }
        lines
    }
}

fn to_strings(records: &[RecordRef]) -> Vec<String> {
    records.iter().map(ToString::to_string).collect()
}

fn push_section(
    lines: &mut Vec<String>,
    heading: &str,
    kind: EntityKind,
    entries: &[String],
    limit: usize,
) {
    if entries.is_empty() {
        return;
    }
    lines.push(format!(
        "  {} {} ({}):",
        heading,
        kind.plural(),
        entries.len()
    ));
    for entry in entries.iter().take(limit) {
        lines.push(format!("    - {}", entry));
    }
    if entries.len() > limit {
        lines.push(format!("    ...and {} more", entries.len() - limit));
    }
}
