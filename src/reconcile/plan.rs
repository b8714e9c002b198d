//! Classification without I/O: which parsed records are skipped, updated or
//! inserted, which stored records are gone, and what happens to those.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::SourceLabels;
use crate::model::task::PredecessorLink;
use crate::model::value::{comparable, timestamps_equal, values_equal};
use crate::model::Tracked;
use crate::snapshot::RecordIndex;
use crate::store::Row;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    MissingUid,
    DuplicateUid,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::MissingUid => write!(f, "missing uid"),
            SkipReason::DuplicateUid => write!(f, "duplicate uid"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedRecord {
    pub uid: Option<String>,
    pub label: Option<String>,
    pub reason: SkipReason,
}

/// Parsed records sorted against a snapshot index.
#[derive(Debug)]
pub struct Triage<'p, T> {
    /// Parsed record and the position of its stored counterpart.
    pub matched: Vec<(&'p T, usize)>,
    pub inserts: Vec<&'p T>,
    pub skipped: Vec<SkippedRecord>,
    /// Positions of stored records no parsed record matched, in store order.
    pub missing: Vec<usize>,
}

/// First occurrence of a UID wins; later ones are skipped, not merged.
pub fn triage<'p, T: Tracked>(parsed: &'p [T], index: &RecordIndex) -> Triage<'p, T> {
    let mut seen_in_file: HashSet<&str> = HashSet::new();
    let mut seen_in_store = vec![false; index.len()];
    let mut triage = Triage {
        matched: Vec::new(),
        inserts: Vec::new(),
        skipped: Vec::new(),
        missing: Vec::new(),
    };

    for item in parsed {
        let label = item.display_label().map(str::to_string);
        let Some(uid) = item.uid().map(str::trim).filter(|u| !u.is_empty()) else {
            triage.skipped.push(SkippedRecord {
                uid: None,
                label,
                reason: SkipReason::MissingUid,
            });
            continue;
        };
        if !seen_in_file.insert(uid) {
            triage.skipped.push(SkippedRecord {
                uid: Some(uid.to_string()),
                label,
                reason: SkipReason::DuplicateUid,
            });
            continue;
        }
        match index.position(uid) {
            Some(pos) => {
                seen_in_store[pos] = true;
                triage.matched.push((item, pos));
            }
            None => triage.inserts.push(item),
        }
    }

    triage.missing = seen_in_store
        .iter()
        .enumerate()
        .filter(|(_, seen)| !**seen)
        .map(|(i, _)| i)
        .collect();
    triage
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    pub field: String,
    pub old: Value,
    pub new: Value,
}

/// Fields of `wanted` whose value differs from `stored` under normalized
/// equality. Fields named in `timestamp_fields` compare as instants.
pub fn diff_fields(stored: &Row, wanted: &Row, timestamp_fields: &[&str]) -> Vec<FieldChange> {
    wanted
        .iter()
        .filter(|(field, value)| {
            let old = stored.get(field.as_str());
            if timestamp_fields.contains(&field.as_str()) {
                !timestamps_equal(old, Some(*value))
            } else {
                !values_equal(old, Some(*value))
            }
        })
        .map(|(field, value)| FieldChange {
            field: field.clone(),
            old: stored.get(field.as_str()).cloned().unwrap_or(Value::Null),
            new: value.clone(),
        })
        .collect()
}

fn signature_part(value: Option<&Value>) -> String {
    value
        .and_then(comparable)
        .map(|c| c.as_text())
        .unwrap_or_default()
}

/// Sorted `uid|type` pairs for a parsed link set.
pub fn link_signature(links: &[PredecessorLink]) -> Vec<String> {
    let mut sig: Vec<String> = links
        .iter()
        .map(|l| {
            format!(
                "{}|{}",
                l.predecessor_uid.trim(),
                l.link_type.map(|t| t.to_string()).unwrap_or_default()
            )
        })
        .collect();
    sig.sort();
    sig
}

/// Sorted `uid|type` pairs for stored predecessor rows.
pub fn stored_link_signature(rows: &[Row]) -> Vec<String> {
    let mut sig: Vec<String> = rows
        .iter()
        .map(|r| {
            format!(
                "{}|{}",
                signature_part(r.get("predecessor_uid")),
                signature_part(r.get("type"))
            )
        })
        .collect();
    sig.sort();
    sig
}

/// Changes needed on a matched record's metadata-list row: the label follows
/// the record's name, and an archived row goes back to the live source.
pub fn metadata_patch(metadata: &Row, label: Option<&str>, labels: &SourceLabels) -> Row {
    let mut patch = Row::new();
    let wanted = label.map_or(Value::Null, Value::from);
    if !values_equal(metadata.get("label"), Some(&wanted)) {
        patch.insert("label".into(), wanted);
    }
    if is_archived(metadata, labels) {
        patch.insert("source".into(), Value::from(labels.live.as_str()));
    }
    patch
}

pub fn is_archived(metadata: &Row, labels: &SourceLabels) -> bool {
    values_equal(
        metadata.get("source"),
        Some(&Value::from(labels.archived.as_str())),
    )
}

/// What happens to a stored record that the new file no longer contains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Disposition {
    /// Unreferenced: removed along with its metadata-list row.
    Deleted,
    /// Referenced: metadata-list row relabelled with the archival sentinel.
    Archived,
    /// Referenced and already archived: nothing to write.
    Kept,
}

pub fn classify_missing(
    metadata: Option<&Row>,
    referenced: bool,
    labels: &SourceLabels,
) -> Disposition {
    if !referenced {
        return Disposition::Deleted;
    }
    match metadata {
        Some(meta) if is_archived(meta, labels) => Disposition::Kept,
        _ => Disposition::Archived,
    }
}
