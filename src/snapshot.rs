//! Loads the rows already stored for a scope and indexes them for matching.

use std::collections::HashMap;

use serde_json::Value;

use crate::batch::BatchWriter;
use crate::config::ImportConfig;
use crate::error::{ImportError, Result};
use crate::model::Scope;
use crate::store::{id_key, Filter, Row};

/// A stored detail row together with its metadata-list row.
#[derive(Debug, Clone)]
pub struct StoredRecord {
    pub id: Value,
    pub uid: String,
    pub metadata_id: Option<Value>,
    pub row: Row,
    pub metadata: Option<Row>,
}

impl StoredRecord {
    pub fn label(&self) -> Option<String> {
        self.row
            .get("name")
            .and_then(Value::as_str)
            .map(str::to_string)
    }
}

/// Stored records of one kind, in store order, indexed by UID.
#[derive(Debug, Clone, Default)]
pub struct RecordIndex {
    pub records: Vec<StoredRecord>,
    by_uid: HashMap<String, usize>,
    /// Rows with no UID; never matched, never removed.
    pub untracked: usize,
    /// Rows repeating a UID already indexed; left as they are.
    pub duplicates: usize,
}

impl RecordIndex {
    fn build(rows: &[Row], metadata_by_id: &HashMap<String, Row>, table: &str) -> Result<Self> {
        let mut index = RecordIndex::default();
        for row in rows {
            let Some(uid) = row.get("uid").and_then(uid_text) else {
                index.untracked += 1;
                continue;
            };
            if index.by_uid.contains_key(&uid) {
                tracing::warn!("{} holds more than one row for uid {}", table, uid);
                index.duplicates += 1;
                continue;
            }
            let id = row
                .get("id")
                .filter(|v| !v.is_null())
                .cloned()
                .ok_or_else(|| {
                    ImportError::load(
                        table,
                        crate::store::StoreError::Rejected(format!("row for uid {} has no id", uid)),
                    )
                })?;
            let metadata_id = row.get("metadata_list_id").filter(|v| !v.is_null()).cloned();
            let metadata = metadata_id
                .as_ref()
                .and_then(id_key)
                .and_then(|k| metadata_by_id.get(&k).cloned());
            index.by_uid.insert(uid.clone(), index.records.len());
            index.records.push(StoredRecord {
                id,
                uid,
                metadata_id,
                row: row.clone(),
                metadata,
            });
        }
        Ok(index)
    }

    pub fn position(&self, uid: &str) -> Option<usize> {
        self.by_uid.get(uid).copied()
    }

    pub fn get(&self, uid: &str) -> Option<&StoredRecord> {
        self.position(uid).map(|i| &self.records[i])
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Everything stored for one organization and project.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub tasks: RecordIndex,
    pub resources: RecordIndex,
    pub assignments: RecordIndex,
    /// Predecessor rows grouped by their task's metadata-list id.
    pub predecessors_by_metadata: HashMap<String, Vec<Row>>,
    /// The same rows grouped by `task_id`, for tasks written without a
    /// metadata-list row.
    pub predecessors_by_task: HashMap<String, Vec<Row>>,
    pub metadata_by_id: HashMap<String, Row>,
    /// Live task and resource metadata-list rows that no detail row in scope
    /// points at, e.g. left behind by an interrupted insert.
    pub orphan_metadata: Vec<Row>,
}

impl Snapshot {
    /// Stored links of a task, found by metadata-list id or by task id.
    pub fn predecessors_of(&self, record: &StoredRecord) -> Vec<Row> {
        let by_metadata = record
            .metadata_id
            .as_ref()
            .and_then(id_key)
            .and_then(|k| self.predecessors_by_metadata.get(&k));
        let by_task = id_key(&record.id).and_then(|k| self.predecessors_by_task.get(&k));

        let mut rows: Vec<Row> = Vec::new();
        for row in by_metadata.into_iter().chain(by_task).flatten() {
            if !rows.contains(row) {
                rows.push(row.clone());
            }
        }
        rows
    }
}

/// UIDs may be stored as text or numbers; both index the same way.
fn uid_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => crate::model::value::clean_text(s),
        Value::Number(_) => id_key(value),
        _ => None,
    }
}

pub fn load_snapshot(
    batch: &mut BatchWriter<'_>,
    config: &ImportConfig,
    scope: &Scope,
) -> Result<Snapshot> {
    let tables = &config.tables;
    let filters = scope.filters();

    let task_rows = batch.select(&tables.tasks, &filters)?;
    let resource_rows = batch.select(&tables.resources, &filters)?;
    let assignment_rows = batch.select(&tables.assignments, &filters)?;
    let predecessor_rows = batch.select(&tables.predecessors, &filters)?;

    let mut metadata_ids: Vec<Value> = Vec::new();
    let mut seen = std::collections::HashSet::new();
    for row in task_rows.iter().chain(resource_rows.iter()) {
        if let Some(id) = row.get("metadata_list_id").filter(|v| !v.is_null()) {
            if let Some(key) = id_key(id) {
                if seen.insert(key) {
                    metadata_ids.push(id.clone());
                }
            }
        }
    }

    let metadata_rows = batch.select_in(&tables.metadata_list, "id", &metadata_ids, &[])?;
    let metadata_by_id: HashMap<String, Row> = metadata_rows
        .into_iter()
        .filter_map(|row| row.get("id").and_then(id_key).map(|k| (k, row)))
        .collect();

    let labels = &config.labels;
    let mut orphan_filters = filters.clone();
    orphan_filters.push(Filter::eq("source", labels.live.as_str()));
    orphan_filters.push(Filter::is_in(
        "type",
        vec![
            Value::from(labels.task_type.as_str()),
            Value::from(labels.resource_type.as_str()),
        ],
    ));
    let orphan_metadata: Vec<Row> = batch
        .select(&tables.metadata_list, &orphan_filters)?
        .into_iter()
        .filter(|row| {
            row.get("id")
                .and_then(id_key)
                .is_some_and(|k| !seen.contains(&k))
        })
        .collect();

    let mut predecessors_by_metadata: HashMap<String, Vec<Row>> = HashMap::new();
    let mut predecessors_by_task: HashMap<String, Vec<Row>> = HashMap::new();
    for row in predecessor_rows {
        if let Some(key) = row.get("task_id").and_then(id_key) {
            predecessors_by_task.entry(key).or_default().push(row.clone());
        }
        if let Some(key) = row.get("metadata_list_id").and_then(id_key) {
            predecessors_by_metadata.entry(key).or_default().push(row);
        }
    }

    let snapshot = Snapshot {
        tasks: RecordIndex::build(&task_rows, &metadata_by_id, &tables.tasks)?,
        resources: RecordIndex::build(&resource_rows, &metadata_by_id, &tables.resources)?,
        assignments: RecordIndex::build(&assignment_rows, &HashMap::new(), &tables.assignments)?,
        predecessors_by_metadata,
        predecessors_by_task,
        metadata_by_id,
        orphan_metadata,
    };

    tracing::info!(
        "Loaded snapshot: {} tasks, {} resources, {} assignments, {} metadata rows",
        snapshot.tasks.len(),
        snapshot.resources.len(),
        snapshot.assignments.len(),
        snapshot.metadata_by_id.len()
    );
    Ok(snapshot)
}
