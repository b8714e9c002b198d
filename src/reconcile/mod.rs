//! Differential re-import of an MS Project export.
//!
//! Each entity kind is reconciled on its own, in the order tasks, resources,
//! assignments. A kind whose section the file does not carry is skipped and
//! its stored rows stay as they are. Within a kind the writes go: metadata
//! rows for matched records that lack one, detail updates, predecessor
//! replacement, metadata re-sync, inserts (metadata row, detail row,
//! predecessor rows), archival, and finally deletes (children first). Last,
//! live metadata rows no detail row points at are swept.
//!
//! There is no transaction across these steps. A failure leaves whatever
//! was already written in place; running the reconciliation again with the
//! same file picks up where it stopped.

pub mod plan;
pub mod summary;

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::batch::BatchWriter;
use crate::config::{ImportConfig, SourceLabels};
use crate::error::{ImportError, Result};
use crate::model::{
    Assignment, ParsedCounts, ParsedProject, PredecessorLink, Resource, Scope, Sections, Task,
    Tracked,
};
use crate::snapshot::{load_snapshot, RecordIndex, Snapshot, StoredRecord};
use crate::store::{id_key, Row, Store, StoreError};
use crate::usage::find_used_metadata_ids;

use plan::Disposition;
pub use summary::{EntitySummary, RecordRef, ReconcileSummary, UpdatedRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Task,
    Resource,
    Assignment,
}

impl EntityKind {
    pub const ALL: [EntityKind; 3] = [EntityKind::Task, EntityKind::Resource, EntityKind::Assignment];

    pub fn plural(self) -> &'static str {
        match self {
            EntityKind::Task => "tasks",
            EntityKind::Resource => "resources",
            EntityKind::Assignment => "assignments",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            EntityKind::Task => "Tasks",
            EntityKind::Resource => "Resources",
            EntityKind::Assignment => "Assignments",
        }
    }
}

/// Kinds that own a metadata-list row.
trait Linked: Tracked {
    const KIND: EntityKind;
    const HAS_PREDECESSORS: bool = false;

    fn links(&self) -> &[PredecessorLink] {
        &[]
    }

    fn detail_table(config: &ImportConfig) -> &str;

    fn type_tag(labels: &SourceLabels) -> &str;
}

impl Linked for Task {
    const KIND: EntityKind = EntityKind::Task;
    const HAS_PREDECESSORS: bool = true;

    fn links(&self) -> &[PredecessorLink] {
        &self.predecessors
    }

    fn detail_table(config: &ImportConfig) -> &str {
        &config.tables.tasks
    }

    fn type_tag(labels: &SourceLabels) -> &str {
        &labels.task_type
    }
}

impl Linked for Resource {
    const KIND: EntityKind = EntityKind::Resource;

    fn detail_table(config: &ImportConfig) -> &str {
        &config.tables.resources
    }

    fn type_tag(labels: &SourceLabels) -> &str {
        &labels.resource_type
    }
}

/// The parsed file as it went into the reconciliation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedSection {
    #[serde(flatten)]
    pub project: ParsedProject,
    pub counts: ParsedCounts,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileOutcome {
    pub parsed: ParsedSection,
    pub summary: ReconcileSummary,
    pub summary_lines: Vec<String>,
    pub dry_run: bool,
}

pub struct Reconciler<'a> {
    batch: BatchWriter<'a>,
    config: &'a ImportConfig,
    scope: &'a Scope,
}

impl<'a> Reconciler<'a> {
    pub fn new(store: &'a mut dyn Store, config: &'a ImportConfig, scope: &'a Scope) -> Self {
        Self {
            batch: BatchWriter::new(store, config.chunk_size),
            config,
            scope,
        }
    }

    pub fn with_progress(self, progress: &'a mut dyn FnMut(&str)) -> Self {
        Self {
            batch: self.batch.with_progress(progress),
            ..self
        }
    }

    /// Read everything and report what would change, without writing.
    pub fn dry_run(self, dry_run: bool) -> Self {
        Self {
            batch: self.batch.dry_run(dry_run),
            ..self
        }
    }

    pub fn run(mut self, parsed: ParsedProject) -> Result<ReconcileOutcome> {
        let dry_run = self.batch.is_dry_run();
        tracing::info!(
            "Reconciling {} tasks, {} resources, {} assignments for organization {} project {}{}",
            parsed.tasks.len(),
            parsed.resources.len(),
            parsed.assignments.len(),
            self.scope.organization_id(),
            self.scope.project_id(),
            if dry_run { " (dry run)" } else { "" }
        );

        let snapshot = load_snapshot(&mut self.batch, self.config, self.scope)?;

        let mut summary = ReconcileSummary::default();
        if dry_run {
            summary.notes.push("Dry run: nothing was written".to_string());
        }
        let sections = parsed.sections;
        for kind in EntityKind::ALL {
            if !carries(sections, kind) {
                tracing::info!("No {} section in the file, leaving stored rows alone", kind.plural());
                summary.notes.push(format!(
                    "The file has no {} section; stored {} were left untouched",
                    kind.plural(),
                    kind.plural()
                ));
            }
        }
        if sections.tasks {
            summary.tasks = self.reconcile_linked(&parsed.tasks, &snapshot.tasks, &snapshot)?;
        }
        if sections.resources {
            summary.resources =
                self.reconcile_linked(&parsed.resources, &snapshot.resources, &snapshot)?;
        }
        if sections.assignments {
            summary.assignments =
                self.reconcile_assignments(&parsed.assignments, &snapshot.assignments)?;
        }
        let swept = self.sweep_orphan_metadata(&snapshot, sections)?;
        if swept > 0 {
            summary
                .notes
                .push(format!("{} orphaned metadata rows were removed", swept));
        }
        summary.notes.extend(untracked_notes(&snapshot, sections));

        let summary_lines = summary.lines(self.config.summary_limit);
        let counts = parsed.counts();
        Ok(ReconcileOutcome {
            parsed: ParsedSection {
                project: parsed,
                counts,
            },
            summary,
            summary_lines,
            dry_run,
        })
    }

    fn reconcile_linked<T: Linked>(
        &mut self,
        parsed: &[T],
        index: &RecordIndex,
        snapshot: &Snapshot,
    ) -> Result<EntitySummary> {
        let config = self.config;
        let scope = self.scope;
        let tables = &config.tables;
        let labels = &config.labels;
        let detail_table = T::detail_table(config);

        let triage = plan::triage(parsed, index);
        let mut out = EntitySummary {
            skipped: triage.skipped,
            ..Default::default()
        };

        // Update check
        let mut detail_patches: BTreeMap<usize, Row> = BTreeMap::new();
        let mut relinked: Vec<(usize, &[PredecessorLink])> = Vec::new();
        let mut metadata_updates: Vec<(Value, Row)> = Vec::new();
        let mut unlinked: Vec<(usize, Option<&str>)> = Vec::new();
        for &(item, pos) in &triage.matched {
            let record = &index.records[pos];
            let mut changed = Vec::new();

            let patch = plan::diff_fields(&record.row, &item.field_values(), T::TIMESTAMP_FIELDS)
                .into_iter()
                .map(|c| {
                    changed.push(c.field.clone());
                    (c.field, c.new)
                })
                .collect::<Row>();
            if !patch.is_empty() {
                detail_patches.insert(pos, patch);
            }

            let repair = record.metadata.is_none();
            if repair {
                changed.push("metadata linked".to_string());
                unlinked.push((pos, item.display_label()));
            }

            if T::HAS_PREDECESSORS {
                let stored_links = snapshot.predecessors_of(record);
                let differs = plan::link_signature(item.links())
                    != plan::stored_link_signature(&stored_links);
                if differs {
                    changed.push("predecessors".to_string());
                }
                // Repaired tasks get their links rewritten under the new metadata id.
                if differs || (repair && !stored_links.is_empty()) {
                    relinked.push((pos, item.links()));
                }
            }

            if let (Some(meta_id), Some(meta)) = (&record.metadata_id, &record.metadata) {
                let patch = plan::metadata_patch(meta, item.display_label(), labels);
                if patch.contains_key("label") {
                    changed.push("metadata label".to_string());
                }
                if patch.contains_key("source") {
                    changed.push("restored".to_string());
                }
                if !patch.is_empty() {
                    metadata_updates.push((meta_id.clone(), patch));
                }
            }

            if !changed.is_empty() {
                out.updated.push(UpdatedRecord {
                    record: RecordRef::new(
                        record.uid.clone(),
                        item.display_label().map(str::to_string),
                    ),
                    changes: changed,
                });
            }
        }

        // Metadata repair: matched rows stored without a metadata-list row.
        let mut repaired: HashMap<usize, Value> = HashMap::new();
        if !unlinked.is_empty() {
            let rows: Vec<Row> = unlinked
                .iter()
                .map(|&(_, label)| metadata_row(scope, labels, T::type_tag(labels), label))
                .collect();
            let created = self.batch.insert(&tables.metadata_list, rows)?;
            let ids = self.generated_ids(&tables.metadata_list, &created, unlinked.len())?;
            for (&(pos, _), id) in unlinked.iter().zip(ids) {
                if let Some(id) = id {
                    detail_patches
                        .entry(pos)
                        .or_default()
                        .insert("metadata_list_id".into(), id.clone());
                    repaired.insert(pos, id);
                }
            }
        }

        let detail_updates: Vec<(Value, Row)> = detail_patches
            .into_iter()
            .map(|(pos, patch)| (index.records[pos].id.clone(), patch))
            .collect();
        self.batch.update_each(detail_table, "id", detail_updates)?;
        if !relinked.is_empty() {
            let stale_metadata: Vec<Value> = relinked
                .iter()
                .filter_map(|&(pos, _)| index.records[pos].metadata_id.clone())
                .collect();
            let stale_tasks: Vec<Value> = relinked
                .iter()
                .map(|&(pos, _)| index.records[pos].id.clone())
                .collect();
            self.batch
                .delete_in(&tables.predecessors, "metadata_list_id", &stale_metadata)?;
            self.batch
                .delete_in(&tables.predecessors, "task_id", &stale_tasks)?;
            let rows: Vec<Row> = relinked
                .iter()
                .flat_map(|&(pos, links)| {
                    let record = &index.records[pos];
                    let metadata_id = repaired.get(&pos).or(record.metadata_id.as_ref());
                    predecessor_rows(scope, &record.id, metadata_id, links)
                })
                .collect();
            self.batch.insert(&tables.predecessors, rows)?;
        }
        self.batch
            .update_each(&tables.metadata_list, "id", metadata_updates)?;

        // Inserts: metadata row first for its id, then the detail row, then links.
        if !triage.inserts.is_empty() {
            let metadata_rows: Vec<Row> = triage
                .inserts
                .iter()
                .map(|item| metadata_row(scope, labels, T::type_tag(labels), item.display_label()))
                .collect();
            let created_metadata = self.batch.insert(&tables.metadata_list, metadata_rows)?;
            let metadata_ids = self.generated_ids(
                &tables.metadata_list,
                &created_metadata,
                triage.inserts.len(),
            )?;

            let detail_rows: Vec<Row> = triage
                .inserts
                .iter()
                .zip(&metadata_ids)
                .map(|(item, metadata_id)| {
                    let mut row = item.field_values();
                    row.insert("uid".into(), Value::from(item.uid().unwrap_or_default().trim()));
                    row.insert(
                        "metadata_list_id".into(),
                        metadata_id.clone().unwrap_or(Value::Null),
                    );
                    scope.stamp(&mut row);
                    row
                })
                .collect();
            let created = self.batch.insert(detail_table, detail_rows)?;
            let detail_ids = self.generated_ids(detail_table, &created, triage.inserts.len())?;

            if T::HAS_PREDECESSORS {
                let rows: Vec<Row> = triage
                    .inserts
                    .iter()
                    .zip(detail_ids.iter().zip(&metadata_ids))
                    .filter_map(|(item, (detail_id, metadata_id))| {
                        detail_id.as_ref().map(|id| {
                            predecessor_rows(scope, id, metadata_id.as_ref(), item.links())
                        })
                    })
                    .flatten()
                    .collect();
                self.batch.insert(&tables.predecessors, rows)?;
            }

            out.inserted = triage
                .inserts
                .iter()
                .map(|item| {
                    RecordRef::new(
                        item.uid().unwrap_or_default().trim(),
                        item.display_label().map(str::to_string),
                    )
                })
                .collect();
        }

        // Deletion / protection
        let missing: Vec<&StoredRecord> = triage.missing.iter().map(|&i| &index.records[i]).collect();
        let candidates: Vec<Value> = missing
            .iter()
            .filter_map(|r| r.metadata_id.clone())
            .collect();
        let used = find_used_metadata_ids(&mut self.batch, config, &candidates, scope)?;

        let mut archive_ids = Vec::new();
        let mut delete_ids = Vec::new();
        let mut delete_metadata_ids = Vec::new();
        for record in missing {
            let referenced = record
                .metadata_id
                .as_ref()
                .and_then(id_key)
                .is_some_and(|k| used.contains(&k));
            let reference = RecordRef::new(record.uid.clone(), record.label());
            match plan::classify_missing(record.metadata.as_ref(), referenced, labels) {
                Disposition::Deleted => {
                    delete_ids.push(record.id.clone());
                    delete_metadata_ids.extend(record.metadata_id.clone());
                    out.deleted.push(reference);
                }
                Disposition::Archived => {
                    archive_ids.extend(record.metadata_id.clone());
                    out.kept_old.push(reference);
                }
                Disposition::Kept => out.kept_old.push(reference),
            }
        }

        if !archive_ids.is_empty() {
            let mut patch = Row::new();
            patch.insert("source".into(), Value::from(labels.archived.as_str()));
            self.batch
                .update_in(&tables.metadata_list, &patch, "id", &archive_ids)?;
        }
        if T::HAS_PREDECESSORS {
            self.batch
                .delete_in(&tables.predecessors, "metadata_list_id", &delete_metadata_ids)?;
            self.batch
                .delete_in(&tables.predecessors, "task_id", &delete_ids)?;
        }
        self.batch.delete_in(detail_table, "id", &delete_ids)?;
        self.batch
            .delete_in(&tables.metadata_list, "id", &delete_metadata_ids)?;

        log_pass(T::KIND, &out);
        Ok(out)
    }

    fn reconcile_assignments(
        &mut self,
        parsed: &[Assignment],
        index: &RecordIndex,
    ) -> Result<EntitySummary> {
        let scope = self.scope;
        let config = self.config;
        let table = &config.tables.assignments;

        let triage = plan::triage(parsed, index);
        let mut out = EntitySummary {
            skipped: triage.skipped,
            ..Default::default()
        };

        let mut updates: Vec<(Value, Row)> = Vec::new();
        for &(item, pos) in &triage.matched {
            let record = &index.records[pos];
            let changes = plan::diff_fields(
                &record.row,
                &item.field_values(),
                Assignment::TIMESTAMP_FIELDS,
            );
            if changes.is_empty() {
                continue;
            }
            out.updated.push(UpdatedRecord {
                record: RecordRef::new(record.uid.clone(), assignment_label(&item.field_values())),
                changes: changes.iter().map(|c| c.field.clone()).collect(),
            });
            updates.push((
                record.id.clone(),
                changes.into_iter().map(|c| (c.field, c.new)).collect(),
            ));
        }
        self.batch.update_each(table, "id", updates)?;

        let rows: Vec<Row> = triage
            .inserts
            .iter()
            .map(|item| {
                let mut row = item.field_values();
                row.insert("uid".into(), Value::from(item.uid().unwrap_or_default().trim()));
                scope.stamp(&mut row);
                row
            })
            .collect();
        out.inserted = triage
            .inserts
            .iter()
            .map(|item| {
                RecordRef::new(
                    item.uid().unwrap_or_default().trim(),
                    assignment_label(&item.field_values()),
                )
            })
            .collect();
        self.batch.insert(table, rows)?;

        // Assignments are plain links: gone from the file means gone.
        let mut delete_ids = Vec::new();
        for &pos in &triage.missing {
            let record = &index.records[pos];
            delete_ids.push(record.id.clone());
            out.deleted
                .push(RecordRef::new(record.uid.clone(), assignment_label(&record.row)));
        }
        self.batch.delete_in(table, "id", &delete_ids)?;

        log_pass(EntityKind::Assignment, &out);
        Ok(out)
    }

    /// Removes live metadata rows of the carried kinds that no detail row
    /// points at, unless another feature still uses them. Returns how many.
    fn sweep_orphan_metadata(&mut self, snapshot: &Snapshot, sections: Sections) -> Result<usize> {
        let config = self.config;
        let labels = &config.labels;
        let mut carried: Vec<&str> = Vec::new();
        if sections.tasks {
            carried.push(&labels.task_type);
        }
        if sections.resources {
            carried.push(&labels.resource_type);
        }

        let candidates: Vec<Value> = snapshot
            .orphan_metadata
            .iter()
            .filter(|row| {
                row.get("type")
                    .and_then(Value::as_str)
                    .is_some_and(|t| carried.contains(&t))
            })
            .filter_map(|row| row.get("id").cloned())
            .collect();
        if candidates.is_empty() {
            return Ok(0);
        }

        let used = find_used_metadata_ids(&mut self.batch, config, &candidates, self.scope)?;
        let unused: Vec<Value> = candidates
            .into_iter()
            .filter(|id| id_key(id).is_some_and(|k| !used.contains(&k)))
            .collect();
        if !unused.is_empty() {
            tracing::warn!("Removing {} orphaned metadata rows", unused.len());
        }
        self.batch
            .delete_in(&config.tables.metadata_list, "id", &unused)?;
        Ok(unused.len())
    }

    /// Ids of freshly inserted rows, one per requested row. Dry runs get `None`s.
    fn generated_ids(&self, table: &str, created: &[Row], expected: usize) -> Result<Vec<Option<Value>>> {
        if self.batch.is_dry_run() {
            return Ok(vec![None; expected]);
        }
        if created.len() != expected {
            return Err(ImportError::write(
                table,
                StoreError::Rejected(format!(
                    "store returned {} rows for {} inserted",
                    created.len(),
                    expected
                )),
            ));
        }
        created
            .iter()
            .map(|row| match row.get("id").filter(|v| !v.is_null()) {
                Some(id) => Ok(Some(id.clone())),
                None => Err(ImportError::write(
                    table,
                    StoreError::Rejected("inserted row came back without an id".into()),
                )),
            })
            .collect()
    }
}

fn metadata_row(scope: &Scope, labels: &SourceLabels, type_tag: &str, label: Option<&str>) -> Row {
    let mut row = Row::new();
    row.insert("source".into(), Value::from(labels.live.as_str()));
    row.insert("label".into(), label.map_or(Value::Null, Value::from));
    row.insert("type".into(), Value::from(type_tag));
    scope.stamp(&mut row);
    row
}

fn predecessor_rows(
    scope: &Scope,
    task_id: &Value,
    metadata_id: Option<&Value>,
    links: &[PredecessorLink],
) -> Vec<Row> {
    links
        .iter()
        .map(|link| {
            let mut row = Row::new();
            row.insert("task_id".into(), task_id.clone());
            row.insert(
                "metadata_list_id".into(),
                metadata_id.cloned().unwrap_or(Value::Null),
            );
            row.insert(
                "predecessor_uid".into(),
                Value::from(link.predecessor_uid.trim()),
            );
            row.insert(
                "type".into(),
                link.link_type.map_or(Value::Null, Value::from),
            );
            scope.stamp(&mut row);
            row
        })
        .collect()
}

fn assignment_label(row: &Row) -> Option<String> {
    let part = |key: &str| {
        row.get(key)
            .and_then(crate::model::value::comparable)
            .map(|c| c.as_text())
    };
    match (part("task_uid"), part("resource_uid")) {
        (None, None) => None,
        (task, resource) => Some(format!(
            "task {} / resource {}",
            task.unwrap_or_else(|| "?".into()),
            resource.unwrap_or_else(|| "?".into())
        )),
    }
}

fn carries(sections: Sections, kind: EntityKind) -> bool {
    match kind {
        EntityKind::Task => sections.tasks,
        EntityKind::Resource => sections.resources,
        EntityKind::Assignment => sections.assignments,
    }
}

fn untracked_notes(snapshot: &Snapshot, sections: Sections) -> Vec<String> {
    let mut notes = Vec::new();
    for (kind, index) in [
        (EntityKind::Task, &snapshot.tasks),
        (EntityKind::Resource, &snapshot.resources),
    ] {
        if !carries(sections, kind) {
            continue;
        }
        if index.untracked > 0 {
            notes.push(format!(
                "{} stored {} without a uid were left untouched",
                index.untracked,
                kind.plural()
            ));
        }
        if index.duplicates > 0 {
            notes.push(format!(
                "{} stored {} repeat an already matched uid and were left untouched",
                index.duplicates,
                kind.plural()
            ));
        }
    }
    if !sections.assignments {
        return notes;
    }
    if snapshot.assignments.untracked > 0 {
        notes.push(format!(
            "{} legacy assignment rows without a uid were left untouched",
            snapshot.assignments.untracked
        ));
    }
    if snapshot.assignments.duplicates > 0 {
        notes.push(format!(
            "{} stored assignments repeat an already matched uid and were left untouched",
            snapshot.assignments.duplicates
        ));
    }
    notes
}

fn log_pass(kind: EntityKind, s: &EntitySummary) {
    tracing::info!(
        "{}: {} updated, {} inserted, {} deleted, {} kept (old), {} skipped",
        kind.title(),
        s.updated.len(),
        s.inserted.len(),
        s.deleted.len(),
        s.kept_old.len(),
        s.skipped.len()
    );
}

/// Reconcile already-parsed records with progress reporting off.
pub fn reconcile(
    store: &mut dyn Store,
    config: &ImportConfig,
    scope: &Scope,
    parsed: ParsedProject,
) -> Result<ReconcileOutcome> {
    Reconciler::new(store, config, scope).run(parsed)
}
