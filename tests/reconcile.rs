use serde_json::{json, Value};

use msp_reconcile::model::{Assignment, PredecessorLink, Resource, Sections, Task};
use msp_reconcile::reconcile::plan::SkipReason;
use msp_reconcile::store::{MemoryStore, Row, Store, StoreOp};
use msp_reconcile::{reconcile, ImportConfig, ImportError, ParsedProject, Reconciler, Scope};

fn scope() -> Scope {
    Scope::new("acme", "p1", Some("construction")).unwrap()
}

fn link(uid: &str, link_type: i64) -> PredecessorLink {
    PredecessorLink {
        predecessor_uid: uid.into(),
        link_type: Some(link_type),
    }
}

fn task(uid: &str, name: &str, links: Vec<PredecessorLink>) -> Task {
    let mut t = Task::new(uid, name);
    t.set_wbs(Some(format!("1.{}", uid)));
    t.percent_complete = Some(50.0);
    t.duration = Some("2 days".into());
    t.set_predecessors(links);
    t
}

fn sample() -> ParsedProject {
    ParsedProject {
        tasks: vec![task("1", "Plan", vec![]), task("2", "Build", vec![link("1", 1)])],
        resources: vec![Resource::new("10", "Crew")],
        assignments: vec![Assignment::new("100", "2", "10")],
        ..Default::default()
    }
}

fn row(v: Value) -> Row {
    v.as_object().cloned().unwrap()
}

fn by_uid<'a>(store: &'a MemoryStore, table: &str, uid: &str) -> Option<&'a Row> {
    store.rows(table).iter().find(|r| r["uid"] == json!(uid))
}

fn by_id<'a>(store: &'a MemoryStore, table: &str, id: &Value) -> Option<&'a Row> {
    store.rows(table).iter().find(|r| &r["id"] == id)
}

fn imported() -> (MemoryStore, ImportConfig) {
    let mut store = MemoryStore::new();
    let config = ImportConfig::default();
    reconcile(&mut store, &config, &scope(), sample()).unwrap();
    store.clear_calls();
    (store, config)
}

fn mark_used(store: &mut MemoryStore, metadata_id: &Value) {
    store
        .insert(
            "metadata_usage",
            vec![row(json!({
                "metadata_list_id": metadata_id,
                "organization_id": "acme",
                "project_id": "p1",
            }))],
        )
        .unwrap();
    store.clear_calls();
}

#[test]
fn test_fresh_import_links_metadata_detail_and_predecessors() {
    let mut store = MemoryStore::new();
    let config = ImportConfig::default();
    let outcome = reconcile(&mut store, &config, &scope(), sample()).unwrap();

    assert_eq!(outcome.summary.tasks.inserted.len(), 2);
    assert_eq!(outcome.summary.resources.inserted.len(), 1);
    assert_eq!(outcome.summary.assignments.inserted.len(), 1);
    assert_eq!(outcome.parsed.counts.tasks, 2);
    assert_eq!(store.rows("metadata_list").len(), 3);

    let build = by_uid(&store, "msp_tasks", "2").unwrap();
    assert_eq!(build["name"], json!("Build"));
    assert_eq!(build["parent_wbs"], json!("1"));
    assert_eq!(build["has_predecessors"], json!(true));
    assert_eq!(build["organization_id"], json!("acme"));
    assert_eq!(build["project_type_id"], json!("construction"));

    let meta = by_id(&store, "metadata_list", &build["metadata_list_id"]).unwrap();
    assert_eq!(meta["label"], json!("Build"));
    assert_eq!(meta["source"], json!("ms project"));
    assert_eq!(meta["type"], json!("task"));

    let preds = store.rows("msp_predecessors");
    assert_eq!(preds.len(), 1);
    assert_eq!(preds[0]["task_id"], build["id"]);
    assert_eq!(preds[0]["metadata_list_id"], build["metadata_list_id"]);
    assert_eq!(preds[0]["predecessor_uid"], json!("1"));
    assert_eq!(preds[0]["type"], json!(1));

    let crew = by_uid(&store, "msp_resources", "10").unwrap();
    let meta = by_id(&store, "metadata_list", &crew["metadata_list_id"]).unwrap();
    assert_eq!(meta["type"], json!("resource"));

    let assignment = by_uid(&store, "msp_assignments", "100").unwrap();
    assert_eq!(assignment["task_uid"], json!("2"));
    assert!(!assignment.contains_key("metadata_list_id"));
}

#[test]
fn test_reimporting_the_same_file_writes_nothing() {
    let (mut store, config) = imported();
    let outcome = reconcile(&mut store, &config, &scope(), sample()).unwrap();

    assert!(store.write_calls().is_empty(), "{:?}", store.write_calls());
    assert_eq!(outcome.summary.change_count(), 0);
    assert!(outcome.summary.tasks.kept_old.is_empty());
}

#[test]
fn test_update_keeps_row_identity() {
    let (mut store, config) = imported();
    let before = by_uid(&store, "msp_tasks", "1").unwrap().clone();

    let mut parsed = sample();
    parsed.tasks[0].name = Some("Plan v2".into());
    let outcome = reconcile(&mut store, &config, &scope(), parsed).unwrap();

    let updated = &outcome.summary.tasks.updated;
    assert_eq!(updated.len(), 1);
    assert_eq!(updated[0].record.uid, "1");
    assert_eq!(updated[0].changes, vec!["name", "metadata label"]);

    let after = by_uid(&store, "msp_tasks", "1").unwrap();
    assert_eq!(after["id"], before["id"]);
    assert_eq!(after["name"], json!("Plan v2"));
    let meta = by_id(&store, "metadata_list", &after["metadata_list_id"]).unwrap();
    assert_eq!(meta["label"], json!("Plan v2"));
    assert_eq!(store.rows("msp_tasks").len(), 2);
}

#[test]
fn test_referenced_record_is_archived_not_deleted() {
    let (mut store, config) = imported();
    let plan = by_uid(&store, "msp_tasks", "1").unwrap().clone();
    mark_used(&mut store, &plan["metadata_list_id"]);

    let mut parsed = sample();
    parsed.tasks.remove(0);
    let outcome = reconcile(&mut store, &config, &scope(), parsed.clone()).unwrap();

    assert_eq!(outcome.summary.tasks.kept_old.len(), 1);
    assert_eq!(outcome.summary.tasks.kept_old[0].uid, "1");
    assert!(outcome.summary.tasks.deleted.is_empty());

    assert_eq!(by_uid(&store, "msp_tasks", "1"), Some(&plan));
    let meta = by_id(&store, "metadata_list", &plan["metadata_list_id"]).unwrap();
    assert_eq!(meta["source"], json!("ms project - old"));

    // Already archived: a further run reports it again but writes nothing.
    store.clear_calls();
    let outcome = reconcile(&mut store, &config, &scope(), parsed).unwrap();
    assert_eq!(outcome.summary.tasks.kept_old.len(), 1);
    assert!(store.write_calls().is_empty());
}

#[test]
fn test_archived_record_is_restored_when_it_returns() {
    let (mut store, config) = imported();
    let plan = by_uid(&store, "msp_tasks", "1").unwrap().clone();
    mark_used(&mut store, &plan["metadata_list_id"]);

    let mut without = sample();
    without.tasks.remove(0);
    reconcile(&mut store, &config, &scope(), without).unwrap();

    let outcome = reconcile(&mut store, &config, &scope(), sample()).unwrap();
    let updated = &outcome.summary.tasks.updated;
    assert_eq!(updated.len(), 1);
    assert_eq!(updated[0].changes, vec!["restored"]);
    let meta = by_id(&store, "metadata_list", &plan["metadata_list_id"]).unwrap();
    assert_eq!(meta["source"], json!("ms project"));
}

#[test]
fn test_unreferenced_record_is_deleted_with_its_children() {
    let (mut store, config) = imported();
    let build = by_uid(&store, "msp_tasks", "2").unwrap().clone();

    let parsed = ParsedProject {
        tasks: vec![task("1", "Plan", vec![])],
        resources: vec![Resource::new("10", "Crew")],
        assignments: vec![],
        ..Default::default()
    };
    let outcome = reconcile(&mut store, &config, &scope(), parsed).unwrap();

    assert_eq!(outcome.summary.tasks.deleted.len(), 1);
    assert_eq!(outcome.summary.tasks.deleted[0].uid, "2");
    assert_eq!(outcome.summary.assignments.deleted.len(), 1);

    assert!(by_uid(&store, "msp_tasks", "2").is_none());
    assert!(by_id(&store, "metadata_list", &build["metadata_list_id"]).is_none());
    assert!(store.rows("msp_predecessors").is_empty());
    assert!(store.rows("msp_assignments").is_empty());
    assert_eq!(store.rows("metadata_list").len(), 2);
}

#[test]
fn test_used_resource_is_archived_and_unused_one_deleted() {
    let mut store = MemoryStore::new();
    let config = ImportConfig::default();
    let mut parsed = sample();
    parsed.resources.push(Resource::new("11", "Spare"));
    reconcile(&mut store, &config, &scope(), parsed).unwrap();

    let crew = by_uid(&store, "msp_resources", "10").unwrap().clone();
    let spare = by_uid(&store, "msp_resources", "11").unwrap().clone();
    mark_used(&mut store, &crew["metadata_list_id"]);

    let mut parsed = sample();
    parsed.resources.clear();
    let outcome = reconcile(&mut store, &config, &scope(), parsed).unwrap();

    let resources = &outcome.summary.resources;
    assert_eq!(resources.kept_old.len(), 1);
    assert_eq!(resources.kept_old[0].uid, "10");
    assert_eq!(resources.deleted.len(), 1);
    assert_eq!(resources.deleted[0].uid, "11");

    assert_eq!(by_uid(&store, "msp_resources", "10"), Some(&crew));
    let meta = by_id(&store, "metadata_list", &crew["metadata_list_id"]).unwrap();
    assert_eq!(meta["source"], json!("ms project - old"));
    assert!(by_uid(&store, "msp_resources", "11").is_none());
    assert!(by_id(&store, "metadata_list", &spare["metadata_list_id"]).is_none());
    assert_eq!(store.rows("metadata_list").len(), 3);
}

#[test]
fn test_assignment_endpoints_update_in_place() {
    let (mut store, config) = imported();
    let before = by_uid(&store, "msp_assignments", "100").unwrap().clone();

    let mut parsed = sample();
    parsed.assignments[0] = Assignment::new("100", "1", "10");
    let outcome = reconcile(&mut store, &config, &scope(), parsed.clone()).unwrap();
    let updated = &outcome.summary.assignments.updated;
    assert_eq!(updated.len(), 1);
    assert_eq!(updated[0].record.uid, "100");
    assert_eq!(updated[0].changes, vec!["task_uid"]);

    parsed.assignments[0] = Assignment::new("100", "1", "12");
    let outcome = reconcile(&mut store, &config, &scope(), parsed).unwrap();
    assert_eq!(outcome.summary.assignments.updated[0].changes, vec!["resource_uid"]);
    assert!(outcome.summary.assignments.inserted.is_empty());
    assert!(outcome.summary.assignments.deleted.is_empty());

    let rows = store.rows("msp_assignments");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["id"], before["id"]);
    assert_eq!(rows[0]["task_uid"], json!("1"));
    assert_eq!(rows[0]["resource_uid"], json!("12"));
}

#[test]
fn test_tasks_only_file_leaves_resources_and_assignments() {
    let (mut store, config) = imported();
    let resources = store.rows("msp_resources").to_vec();
    let assignments = store.rows("msp_assignments").to_vec();

    let parsed = ParsedProject {
        tasks: sample().tasks,
        sections: Sections::TASKS_ONLY,
        ..Default::default()
    };
    let outcome = reconcile(&mut store, &config, &scope(), parsed).unwrap();

    assert_eq!(outcome.summary.change_count(), 0);
    assert!(outcome.summary.resources.kept_old.is_empty());
    assert!(store.write_calls().is_empty(), "{:?}", store.write_calls());
    assert_eq!(store.rows("msp_resources"), resources.as_slice());
    assert_eq!(store.rows("msp_assignments"), assignments.as_slice());
    assert_eq!(store.rows("metadata_list").len(), 3);
    let notes = &outcome.summary.notes;
    assert!(notes.contains(
        &"The file has no resources section; stored resources were left untouched".to_string()
    ));
    assert!(notes.contains(
        &"The file has no assignments section; stored assignments were left untouched".to_string()
    ));
}

#[test]
fn test_task_without_metadata_row_is_linked_once() {
    let mut store = MemoryStore::new();
    let config = ImportConfig::default();
    store
        .insert(
            "msp_tasks",
            vec![row(json!({"uid": "2", "organization_id": "acme", "project_id": "p1"}))],
        )
        .unwrap();
    let task_id = by_uid(&store, "msp_tasks", "2").unwrap()["id"].clone();
    store
        .insert(
            "msp_predecessors",
            vec![row(json!({
                "task_id": task_id.clone(),
                "metadata_list_id": null,
                "predecessor_uid": "1",
                "type": 1,
                "organization_id": "acme",
                "project_id": "p1",
            }))],
        )
        .unwrap();

    let parsed = ParsedProject {
        tasks: vec![task("2", "Build", vec![link("1", 1)])],
        ..Default::default()
    };
    let outcome = reconcile(&mut store, &config, &scope(), parsed.clone()).unwrap();
    let changes = &outcome.summary.tasks.updated[0].changes;
    assert!(changes.contains(&"metadata linked".to_string()), "{:?}", changes);
    assert!(!changes.contains(&"predecessors".to_string()), "{:?}", changes);

    let build = by_uid(&store, "msp_tasks", "2").unwrap().clone();
    assert_eq!(build["id"], task_id);
    let meta = by_id(&store, "metadata_list", &build["metadata_list_id"]).unwrap();
    assert_eq!(meta["label"], json!("Build"));
    assert_eq!(meta["type"], json!("task"));
    assert_eq!(meta["source"], json!("ms project"));

    let preds = store.rows("msp_predecessors");
    assert_eq!(preds.len(), 1);
    assert_eq!(preds[0]["task_id"], task_id);
    assert_eq!(preds[0]["metadata_list_id"], build["metadata_list_id"]);

    for _ in 0..2 {
        store.clear_calls();
        let outcome = reconcile(&mut store, &config, &scope(), parsed.clone()).unwrap();
        assert_eq!(outcome.summary.change_count(), 0);
        assert!(store.write_calls().is_empty(), "{:?}", store.write_calls());
        assert_eq!(store.rows("msp_predecessors").len(), 1);
        assert_eq!(store.rows("metadata_list").len(), 1);
    }
}

#[test]
fn test_duplicate_uid_in_file_is_skipped() {
    let mut store = MemoryStore::new();
    let config = ImportConfig::default();
    let parsed = ParsedProject {
        tasks: vec![task("1", "Plan", vec![]), task("1", "Plan again", vec![])],
        ..Default::default()
    };
    let outcome = reconcile(&mut store, &config, &scope(), parsed).unwrap();

    assert_eq!(outcome.summary.tasks.inserted.len(), 1);
    let skipped = &outcome.summary.tasks.skipped;
    assert_eq!(skipped.len(), 1);
    assert_eq!(skipped[0].reason, SkipReason::DuplicateUid);
    assert_eq!(skipped[0].label.as_deref(), Some("Plan again"));
    assert!(outcome
        .summary_lines
        .iter()
        .any(|l| l == "    - 1 (Plan again): duplicate uid"));
    assert_eq!(store.rows("msp_tasks").len(), 1);
}

#[test]
fn test_changed_links_replace_predecessor_rows() {
    let (mut store, config) = imported();
    let mut parsed = sample();
    parsed.tasks[1].set_predecessors(vec![link("1", 3)]);

    let outcome = reconcile(&mut store, &config, &scope(), parsed).unwrap();
    let updated = &outcome.summary.tasks.updated;
    assert_eq!(updated.len(), 1);
    assert_eq!(updated[0].record.uid, "2");
    assert_eq!(updated[0].changes, vec!["predecessors"]);

    let preds = store.rows("msp_predecessors");
    assert_eq!(preds.len(), 1);
    assert_eq!(preds[0]["type"], json!(3));
    assert_eq!(preds[0]["task_id"], by_uid(&store, "msp_tasks", "2").unwrap()["id"]);
}

#[test]
fn test_legacy_rows_without_uid_are_left_alone() {
    let (mut store, config) = imported();
    store
        .insert(
            "msp_assignments",
            vec![row(json!({
                "task_uid": "1",
                "resource_uid": "10",
                "organization_id": "acme",
                "project_id": "p1",
            }))],
        )
        .unwrap();

    let outcome = reconcile(&mut store, &config, &scope(), sample()).unwrap();
    assert_eq!(outcome.summary.assignments.change_count(), 0);
    assert!(outcome
        .summary
        .notes
        .contains(&"1 legacy assignment rows without a uid were left untouched".to_string()));
    assert_eq!(store.rows("msp_assignments").len(), 2);
}

#[test]
fn test_other_scopes_are_untouched() {
    let mut store = MemoryStore::new();
    store
        .insert(
            "msp_tasks",
            vec![row(json!({
                "uid": "1",
                "name": "Someone else's",
                "organization_id": "other",
                "project_id": "p1",
            }))],
        )
        .unwrap();
    let config = ImportConfig::default();
    let outcome = reconcile(&mut store, &config, &scope(), sample()).unwrap();

    assert_eq!(outcome.summary.tasks.inserted.len(), 2);
    assert_eq!(store.rows("msp_tasks").len(), 3);
    assert!(store
        .rows("msp_tasks")
        .iter()
        .any(|r| r["organization_id"] == json!("other") && r["name"] == json!("Someone else's")));
}

#[test]
fn test_dry_run_reports_without_writing() {
    let mut store = MemoryStore::new();
    let config = ImportConfig::default();
    let outcome = Reconciler::new(&mut store, &config, &scope())
        .dry_run(true)
        .run(sample())
        .unwrap();

    assert!(outcome.dry_run);
    assert_eq!(outcome.summary.tasks.inserted.len(), 2);
    assert!(outcome
        .summary
        .notes
        .contains(&"Dry run: nothing was written".to_string()));
    assert!(store.write_calls().is_empty());
    assert!(store.rows("msp_tasks").is_empty());
}

#[test]
fn test_progress_reports_each_chunk() {
    let mut store = MemoryStore::new();
    let config = ImportConfig {
        chunk_size: 1,
        ..Default::default()
    };
    let mut labels: Vec<String> = Vec::new();
    let mut progress = |label: &str| labels.push(label.to_string());
    Reconciler::new(&mut store, &config, &scope())
        .with_progress(&mut progress)
        .run(sample())
        .unwrap();

    assert!(labels.contains(&"Inserting metadata_list 1/2".to_string()));
    assert!(labels.contains(&"Inserting msp_tasks 2/2".to_string()));
    assert!(labels.contains(&"Inserting msp_assignments 1/1".to_string()));
    let inserts = store
        .calls()
        .iter()
        .filter(|c| c.op == StoreOp::Insert && c.table == "msp_tasks")
        .count();
    assert_eq!(inserts, 2);
}

#[test]
fn test_failed_write_keeps_earlier_writes() {
    let mut store = MemoryStore::new();
    store.fail_after(StoreOp::Insert, "msp_tasks", 0);
    let config = ImportConfig::default();
    let err = reconcile(&mut store, &config, &scope(), sample()).unwrap_err();

    match &err {
        ImportError::Write { table, .. } => assert_eq!(table, "msp_tasks"),
        other => panic!("unexpected error: {}", other),
    }
    assert!(err.is_partial_write());
    assert_eq!(store.rows("metadata_list").len(), 2);
    assert!(store.rows("msp_tasks").is_empty());
    assert!(store.rows("msp_resources").is_empty());
}

#[test]
fn test_rerun_after_failed_write_removes_orphaned_metadata() {
    let mut store = MemoryStore::new();
    store.fail_after(StoreOp::Insert, "msp_tasks", 0);
    let config = ImportConfig::default();
    reconcile(&mut store, &config, &scope(), sample()).unwrap_err();

    let orphans: Vec<Value> = store
        .rows("metadata_list")
        .iter()
        .map(|r| r["id"].clone())
        .collect();
    assert_eq!(orphans.len(), 2);
    // Something else picked up the first one in the meantime.
    mark_used(&mut store, &orphans[0]);

    let outcome = reconcile(&mut store, &config, &scope(), sample()).unwrap();
    assert_eq!(outcome.summary.tasks.inserted.len(), 2);
    assert!(outcome
        .summary
        .notes
        .contains(&"1 orphaned metadata rows were removed".to_string()));
    assert!(by_id(&store, "metadata_list", &orphans[0]).is_some());
    assert!(by_id(&store, "metadata_list", &orphans[1]).is_none());
    assert_eq!(store.rows("metadata_list").len(), 4);

    // Nothing left to sweep on the next run.
    store.clear_calls();
    let outcome = reconcile(&mut store, &config, &scope(), sample()).unwrap();
    assert_eq!(outcome.summary.change_count(), 0);
    assert!(store.write_calls().is_empty());
}

#[test]
fn test_missing_scope_is_rejected_before_any_read() {
    assert!(matches!(
        Scope::new("", "p1", None),
        Err(ImportError::Validation(_))
    ));
    assert!(matches!(
        Scope::new("acme", "  ", None),
        Err(ImportError::Validation(_))
    ));
}
