use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Filter, Row, Store, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoreOp {
    Select,
    Insert,
    Update,
    Delete,
}

/// One call issued against the store, as recorded by [`MemoryStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreCall {
    pub op: StoreOp,
    pub table: String,
    /// Rows sent (insert) or rows returned (select, update, delete).
    pub rows: usize,
}

#[derive(Debug, Clone)]
struct InjectedFailure {
    op: StoreOp,
    table: String,
    /// Calls that still succeed before the failure fires.
    remaining_ok: usize,
}

/// In-process store: tables of JSON rows with sequential integer ids.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryStore {
    tables: BTreeMap<String, Vec<Row>>,
    next_id: i64,
    #[serde(skip)]
    calls: Vec<StoreCall>,
    #[serde(skip)]
    failures: Vec<InjectedFailure>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All rows of a table, in insertion order.
    pub fn rows(&self, table: &str) -> &[Row] {
        self.tables.get(table).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Calls issued since creation or the last [`MemoryStore::clear_calls`].
    pub fn calls(&self) -> &[StoreCall] {
        &self.calls
    }

    /// Calls that changed data.
    pub fn write_calls(&self) -> Vec<&StoreCall> {
        self.calls.iter().filter(|c| c.op != StoreOp::Select).collect()
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    /// Make the call after `succeed_first` successful `op` calls on `table` fail.
    pub fn fail_after(&mut self, op: StoreOp, table: &str, succeed_first: usize) {
        self.failures.push(InjectedFailure {
            op,
            table: table.to_string(),
            remaining_ok: succeed_first,
        });
    }

    fn check_failure(&mut self, op: StoreOp, table: &str) -> Result<(), StoreError> {
        let Some(pos) = self
            .failures
            .iter()
            .position(|f| f.op == op && f.table == table)
        else {
            return Ok(());
        };
        if self.failures[pos].remaining_ok > 0 {
            self.failures[pos].remaining_ok -= 1;
            return Ok(());
        }
        self.failures.remove(pos);
        Err(StoreError::Rejected(format!(
            "injected {:?} failure on {}",
            op, table
        )))
    }

    fn record(&mut self, op: StoreOp, table: &str, rows: usize) {
        self.calls.push(StoreCall {
            op,
            table: table.to_string(),
            rows,
        });
    }

    fn assign_id(&mut self, row: &mut Row) {
        match row.get("id").and_then(Value::as_i64) {
            Some(existing) => self.next_id = self.next_id.max(existing),
            None => {
                self.next_id += 1;
                row.insert("id".into(), Value::from(self.next_id));
            }
        }
    }
}

fn matches_all(row: &Row, filters: &[Filter]) -> bool {
    filters.iter().all(|f| f.matches(row))
}

impl Store for MemoryStore {
    fn select(&mut self, table: &str, filters: &[Filter]) -> Result<Vec<Row>, StoreError> {
        self.check_failure(StoreOp::Select, table)?;
        let found: Vec<Row> = self
            .rows(table)
            .iter()
            .filter(|r| matches_all(r, filters))
            .cloned()
            .collect();
        self.record(StoreOp::Select, table, found.len());
        Ok(found)
    }

    fn insert(&mut self, table: &str, rows: Vec<Row>) -> Result<Vec<Row>, StoreError> {
        self.check_failure(StoreOp::Insert, table)?;
        self.record(StoreOp::Insert, table, rows.len());
        let mut stored = Vec::with_capacity(rows.len());
        for mut row in rows {
            self.assign_id(&mut row);
            stored.push(row);
        }
        self.tables
            .entry(table.to_string())
            .or_default()
            .extend(stored.iter().cloned());
        Ok(stored)
    }

    fn update(
        &mut self,
        table: &str,
        patch: &Row,
        filters: &[Filter],
    ) -> Result<Vec<Row>, StoreError> {
        self.check_failure(StoreOp::Update, table)?;
        let mut updated = Vec::new();
        if let Some(rows) = self.tables.get_mut(table) {
            for row in rows.iter_mut().filter(|r| matches_all(r, filters)) {
                for (k, v) in patch {
                    row.insert(k.clone(), v.clone());
                }
                updated.push(row.clone());
            }
        }
        self.record(StoreOp::Update, table, updated.len());
        Ok(updated)
    }

    fn delete(&mut self, table: &str, filters: &[Filter]) -> Result<Vec<Row>, StoreError> {
        self.check_failure(StoreOp::Delete, table)?;
        let mut removed = Vec::new();
        if let Some(rows) = self.tables.get_mut(table) {
            let (gone, kept): (Vec<Row>, Vec<Row>) =
                rows.drain(..).partition(|r| matches_all(r, filters));
            *rows = kept;
            removed = gone;
        }
        self.record(StoreOp::Delete, table, removed.len());
        Ok(removed)
    }
}
