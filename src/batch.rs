//! Chunked, strictly sequential access to the store.
//!
//! Every call waits for the previous one. The first failing chunk aborts the
//! operation; chunks already sent stay committed.

use serde_json::Value;

use crate::error::{ImportError, Result};
use crate::store::{Filter, Row, Store};

pub const DEFAULT_CHUNK_SIZE: usize = 250;

pub struct BatchWriter<'a> {
    store: &'a mut dyn Store,
    chunk_size: usize,
    progress: Option<&'a mut dyn FnMut(&str)>,
    dry_run: bool,
}

impl<'a> BatchWriter<'a> {
    pub fn new(store: &'a mut dyn Store, chunk_size: usize) -> Self {
        Self {
            store,
            chunk_size: chunk_size.max(1),
            progress: None,
            dry_run: false,
        }
    }

    /// Receive an `"<action> <table> N/M"` label before each chunk.
    pub fn with_progress(mut self, progress: &'a mut dyn FnMut(&str)) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Reads still go through; writes are skipped and return nothing.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    fn chunk_count(&self, len: usize) -> usize {
        len.div_ceil(self.chunk_size)
    }

    fn report(&mut self, action: &str, table: &str, index: usize, total: usize) {
        let label = format!("{} {} {}/{}", action, table, index + 1, total);
        tracing::debug!("{}", label);
        if let Some(progress) = self.progress.as_mut() {
            progress(&label);
        }
    }

    /// Insert `rows` in chunks; returns the stored rows in input order.
    pub fn insert(&mut self, table: &str, rows: Vec<Row>) -> Result<Vec<Row>> {
        if self.dry_run || rows.is_empty() {
            return Ok(Vec::new());
        }
        let total = self.chunk_count(rows.len());
        let mut written = Vec::with_capacity(rows.len());
        for (i, chunk) in rows.chunks(self.chunk_size).enumerate() {
            self.report("Inserting", table, i, total);
            let stored = self
                .store
                .insert(table, chunk.to_vec())
                .map_err(|e| ImportError::write(table, e))?;
            written.extend(stored);
        }
        Ok(written)
    }

    /// Apply one patch to every row whose `column` is in `keys`.
    pub fn update_in(
        &mut self,
        table: &str,
        patch: &Row,
        column: &str,
        keys: &[Value],
    ) -> Result<Vec<Row>> {
        if self.dry_run || keys.is_empty() {
            return Ok(Vec::new());
        }
        let total = self.chunk_count(keys.len());
        let mut written = Vec::new();
        for (i, chunk) in keys.chunks(self.chunk_size).enumerate() {
            self.report("Updating", table, i, total);
            let filters = [Filter::is_in(column, chunk.to_vec())];
            let stored = self
                .store
                .update(table, patch, &filters)
                .map_err(|e| ImportError::write(table, e))?;
            written.extend(stored);
        }
        Ok(written)
    }

    /// Apply a separate patch per key, one call per record.
    pub fn update_each(
        &mut self,
        table: &str,
        column: &str,
        updates: Vec<(Value, Row)>,
    ) -> Result<Vec<Row>> {
        if self.dry_run || updates.is_empty() {
            return Ok(Vec::new());
        }
        let total = self.chunk_count(updates.len());
        let mut written = Vec::new();
        for (i, chunk) in updates.chunks(self.chunk_size).enumerate() {
            self.report("Updating", table, i, total);
            for (key, patch) in chunk {
                let filters = [Filter::Eq(column.to_string(), key.clone())];
                let stored = self
                    .store
                    .update(table, patch, &filters)
                    .map_err(|e| ImportError::write(table, e))?;
                written.extend(stored);
            }
        }
        Ok(written)
    }

    /// Delete every row whose `column` is in `keys`.
    pub fn delete_in(&mut self, table: &str, column: &str, keys: &[Value]) -> Result<Vec<Row>> {
        if self.dry_run || keys.is_empty() {
            return Ok(Vec::new());
        }
        let total = self.chunk_count(keys.len());
        let mut removed = Vec::new();
        for (i, chunk) in keys.chunks(self.chunk_size).enumerate() {
            self.report("Deleting", table, i, total);
            let filters = [Filter::is_in(column, chunk.to_vec())];
            let gone = self
                .store
                .delete(table, &filters)
                .map_err(|e| ImportError::write(table, e))?;
            removed.extend(gone);
        }
        Ok(removed)
    }

    pub fn select(&mut self, table: &str, filters: &[Filter]) -> Result<Vec<Row>> {
        self.store
            .select(table, filters)
            .map_err(|e| ImportError::load(table, e))
    }

    /// Read rows whose `column` is in `keys`, chunking the key list.
    pub fn select_in(
        &mut self,
        table: &str,
        column: &str,
        keys: &[Value],
        filters: &[Filter],
    ) -> Result<Vec<Row>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let total = self.chunk_count(keys.len());
        let mut found = Vec::new();
        for (i, chunk) in keys.chunks(self.chunk_size).enumerate() {
            self.report("Reading", table, i, total);
            let mut all = filters.to_vec();
            all.push(Filter::is_in(column, chunk.to_vec()));
            let rows = self
                .store
                .select(table, &all)
                .map_err(|e| ImportError::load(table, e))?;
            found.extend(rows);
        }
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, StoreOp};
    use serde_json::json;

    fn rows(n: usize) -> Vec<Row> {
        (0..n)
            .map(|i| json!({"n": i}).as_object().cloned().unwrap())
            .collect()
    }

    #[test]
    fn test_insert_600_rows_in_three_chunks() {
        let mut store = MemoryStore::new();
        let written = {
            let mut batch = BatchWriter::new(&mut store, 250);
            batch.insert("t", rows(600)).unwrap()
        };
        assert_eq!(written.len(), 600);
        let sizes: Vec<usize> = store.calls().iter().map(|c| c.rows).collect();
        assert_eq!(sizes, vec![250, 250, 100]);
        assert!(store.calls().iter().all(|c| c.op == StoreOp::Insert));
        assert_eq!(written[599]["n"], json!(599));
    }

    #[test]
    fn test_failed_chunk_keeps_earlier_chunks() {
        let mut store = MemoryStore::new();
        store.fail_after(StoreOp::Insert, "t", 1);
        let err = {
            let mut batch = BatchWriter::new(&mut store, 250);
            batch.insert("t", rows(600)).unwrap_err()
        };
        assert!(matches!(err, ImportError::Write { ref table, .. } if table == "t"));
        assert_eq!(store.rows("t").len(), 250);
        assert_eq!(store.calls().len(), 1);
    }

    #[test]
    fn test_progress_labels() {
        let mut store = MemoryStore::new();
        let mut labels = Vec::new();
        {
            let mut sink = |s: &str| labels.push(s.to_string());
            let mut batch = BatchWriter::new(&mut store, 2).with_progress(&mut sink);
            batch.insert("t", rows(3)).unwrap();
        }
        assert_eq!(labels, vec!["Inserting t 1/2", "Inserting t 2/2"]);
    }

    #[test]
    fn test_delete_and_select_in_chunks() {
        let mut store = MemoryStore::new();
        store.insert("t", rows(5)).unwrap();
        store.clear_calls();

        let keys: Vec<Value> = (1..=5).map(Value::from).collect();
        let mut batch = BatchWriter::new(&mut store, 2);
        let found = batch.select_in("t", "id", &keys, &[]).unwrap();
        assert_eq!(found.len(), 5);
        let removed = batch.delete_in("t", "id", &keys[..3]).unwrap();
        assert_eq!(removed.len(), 3);
        drop(batch);

        assert_eq!(store.rows("t").len(), 2);
        // 3 select chunks + 2 delete chunks
        assert_eq!(store.calls().len(), 5);
    }

    #[test]
    fn test_empty_input_and_dry_run_issue_no_writes() {
        let mut store = MemoryStore::new();
        {
            let mut batch = BatchWriter::new(&mut store, 0).dry_run(true);
            assert_eq!(batch.chunk_size(), 1);
            assert!(batch.insert("t", rows(3)).unwrap().is_empty());
            assert!(batch.delete_in("t", "id", &[json!(1)]).unwrap().is_empty());
        }
        {
            let mut batch = BatchWriter::new(&mut store, 10);
            assert!(batch.insert("t", Vec::new()).unwrap().is_empty());
        }
        assert!(store.calls().is_empty());
    }

    #[test]
    fn test_update_each_applies_per_record_patch() {
        let mut store = MemoryStore::new();
        store.insert("t", rows(2)).unwrap();
        {
            let mut batch = BatchWriter::new(&mut store, 250);
            let updates = vec![
                (json!(1), json!({"name": "a"}).as_object().cloned().unwrap()),
                (json!(2), json!({"name": "b"}).as_object().cloned().unwrap()),
            ];
            assert_eq!(batch.update_each("t", "id", updates).unwrap().len(), 2);
        }
        assert_eq!(store.rows("t")[0]["name"], json!("a"));
        assert_eq!(store.rows("t")[1]["name"], json!("b"));
    }
}
